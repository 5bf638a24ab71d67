// Back-navigation state.
// Tracks the overlay layers opened on top of the feed so "back" closes the topmost one.

use serde::{Deserialize, Serialize};

/// Which drawer is shown over the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerKind {
    /// Post body text.
    Content,
    /// Comment thread link.
    Comments,
}

/// Payload handed to the drawer component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DrawerContent {
    /// Body markup. `blank` is set when the body has no visible text.
    Content { html: String, blank: bool },
    Comments { url: String },
}

impl DrawerContent {
    pub fn kind(&self) -> DrawerKind {
        match self {
            DrawerContent::Content { .. } => DrawerKind::Content,
            DrawerContent::Comments { .. } => DrawerKind::Comments,
        }
    }
}

/// An overlay layer above the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Viewer,
    Drawer(DrawerKind),
}

/// Stack of open layers (bottom = viewer, top = current).
/// At most one viewer and one drawer are open at a time.
#[derive(Debug, Clone, Default)]
pub struct BackStack {
    stack: Vec<Layer>,
}

impl BackStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current top layer.
    pub fn current(&self) -> Option<Layer> {
        self.stack.last().copied()
    }

    /// Record the viewer as open. Re-opening while open is a no-op.
    pub fn push_viewer(&mut self) {
        if !self.has_viewer() {
            self.stack.clear();
            self.stack.push(Layer::Viewer);
        }
    }

    /// Record a drawer. A drawer already open is replaced.
    pub fn push_drawer(&mut self, kind: DrawerKind) {
        self.stack.retain(|layer| !matches!(layer, Layer::Drawer(_)));
        self.stack.push(Layer::Drawer(kind));
    }

    /// Pop the top layer (go back). The drawer goes before the viewer.
    pub fn pop(&mut self) -> Option<Layer> {
        self.stack.pop()
    }

    /// Remove the drawer layer, if any, without touching the viewer.
    pub fn drop_drawer(&mut self) -> Option<DrawerKind> {
        let pos = self
            .stack
            .iter()
            .position(|layer| matches!(layer, Layer::Drawer(_)))?;
        match self.stack.remove(pos) {
            Layer::Drawer(kind) => Some(kind),
            Layer::Viewer => None,
        }
    }

    pub fn has_viewer(&self) -> bool {
        self.stack.contains(&Layer::Viewer)
    }

    pub fn reset(&mut self) {
        self.stack.clear();
    }
}
