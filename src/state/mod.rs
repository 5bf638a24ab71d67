// State module.
// Viewer state machine, back navigation and the session that ties the feed together.

pub mod history;
pub mod session;
pub mod viewer;

pub use history::{BackStack, DrawerContent, DrawerKind, Layer};
pub use session::FeedSession;
pub use viewer::{NullPresenter, Phase, Presenter, Transition, ViewerSession, ViewerState};
