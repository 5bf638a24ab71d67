// Lightweight HTML scanning.
// Tokenizes tags and locates elements by name, class or attribute without building a DOM.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(/?)([a-zA-Z][a-zA-Z0-9:-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .expect("valid tag regex")
});

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid attribute regex")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is text, not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    SelfClosing,
}

/// A single start or end tag.
#[derive(Debug, Clone)]
pub struct Tag<'a> {
    /// Lowercased tag name.
    pub name: String,
    pub kind: TagKind,
    /// Byte span of the tag in the source.
    pub span: Range<usize>,
    attrs: &'a str,
}

impl<'a> Tag<'a> {
    pub fn attr(&self, name: &str) -> Option<String> {
        attr_value(self.attrs, name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    fn starts_element(&self) -> bool {
        self.kind != TagKind::Close
    }
}

/// An element located in a document: its start tag plus the extent of its content.
#[derive(Debug, Clone)]
pub struct Element<'a> {
    html: &'a str,
    tag: Tag<'a>,
    /// Index of the start tag in the document's tag list.
    index: usize,
    /// Tag indices of descendants.
    descendants: Range<usize>,
    pub outer: Range<usize>,
    pub inner: Range<usize>,
}

impl<'a> Element<'a> {
    pub fn name(&self) -> &str {
        &self.tag.name
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.tag.attr(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.tag.has_class(class)
    }

    pub fn inner_html(&self) -> &'a str {
        &self.html[self.inner.clone()]
    }

    pub fn outer_html(&self) -> &'a str {
        &self.html[self.outer.clone()]
    }

    /// Whether `other` starts inside this element.
    pub fn contains(&self, other: &Element<'_>) -> bool {
        self.descendants.contains(&other.index)
    }
}

/// Tokenized view of an HTML document.
pub struct Document<'a> {
    html: &'a str,
    tags: Vec<Tag<'a>>,
}

impl<'a> Document<'a> {
    pub fn parse(html: &'a str) -> Self {
        Self {
            html,
            tags: tokenize(html),
        }
    }

    pub fn html(&self) -> &'a str {
        self.html
    }

    /// All elements matching `pred`, in document order.
    pub fn select(&self, pred: impl Fn(&Tag<'a>) -> bool) -> Vec<Element<'a>> {
        self.select_range(0..self.tags.len(), pred)
    }

    /// Descendants of `scope` matching `pred`, in document order.
    pub fn select_within(
        &self,
        scope: &Element<'a>,
        pred: impl Fn(&Tag<'a>) -> bool,
    ) -> Vec<Element<'a>> {
        self.select_range(scope.descendants.clone(), pred)
    }

    /// First element matching `pred`.
    pub fn first(&self, pred: impl Fn(&Tag<'a>) -> bool) -> Option<Element<'a>> {
        self.tags
            .iter()
            .position(|tag| tag.starts_element() && pred(tag))
            .map(|index| self.element(index))
    }

    fn select_range(
        &self,
        range: Range<usize>,
        pred: impl Fn(&Tag<'a>) -> bool,
    ) -> Vec<Element<'a>> {
        range
            .filter(|&index| {
                let tag = &self.tags[index];
                tag.starts_element() && pred(tag)
            })
            .map(|index| self.element(index))
            .collect()
    }

    fn element(&self, index: usize) -> Element<'a> {
        let tag = self.tags[index].clone();
        let (descendants, outer, inner) = match tag.kind {
            TagKind::Open => match self.close_index(index) {
                Some(close) => {
                    let end = &self.tags[close].span;
                    (
                        index + 1..close,
                        tag.span.start..end.end,
                        tag.span.end..end.start,
                    )
                }
                None => (
                    index + 1..self.tags.len(),
                    tag.span.start..self.html.len(),
                    tag.span.end..self.html.len(),
                ),
            },
            _ => (
                index + 1..index + 1,
                tag.span.clone(),
                tag.span.end..tag.span.end,
            ),
        };
        Element {
            html: self.html,
            tag,
            index,
            descendants,
            outer,
            inner,
        }
    }

    /// Index of the end tag balancing the start tag at `open`.
    fn close_index(&self, open: usize) -> Option<usize> {
        let name = &self.tags[open].name;
        let mut depth = 0usize;
        for (index, tag) in self.tags.iter().enumerate().skip(open + 1) {
            if &tag.name != name {
                continue;
            }
            match tag.kind {
                TagKind::Open => depth += 1,
                TagKind::Close if depth == 0 => return Some(index),
                TagKind::Close => depth -= 1,
                TagKind::SelfClosing => {}
            }
        }
        None
    }
}

fn tokenize(html: &str) -> Vec<Tag<'_>> {
    let mut tags = Vec::new();
    let mut pos = 0;

    while pos < html.len() {
        let Some(caps) = TAG_RE.captures_at(html, pos) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };

        // Tags inside comments are not tags.
        if let Some(offset) = html[pos..whole.start()].find("<!--") {
            let start = pos + offset + 4;
            pos = match html[start..].find("-->") {
                Some(end) => start + end + 3,
                None => html.len(),
            };
            continue;
        }

        let name = caps[2].to_ascii_lowercase();
        let attrs = caps.get(3).map_or("", |m| m.as_str());
        let kind = if !caps[1].is_empty() {
            TagKind::Close
        } else if attrs.trim_end().ends_with('/') || VOID_ELEMENTS.contains(&name.as_str()) {
            TagKind::SelfClosing
        } else {
            TagKind::Open
        };

        pos = whole.end();
        if kind == TagKind::Open && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let needle = format!("</{}", name);
            pos = match html[pos..].to_ascii_lowercase().find(&needle) {
                Some(offset) => pos + offset,
                None => html.len(),
            };
        }

        tags.push(Tag {
            name,
            kind,
            span: whole.range(),
            attrs,
        });
    }

    tags
}

/// Look up an attribute in the raw attribute text of a tag.
fn attr_value(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE.captures_iter(attrs).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        Some(decode_entities(raw))
    })
}

/// Decode the character references that commonly appear in attribute values.
pub fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Visible text of a markup fragment: tags dropped, entities decoded.
pub fn text_content(html: &str) -> String {
    decode_entities(&TAG_RE.replace_all(html, " ")).trim().to_string()
}

/// Copy `range` of `html`, leaving out every span in `removed`.
/// Spans may overlap or nest.
pub fn strip_spans(html: &str, range: Range<usize>, mut removed: Vec<Range<usize>>) -> String {
    removed.sort_by_key(|span| span.start);

    let mut out = String::with_capacity(range.len());
    let mut cursor = range.start;
    for span in removed {
        let start = span.start.clamp(range.start, range.end);
        let end = span.end.clamp(range.start, range.end);
        if end <= cursor {
            continue;
        }
        if start > cursor {
            out.push_str(&html[cursor..start]);
        }
        cursor = end;
    }
    if cursor < range.end {
        out.push_str(&html[cursor..range.end]);
    }
    out
}
