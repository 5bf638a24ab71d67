// Post page extraction.
// Turns the HTML of a post page into a PostRecord: images, body markup and comments link.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::config::{
    Config, DEFAULT_COMMENT_IFRAME_BASE, DEFAULT_COMMENT_SERVICE, DEFAULT_TRACKING_DOMAIN,
};

use super::markup::{Document, strip_spans};
use super::types::PostRecord;

static COMMENT_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"commentIframeUrl["'\s:]+([^"']+)"#).expect("valid comment token regex")
});
static BLOG_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"blogId[=:"'\s]+(\d+)"#).expect("valid blog id regex"));
static POST_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"postId[=:"'\s]+(\d+)"#).expect("valid post id regex"));

const POST_BODY_CLASS: &str = "post-body";
const SEPARATOR_CLASS: &str = "separator";

/// Extracts structured post data from raw post-page HTML.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    tracking_domain: String,
    comment_service: String,
    comment_iframe_base: String,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self {
            tracking_domain: DEFAULT_TRACKING_DOMAIN.to_string(),
            comment_service: DEFAULT_COMMENT_SERVICE.to_string(),
            comment_iframe_base: DEFAULT_COMMENT_IFRAME_BASE.to_string(),
        }
    }
}

impl ContentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            tracking_domain: config.tracking_domain.clone(),
            comment_service: config.comment_service.clone(),
            comment_iframe_base: config.comment_iframe_base.clone(),
        }
    }

    /// Extract a record from `html`. Relative URLs are resolved against `base`.
    ///
    /// Never fails: anything that cannot be found degrades to its empty value.
    pub fn extract(&self, html: &str, base: Option<&Url>) -> PostRecord {
        let doc = Document::parse(html);
        PostRecord {
            images: self.images(&doc, base),
            body_html: self.body_html(&doc),
            comments_url: self.comments_url(&doc),
        }
    }

    /// Targets of every anchor inside an image separator, in document order.
    fn images(&self, doc: &Document<'_>, base: Option<&Url>) -> Vec<String> {
        let mut anchors = Vec::new();
        for separator in doc.select(|t| t.has_class(SEPARATOR_CLASS)) {
            for anchor in doc.select_within(&separator, |t| t.name == "a") {
                // Nested separators would otherwise yield the same anchor twice.
                if anchors.iter().any(|(index, _)| *index == anchor.outer.start) {
                    continue;
                }
                if let Some(href) = anchor.attr("href") {
                    anchors.push((anchor.outer.start, href));
                }
            }
        }
        anchors.sort_by_key(|(index, _)| *index);

        anchors
            .into_iter()
            .map(|(_, href)| resolve(base, &href))
            .filter(|url| !url.is_empty() && !url.contains(&self.tracking_domain))
            .collect()
    }

    /// Body markup with images and separator blocks removed.
    fn body_html(&self, doc: &Document<'_>) -> String {
        let Some(body) = doc.first(|t| t.has_class(POST_BODY_CLASS)) else {
            return String::new();
        };
        let removed = doc
            .select_within(&body, |t| t.name == "img" || t.has_class(SEPARATOR_CLASS))
            .into_iter()
            .map(|element| element.outer)
            .collect();
        strip_spans(doc.html(), body.inner.clone(), removed)
    }

    /// Comment iframe URL: embedded iframe, then inline script token, then composed from ids.
    fn comments_url(&self, doc: &Document<'_>) -> Option<String> {
        self.comments_from_iframe(doc)
            .or_else(|| comments_from_scripts(doc))
            .or_else(|| self.comments_from_ids(doc.html()))
    }

    fn comments_from_iframe(&self, doc: &Document<'_>) -> Option<String> {
        doc.select(|t| t.name == "iframe")
            .into_iter()
            .filter_map(|frame| frame.attr("src"))
            .find(|src| src.contains(&self.comment_service))
    }

    fn comments_from_ids(&self, html: &str) -> Option<String> {
        let blog_id = BLOG_ID_RE.captures(html)?.get(1)?.as_str();
        let post_id = POST_ID_RE.captures(html)?.get(1)?.as_str();
        Some(format!(
            "{}?blogID={}&postID={}",
            self.comment_iframe_base, blog_id, post_id
        ))
    }
}

/// Later scripts take precedence over earlier ones.
fn comments_from_scripts(doc: &Document<'_>) -> Option<String> {
    doc.select(|t| t.name == "script")
        .into_iter()
        .map(|script| script.inner_html())
        .filter(|text| text.contains("commentIframeUrl"))
        .filter_map(|text| {
            COMMENT_TOKEN_RE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .last()
}

/// Resolve `href` against `base`, keeping it unchanged when it cannot be resolved.
pub(crate) fn resolve(base: Option<&Url>, href: &str) -> String {
    let href = href.trim();
    let resolved = match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    };
    resolved.map_or_else(|| href.to_string(), |url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: &str = r#"<html><body>
<div class="post-body entry-content">
  <p>Intro</p>
  <div class="separator"><a href="https://img.example/1.jpg"><img src="https://img.example/1s.jpg"></a></div>
  <div class="separator"><a href="https://blogger.googleusercontent.com/tracker/abc"><img src="t.gif"></a></div>
  <div class="separator"><a href="/media/2.jpg"><img src="/media/2s.jpg"></a></div>
  <img src="https://img.example/loose.jpg">
  <p>Outro</p>
</div>
<iframe src="https://www.blogger.com/comment/frame/123?po=456"></iframe>
</body></html>"#;

    fn base() -> Url {
        Url::parse("https://blog.example/2024/01/post.html").unwrap()
    }

    #[test]
    fn images_skip_tracking_and_resolve_relative() {
        let record = ContentExtractor::new().extract(POST, Some(&base()));
        assert_eq!(
            record.images,
            vec![
                "https://img.example/1.jpg".to_string(),
                "https://blog.example/media/2.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn tracking_anchor_is_dropped() {
        let html = r#"<div class="separator"><a href="https://img.example/a.jpg">a</a></div>
<div class="separator"><a href="https://blogger.googleusercontent.com/tracker/1">t</a></div>"#;
        let record = ContentExtractor::new().extract(html, None);
        assert_eq!(record.images, vec!["https://img.example/a.jpg".to_string()]);
    }

    #[test]
    fn duplicate_images_are_kept() {
        let html = r#"<div class="separator"><a href="https://img.example/a.jpg">a</a></div>
<div class="separator"><a href="https://img.example/a.jpg">a</a></div>"#;
        let record = ContentExtractor::new().extract(html, None);
        assert_eq!(record.images.len(), 2);
    }

    #[test]
    fn body_strips_images_and_separators() {
        let record = ContentExtractor::new().extract(POST, Some(&base()));
        assert!(record.body_html.contains("<p>Intro</p>"));
        assert!(record.body_html.contains("<p>Outro</p>"));
        assert!(!record.body_html.contains("<img"));
        assert!(!record.body_html.contains("separator"));
    }

    #[test]
    fn comments_from_iframe_first() {
        let record = ContentExtractor::new().extract(POST, None);
        assert_eq!(
            record.comments_url.as_deref(),
            Some("https://www.blogger.com/comment/frame/123?po=456")
        );
    }

    #[test]
    fn comments_from_script_token() {
        let html = r#"<div class="post-body">x</div>
<script>var cfg = {"commentIframeUrl": "https://www.blogger.com/comment-iframe.g?blogID=1&postID=2"};</script>
<script>blogId = 999; postId = 888;</script>"#;
        let record = ContentExtractor::new().extract(html, None);
        assert_eq!(
            record.comments_url.as_deref(),
            Some("https://www.blogger.com/comment-iframe.g?blogID=1&postID=2")
        );
    }

    #[test]
    fn comments_composed_from_ids() {
        let html = r#"<div class="post-body">x</div><div data-blogId="12345" data-postId="678"></div>
<script>window.blogId = "12345"; window.postId = "678";</script>"#;
        let record = ContentExtractor::new().extract(html, None);
        assert_eq!(
            record.comments_url.as_deref(),
            Some("https://www.blogger.com/comment-iframe.g?blogID=12345&postID=678")
        );
    }

    #[test]
    fn missing_everything_yields_empty_record() {
        let record = ContentExtractor::new().extract("<<<not html at all", None);
        assert_eq!(record, PostRecord::empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = ContentExtractor::new();
        let first = extractor.extract(POST, Some(&base()));
        let second = extractor.extract(POST, Some(&base()));
        assert_eq!(first, second);
    }
}
