//! HTML rewriting.
//!
//! Runs the buffered document through `lol_html` once:
//! - `<base href="{origin}/">` right after the first `<head>` start tag,
//!   or at the very start of the document when there is none
//! - the interceptor script right before the first `</body>`, or at the very
//!   end of the document when there is none
//!   (a `</body>` with no matching `<body>` start tag still counts)
//! - optionally, relative `href`/`src`/`poster`/`action`/`srcset` references
//!   resolved against the document URL
//!
//! Upstream `<base>` elements are consumed so the document keeps exactly one;
//! the first one with an `href` sets the base for absolutized references.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lol_html::html_content::{ContentType, Element, EndTag};
use lol_html::{element, HandlerResult, HtmlRewriter, Settings};
use url::Url;

use crate::proxy::error::{ProxyError, ProxyResult};
use crate::proxy::target::ProxyTarget;
use crate::rewrite::interceptor;

/// Inputs the rewriter needs for one document.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    /// Origin of the resolved target, without trailing slash.
    pub origin: String,
    /// Full URL the document was fetched from.
    pub document_url: Url,
    /// Proxy endpoint path baked into the interceptor script.
    pub endpoint_path: String,
    /// Resolve relative references against the document URL.
    pub absolutize_references: bool,
}

impl RewriteContext {
    pub fn new(target: &ProxyTarget, endpoint_path: &str, absolutize_references: bool) -> Self {
        Self {
            origin: target.origin.clone(),
            document_url: target.resolved.clone(),
            endpoint_path: endpoint_path.to_string(),
            absolutize_references,
        }
    }

    /// The injected base declaration.
    pub fn base_tag(&self) -> String {
        format!(r#"<base href="{}/">"#, self.origin)
    }
}

/// Rewrite a markup document for display through the proxy.
pub fn rewrite_markup(html: &str, ctx: &RewriteContext) -> ProxyResult<String> {
    let base_tag = ctx.base_tag();
    let script = interceptor::render(&ctx.endpoint_path);

    let head_seen = Cell::new(false);
    let body_seen = Cell::new(false);
    let base_href_seen = Cell::new(false);
    let script_injected = Rc::new(Cell::new(false));
    let reference_base = RefCell::new(ctx.document_url.clone());

    let mut handlers = vec![
        element!("head", |el| {
            if !head_seen.replace(true) {
                el.prepend(&base_tag, ContentType::Html);
            }
            Ok(())
        }),
        element!("base", |el| {
            // Only the first `<base href>` of a document counts.
            if let Some(href) = el.get_attribute("href") {
                if !base_href_seen.replace(true) {
                    let joined = reference_base.borrow().join(href.trim());
                    if let Ok(url) = joined {
                        *reference_base.borrow_mut() = url;
                    }
                }
            }
            el.remove();
            Ok(())
        }),
        element!("body", |el| {
            if body_seen.replace(true) {
                return Ok(());
            }
            let block = script.clone();
            let injected = Rc::clone(&script_injected);
            if let Some(end_handlers) = el.end_tag_handlers() {
                end_handlers.push(Box::new(move |end: &mut EndTag| {
                    end.before(&block, ContentType::Html);
                    injected.set(true);
                    Ok(())
                }));
            }
            Ok(())
        }),
    ];

    if ctx.absolutize_references {
        handlers.push(element!("a[href], area[href], link[href]", |el| {
            absolutize_attribute(el, "href", &reference_base.borrow())
        }));
        handlers.push(element!("*[src]", |el| {
            absolutize_attribute(el, "src", &reference_base.borrow())
        }));
        handlers.push(element!("video[poster]", |el| {
            absolutize_attribute(el, "poster", &reference_base.borrow())
        }));
        handlers.push(element!("form[action]", |el| {
            absolutize_attribute(el, "action", &reference_base.borrow())
        }));
        handlers.push(element!("img[srcset], source[srcset]", |el| {
            if let Some(srcset) = el.get_attribute("srcset") {
                let rewritten = absolutize_srcset(&reference_base.borrow(), &srcset);
                el.set_attribute("srcset", &rewritten)?;
            }
            Ok(())
        }));
    }

    let mut output = Vec::with_capacity(html.len() + script.len() + base_tag.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| ProxyError::Rewrite(e.to_string()))?;
    rewriter.end().map_err(|e| ProxyError::Rewrite(e.to_string()))?;

    let mut document = String::from_utf8(output).map_err(|e| ProxyError::Rewrite(e.to_string()))?;

    if !head_seen.get() {
        document.insert_str(0, &base_tag);
    }
    if !script_injected.get() {
        match stray_body_close(&document, body_seen.get()) {
            Some(at) => document.insert_str(at, &script),
            None => document.push_str(&script),
        }
    }

    Ok(document)
}

fn absolutize_attribute(el: &mut Element, attr: &str, base: &Url) -> HandlerResult {
    if let Some(value) = el.get_attribute(attr) {
        if let Some(absolute) = absolutize_reference(base, &value) {
            el.set_attribute(attr, &absolute)?;
        }
    }
    Ok(())
}

/// Resolve a relative reference; `None` when it should be left untouched.
pub fn absolutize_reference(base: &Url, reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    // Absolute URLs and scheme-only references (data:, mailto:, javascript:) parse on their own.
    if Url::parse(trimmed).is_ok() {
        return None;
    }
    base.join(trimmed).ok().map(String::from)
}

/// Position of a `</body>` end tag in a document that never opened `<body>`.
///
/// Tokenizer end-tag hooks hang off start tags, so this one case is found by
/// a plain case-insensitive search.
fn stray_body_close(document: &str, body_seen: bool) -> Option<usize> {
    if body_seen {
        return None;
    }
    document.to_ascii_lowercase().find("</body")
}

/// Rewrite each `srcset` candidate URL, keeping its descriptor.
///
/// Candidates are split the way browsers parse them: the URL runs up to
/// whitespace (so commas inside it survive), and the descriptor runs up to the
/// next comma outside parentheses.
fn absolutize_srcset(base: &Url, srcset: &str) -> String {
    let mut candidates = Vec::new();
    let mut rest = srcset;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest.find(|c: char| c.is_ascii_whitespace()).unwrap_or(rest.len());
        let (mut url, tail) = rest.split_at(url_end);
        rest = tail;

        let mut descriptor = "";
        if url.ends_with(',') {
            url = url.trim_end_matches(',');
        } else {
            let end = descriptor_end(rest);
            descriptor = rest[..end].trim();
            rest = &rest[end..];
        }

        let url = absolutize_reference(base, url).unwrap_or_else(|| url.to_string());
        if descriptor.is_empty() {
            candidates.push(url);
        } else {
            candidates.push(format!("{url} {descriptor}"));
        }
    }

    candidates.join(", ")
}

fn descriptor_end(descriptors: &str) -> usize {
    let mut depth = 0usize;
    for (i, c) in descriptors.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return i,
            _ => {}
        }
    }
    descriptors.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::interceptor::INTERCEPTOR_MARKER;

    fn ctx(url: &str, absolutize: bool) -> RewriteContext {
        let target = ProxyTarget::resolve(Some(url)).unwrap();
        RewriteContext::new(&target, "/api/proxy", absolutize)
    }

    fn script_count(doc: &str) -> usize {
        doc.matches(INTERCEPTOR_MARKER).count()
    }

    #[test]
    fn test_base_after_head() {
        let doc = rewrite_markup(
            "<html><head><title>t</title></head><body>x</body></html>",
            &ctx("example.com", false),
        )
        .unwrap();

        assert!(doc.contains(r#"<head><base href="https://example.com/"><title>"#));
        assert_eq!(doc.matches("<base").count(), 1);
    }

    #[test]
    fn test_script_before_body_close() {
        let doc = rewrite_markup(
            "<html><head></head><body><p>x</p></body></html>",
            &ctx("example.com", false),
        )
        .unwrap();

        assert_eq!(script_count(&doc), 1);
        let script_end = doc.find("</script>").unwrap() + "</script>".len();
        let after = &doc[script_end..];
        assert!(after.trim_start().starts_with("</body>"));
        assert!(doc.find(INTERCEPTOR_MARKER).unwrap() > doc.find("<p>x</p>").unwrap());
    }

    #[test]
    fn test_missing_anchors_fall_back() {
        let doc = rewrite_markup("<p>fragment</p>", &ctx("https://example.com/a/b", false)).unwrap();

        assert!(doc.starts_with(r#"<base href="https://example.com/">"#));
        assert!(doc.trim_end().ends_with("</script>"));
        assert_eq!(script_count(&doc), 1);
    }

    #[test]
    fn test_first_occurrence_only() {
        let doc = rewrite_markup(
            "<head></head><head></head><body></body><body></body>",
            &ctx("example.com", false),
        )
        .unwrap();

        assert_eq!(doc.matches("<base").count(), 1);
        assert_eq!(script_count(&doc), 1);
    }

    #[test]
    fn test_markers_in_comments_ignored() {
        let doc = rewrite_markup(
            "<!-- <head></body> --><html><head></head><body></body></html>",
            &ctx("example.com", false),
        )
        .unwrap();

        assert!(doc.starts_with("<!-- <head></body> -->"));
        assert!(doc.contains(r#"<head><base href="https://example.com/"></head>"#));
        assert_eq!(script_count(&doc), 1);
    }

    #[test]
    fn test_uppercase_markers() {
        let doc = rewrite_markup("<HEAD></HEAD><BODY></BODY>", &ctx("example.com", false)).unwrap();
        assert!(doc.starts_with(r#"<HEAD><base href="https://example.com/">"#));
        assert_eq!(script_count(&doc), 1);
    }

    #[test]
    fn test_upstream_base_consumed() {
        let doc = rewrite_markup(
            r#"<head><base href="/static/"></head><body><img src="logo.png"></body>"#,
            &ctx("https://example.com/page", true),
        )
        .unwrap();

        assert_eq!(doc.matches("<base").count(), 1);
        assert!(doc.contains(r#"<img src="https://example.com/static/logo.png">"#));
    }

    #[test]
    fn test_references_absolutized() {
        let doc = rewrite_markup(
            concat!(
                r#"<head><link rel="stylesheet" href="css/site.css"></head><body>"#,
                r#"<a href="next.html">n</a><a href="https://other.test/">o</a>"#,
                r##"<a href="#top">t</a><a href="mailto:a@b.c">m</a>"##,
                r#"<img src="//cdn.example.com/i.png" srcset="a.png 1x, /b.png 2x">"#,
                r#"<form action="/search"></form></body>"#
            ),
            &ctx("https://example.com/dir/index.html", true),
        )
        .unwrap();

        assert!(doc.contains(r#"href="https://example.com/dir/css/site.css""#));
        assert!(doc.contains(r#"href="https://example.com/dir/next.html""#));
        assert!(doc.contains(r#"href="https://other.test/""#));
        assert!(doc.contains(r##"href="#top""##));
        assert!(doc.contains(r#"href="mailto:a@b.c""#));
        assert!(doc.contains(r#"src="https://cdn.example.com/i.png""#));
        assert!(doc.contains(
            r#"srcset="https://example.com/dir/a.png 1x, https://example.com/b.png 2x""#
        ));
        assert!(doc.contains(r#"action="https://example.com/search""#));
    }

    #[test]
    fn test_references_untouched_when_disabled() {
        let doc = rewrite_markup(
            r#"<head></head><body><a href="next.html">n</a></body>"#,
            &ctx("https://example.com/dir/", false),
        )
        .unwrap();
        assert!(doc.contains(r#"<a href="next.html">"#));
    }

    #[test]
    fn test_absolutize_reference_rules() {
        let base = Url::parse("https://example.com/a/").unwrap();
        assert_eq!(absolutize_reference(&base, "b"), Some("https://example.com/a/b".into()));
        assert_eq!(absolutize_reference(&base, "  /c "), Some("https://example.com/c".into()));
        assert_eq!(absolutize_reference(&base, ""), None);
        assert_eq!(absolutize_reference(&base, "#x"), None);
        assert_eq!(absolutize_reference(&base, "data:image/png;base64,AAAA"), None);
        assert_eq!(absolutize_reference(&base, "javascript:void(0)"), None);
    }

    #[test]
    fn test_srcset_commas_inside_urls() {
        let doc = rewrite_markup(
            concat!(
                r#"<img srcset="https://cdn.test/upload/w_300,h_200/a.jpg 1x">"#,
                r#"<img srcset="data:image/png;base64,AAAA 1x">"#,
                r#"<img srcset="small.jpg 480w,large.jpg 1080w">"#
            ),
            &ctx("https://example.com/dir/page", true),
        )
        .unwrap();

        assert!(doc.contains(r#"srcset="https://cdn.test/upload/w_300,h_200/a.jpg 1x""#));
        assert!(doc.contains(r#"srcset="data:image/png;base64,AAAA 1x""#));
        assert!(doc.contains(
            r#"srcset="https://example.com/dir/small.jpg 480w, https://example.com/dir/large.jpg 1080w""#
        ));
    }

    #[test]
    fn test_srcset_candidate_parsing() {
        let base = Url::parse("https://example.com/a/").unwrap();
        assert_eq!(absolutize_srcset(&base, "x.png"), "https://example.com/a/x.png");
        assert_eq!(
            absolutize_srcset(&base, " x.png, y.png 2x ,, "),
            "https://example.com/a/x.png, https://example.com/a/y.png 2x"
        );
        assert_eq!(
            absolutize_srcset(&base, "img/w_1,h_2.png 1x"),
            "https://example.com/a/img/w_1,h_2.png 1x"
        );
    }

    #[test]
    fn test_first_upstream_base_wins() {
        let doc = rewrite_markup(
            r#"<head><base href="/first/"><base href="/second/"></head><body><img src="x.png"></body>"#,
            &ctx("https://example.com/page", true),
        )
        .unwrap();

        assert_eq!(doc.matches("<base").count(), 1);
        assert!(doc.contains(r#"<img src="https://example.com/first/x.png">"#));
    }

    #[test]
    fn test_body_close_without_body_start() {
        let doc = rewrite_markup(
            "<html><head></head><p>x</p></BODY></html>",
            &ctx("example.com", false),
        )
        .unwrap();

        assert_eq!(script_count(&doc), 1);
        let script_end = doc.find("</script>").unwrap() + "</script>".len();
        assert!(doc[script_end..].trim_start().starts_with("</BODY></html>"));
    }
}
