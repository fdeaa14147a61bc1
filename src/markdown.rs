//! Markdown to HTML rendering for assistant turns.
//!
//! Rendering never fails. [`build_renderer`] tries to construct the CommonMark
//! renderer and, when its options are unusable, logs a warning and hands back
//! [`FallbackRenderer`], which only escapes text and turns newlines into
//! `<br>` tags.

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, html};

use crate::error::{Error, Result};
use crate::observability::MARKDOWN_FALLBACKS;

/// Converts text into an HTML fragment.
pub trait MarkdownRenderer: Send + Sync {
    /// Render `text` as HTML.
    fn render(&self, text: &str) -> String;
}

/// Knobs for the CommonMark renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownOptions {
    /// Enable GitHub-style tables.
    pub tables: bool,

    /// Enable `- [ ]` / `- [x]` task lists.
    pub task_lists: bool,

    /// Enable `~~strikethrough~~`.
    pub strikethrough: bool,

    /// Browsing context links open in, or `None` to leave links untouched.
    pub link_target: Option<String>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            task_lists: true,
            strikethrough: true,
            link_target: Some("_blank".to_string()),
        }
    }
}

/// CommonMark renderer backed by `pulldown-cmark`.
///
/// Raw HTML in the input is dropped, links with a `javascript:`, `vbscript:`
/// or `data:` destination lose their anchor, and every other link gets the
/// configured target.
#[derive(Debug, Clone)]
pub struct CommonMarkRenderer {
    options: Options,
    link_target: Option<String>,
}

impl CommonMarkRenderer {
    /// Create a renderer, validating the options.
    pub fn new(options: &MarkdownOptions) -> Result<Self> {
        if let Some(target) = &options.link_target {
            let valid = !target.is_empty()
                && target
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(Error::validation(
                    format!("invalid link target {target:?}"),
                    Some("link_target".to_string()),
                ));
            }
        }

        let mut flags = Options::empty();
        if options.tables {
            flags.insert(Options::ENABLE_TABLES);
        }
        if options.task_lists {
            flags.insert(Options::ENABLE_TASKLISTS);
        }
        if options.strikethrough {
            flags.insert(Options::ENABLE_STRIKETHROUGH);
        }

        Ok(Self {
            options: flags,
            link_target: options.link_target.clone(),
        })
    }

    fn open_link(&self, link_type: LinkType, dest_url: &str, title: &str) -> String {
        let href = match link_type {
            LinkType::Email => format!("mailto:{dest_url}"),
            _ => dest_url.to_string(),
        };
        let mut tag = format!("<a href=\"{}\"", escape_html(&href));
        if !title.is_empty() {
            tag.push_str(&format!(" title=\"{}\"", escape_html(title)));
        }
        if let Some(target) = &self.link_target {
            tag.push_str(&format!(" target=\"{target}\" rel=\"noopener noreferrer\""));
        }
        tag.push('>');
        tag
    }
}

impl MarkdownRenderer for CommonMarkRenderer {
    fn render(&self, text: &str) -> String {
        // One entry per open link: whether its anchor was emitted.
        let mut links: Vec<bool> = Vec::new();
        let parser = Parser::new_ext(text, self.options).filter_map(|event| match event {
            Event::Html(_) | Event::InlineHtml(_) => None,
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            }) => {
                if is_blocked_url(&dest_url) {
                    links.push(false);
                    None
                } else {
                    links.push(true);
                    Some(Event::Html(CowStr::from(
                        self.open_link(link_type, &dest_url, &title),
                    )))
                }
            }
            Event::End(TagEnd::Link) => {
                if links.pop().unwrap_or(false) {
                    Some(Event::Html(CowStr::Borrowed("</a>")))
                } else {
                    None
                }
            }
            other => Some(other),
        });

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// Degraded renderer used when the CommonMark renderer cannot be built.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackRenderer;

impl MarkdownRenderer for FallbackRenderer {
    fn render(&self, text: &str) -> String {
        escape_html(text).replace('\n', "<br>")
    }
}

/// Build the best available renderer for `options`.
pub fn build_renderer(options: &MarkdownOptions) -> Box<dyn MarkdownRenderer> {
    match CommonMarkRenderer::new(options) {
        Ok(renderer) => Box::new(renderer),
        Err(err) => {
            MARKDOWN_FALLBACKS.click();
            tracing::warn!(error = %err, "markdown renderer unavailable; using line-break fallback");
            Box::new(FallbackRenderer)
        }
    }
}

/// Render text literally, so it is never interpreted as markup.
pub fn render_literal(text: &str) -> String {
    escape_html(text)
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_blocked_url(url: &str) -> bool {
    let scheme: String = url
        .trim_start()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .take(11)
        .collect::<String>()
        .to_ascii_lowercase();
    ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|blocked| scheme.starts_with(blocked))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> CommonMarkRenderer {
        CommonMarkRenderer::new(&MarkdownOptions::default()).unwrap()
    }

    #[test]
    fn bold_becomes_strong() {
        let html = renderer().render("**bold**");
        assert_eq!(html, "<p><strong>bold</strong></p>\n");
    }

    #[test]
    fn tables_render() {
        let html = renderer().render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"), "{html}");
        assert!(html.contains("<td>1</td>"), "{html}");
    }

    #[test]
    fn task_lists_render() {
        let html = renderer().render("- [x] done\n- [ ] todo\n");
        assert!(html.contains("type=\"checkbox\""), "{html}");
        assert!(html.contains("checked"), "{html}");
    }

    #[test]
    fn links_open_in_new_context() {
        let html = renderer().render("[docs](https://example.com/a?b=1&c=2 \"Docs\")");
        assert_eq!(
            html,
            "<p><a href=\"https://example.com/a?b=1&amp;c=2\" title=\"Docs\" \
             target=\"_blank\" rel=\"noopener noreferrer\">docs</a></p>\n"
        );
    }

    #[test]
    fn links_untouched_without_target() {
        let options = MarkdownOptions {
            link_target: None,
            ..MarkdownOptions::default()
        };
        let html = CommonMarkRenderer::new(&options)
            .unwrap()
            .render("[x](https://example.com)");
        assert_eq!(html, "<p><a href=\"https://example.com\">x</a></p>\n");
    }

    #[test]
    fn raw_html_is_dropped() {
        let html = renderer().render("hi <script>alert(1)</script> there");
        assert!(!html.contains("<script>"), "{html}");
        assert!(html.contains("hi"), "{html}");

        let html = renderer().render("<div onclick=\"x()\">\nblock\n</div>\n");
        assert!(!html.contains("<div"), "{html}");
    }

    #[test]
    fn script_links_lose_their_anchor() {
        let html = renderer().render("[click](javascript:alert(1))");
        assert_eq!(html, "<p>click</p>\n");
    }

    #[test]
    fn data_links_lose_their_anchor() {
        let html = renderer().render("[img](data:text/html;base64,PHNjcmlwdD4=)");
        assert_eq!(html, "<p>img</p>\n");
    }

    #[test]
    fn email_autolinks_keep_mailto() {
        let html = renderer().render("write to <ops@example.com>");
        assert_eq!(
            html,
            "<p>write to <a href=\"mailto:ops@example.com\" \
             target=\"_blank\" rel=\"noopener noreferrer\">ops@example.com</a></p>\n"
        );

        let html = renderer().render("<https://example.com>");
        assert!(html.contains("href=\"https://example.com\""), "{html}");
    }

    #[test]
    fn invalid_link_target_is_rejected() {
        let options = MarkdownOptions {
            link_target: Some("\" onmouseover=\"x".to_string()),
            ..MarkdownOptions::default()
        };
        let err = CommonMarkRenderer::new(&options).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn build_renderer_falls_back() {
        let options = MarkdownOptions {
            link_target: Some(String::new()),
            ..MarkdownOptions::default()
        };
        let renderer = build_renderer(&options);
        assert_eq!(renderer.render("line one\nline two"), "line one<br>line two");
        assert_eq!(renderer.render("**bold**"), "**bold**");
    }

    #[test]
    fn build_renderer_prefers_commonmark() {
        let renderer = build_renderer(&MarkdownOptions::default());
        assert!(renderer.render("**bold**").contains("<strong>bold</strong>"));
    }

    #[test]
    fn fallback_escapes_markup() {
        assert_eq!(
            FallbackRenderer.render("<b>\n&"),
            "&lt;b&gt;<br>&amp;"
        );
    }

    #[test]
    fn literal_rendering_escapes() {
        assert_eq!(
            render_literal("**not bold** <i>x</i>"),
            "**not bold** &lt;i&gt;x&lt;/i&gt;"
        );
    }
}
