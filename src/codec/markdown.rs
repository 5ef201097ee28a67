use pulldown_cmark::{html, Event, Options, Parser};

use super::inline_css::inline_styles;
use super::themes::Theme;

const ARTICLE_OPEN: &str = "<article class=\"markdown-body\">";
const ARTICLE_CLOSE: &str = "</article>";

/// Render markdown to a self-contained HTML fragment.
///
/// Soft breaks become `<br />` and raw HTML in the source is escaped so it
/// shows up as typed. The fragment is styled inside an article wrapper and
/// only the wrapper's inner HTML is returned.
pub(super) fn render(source: &str, theme: &Theme) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut body = String::new();
    html::push_html(&mut body, parser);

    let article = format!("{}{}{}", ARTICLE_OPEN, body, ARTICLE_CLOSE);
    let styled = inline_styles(&article, &theme.css);
    article_inner(&styled).to_string()
}

/// Inner HTML of the outermost article; the article tag may have gained a
/// `style` attribute during inlining.
fn article_inner(html: &str) -> &str {
    let start = html
        .find("<article")
        .and_then(|open| html[open..].find('>').map(|gt| open + gt + 1))
        .unwrap_or(0);
    let end = html.rfind(ARTICLE_CLOSE).unwrap_or(html.len());
    if start <= end {
        &html[start..end]
    } else {
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_theme() -> Theme {
        Theme {
            name: "test".to_string(),
            css: String::new(),
        }
    }

    #[test]
    fn test_render_heading_and_paragraph() {
        let html = render("# Title\n\nSome *text*", &plain_theme());
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<p>Some <em>text</em></p>"));
        assert!(!html.contains("<article"));
    }

    #[test]
    fn test_soft_breaks_become_hard_breaks() {
        let html = render("line one\nline two", &plain_theme());
        assert!(html.contains("line one<br />"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render("hello <script>alert(1)</script>", &plain_theme());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_fenced_code_keeps_language_class() {
        let html = render("```rust\nfn main() {}\n```", &plain_theme());
        assert!(html.contains("class=\"language-rust\""));
    }

    #[test]
    fn test_theme_styles_are_inlined() {
        let theme = Theme {
            name: "test".to_string(),
            css: ".markdown-body h1 { color: red; }".to_string(),
        };
        let html = render("# Hi", &theme);
        assert!(html.contains("<h1 style=\"color: red\">Hi</h1>"));
        assert!(!html.contains("<style"));
    }

    #[test]
    fn test_article_inner_after_styling() {
        let html = "<article class=\"markdown-body\" style=\"color: red\"><p>x</p></article>";
        assert_eq!(article_inner(html), "<p>x</p>");
    }
}
