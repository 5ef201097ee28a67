/// Render plain text one `<div>` per line so it displays exactly as typed.
pub(super) fn render(source: &str) -> String {
    let mut html = String::with_capacity(source.len() * 2);
    for line in source.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        html.push_str("<div>");
        if line.is_empty() {
            html.push_str("<br />");
        } else {
            html.push_str(&html_escape::encode_text(line));
        }
        html.push_str("</div>");
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_become_divs() {
        assert_eq!(render("a\n\nb"), "<div>a</div><div><br /></div><div>b</div>");
    }

    #[test]
    fn test_markup_is_escaped() {
        assert_eq!(render("<b>&</b>"), "<div>&lt;b&gt;&amp;&lt;/b&gt;</div>");
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(render("a\r\nb"), "<div>a</div><div>b</div>");
    }
}
