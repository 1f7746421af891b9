//! Conversion of raw file content into the HTML stored alongside it.

/// Produces the rendered form of a file, once, at creation time.
pub trait Renderer: Send + Sync {
    /// Render `raw` for display. `lexer` is already validated.
    fn render(&self, raw: &str, lexer: &str) -> String;
}

/// Escapes content and lays it out as a numbered table of lines.
///
/// No highlighting is applied; `lexer` only ends up as a CSS class.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn render(&self, raw: &str, lexer: &str) -> String {
        let mut out = String::with_capacity(raw.len() + raw.len() / 2 + 64);
        out.push_str(&format!(
            "<table class=\"sourcetable\"><tbody class=\"lexer-{}\">",
            escape_html(lexer)
        ));
        for (index, line) in raw.lines().enumerate() {
            let number = index + 1;
            out.push_str(&format!(
                "<tr><td class=\"linenos\"><a href=\"#L-{0}\" id=\"L-{0}\">{0}</a></td><td class=\"code\">{1}</td></tr>",
                number,
                escape_html(line)
            ));
        }
        out.push_str("</tbody></table>");
        out
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}
