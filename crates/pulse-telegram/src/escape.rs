use pulse_report::EscapeRules;

/// MarkdownV2 escaping for the Reporter.
pub struct TelegramMarkdownV2;

impl EscapeRules for TelegramMarkdownV2 {
    fn escape_text(&self, text: &str) -> String {
        escape_markdown_v2(text)
    }

    fn hyperlink(&self, label: &str, url: &str) -> String {
        format!(
            "[{}]({})",
            escape_markdown_v2(label),
            escape_markdown_v2_url(url)
        )
    }

    fn heading(&self, text: &str) -> String {
        format!("*{}*", escape_markdown_v2(text))
    }
}

/// Escape special characters for Telegram MarkdownV2.
///
/// MarkdownV2 requires escaping: `_ * [ ] ( ) ~ ` # + - = | { } . !`
fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '#' | '+' | '-' | '=' | '|' | '{'
            | '}' | '.' | '!' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Inside a `(url)` link target only `)` and `\` need escaping.
fn escape_markdown_v2_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len() + 8);
    for ch in url.chars() {
        if ch == ')' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_specials_in_text() {
        let rules = TelegramMarkdownV2;
        let escaped = rules.escape_text("Hello. World! (test)");
        assert!(escaped.contains("\\."));
        assert!(escaped.contains("\\!"));
        assert!(escaped.contains("\\("));
    }

    #[test]
    fn hyperlink_escapes_label_and_url() {
        let rules = TelegramMarkdownV2;
        let link = rules.hyperlink("BTC update.", "https://example.com/a_b(c)");
        assert_eq!(link, "[BTC update\\.](https://example.com/a_b(c\\))");
    }

    #[test]
    fn heading_wraps_in_bold_markers() {
        let rules = TelegramMarkdownV2;
        assert_eq!(rules.heading("Report"), "*Report*");
    }
}
