/// Escaping and link-rendering rules supplied by the messenger adapter.
/// The Reporter stays ignorant of any specific wire format (MarkdownV2,
/// HTML, plain text); it only knows how to ask this trait to produce
/// well-formed fragments.
pub trait EscapeRules: Send + Sync {
    /// Escape literal text so it renders safely in the target format.
    fn escape_text(&self, text: &str) -> String;

    /// Render a clickable hyperlink with the given display label.
    fn hyperlink(&self, label: &str, url: &str) -> String;

    /// Render a bold/emphasized heading fragment.
    fn heading(&self, text: &str) -> String;
}

/// Escape rules with no special characters and plain `label (url)` links.
/// Used by tests and any messenger with no markup dialect.
pub struct PlainTextEscape;

impl EscapeRules for PlainTextEscape {
    fn escape_text(&self, text: &str) -> String {
        text.to_string()
    }

    fn hyperlink(&self, label: &str, url: &str) -> String {
        format!("{label} ({url})")
    }

    fn heading(&self, text: &str) -> String {
        text.to_string()
    }
}
