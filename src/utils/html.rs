// src/utils/html.rs

/// Cleans rich-text tab content with ammonia.
///
/// Safe formatting tags (<b>, <p>, lists, links) survive; scripts, iframes
/// and event-handler attributes are stripped along with their content.
pub fn sanitize_rich_text(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_keeps_formatting() {
        let cleaned = sanitize_rich_text("<p>Week <b>1</b></p><script>alert(1)</script>");
        assert_eq!(cleaned, "<p>Week <b>1</b></p>");
    }

    #[test]
    fn strips_event_handlers() {
        let cleaned = sanitize_rich_text(r#"<p onclick="steal()">hi</p>"#);
        assert_eq!(cleaned, "<p>hi</p>");
    }
}
