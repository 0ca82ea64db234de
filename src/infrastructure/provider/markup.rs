//! Provider speech markup (TwiML)

/// Wrap a spoken message in TwiML `<Response><Say>` markup
///
/// The message is XML-escaped; the provider reads the markup verbatim,
/// so un-escaped user text would break the document.
pub fn say_markup(message: &str, voice: &str) -> String {
    format!(
        r#"<Response><Say voice="{}">{}</Say></Response>"#,
        escape_xml(voice),
        escape_xml(message)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
