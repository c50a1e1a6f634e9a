//! Structural classification of pushed event notifications.
//!
//! Camera firmware varies in namespace prefixes and formatting, so bodies are
//! matched on markers rather than parsed against the full ONVIF schema.

/// Topic markers for the motion alarm. The misspelt form is what the
/// SV3C family of cameras actually emits.
const MOTION_TOPIC_MARKERS: [&str; 2] = ["VideoSource/MotionAlarm", "VideoSoure/MotionAlarm"];

/// Outcome of classifying one notification body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Motion alarm with its boolean state
    Motion(bool),
    /// Well-formed notification of some other kind
    Unrecognized,
    /// Empty, non UTF-8 or not XML at all
    Malformed,
}

pub fn classify(body: &[u8]) -> Notification {
    let text = match std::str::from_utf8(body) {
        Ok(text) => text.trim(),
        Err(_) => return Notification::Malformed,
    };

    if text.is_empty() || !text.starts_with('<') || !text.ends_with('>') {
        return Notification::Malformed;
    }

    if !MOTION_TOPIC_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Notification::Unrecognized;
    }

    match state_item(text) {
        Some(active) => Notification::Motion(active),
        None => Notification::Unrecognized,
    }
}

/// Finds `<*:SimpleItem Name="State" Value="true|false"/>` and returns its value
fn state_item(text: &str) -> Option<bool> {
    let mut rest = text;

    while let Some(start) = rest.find("SimpleItem") {
        let element = &rest[start..];
        let end = element.find('>').unwrap_or(element.len());
        let tag = &element[..end];

        if attribute(tag, "Name") == Some("State") {
            match attribute(tag, "Value") {
                Some("true") => return Some(true),
                Some("false") => return Some(false),
                _ => return None,
            }
        }

        rest = &element[end..];
    }

    None
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search = tag;

    loop {
        let index = search.find(name)?;
        let preceded_by_space = search[..index]
            .chars()
            .last()
            .map_or(false, char::is_whitespace);
        let after = search[index + name.len()..].trim_start();

        if preceded_by_space {
            if let Some(value) = after.strip_prefix('=') {
                let value = value.trim_start();
                let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
                let value = &value[1..];
                let close = value.find(quote)?;
                return Some(&value[..close]);
            }
        }

        search = &search[index + name.len()..];
    }
}
