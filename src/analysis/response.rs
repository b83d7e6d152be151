//! Prompt framing and response decoding for the text-generation endpoint

use serde_json::Value;

/// Marker that precedes the model's answer in the framed prompt
pub const ASSISTANT_MARKER: &str = "Assistant:";

const PREAMBLE: &str = "You are a cybersecurity expert assistant. \
    Please provide accurate and helpful information about security topics.";

/// Wrap a user prompt in the security-expert framing
pub fn frame_prompt(prompt: &str) -> String {
    format!("{}\n\nUser: {}\n\n{}", PREAMBLE, prompt, ASSISTANT_MARKER)
}

/// Pull the answer out of a response body.
///
/// - `[{"generated_text": ...}, ...]`: text after the last assistant marker, trimmed
/// - `[other, ...]`: the first element as JSON
/// - anything else, including bodies that are not JSON: the raw body
pub fn extract_text(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    match value.as_array().and_then(|items| items.first()) {
        Some(first) => match first.get("generated_text").and_then(Value::as_str) {
            Some(text) => after_last_marker(text),
            None => first.to_string(),
        },
        None => body.to_string(),
    }
}

fn after_last_marker(text: &str) -> String {
    text.rsplit(ASSISTANT_MARKER)
        .next()
        .unwrap_or(text)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prompt() {
        let framed = frame_prompt("Is port 445 risky?");
        assert!(framed.starts_with("You are a cybersecurity expert assistant."));
        assert!(framed.contains("\n\nUser: Is port 445 risky?\n\n"));
        assert!(framed.ends_with("Assistant:"));
    }

    #[test]
    fn test_generated_text_without_marker() {
        let body = r#"[{"generated_text": "  It may be a dropper.  "}]"#;
        assert_eq!(extract_text(body), "It may be a dropper.");
    }

    #[test]
    fn test_generated_text_after_last_marker() {
        let body = r#"[{"generated_text": "User: hi\n\nAssistant: first\nAssistant:  second answer "}]"#;
        assert_eq!(extract_text(body), "second answer");
    }

    #[test]
    fn test_only_first_candidate_is_used() {
        let body = r#"[{"generated_text": "one"}, {"generated_text": "two"}]"#;
        assert_eq!(extract_text(body), "one");
    }

    #[test]
    fn test_first_candidate_without_text() {
        let body = r#"[{"score": 0.5}]"#;
        assert_eq!(extract_text(body), r#"{"score":0.5}"#);
    }

    #[test]
    fn test_unrecognized_shapes_return_raw_payload() {
        let object = r#"{"error": "something odd"}"#;
        assert_eq!(extract_text(object), object);
        assert_eq!(extract_text("[]"), "[]");
        assert_eq!(extract_text("<html>gateway</html>"), "<html>gateway</html>");
    }
}
