/// A `[THINK]...[/THINK]` region extracted from a final message, emitted
/// separately as a "think" event (§4.E termination).
#[derive(Debug, Clone)]
pub struct ExtractedThink {
    pub content: String,
    pub think: Option<String>,
}

const OPEN_TAG: &str = "[THINK]";
const CLOSE_TAG: &str = "[/THINK]";

/// Strips the first `[THINK]...[/THINK]` region from `text`, if present, and
/// returns the remainder alongside the extracted thinking text.
#[must_use]
pub fn strip_think_region(text: &str) -> ExtractedThink {
    let Some(start) = text.find(OPEN_TAG) else {
        return ExtractedThink { content: text.to_string(), think: None };
    };
    let after_open = start + OPEN_TAG.len();
    let Some(relative_end) = text[after_open..].find(CLOSE_TAG) else {
        return ExtractedThink { content: text.to_string(), think: None };
    };
    let end = after_open + relative_end;

    let think = text[after_open..end].trim().to_string();
    let mut content = String::with_capacity(text.len());
    content.push_str(&text[..start]);
    content.push_str(&text[end + CLOSE_TAG.len()..]);

    ExtractedThink { content: content.trim().to_string(), think: Some(think) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_think_region_and_returns_remainder() {
        let extracted = strip_think_region("[THINK]reasoning here[/THINK]the answer");
        assert_eq!(extracted.think.as_deref(), Some("reasoning here"));
        assert_eq!(extracted.content, "the answer");
    }

    #[test]
    fn leaves_text_untouched_when_no_think_region() {
        let extracted = strip_think_region("just the answer");
        assert_eq!(extracted.content, "just the answer");
        assert!(extracted.think.is_none());
    }
}
