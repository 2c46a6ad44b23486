//! Balanced-bracket scanning over untrusted oracle text.
//!
//! The scanner tracks a stack of expected closers for both `[`/`]` and `{`/`}` and
//! skips over JSON string literals (including escaped quotes), so brackets inside
//! string values never end a span early. A span that is opened but never closed
//! yields nothing. An unclosed opener is skipped as prose when no object or string
//! starts before the next opener; otherwise the rest of the text is treated as a
//! truncated payload.

/// Byte spans of top-level balanced groups starting with `open`, in order.
/// After a span is emitted the scan resumes at its end, so nested groups are
/// never reported on their own.
pub fn balanced_spans(text: &str, open: char) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut offset = 0;
    while let Some(rel) = text[offset..].find(open) {
        let start = offset + rel;
        match scan_group(&text[start..]) {
            Scan::Closed(len) => {
                spans.push(&text[start..start + len]);
                offset = start + len;
            }
            // Stray opener in prose; keep looking past it.
            Scan::Mismatched => offset = start + open.len_utf8(),
            Scan::Unterminated => {
                let after = start + open.len_utf8();
                match text[after..].find(open) {
                    Some(rel) if !text[after..after + rel].contains(|c: char| c == '{' || c == '"') => {
                        offset = after + rel;
                    }
                    // Truncated payload. Anything nested inside it must not be salvaged.
                    _ => break,
                }
            }
        }
    }
    spans
}

/// First balanced group starting with `open`.
pub fn first_balanced(text: &str, open: char) -> Option<&str> {
    balanced_spans(text, open).into_iter().next()
}

enum Scan {
    /// Byte length of the balanced group.
    Closed(usize),
    Mismatched,
    Unterminated,
}

fn scan_group(s: &str) -> Scan {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                if stack.pop() != Some(ch) {
                    return Scan::Mismatched;
                }
                if stack.is_empty() {
                    return Scan::Closed(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    Scan::Unterminated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_array_inside_prose() {
        let text = "Here is the plan:\n[ {\"a\": 1}, {\"b\": [2, 3]} ]\nDone.";
        assert_eq!(
            first_balanced(text, '['),
            Some("[ {\"a\": 1}, {\"b\": [2, 3]} ]")
        );
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let text = r#"[{"elementDescription": "the ] key \" [x"}] trailing"#;
        assert_eq!(
            first_balanced(text, '['),
            Some(r#"[{"elementDescription": "the ] key \" [x"}]"#)
        );
    }

    #[test]
    fn unterminated_payload_yields_nothing() {
        assert_eq!(first_balanced("[ {\"a\": 1}, ", '['), None);
        assert_eq!(first_balanced("[ {\"b\": [2, 3]}, ", '['), None);
        assert_eq!(first_balanced("no payload at all", '['), None);
    }

    #[test]
    fn unclosed_bracket_in_prose_does_not_hide_payload() {
        let text = "Note: steps [see below:\n[{\"a\": 1}]\nDone.";
        assert_eq!(first_balanced(text, '['), Some("[{\"a\": 1}]"));
    }

    #[test]
    fn mismatched_closer_is_rejected() {
        assert_eq!(first_balanced("[ { ] }", '['), None);
    }

    #[test]
    fn consecutive_groups_are_reported_separately() {
        let spans = balanced_spans("see [note] then [1, [2]] end", '[');
        assert_eq!(spans, vec!["[note]", "[1, [2]]"]);
    }

    #[test]
    fn object_scan_handles_fenced_reply() {
        let text = "```json\n{\"screenDescription\": \"Login\", \"matchedElement\": {\"x\": 1}}\n```";
        assert_eq!(
            first_balanced(text, '{'),
            Some("{\"screenDescription\": \"Login\", \"matchedElement\": {\"x\": 1}}")
        );
    }
}
