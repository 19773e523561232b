//! Best-effort reconstruction of a JSON value from a growing prefix.
//!
//! The upstream model streams the structured answer as JSON text, so at any
//! point mid-turn the accumulated buffer is a syntactically incomplete
//! document: an unterminated string, a missing closer, a half-written key.
//! This module salvages the value the prefix has converged on so far, without
//! pulling in a heavy dependency.
//!
//! Recovery rules, for input that is a prefix of a well-formed document:
//! 1. Unterminated strings, arrays, and objects are closed.
//! 2. A trailing incomplete token (dangling key, bare literal or number cut
//!    at end of input, half of an escape sequence) is discarded.
//! 3. Anything already complete is kept verbatim.
//!
//! Returns `None` only when no plausible prefix can be recovered (empty or
//! non-JSON-looking input).

use serde_json::{Map, Value};

/// Nesting guard for pathological inputs.
const MAX_DEPTH: usize = 64;

/// Reconstruct the best-effort value obtainable from `input`.
pub fn complete_prefix(input: &str) -> Option<Value> {
    // Fast path: the prefix may already be a complete document.
    if let Ok(v) = serde_json::from_str(input) {
        return Some(v);
    }

    let mut scanner = Scanner::new(input);
    scanner.skip_ws();
    if scanner.at_end() {
        return None;
    }
    scanner.value(0)
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    /// Parse one value slot. `None` means the slot produced nothing usable:
    /// input ended mid-token, or the token is malformed. Containers treat
    /// that as "stop here and keep what we have".
    fn value(&mut self, depth: usize) -> Option<Value> {
        if depth > MAX_DEPTH {
            return None;
        }
        match self.peek()? {
            '{' => Some(self.object(depth + 1)),
            '[' => Some(self.array(depth + 1)),
            '"' => {
                let (text, _closed) = self.string();
                // A still-open string is usable: its decoded prefix only
                // ever grows as more input arrives.
                Some(Value::String(text))
            },
            't' => self.literal("true", Value::Bool(true)),
            'f' => self.literal("false", Value::Bool(false)),
            'n' => self.literal("null", Value::Null),
            '-' | '0'..='9' => self.number(),
            _ => None,
        }
    }

    fn object(&mut self, depth: usize) -> Value {
        self.pos += 1; // consume '{'
        let mut map = Map::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Value::Object(map),
                Some('}') => {
                    self.pos += 1;
                    return Value::Object(map);
                },
                Some('"') => {
                    let (key, closed) = self.string();
                    if !closed {
                        // Dangling key cut at end of input: discard the pair.
                        return Value::Object(map);
                    }
                    self.skip_ws();
                    if self.peek() != Some(':') {
                        // Key with no colon yet (or malformed): discard.
                        return Value::Object(map);
                    }
                    self.pos += 1;
                    self.skip_ws();
                    match self.value(depth) {
                        Some(v) => {
                            map.insert(key, v);
                        },
                        None => return Value::Object(map),
                    }
                    self.skip_ws();
                    match self.peek() {
                        Some(',') => {
                            self.pos += 1;
                        },
                        Some('}') => {
                            self.pos += 1;
                            return Value::Object(map);
                        },
                        _ => return Value::Object(map),
                    }
                },
                Some(_) => return Value::Object(map),
            }
        }
    }

    fn array(&mut self, depth: usize) -> Value {
        self.pos += 1; // consume '['
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Value::Array(items),
                Some(']') => {
                    self.pos += 1;
                    return Value::Array(items);
                },
                Some(',') => {
                    self.pos += 1;
                },
                Some(_) => match self.value(depth) {
                    Some(v) => items.push(v),
                    None => return Value::Array(items),
                },
            }
        }
    }

    /// Decode a string starting at the opening quote. Returns the decoded
    /// text and whether the closing quote was seen. A half-written escape
    /// sequence at end of input is discarded, never rendered.
    fn string(&mut self) -> (String, bool) {
        self.pos += 1; // consume '"'
        let mut out = String::new();
        // High half of a surrogate pair waiting for its low half.
        let mut pending_high: Option<u32> = None;

        fn flush_high(out: &mut String, pending: &mut Option<u32>) {
            if pending.take().is_some() {
                out.push('\u{FFFD}');
            }
        }

        loop {
            let Some(ch) = self.bump() else {
                // Unterminated string: any half-decoded surrogate is dropped.
                return (out, false);
            };
            match ch {
                '"' => {
                    flush_high(&mut out, &mut pending_high);
                    return (out, true);
                },
                '\\' => {
                    let Some(esc) = self.bump() else {
                        // Trailing backslash: half an escape, discard.
                        return (out, false);
                    };
                    match esc {
                        '"' | '\\' | '/' => {
                            flush_high(&mut out, &mut pending_high);
                            out.push(esc);
                        },
                        'b' => {
                            flush_high(&mut out, &mut pending_high);
                            out.push('\u{0008}');
                        },
                        'f' => {
                            flush_high(&mut out, &mut pending_high);
                            out.push('\u{000C}');
                        },
                        'n' => {
                            flush_high(&mut out, &mut pending_high);
                            out.push('\n');
                        },
                        'r' => {
                            flush_high(&mut out, &mut pending_high);
                            out.push('\r');
                        },
                        't' => {
                            flush_high(&mut out, &mut pending_high);
                            out.push('\t');
                        },
                        'u' => {
                            let mut code: u32 = 0;
                            for _ in 0..4 {
                                let Some(h) = self.bump().and_then(|c| c.to_digit(16)) else {
                                    // Partial \uXXXX at end of input: discard.
                                    return (out, false);
                                };
                                code = code * 16 + h;
                            }
                            if (0xD800..0xDC00).contains(&code) {
                                flush_high(&mut out, &mut pending_high);
                                pending_high = Some(code);
                            } else if (0xDC00..0xE000).contains(&code) {
                                match pending_high.take() {
                                    Some(high) => {
                                        let c = 0x10000
                                            + ((high - 0xD800) << 10)
                                            + (code - 0xDC00);
                                        out.push(
                                            char::from_u32(c).unwrap_or('\u{FFFD}'),
                                        );
                                    },
                                    None => out.push('\u{FFFD}'),
                                }
                            } else {
                                flush_high(&mut out, &mut pending_high);
                                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                            }
                        },
                        other => {
                            flush_high(&mut out, &mut pending_high);
                            out.push(other);
                        },
                    }
                },
                _ => {
                    flush_high(&mut out, &mut pending_high);
                    out.push(ch);
                },
            }
        }
    }

    /// `true` / `false` / `null`. A proper prefix cut at end of input is an
    /// incomplete token and yields `None`.
    fn literal(&mut self, word: &str, value: Value) -> Option<Value> {
        let remaining = self.chars.len() - self.pos;
        let matched = word
            .chars()
            .take(remaining)
            .enumerate()
            .all(|(i, c)| self.chars[self.pos + i] == c);
        if !matched {
            return None;
        }
        if remaining < word.chars().count() {
            // Token ran off the end of input.
            self.pos = self.chars.len();
            return None;
        }
        self.pos += word.chars().count();
        Some(value)
    }

    /// A number cut at end of input may still be growing (`12` vs `123`),
    /// so a trailing number token is treated as incomplete.
    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some('0'..='9' | '-' | '+' | '.' | 'e' | 'E')
        ) {
            self.pos += 1;
        }
        if self.at_end() {
            return None;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        serde_json::from_str(&text).ok()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_document_passes_through() {
        let input = r#"{"answerText":"Wi-Fi is ROOM204","sources":[],"images":[],"needsOperator":false,"operatorSummary":""}"#;
        let v = complete_prefix(input).unwrap();
        assert_eq!(v["answerText"], "Wi-Fi is ROOM204");
        assert_eq!(v["needsOperator"], false);
    }

    #[test]
    fn empty_and_non_json_return_none() {
        assert!(complete_prefix("").is_none());
        assert!(complete_prefix("   ").is_none());
        assert!(complete_prefix("not json at all").is_none());
    }

    #[test]
    fn dangling_key_is_discarded() {
        let v = complete_prefix(r#"{"answer"#).unwrap();
        assert_eq!(v, serde_json::json!({}));
    }

    #[test]
    fn key_without_value_is_discarded() {
        let v = complete_prefix(r#"{"answerText":"#).unwrap();
        assert_eq!(v, serde_json::json!({}));
    }

    #[test]
    fn open_string_value_keeps_decoded_prefix() {
        let v = complete_prefix(r#"{"answerText":"Wi-Fi is"#).unwrap();
        assert_eq!(v["answerText"], "Wi-Fi is");
    }

    #[test]
    fn completed_field_survives_next_dangling_key() {
        let v = complete_prefix(r#"{"answerText":"done","sour"#).unwrap();
        assert_eq!(v["answerText"], "done");
        assert!(v.get("sour").is_none());
    }

    #[test]
    fn unterminated_array_is_closed() {
        let v = complete_prefix(r#"{"sources":["a.pdf","b"#).unwrap();
        let sources = v["sources"].as_array().unwrap();
        assert_eq!(sources[0], "a.pdf");
        assert_eq!(sources[1], "b");
    }

    #[test]
    fn trailing_comma_prefix_keeps_prior_fields() {
        let v = complete_prefix(r#"{"answerText":"hi","#).unwrap();
        assert_eq!(v["answerText"], "hi");
    }

    #[test]
    fn trailing_incomplete_literal_is_discarded() {
        let v = complete_prefix(r#"{"answerText":"ok","needsOperator":fal"#).unwrap();
        assert_eq!(v["answerText"], "ok");
        assert!(v.get("needsOperator").is_none());
    }

    #[test]
    fn complete_literal_at_end_is_kept() {
        let v = complete_prefix(r#"{"needsOperator":false"#).unwrap();
        assert_eq!(v["needsOperator"], false);
    }

    #[test]
    fn trailing_number_is_treated_as_incomplete() {
        let v = complete_prefix(r#"{"count":12"#).unwrap();
        assert!(v.get("count").is_none());
    }

    #[test]
    fn half_escape_is_never_rendered() {
        let v = complete_prefix(r#"{"answerText":"line\"#).unwrap();
        assert_eq!(v["answerText"], "line");
        let v = complete_prefix(r#"{"answerText":"snow\u26"#).unwrap();
        assert_eq!(v["answerText"], "snow");
    }

    #[test]
    fn completed_escapes_decode() {
        let v = complete_prefix(r#"{"answerText":"a\nb☃"#).unwrap();
        assert_eq!(v["answerText"], "a\nb\u{2603}");
    }

    #[test]
    fn surrogate_pair_split_across_prefixes() {
        // An emoji written as an escaped surrogate pair.
        let full = r#"{"answerText":"hi \uD83D\uDE00!"}"#;
        // Cut right after the high half: nothing spurious is rendered.
        let v = complete_prefix(&full[..26]).unwrap();
        assert_eq!(v["answerText"], "hi ");
        // Both halves present, string still open: pair decodes.
        let v = complete_prefix(&full[..32]).unwrap();
        assert_eq!(v["answerText"], "hi \u{1F600}");
        let v = complete_prefix(full).unwrap();
        assert_eq!(v["answerText"], "hi \u{1F600}!");
    }

    #[test]
    fn nested_containers_complete() {
        let v = complete_prefix(r#"{"a":{"b":[1,2],"c":{"d":"x"#).unwrap();
        assert_eq!(v["a"]["b"], serde_json::json!([1, 2]));
        assert_eq!(v["a"]["c"]["d"], "x");
    }

    #[test]
    fn deeply_nested_input_bails_instead_of_overflowing() {
        let input = "[".repeat(500);
        // Either a truncated skeleton or nothing; must not recurse forever.
        let _ = complete_prefix(&input);
    }

    // Monotonic partial rendering: for any two prefixes p1 ⊆ p2 of a
    // serialized answer, the reconstructed answerText never shrinks.
    #[test]
    fn answer_text_grows_monotonically_over_all_prefixes() {
        let full = r#"{"answerText":"Café opens at 7:00,\nbreakfast ends at 10.","sources":["guide.pdf"],"images":[],"needsOperator":false,"operatorSummary":""}"#;
        let mut last_len = 0usize;
        for end in 1..=full.len() {
            if !full.is_char_boundary(end) {
                continue;
            }
            let Some(v) = complete_prefix(&full[..end]) else {
                continue;
            };
            let text_len = v
                .get("answerText")
                .and_then(|t| t.as_str())
                .map(|t| t.chars().count())
                .unwrap_or(0);
            assert!(
                text_len >= last_len,
                "answerText shrank at prefix length {end}: {text_len} < {last_len}"
            );
            last_len = text_len;
        }
        assert!(last_len > 0);
    }
}
