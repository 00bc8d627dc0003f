//! Shaping of raw model output into a short widget-sized reply.

/// Sentences kept from the model's reply.
pub const MAX_REPLY_SENTENCES: usize = 2;

/// Word cap applied after the sentence cap.
pub const MAX_REPLY_WORDS: usize = 45;

/// Appended when the word cap cuts a reply short.
pub const ELLIPSIS: &str = "...";

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Clamp `raw` to [`MAX_REPLY_SENTENCES`] sentences and [`MAX_REPLY_WORDS`]
/// words, ending in terminal punctuation.
///
/// Returns an empty string only when `raw` is empty or whitespace. The result
/// is a fixed point: normalizing it again changes nothing.
pub fn normalize_reply(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return collapsed;
    }

    let clamped = clamp_words(&first_sentences(&collapsed, MAX_REPLY_SENTENCES), MAX_REPLY_WORDS);
    let trimmed = clamped.trim();

    if trimmed.is_empty() || trimmed.ends_with(is_terminal) {
        trimmed.to_owned()
    } else {
        format!("{trimmed}.")
    }
}

/// Keep the first `max` sentence-like segments of whitespace-collapsed text.
///
/// A segment ends after a run of `.`, `!` or `?` that is followed by
/// whitespace or the end of the text, so `3.5` or `e.g.x` never split.
/// Trailing text without terminal punctuation forms a final segment.
fn first_sentences(text: &str, max: usize) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !is_terminal(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        if chars.peek().map_or(true, |&(_, next)| next.is_whitespace()) {
            segments.push(text[start..end].trim());
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        segments.push(tail);
    }

    segments.into_iter().take(max).collect::<Vec<_>>().join(" ")
}

fn clamp_words(text: &str, max: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max {
        return text.trim().to_owned();
    }
    format!("{}{ELLIPSIS}", words[..max].join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Sentence cap
    // -----------------------------------------------------------------------

    #[test]
    fn keeps_first_two_sentences() {
        assert_eq!(
            normalize_reply("Hello there. This is extra. Third sentence."),
            "Hello there. This is extra."
        );
    }

    #[test]
    fn mixed_terminators_count_as_boundaries() {
        assert_eq!(normalize_reply("Yes! Really? No. Maybe."), "Yes! Really?");
    }

    #[test]
    fn reply_within_budget_is_unchanged() {
        let reply = "Hello! How can I help you today regarding Shrravan's work?";
        assert_eq!(normalize_reply(reply), reply);
    }

    #[test]
    fn decimals_and_abbreviations_do_not_split() {
        assert_eq!(
            normalize_reply("Version 3.5 shipped in 2024. It uses e.g.Rust. Extra."),
            "Version 3.5 shipped in 2024. It uses e.g.Rust."
        );
    }

    #[test]
    fn punctuation_runs_stay_with_their_sentence() {
        assert_eq!(normalize_reply("Wait... what?! Third one."), "Wait... what?!");
    }

    // -----------------------------------------------------------------------
    // Whitespace and termination
    // -----------------------------------------------------------------------

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(normalize_reply("  Hello \n\n there\t friend.  "), "Hello there friend.");
    }

    #[test]
    fn appends_period_when_unterminated() {
        assert_eq!(normalize_reply("No punctuation here"), "No punctuation here.");
        assert_eq!(normalize_reply("First. And a tail"), "First. And a tail.");
    }

    #[test]
    fn empty_or_blank_input_yields_empty_string() {
        assert_eq!(normalize_reply(""), "");
        assert_eq!(normalize_reply(" \n\t "), "");
    }

    // -----------------------------------------------------------------------
    // Word cap
    // -----------------------------------------------------------------------

    #[test]
    fn long_single_sentence_is_cut_to_word_cap_with_ellipsis() {
        let words: Vec<String> = (1..=60).map(|i| format!("w{i}")).collect();
        let out = normalize_reply(&words.join(" "));

        let expected = format!("{}{ELLIPSIS}", words[..MAX_REPLY_WORDS].join(" "));
        assert_eq!(out, expected);
        assert_eq!(out.split_whitespace().count(), MAX_REPLY_WORDS);
    }

    #[test]
    fn exactly_word_cap_is_not_truncated() {
        let text = vec!["word"; MAX_REPLY_WORDS].join(" ");
        assert_eq!(normalize_reply(&text), format!("{text}."));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn samples() -> Vec<String> {
        let long: Vec<String> = (0..80).map(|i| format!("token{i}")).collect();
        vec![
            "Hello there. This is extra. Third sentence.".into(),
            "no terminal at all".into(),
            "  spaced   out\ttext!  and more ".into(),
            "Wait... what?! Third one.".into(),
            "Version 3.5 shipped. e.g.x is fine".into(),
            long.join(" "),
            format!("Short one. {}", long.join(" ")),
            "?".into(),
            "...".into(),
            "Ünïcödé sentence。 Another one! Last".into(),
        ]
    }

    #[test]
    fn normalization_is_idempotent() {
        for sample in samples() {
            let once = normalize_reply(&sample);
            assert_eq!(normalize_reply(&once), once, "not a fixed point for {sample:?}");
        }
    }

    #[test]
    fn non_empty_input_always_ends_in_terminal_punctuation() {
        for sample in samples() {
            let out = normalize_reply(&sample);
            assert!(out.ends_with(is_terminal), "unterminated output {out:?} for {sample:?}");
        }
    }
}
