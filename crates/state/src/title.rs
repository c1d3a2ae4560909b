use serde::{Deserialize, Serialize};

use super::types::DEFAULT_CONVERSATION_TITLE;

pub const DEFAULT_TITLE_MAX_WORDS: usize = 6;
pub const DEFAULT_TITLE_MAX_CHARS: usize = 40;
pub const DEFAULT_CARD_TITLE_MAX_CHARS: usize = 50;
pub const DEFAULT_ELLIPSIS: &str = "...";

/// Limits applied when deriving a conversation title from free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRules {
    pub max_words: usize,
    pub max_chars: usize,
    pub ellipsis: String,
}

impl Default for TitleRules {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_TITLE_MAX_WORDS,
            max_chars: DEFAULT_TITLE_MAX_CHARS,
            ellipsis: DEFAULT_ELLIPSIS.to_string(),
        }
    }
}

impl TitleRules {
    /// Derives a short display title from arbitrary text.
    ///
    /// Control whitespace collapses to one space, then the first `max_words` words are
    /// kept unless they exceed `max_chars`, in which case the cleaned text is cut at
    /// `max_chars` characters. The ellipsis is appended whenever anything was dropped.
    pub fn synthesize(&self, text: &str) -> String {
        let cleaned = collapse_control_whitespace(text);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return DEFAULT_CONVERSATION_TITLE.to_string();
        }

        let mut title = cleaned
            .split(' ')
            .filter(|word| !word.is_empty())
            .take(self.max_words)
            .collect::<Vec<_>>()
            .join(" ");

        if title.chars().count() > self.max_chars {
            title = cleaned.chars().take(self.max_chars).collect();
        }

        if title.chars().count() < cleaned.chars().count() {
            title.push_str(&self.ellipsis);
        }

        title
    }
}

/// [`TitleRules::synthesize`] with the default limits.
pub fn synthesize_title(text: &str) -> String {
    TitleRules::default().synthesize(text)
}

/// Card heading: the first `max_chars` characters of the content, with `ellipsis`
/// appended if anything was cut.
pub fn card_title(content: &str, max_chars: usize, ellipsis: &str) -> String {
    let mut title = content.chars().take(max_chars).collect::<String>();
    if content.chars().count() > max_chars {
        title.push_str(ellipsis);
    }
    title
}

fn collapse_control_whitespace(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_run = false;

    for character in text.chars() {
        if matches!(character, '\r' | '\n' | '\t') {
            if !in_run {
                collapsed.push(' ');
                in_run = true;
            }
            continue;
        }

        in_run = false;
        collapsed.push(character);
    }

    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_text_fall_back_to_default_title() {
        assert_eq!(synthesize_title(""), "New Conversation");
        assert_eq!(synthesize_title("  \r\n\t  "), "New Conversation");
    }

    #[test]
    fn short_text_is_kept_verbatim() {
        assert_eq!(synthesize_title("hello world"), "hello world");
    }

    #[test]
    fn long_single_word_is_cut_at_forty_characters() {
        let word = "a".repeat(41);
        let title = synthesize_title(&word);
        assert_eq!(title, format!("{}...", "a".repeat(40)));
    }

    #[test]
    fn only_the_first_six_words_are_kept() {
        assert_eq!(
            synthesize_title("one two three four five six seven"),
            "one two three four five six..."
        );
    }

    #[test]
    fn six_words_over_the_char_limit_use_the_cleaned_prefix() {
        assert_eq!(
            synthesize_title("Summarize quantum computing advances this week please"),
            "Summarize quantum computing advances thi..."
        );
    }

    #[test]
    fn control_whitespace_runs_collapse_before_splitting() {
        assert_eq!(synthesize_title("\tfirst\r\n\r\nsecond\n"), "first second");
    }

    #[test]
    fn repeated_spaces_count_as_dropped_text() {
        // The joined words are shorter than the cleaned input, so the ellipsis is added.
        assert_eq!(synthesize_title("a  b"), "a b...");
    }

    #[test]
    fn multibyte_text_is_cut_on_character_boundaries() {
        let text = "é".repeat(45);
        let title = synthesize_title(&text);
        assert_eq!(title.chars().count(), 43);
        assert!(title.starts_with(&"é".repeat(40)));
    }

    #[test]
    fn synthesis_is_deterministic() {
        let text = "Plan a\tthree day\ntrip to Kyoto in autumn";
        assert_eq!(synthesize_title(text), synthesize_title(text));
    }

    #[test]
    fn custom_rules_change_limits_and_ellipsis() {
        let rules = TitleRules {
            max_words: 2,
            max_chars: 40,
            ellipsis: "…".to_string(),
        };
        assert_eq!(rules.synthesize("alpha beta gamma"), "alpha beta…");
    }

    #[test]
    fn card_titles_truncate_at_fifty_characters() {
        let short = "Quantum computing saw new error-correction results.";
        assert_eq!(short.chars().count(), 51);
        assert_eq!(
            card_title(short, DEFAULT_CARD_TITLE_MAX_CHARS, DEFAULT_ELLIPSIS),
            "Quantum computing saw new error-correction results..."
        );
        assert_eq!(
            card_title("brief", DEFAULT_CARD_TITLE_MAX_CHARS, DEFAULT_ELLIPSIS),
            "brief"
        );
        assert_eq!(card_title("abcdef", 3, "…"), "abc…");
    }
}
