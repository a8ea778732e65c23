//! Commit titles from bot summaries

use tracing::debug;

pub const MAX_TITLE_CHARS: usize = 72;

const ELLIPSIS: &str = "...";

const FALLBACK_TITLE: &str = "draft! prompt";

/// Single-line commit title for a prompt commit
///
/// Uses the first non-blank line of the bot's summary, else the prompt.
/// Control characters are dropped, whitespace runs collapse to one space and
/// the result is cut to `MAX_TITLE_CHARS`.
pub fn commit_title(summary: Option<&str>, prompt: &str) -> String {
    debug!(has_summary = summary.is_some(), "commit_title: called");
    let from_summary = summary
        .and_then(|s| s.lines().map(clean).find(|l| !l.is_empty()))
        .unwrap_or_default();

    let title = if from_summary.is_empty() {
        debug!("commit_title: falling back to prompt");
        clean(prompt)
    } else {
        from_summary
    };

    if title.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    shorten(&title)
}

fn clean(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn shorten(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let keep = MAX_TITLE_CHARS - ELLIPSIS.len();
    let mut short: String = title.chars().take(keep).collect();
    short.truncate(short.trim_end().len());
    short.push_str(ELLIPSIS);
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uses_first_summary_line() {
        let title = commit_title(Some("\n  Add greeting to hello.txt\n\nDetails follow"), "prompt");
        assert_eq!(title, "Add greeting to hello.txt");
    }

    #[test]
    fn test_falls_back_to_prompt() {
        assert_eq!(commit_title(None, "Fix the\nbuild"), "Fix the build");
        assert_eq!(commit_title(Some("  \n\t"), "Fix the build"), "Fix the build");
    }

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(commit_title(Some("Add\u{7} bell\u{1b}[0m"), "p"), "Add bell[0m");
    }

    #[test]
    fn test_long_title_is_shortened() {
        let long = "word ".repeat(40);
        let title = commit_title(None, &long);
        assert!(title.chars().count() <= MAX_TITLE_CHARS);
        assert!(title.ends_with("..."));
        assert!(title.starts_with("word word"));
    }

    #[test]
    fn test_control_only_input_has_fallback() {
        assert_eq!(commit_title(Some("\u{1}"), "\u{2}"), FALLBACK_TITLE);
    }

    proptest! {
        #[test]
        fn prop_title_is_single_clean_line(summary in proptest::option::of(".*"), prompt in ".+") {
            let title = commit_title(summary.as_deref(), &prompt);
            prop_assert!(!title.is_empty());
            prop_assert!(title.chars().count() <= MAX_TITLE_CHARS);
            prop_assert!(!title.chars().any(|c| c.is_control()));
            prop_assert!(!title.contains('\n'));
            prop_assert_eq!(title.trim(), title.as_str());
        }
    }
}
