//! Line classification and the derived status indicator.

/// Trailing sequence the interpreter prints when it is ready for input.
pub const PROMPT_SUFFIX: &str = "$ ";

/// Substrings that mark a line as error-like.
///
/// Matching is case-sensitive and substring based, so `ERROR` is not caught
/// while `testfailure.log` is.
pub const ERROR_KEYWORDS: [&str; 4] = ["error", "Error", "fail", "Failed"];

/// Presentation category of one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// The line ends with the prompt suffix.
    Prompt,
    /// The line contains one of [`ERROR_KEYWORDS`].
    ErrorLike,
    Normal,
}

/// Classify a decoded line. First matching rule wins.
pub fn classify(line: &str) -> LineClass {
    if line.ends_with(PROMPT_SUFFIX) {
        LineClass::Prompt
    } else if ERROR_KEYWORDS.iter().any(|kw| line.contains(kw)) {
        LineClass::ErrorLike
    } else {
        LineClass::Normal
    }
}

/// Shell activity as seen from the last line of output.
///
/// There is no state machine here: every observed line overwrites the
/// previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusIndicator {
    /// Nothing received yet.
    #[default]
    Unset,
    /// A prompt was the last thing the shell printed.
    Idle,
    /// The shell is producing output.
    Busy,
    /// The last line looked like an error.
    Attention,
}

impl StatusIndicator {
    pub fn observe(&mut self, class: LineClass) {
        *self = match class {
            LineClass::Prompt => StatusIndicator::Idle,
            LineClass::ErrorLike => StatusIndicator::Attention,
            LineClass::Normal => StatusIndicator::Busy,
        };
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusIndicator::Unset => "unknown",
            StatusIndicator::Idle => "idle",
            StatusIndicator::Busy => "busy",
            StatusIndicator::Attention => "attention",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_line() {
        assert_eq!(classify("user@host:~$ "), LineClass::Prompt);

        let mut status = StatusIndicator::default();
        status.observe(classify("user@host:~$ "));
        assert_eq!(status, StatusIndicator::Idle);
    }

    #[test]
    fn test_prompt_wins_over_keywords() {
        assert_eq!(classify("~/error_logs$ "), LineClass::Prompt);
    }

    #[test]
    fn test_dollar_without_space_is_not_prompt() {
        assert_eq!(classify("echo $"), LineClass::Normal);
        assert_eq!(classify("cost: 5$"), LineClass::Normal);
    }

    #[test]
    fn test_error_keywords() {
        assert_eq!(classify("Compilation fail: unresolved reference"), LineClass::ErrorLike);
        assert_eq!(classify("[ERROR GPL-0302] Error: divergence"), LineClass::ErrorLike);
        assert_eq!(classify("make: *** [Makefile:12: synth] error 2"), LineClass::ErrorLike);
        assert_eq!(classify("Routing Failed"), LineClass::ErrorLike);
    }

    #[test]
    fn test_substring_match_false_positive_is_expected() {
        // Known limitation: substring matching flags unrelated words.
        assert_eq!(classify("testfailure.log written"), LineClass::ErrorLike);
        assert_eq!(classify("wrote errors_summary.rpt"), LineClass::ErrorLike);
    }

    #[test]
    fn test_uppercase_error_is_not_matched() {
        // The keyword list has no all-caps entry.
        assert_eq!(classify("[ERROR GPL-0302]"), LineClass::Normal);
        assert_eq!(classify("FAILED"), LineClass::Normal);
    }

    #[test]
    fn test_normal_line() {
        assert_eq!(classify("[INFO] Running synthesis"), LineClass::Normal);
        assert_eq!(classify(""), LineClass::Normal);
    }

    #[test]
    fn test_status_follows_last_line() {
        let mut status = StatusIndicator::default();
        assert_eq!(status, StatusIndicator::Unset);

        status.observe(LineClass::Normal);
        assert_eq!(status, StatusIndicator::Busy);

        status.observe(LineClass::ErrorLike);
        assert_eq!(status, StatusIndicator::Attention);

        status.observe(LineClass::Prompt);
        assert_eq!(status, StatusIndicator::Idle);

        status.observe(LineClass::Normal);
        assert_eq!(status, StatusIndicator::Busy);
    }
}
