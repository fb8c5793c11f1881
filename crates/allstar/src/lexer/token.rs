use std::fmt;

use compact_str::CompactString;

use super::DEFAULT_TOKEN_CHANNEL;
use crate::atn::TOKEN_EOF;
use crate::error::TextSpan;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub token_type: i32,
    pub channel: i32,
    /// Index of the first code point.
    pub start: usize,
    /// Index one past the last code point.
    pub end: usize,
    /// 1-based line of the first code point.
    pub line: usize,
    /// 0-based column of the first code point.
    pub column: usize,
    pub text: CompactString,
    /// Position in the lexer's output, hidden tokens included.
    pub token_index: usize,
}

impl Token {
    /// A token on the default channel.
    #[must_use]
    pub fn new(token_type: i32, text: &str, start: usize) -> Self {
        Self {
            token_type,
            channel: DEFAULT_TOKEN_CHANNEL,
            start,
            end: start + text.chars().count(),
            line: 1,
            column: start,
            text: CompactString::from(text),
            token_index: 0,
        }
    }

    /// The end-of-file token at input index `at`.
    #[must_use]
    pub fn eof(at: usize, line: usize, column: usize) -> Self {
        Self {
            token_type: TOKEN_EOF,
            channel: DEFAULT_TOKEN_CHANNEL,
            start: at,
            end: at,
            line,
            column,
            text: CompactString::const_new("<EOF>"),
            token_index: 0,
        }
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.token_type == TOKEN_EOF
    }

    #[must_use]
    pub const fn span(&self) -> TextSpan {
        TextSpan::new(self.start, self.end)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .text
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t");
        write!(
            f,
            "[@{},{}:{}='{}',<{}>",
            self.token_index,
            self.start,
            self.end as isize - 1,
            text,
            self.token_type
        )?;
        if self.channel != DEFAULT_TOKEN_CHANNEL {
            write!(f, ",channel={}", self.channel)?;
        }
        write!(f, ",{}:{}]", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_runtime_format() {
        let mut token = Token::new(1, "x1", 0);
        assert_eq!(token.to_string(), "[@0,0:1='x1',<1>,1:0]");
        token.channel = 1;
        token.text = CompactString::from("\n");
        assert_eq!(token.to_string(), "[@0,0:1='\\n',<1>,channel=1,1:0]");
        assert_eq!(Token::eof(5, 1, 5).to_string(), "[@0,5:4='<EOF>',<-1>,1:5]");
    }
}
