use super::{offset_position, IntStream, MarkStack, TokenStream, EOF};
use crate::error::StateError;
use crate::lexer::{Token, DEFAULT_TOKEN_CHANNEL};

/// A buffered token stream over the default channel.
///
/// Off-channel tokens are dropped on construction and an EOF token is
/// appended when the input does not end with one, so the stream is never
/// empty.
#[derive(Debug, Clone)]
pub struct VecTokenStream {
    tokens: Vec<Token>,
    index: usize,
    marks: MarkStack,
}

impl VecTokenStream {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.channel == DEFAULT_TOKEN_CHANNEL)
            .collect();
        if !tokens.last().is_some_and(Token::is_eof) {
            let (at, line, column) = tokens
                .last()
                .map_or((0, 1, 0), |t| (t.end, t.line, t.column + t.text.chars().count()));
            let mut eof = Token::eof(at, line, column);
            eof.token_index = tokens.last().map_or(0, |t| t.token_index + 1);
            tokens.push(eof);
        }
        Self {
            tokens,
            index: 0,
            marks: MarkStack::default(),
        }
    }

    /// Builds a stream from bare token types, for tests and tooling.
    #[must_use]
    pub fn from_types(types: &[i32]) -> Self {
        let tokens = types
            .iter()
            .enumerate()
            .map(|(i, &token_type)| {
                let mut token = Token::new(token_type, "", i);
                token.token_index = i;
                token
            })
            .collect();
        Self::new(tokens)
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

impl IntStream for VecTokenStream {
    fn consume(&mut self) -> Result<(), StateError> {
        if self.la(1) == EOF {
            return Err(StateError::ConsumeAtEof);
        }
        self.index += 1;
        Ok(())
    }

    fn la(&self, offset: isize) -> i32 {
        if offset == 0 {
            return 0;
        }
        self.lt(offset).map_or(EOF, |t| t.token_type)
    }

    fn mark(&mut self) -> usize {
        self.marks.mark()
    }

    fn release(&mut self, marker: usize) -> Result<(), StateError> {
        self.marks.release(marker)
    }

    fn index(&self) -> usize {
        self.index
    }

    fn seek(&mut self, index: usize) {
        self.index = index.min(self.tokens.len() - 1);
    }

    fn size(&self) -> usize {
        self.tokens.len()
    }
}

impl TokenStream for VecTokenStream {
    fn lt(&self, offset: isize) -> Option<&Token> {
        let pos = offset_position(self.index, offset)?;
        // reads past the end see the trailing EOF
        self.tokens.get(pos).or_else(|| {
            (offset > 0).then(|| self.tokens.last()).flatten()
        })
    }

    fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    fn text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.tokens.len());
        if start >= end {
            return String::new();
        }
        self.tokens[start..end]
            .iter()
            .filter(|t| !t.is_eof())
            .map(|t| t.text.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_tokens_dropped_and_eof_appended() {
        let mut hidden = Token::new(9, " ", 1);
        hidden.channel = 1;
        let stream = VecTokenStream::new(vec![Token::new(1, "a", 0), hidden, Token::new(2, "b", 2)]);
        assert_eq!(stream.size(), 3);
        assert_eq!(stream.la(1), 1);
        assert_eq!(stream.la(2), 2);
        assert_eq!(stream.la(3), EOF);
        assert_eq!(stream.la(7), EOF);
        assert_eq!(TokenStream::text(&stream, 0, 3), "ab");
    }

    #[test]
    fn test_consume_stops_at_eof() {
        let mut stream = VecTokenStream::from_types(&[4]);
        stream.consume().unwrap();
        assert_eq!(stream.la(1), EOF);
        assert_eq!(stream.la(-1), 4);
        assert_eq!(stream.consume(), Err(StateError::ConsumeAtEof));
    }

    #[test]
    fn test_seek_and_marks() {
        let mut stream = VecTokenStream::from_types(&[4, 5, 6]);
        let marker = stream.mark();
        stream.seek(2);
        assert_eq!(stream.la(1), 6);
        stream.seek(50);
        assert_eq!(stream.la(1), EOF);
        stream.release(marker).unwrap();
    }
}
