//! Tokenizer for query expressions

use super::ExpressionError;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Identifier(String),
    QuotedIdentifier(String),
    RawString(String),
    Literal(Value),
    Number(i64),
    Dot,
    Star,
    /// `[]`
    Flatten,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Colon,
    Pipe,
    At,
    Eof,
}

/// Token plus its byte offset in the source
pub(crate) type Spanned = (usize, Token);

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    loop {
        let spanned = lexer.next_token()?;
        let done = spanned.1 == Token::Eof;
        tokens.push(spanned);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Spanned, ExpressionError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((pos, c)) = self.chars.next() else {
            return Ok((self.source.len(), Token::Eof));
        };

        let token = match c {
            '.' => Token::Dot,
            '*' => Token::Star,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '@' => Token::At,
            '[' => {
                if self.chars.next_if(|(_, c)| *c == ']').is_some() {
                    Token::Flatten
                } else {
                    Token::LBracket
                }
            }
            '|' => {
                if self.chars.peek().is_some_and(|(_, c)| *c == '|') {
                    return Err(ExpressionError::UnexpectedChar {
                        position: pos,
                        found: '|',
                    });
                }
                Token::Pipe
            }
            '"' => Token::QuotedIdentifier(self.quoted_identifier(pos)?),
            '\'' => Token::RawString(self.raw_string(pos)?),
            '`' => Token::Literal(self.json_literal(pos)?),
            '-' | '0'..='9' => Token::Number(self.number(pos, c)?),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::from(c);
                while let Some((_, next)) = self
                    .chars
                    .next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
                {
                    name.push(next);
                }
                Token::Identifier(name)
            }
            other => {
                return Err(ExpressionError::UnexpectedChar {
                    position: pos,
                    found: other,
                });
            }
        };
        Ok((pos, token))
    }

    /// Collect raw text up to an unescaped `delimiter`, keeping escapes intact
    fn delimited(&mut self, start: usize, delimiter: char) -> Result<String, ExpressionError> {
        let mut text = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => {
                    text.push('\\');
                    if let Some((_, escaped)) = self.chars.next() {
                        text.push(escaped);
                    }
                }
                c if c == delimiter => return Ok(text),
                c => text.push(c),
            }
        }
        Err(ExpressionError::Unterminated { position: start })
    }

    fn quoted_identifier(&mut self, start: usize) -> Result<String, ExpressionError> {
        let text = self.delimited(start, '"')?;
        serde_json::from_str::<String>(&format!("\"{text}\"")).map_err(|e| {
            ExpressionError::InvalidLiteral {
                position: start,
                reason: e.to_string(),
            }
        })
    }

    fn raw_string(&mut self, start: usize) -> Result<String, ExpressionError> {
        Ok(self.delimited(start, '\'')?.replace("\\'", "'"))
    }

    /// Backtick literal
    ///
    /// Content that does not parse as JSON is taken as a plain string, so
    /// `` `T` `` evaluates to `"T"`.
    fn json_literal(&mut self, start: usize) -> Result<Value, ExpressionError> {
        let text = self.delimited(start, '`')?.replace("\\`", "`");
        let trimmed = text.trim();
        Ok(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
    }

    fn number(&mut self, start: usize, first: char) -> Result<i64, ExpressionError> {
        let mut digits = String::from(first);
        while let Some((_, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
            digits.push(c);
        }
        digits
            .parse()
            .map_err(|_| ExpressionError::InvalidLiteral {
                position: start,
                reason: format!("'{digits}' is not a number"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(_, t)| t)
            .collect()
    }

    #[test]
    fn tokenizes_paths_and_projections() {
        assert_eq!(
            kinds("a.b[0].c[*]"),
            vec![
                Token::Identifier("a".into()),
                Token::Dot,
                Token::Identifier("b".into()),
                Token::LBracket,
                Token::Number(0),
                Token::RBracket,
                Token::Dot,
                Token::Identifier("c".into()),
                Token::LBracket,
                Token::Star,
                Token::RBracket,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn flatten_is_a_single_token() {
        assert_eq!(
            kinds("a[]"),
            vec![Token::Identifier("a".into()), Token::Flatten, Token::Eof]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds("`{\"x\": 1}` 'raw' \"quoted id\""),
            vec![
                Token::Literal(json!({"x": 1})),
                Token::RawString("raw".into()),
                Token::QuotedIdentifier("quoted id".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn bare_backtick_text_is_a_string() {
        assert_eq!(kinds("`T`"), vec![Token::Literal(json!("T")), Token::Eof]);
    }

    #[test]
    fn unterminated_literal_reports_start() {
        assert_eq!(
            tokenize("a.`oops"),
            Err(ExpressionError::Unterminated { position: 2 })
        );
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(matches!(
            tokenize("a # b"),
            Err(ExpressionError::UnexpectedChar { found: '#', .. })
        ));
        assert!(matches!(
            tokenize("a || b"),
            Err(ExpressionError::UnexpectedChar { found: '|', .. })
        ));
    }
}
