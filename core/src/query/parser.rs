//! Pratt parser producing the expression AST

use super::ExpressionError;
use super::functions::Function;
use super::lexer::{Spanned, Token, tokenize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ast {
    /// `@`
    Identity,
    Field(String),
    Index(i64),
    Literal(Value),
    Subexpr(Box<Ast>, Box<Ast>),
    Pipe(Box<Ast>, Box<Ast>),
    MultiList(Vec<Ast>),
    MultiHash(Vec<(String, Ast)>),
    /// Evaluate rhs against every element of the lhs array
    ListProjection(Box<Ast>, Box<Ast>),
    /// Evaluate rhs against every value of the lhs object
    ObjectProjection(Box<Ast>, Box<Ast>),
    Flatten(Box<Ast>),
    Call(Function, Vec<Ast>),
}

// Binding powers
const PIPE: u8 = 1;
const FLATTEN: u8 = 9;
const PROJECTION_STOP: u8 = 10;
const STAR: u8 = 20;
const DOT: u8 = 40;
const LBRACE: u8 = 50;
const LBRACKET: u8 = 55;
const LPAREN: u8 = 60;

fn lbp(token: &Token) -> u8 {
    match token {
        Token::Pipe => PIPE,
        Token::Flatten => FLATTEN,
        Token::Star => STAR,
        Token::Dot => DOT,
        Token::LBrace => LBRACE,
        Token::LBracket => LBRACKET,
        Token::LParen => LPAREN,
        _ => 0,
    }
}

pub(crate) fn parse(source: &str) -> Result<Ast, ExpressionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    if parser.peek() == &Token::Eof {
        return Err(ExpressionError::Empty);
    }
    let ast = parser.expression(0)?;
    match parser.advance() {
        (_, Token::Eof) => Ok(ast),
        (position, token) => Err(unexpected(position, &token)),
    }
}

fn unexpected(position: usize, token: &Token) -> ExpressionError {
    match token {
        Token::Eof => ExpressionError::UnexpectedEnd { position },
        other => ExpressionError::UnexpectedToken {
            position,
            found: format!("{other:?}"),
        },
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|(_, t)| t)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Spanned {
        match self.tokens.get(self.pos) {
            Some(spanned) => {
                self.pos += 1;
                spanned.clone()
            }
            None => (self.tokens.last().map(|(p, _)| *p).unwrap_or(0), Token::Eof),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        let (position, token) = self.advance();
        if token == expected {
            Ok(())
        } else {
            Err(unexpected(position, &token))
        }
    }

    fn expression(&mut self, rbp: u8) -> Result<Ast, ExpressionError> {
        let (position, token) = self.advance();
        let mut left = self.nud(position, token)?;
        while rbp < lbp(self.peek()) {
            let (position, token) = self.advance();
            left = self.led(left, position, token)?;
        }
        Ok(left)
    }

    fn nud(&mut self, position: usize, token: Token) -> Result<Ast, ExpressionError> {
        match token {
            Token::Identifier(name) => {
                if self.peek() == &Token::LParen {
                    self.advance();
                    self.call(position, &name)
                } else {
                    Ok(Ast::Field(name))
                }
            }
            Token::QuotedIdentifier(name) => Ok(Ast::Field(name)),
            Token::RawString(text) => Ok(Ast::Literal(Value::String(text))),
            Token::Literal(value) => Ok(Ast::Literal(value)),
            Token::At => Ok(Ast::Identity),
            Token::Star => {
                let rhs = self.projection_rhs(STAR)?;
                Ok(Ast::ObjectProjection(Box::new(Ast::Identity), Box::new(rhs)))
            }
            Token::Flatten => {
                let rhs = self.projection_rhs(FLATTEN)?;
                Ok(Ast::ListProjection(
                    Box::new(Ast::Flatten(Box::new(Ast::Identity))),
                    Box::new(rhs),
                ))
            }
            Token::LBracket => match self.peek().clone() {
                Token::Number(index) => {
                    self.advance();
                    self.expect(Token::RBracket)?;
                    Ok(Ast::Index(index))
                }
                Token::Star => {
                    self.advance();
                    self.expect(Token::RBracket)?;
                    let rhs = self.projection_rhs(STAR)?;
                    Ok(Ast::ListProjection(Box::new(Ast::Identity), Box::new(rhs)))
                }
                _ => self.multi_list(),
            },
            Token::LBrace => self.multi_hash(),
            other => Err(unexpected(position, &other)),
        }
    }

    fn led(&mut self, left: Ast, position: usize, token: Token) -> Result<Ast, ExpressionError> {
        match token {
            Token::Dot => {
                if self.peek() == &Token::Star {
                    self.advance();
                    let rhs = self.projection_rhs(STAR)?;
                    Ok(Ast::ObjectProjection(Box::new(left), Box::new(rhs)))
                } else {
                    let rhs = self.dot_rhs(DOT)?;
                    Ok(Ast::Subexpr(Box::new(left), Box::new(rhs)))
                }
            }
            Token::LBracket => match self.advance() {
                (_, Token::Number(index)) => {
                    self.expect(Token::RBracket)?;
                    Ok(Ast::Subexpr(Box::new(left), Box::new(Ast::Index(index))))
                }
                (_, Token::Star) => {
                    self.expect(Token::RBracket)?;
                    let rhs = self.projection_rhs(STAR)?;
                    Ok(Ast::ListProjection(Box::new(left), Box::new(rhs)))
                }
                (position, other) => Err(unexpected(position, &other)),
            },
            Token::Flatten => {
                let rhs = self.projection_rhs(FLATTEN)?;
                Ok(Ast::ListProjection(
                    Box::new(Ast::Flatten(Box::new(left))),
                    Box::new(rhs),
                ))
            }
            Token::Pipe => {
                let rhs = self.expression(PIPE)?;
                Ok(Ast::Pipe(Box::new(left), Box::new(rhs)))
            }
            Token::LBrace => {
                let rhs = self.multi_hash()?;
                Ok(Ast::Subexpr(Box::new(left), Box::new(rhs)))
            }
            other => Err(unexpected(position, &other)),
        }
    }

    /// What may follow a `.`
    fn dot_rhs(&mut self, bp: u8) -> Result<Ast, ExpressionError> {
        match self.peek() {
            Token::Identifier(_) | Token::QuotedIdentifier(_) => self.expression(bp),
            Token::LBracket => {
                self.advance();
                self.multi_list()
            }
            Token::LBrace => {
                self.advance();
                self.multi_hash()
            }
            _ => {
                let (position, token) = self.advance();
                Err(unexpected(position, &token))
            }
        }
    }

    /// The expression applied to each element of a projection
    fn projection_rhs(&mut self, bp: u8) -> Result<Ast, ExpressionError> {
        if lbp(self.peek()) < PROJECTION_STOP {
            return Ok(Ast::Identity);
        }
        match self.peek() {
            Token::Dot => {
                self.advance();
                self.dot_rhs(bp)
            }
            Token::LBracket | Token::LBrace => self.expression(bp),
            _ => {
                let (position, token) = self.advance();
                Err(unexpected(position, &token))
            }
        }
    }

    fn multi_list(&mut self) -> Result<Ast, ExpressionError> {
        let mut items = Vec::new();
        loop {
            items.push(self.expression(0)?);
            match self.advance() {
                (_, Token::Comma) => continue,
                (_, Token::RBracket) => return Ok(Ast::MultiList(items)),
                (position, token) => return Err(unexpected(position, &token)),
            }
        }
    }

    fn multi_hash(&mut self) -> Result<Ast, ExpressionError> {
        let mut pairs = Vec::new();
        loop {
            let key = match self.advance() {
                (_, Token::Identifier(key) | Token::QuotedIdentifier(key)) => key,
                (position, token) => return Err(unexpected(position, &token)),
            };
            self.expect(Token::Colon)?;
            pairs.push((key, self.expression(0)?));
            match self.advance() {
                (_, Token::Comma) => continue,
                (_, Token::RBrace) => return Ok(Ast::MultiHash(pairs)),
                (position, token) => return Err(unexpected(position, &token)),
            }
        }
    }

    fn call(&mut self, position: usize, name: &str) -> Result<Ast, ExpressionError> {
        let function = Function::lookup(name).ok_or_else(|| ExpressionError::UnknownFunction {
            position,
            name: name.to_string(),
        })?;

        let mut args = Vec::new();
        if self.peek() == &Token::RParen {
            self.advance();
        } else {
            loop {
                args.push(self.expression(0)?);
                match self.advance() {
                    (_, Token::Comma) => continue,
                    (_, Token::RParen) => break,
                    (position, token) => return Err(unexpected(position, &token)),
                }
            }
        }

        if !function.accepts(args.len()) {
            return Err(ExpressionError::Arity {
                name: function.name(),
                given: args.len(),
            });
        }
        Ok(Ast::Call(function, args))
    }
}
