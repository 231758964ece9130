use std::rc::Rc;

use miette::SourceSpan;

use crate::{
    error::EvalError,
    lex::{Token, TokenKind},
    value::Param,
};

/// A position in a token sequence.
///
/// The evaluator parses as it goes, so this is all the parser state there is.
#[derive(Debug, Clone)]
pub struct Cursor<'de> {
    tokens: Rc<[Token<'de>]>,
    next: usize,
}

impl<'de> Cursor<'de> {
    pub fn new(tokens: Rc<[Token<'de>]>) -> Self {
        Cursor { tokens, next: 0 }
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().is_none_or(|token| token.kind == TokenKind::Eof)
    }

    pub fn advance(&mut self) -> Option<Token<'de>> {
        let token = self.tokens.get(self.next).copied();
        if token.is_some() {
            self.next += 1;
        }
        token
    }

    pub fn peek(&self) -> Option<Token<'de>> {
        self.tokens.get(self.next).copied()
    }

    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    /// Moves past every remaining token.
    pub fn finish(&mut self) {
        self.next = self.tokens.len();
    }

    pub fn advance_or_eof(&mut self, expected: &'static str) -> Result<Token<'de>, EvalError> {
        match self.advance() {
            Some(token) if token.kind != TokenKind::Eof => Ok(token),
            _ => Err(self.eof(expected)),
        }
    }

    pub fn expect(
        &mut self,
        kind: TokenKind,
        expected: &'static str,
    ) -> Result<Token<'de>, EvalError> {
        self.expect_where(|token| token.kind == kind, expected)
    }

    pub fn expect_where(
        &mut self,
        check: impl FnOnce(&Token<'de>) -> bool,
        expected: &'static str,
    ) -> Result<Token<'de>, EvalError> {
        let token = self.advance_or_eof(expected)?;
        if check(&token) {
            Ok(token)
        } else {
            Err(EvalError::UnexpectedToken {
                expected,
                found: token.literal.to_string(),
                line: token.line,
                span: token.span,
            })
        }
    }

    pub fn eof(&self, expected: &'static str) -> EvalError {
        let (line, span) = match self.tokens.last() {
            Some(last) => {
                let end = last.span.offset() + last.span.len();
                (last.line, SourceSpan::from(end..end))
            }
            None => (1, SourceSpan::from(0..0)),
        };
        EvalError::UnexpectedEof { expected, line, span }
    }

    /// Parses `( <Type> <Identifier>, ... )`; the cursor must be on the `(`.
    pub fn params(&mut self, function: Token<'de>) -> Result<Vec<Param<'de>>, EvalError> {
        self.expect(TokenKind::LeftParen, "`(` to open the parameter list")?;

        let malformed = |token: Token<'de>| EvalError::MalformedFunctionParameter {
            function: function.literal.to_string(),
            line: token.line,
            span: token.span,
            found: token.literal.to_string(),
        };

        let mut params = Vec::new();
        if self.peek_kind() == Some(TokenKind::RightParen) {
            self.advance();
            return Ok(params);
        }
        loop {
            let ty = self.advance_or_eof("a parameter type")?;
            let Some(declared) = ty.kind.declared_type() else {
                return Err(malformed(ty));
            };
            let name = self.advance_or_eof("a parameter name")?;
            if name.kind != TokenKind::Ident {
                return Err(malformed(name));
            }
            params.push(Param { name, declared });

            let separator = self.advance_or_eof("`,` or `)`")?;
            match separator.kind {
                TokenKind::Comma => continue,
                TokenKind::RightParen => return Ok(params),
                _ => return Err(malformed(separator)),
            }
        }
    }

    /// Captures the raw tokens between `{` and its matching `}`.
    pub fn body(&mut self) -> Result<Rc<[Token<'de>]>, EvalError> {
        self.expect(TokenKind::LeftBrace, "`{` to open the function body")?;
        let mut body = Vec::new();
        let mut depth = 0usize;
        loop {
            let token = self.advance_or_eof("`}` to close the function body")?;
            match token.kind {
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace if depth == 0 => return Ok(body.into()),
                TokenKind::RightBrace => depth -= 1,
                _ => {}
            }
            body.push(token);
        }
    }
}
