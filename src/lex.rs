use std::fmt::Display;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::trace;

use crate::value::ValueKind;

#[derive(Error, Debug, Diagnostic)]
#[error("Unterminated string")]
#[diagnostic(
    code(hive::unterminated_string),
    help("add a closing `\"` to terminate the string literal")
)]
pub struct StringTerminationError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this string is never closed")]
    bad_line: SourceSpan,

    line: usize,
}

impl StringTerminationError {
    pub fn line(&self) -> usize {
        self.line
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("Invalid number literal `{literal}`: {reason}")]
#[diagnostic(
    code(hive::invalid_number),
    help("integer literals must fit in a signed 64-bit integer")
)]
pub struct NumberLiteralError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this numeric literal")]
    bad_bit: SourceSpan,

    pub literal: String,
    reason: String,
    line: usize,
}

impl NumberLiteralError {
    pub fn line(&self) -> usize {
        self.line
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum LexError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnterminatedString(#[from] StringTerminationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidNumber(#[from] NumberLiteralError),
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnterminatedString(e) => e.line(),
            LexError::InvalidNumber(e) => e.line(),
        }
    }
}

/// A classified lexical unit.
///
/// `literal` is the source text of the token, except for strings where it is
/// the text between the quotes. Decoded numbers live in the kind itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    pub line: usize,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Star,
    Slash,
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Int(i64),
    Float(f64),
    String,
    Ident,

    // declared-type keywords
    TypeInt,
    TypeFlt,
    TypeStr,
    TypeBool,

    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Entity,
    Prog,
    Create,
    Run,
    Output,
    Clear,

    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident {
            "else" => TokenKind::Else,
            "false" => TokenKind::False,
            "for" => TokenKind::For,
            "fun" => TokenKind::Fun,
            "if" => TokenKind::If,
            "nil" => TokenKind::Nil,
            "or" => TokenKind::Or,
            "return" => TokenKind::Return,
            "super" => TokenKind::Super,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            "int" => TokenKind::TypeInt,
            "flt" => TokenKind::TypeFlt,
            "str" => TokenKind::TypeStr,
            "bool" => TokenKind::TypeBool,
            "entity" => TokenKind::Entity,
            "prog" => TokenKind::Prog,
            "create" => TokenKind::Create,
            "run" => TokenKind::Run,
            "output" => TokenKind::Output,
            "clear" => TokenKind::Clear,
            _ => return None,
        })
    }

    /// `+ - * /`
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Star | TokenKind::Slash
        )
    }

    /// `== != > >= < <=`
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TokenKind::EqualEqual
                | TokenKind::BangEqual
                | TokenKind::Greater
                | TokenKind::GreaterEqual
                | TokenKind::Less
                | TokenKind::LessEqual
        )
    }

    /// The value kind named by a declared-type keyword.
    pub fn declared_type(&self) -> Option<ValueKind> {
        match self {
            TokenKind::TypeInt => Some(ValueKind::Int),
            TokenKind::TypeFlt => Some(ValueKind::Flt),
            TokenKind::TypeStr => Some(ValueKind::Str),
            TokenKind::TypeBool => Some(ValueKind::Bool),
            _ => None,
        }
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match self.kind {
            TokenKind::LeftParen => write!(f, "LEFT_PAREN {lit} null"),
            TokenKind::RightParen => write!(f, "RIGHT_PAREN {lit} null"),
            TokenKind::LeftBrace => write!(f, "LEFT_BRACE {lit} null"),
            TokenKind::RightBrace => write!(f, "RIGHT_BRACE {lit} null"),
            TokenKind::LeftBracket => write!(f, "LEFT_BRACKET {lit} null"),
            TokenKind::RightBracket => write!(f, "RIGHT_BRACKET {lit} null"),
            TokenKind::Comma => write!(f, "COMMA {lit} null"),
            TokenKind::Dot => write!(f, "DOT {lit} null"),
            TokenKind::Minus => write!(f, "MINUS {lit} null"),
            TokenKind::Plus => write!(f, "PLUS {lit} null"),
            TokenKind::Semicolon => write!(f, "SEMICOLON {lit} null"),
            TokenKind::Star => write!(f, "STAR {lit} null"),
            TokenKind::Slash => write!(f, "SLASH {lit} null"),
            TokenKind::Bang => write!(f, "BANG {lit} null"),
            TokenKind::BangEqual => write!(f, "BANG_EQUAL {lit} null"),
            TokenKind::Equal => write!(f, "EQUAL {lit} null"),
            TokenKind::EqualEqual => write!(f, "EQUAL_EQUAL {lit} null"),
            TokenKind::Greater => write!(f, "GREATER {lit} null"),
            TokenKind::GreaterEqual => write!(f, "GREATER_EQUAL {lit} null"),
            TokenKind::Less => write!(f, "LESS {lit} null"),
            TokenKind::LessEqual => write!(f, "LESS_EQUAL {lit} null"),
            TokenKind::Int(n) => write!(f, "INT {lit} {n}"),
            TokenKind::Float(n) => {
                if n == n.trunc() {
                    write!(f, "FLT {lit} {n}.0")
                } else {
                    write!(f, "FLT {lit} {n}")
                }
            }
            TokenKind::String => write!(f, "STR \"{lit}\" {lit}"),
            TokenKind::Ident => write!(f, "IDENTIFIER {lit} null"),
            TokenKind::TypeInt => write!(f, "INT_TYPE {lit} null"),
            TokenKind::TypeFlt => write!(f, "FLT_TYPE {lit} null"),
            TokenKind::TypeStr => write!(f, "STR_TYPE {lit} null"),
            TokenKind::TypeBool => write!(f, "BOOL_TYPE {lit} null"),
            TokenKind::Else => write!(f, "ELSE {lit} null"),
            TokenKind::False => write!(f, "FALSE {lit} null"),
            TokenKind::For => write!(f, "FOR {lit} null"),
            TokenKind::Fun => write!(f, "FUN {lit} null"),
            TokenKind::If => write!(f, "IF {lit} null"),
            TokenKind::Nil => write!(f, "NIL {lit} null"),
            TokenKind::Or => write!(f, "OR {lit} null"),
            TokenKind::Return => write!(f, "RETURN {lit} null"),
            TokenKind::Super => write!(f, "SUPER {lit} null"),
            TokenKind::This => write!(f, "THIS {lit} null"),
            TokenKind::True => write!(f, "TRUE {lit} null"),
            TokenKind::Var => write!(f, "VAR {lit} null"),
            TokenKind::While => write!(f, "WHILE {lit} null"),
            TokenKind::Entity => write!(f, "ENTITY {lit} null"),
            TokenKind::Prog => write!(f, "PROG {lit} null"),
            TokenKind::Create => write!(f, "CREATE {lit} null"),
            TokenKind::Run => write!(f, "RUN {lit} null"),
            TokenKind::Output => write!(f, "OUTPUT {lit} null"),
            TokenKind::Clear => write!(f, "CLEAR {lit} null"),
            TokenKind::Eof => write!(f, "EOF {lit} null"),
        }
    }
}

/// Single left-to-right pass over the source, ending with one `Eof` token.
///
/// Characters that start no token are skipped without a diagnostic.
pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    byte: usize,
    line: usize,
    finished: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Lexer {
            filename,
            whole: input,
            rest: input,
            byte: 0,
            line: 1,
            finished: false,
        }
    }

    fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.filename.unwrap_or("<input>"), self.whole.to_string())
    }

    /// Moves past `n` more bytes of the token that started at `cur`.
    fn bump(&mut self, n: usize) {
        self.byte += n;
        self.rest = &self.rest[n..];
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut chars = self.rest.chars();
            let Some(c) = chars.next() else {
                if self.finished {
                    return None;
                }
                self.finished = true;
                return Some(Ok(Token {
                    kind: TokenKind::Eof,
                    literal: "",
                    line: self.line,
                    span: SourceSpan::from(self.byte..self.byte),
                }));
            };
            let start = self.byte;
            let line = self.line;
            let literal = &self.rest[..c.len_utf8()];
            let cur = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Start {
                String,
                Comment,
                Ident,
                Number,
                IfEqualElse(TokenKind, TokenKind),
            }

            let process = move |kind: TokenKind| {
                Some(Ok(Token {
                    kind,
                    literal,
                    line,
                    span: SourceSpan::from(start..start + literal.len()),
                }))
            };

            let started = match c {
                '(' => return process(TokenKind::LeftParen),
                ')' => return process(TokenKind::RightParen),
                '{' => return process(TokenKind::LeftBrace),
                '}' => return process(TokenKind::RightBrace),
                '[' => return process(TokenKind::LeftBracket),
                ']' => return process(TokenKind::RightBracket),
                ',' => return process(TokenKind::Comma),
                '.' => return process(TokenKind::Dot),
                '-' => return process(TokenKind::Minus),
                '+' => return process(TokenKind::Plus),
                ';' => return process(TokenKind::Semicolon),
                '*' => return process(TokenKind::Star),
                '/' => return process(TokenKind::Slash),
                '!' => Start::IfEqualElse(TokenKind::BangEqual, TokenKind::Bang),
                '=' => Start::IfEqualElse(TokenKind::EqualEqual, TokenKind::Equal),
                '>' => Start::IfEqualElse(TokenKind::GreaterEqual, TokenKind::Greater),
                '<' => Start::IfEqualElse(TokenKind::LessEqual, TokenKind::Less),
                '#' => Start::Comment,
                '"' => Start::String,
                '0'..='9' => Start::Number,
                c if c.is_ascii_alphanumeric() => Start::Ident,
                '\n' => {
                    self.line += 1;
                    continue;
                }
                ' ' => continue,
                c => {
                    trace!(character = ?c, line, "skipping unrecognised character");
                    continue;
                }
            };

            match started {
                Start::Comment => {
                    let new_line = self.rest.find('\n').unwrap_or(self.rest.len());
                    self.bump(new_line);
                    continue;
                }
                Start::String => {
                    let Some(end) = self.rest.find('"') else {
                        return Some(Err(StringTerminationError {
                            src: self.named_source(),
                            bad_line: SourceSpan::from(start..self.whole.len()),
                            line,
                        }
                        .into()));
                    };
                    let literal = &self.rest[..end];
                    self.line += literal.matches('\n').count();
                    self.bump(end + 1);
                    return Some(Ok(Token {
                        kind: TokenKind::String,
                        literal,
                        line,
                        span: SourceSpan::from(start..self.byte),
                    }));
                }
                Start::Ident => {
                    let first_non_ident = cur
                        .find(|c: char| !c.is_ascii_alphanumeric())
                        .unwrap_or(cur.len());
                    let literal = &cur[..first_non_ident];
                    self.bump(literal.len() - c.len_utf8());

                    let kind = TokenKind::keyword(literal).unwrap_or(TokenKind::Ident);
                    return Some(Ok(Token {
                        kind,
                        literal,
                        line,
                        span: SourceSpan::from(start..self.byte),
                    }));
                }
                Start::Number => {
                    let first_non_digit = cur
                        .find(|c| !matches!(c, '0'..='9' | '.'))
                        .unwrap_or(cur.len());
                    let literal = &cur[..first_non_digit];
                    self.bump(literal.len() - c.len_utf8());

                    let kind = if literal.contains('.') {
                        // everything from a second dot on is ignored: `1.2.3` reads as `1.2`
                        let text = match literal.match_indices('.').nth(1) {
                            Some((second_dot, _)) => &literal[..second_dot],
                            None => literal,
                        };
                        text.parse().map(TokenKind::Float).map_err(|e| e.to_string())
                    } else {
                        literal.parse().map(TokenKind::Int).map_err(|e| e.to_string())
                    };

                    return Some(match kind {
                        Ok(kind) => Ok(Token {
                            kind,
                            literal,
                            line,
                            span: SourceSpan::from(start..self.byte),
                        }),
                        Err(reason) => Err(NumberLiteralError {
                            src: self.named_source(),
                            bad_bit: SourceSpan::from(start..self.byte),
                            literal: literal.to_string(),
                            reason,
                            line,
                        }
                        .into()),
                    });
                }
                Start::IfEqualElse(yes, no) => {
                    if self.rest.starts_with('=') {
                        let literal = &cur[..c.len_utf8() + 1];
                        self.bump(1);
                        return Some(Ok(Token {
                            kind: yes,
                            literal,
                            line,
                            span: SourceSpan::from(start..self.byte),
                        }));
                    } else {
                        return process(no);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(None, input)
            .map(|token| token.map(|t| t.kind))
            .collect::<Result<_, _>>()
            .expect("input should lex")
    }

    #[test]
    fn punctuation_and_compound_operators() {
        assert_eq!(
            kinds("(){}[],.-+;*/ ! != = == > >= < <="),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Semicolon,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn separated_equals_are_two_tokens() {
        assert_eq!(
            kinds("= ="),
            vec![TokenKind::Equal, TokenKind::Equal, TokenKind::Eof]
        );
    }

    #[test]
    fn declaration_statement() {
        let tokens: Vec<_> = Lexer::new(None, "flt ratio = 2.5;")
            .collect::<Result<_, _>>()
            .unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::TypeFlt,
                TokenKind::Ident,
                TokenKind::Equal,
                TokenKind::Float(2.5),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[1].literal, "ratio");
        assert_eq!(tokens[3].literal, "2.5");
    }

    #[test]
    fn numbers_with_and_without_dot() {
        assert_eq!(
            kinds("42 4.0 5. 1.2.3"),
            vec![
                TokenKind::Int(42),
                TokenKind::Float(4.0),
                TokenKind::Float(5.0),
                TokenKind::Float(1.2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn oversized_integer_is_an_error() {
        let err = Lexer::new(None, "99999999999999999999;")
            .find_map(Result::err)
            .expect("should fail");
        assert!(matches!(err, LexError::InvalidNumber(_)));
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("prog run output clear entity create int str bool flt true false total2"),
            vec![
                TokenKind::Prog,
                TokenKind::Run,
                TokenKind::Output,
                TokenKind::Clear,
                TokenKind::Entity,
                TokenKind::Create,
                TokenKind::TypeInt,
                TokenKind::TypeStr,
                TokenKind::TypeBool,
                TokenKind::TypeFlt,
                TokenKind::True,
                TokenKind::False,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_unknown_characters_are_skipped() {
        assert_eq!(
            kinds("# a comment\n@x $ ~ # another"),
            vec![TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn underscore_splits_identifiers() {
        let tokens: Vec<_> = Lexer::new(None, "my_name")
            .collect::<Result<_, _>>()
            .unwrap();
        let literals: Vec<_> = tokens.iter().map(|t| t.literal).collect();
        assert_eq!(literals, vec!["my", "name", ""]);
    }

    #[test]
    fn strings_track_lines() {
        let tokens: Vec<_> = Lexer::new(None, "\"a\nb\" x")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].literal, "a\nb");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string() {
        let err = Lexer::new(None, "\n str s = \"abc;")
            .find_map(Result::err)
            .expect("should fail");
        assert!(matches!(err, LexError::UnterminatedString(_)));
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn display_matches_tokenize_format() {
        let rendered: Vec<_> = Lexer::new(None, "x = 3;")
            .map(|t| t.unwrap().to_string())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "IDENTIFIER x null",
                "EQUAL = null",
                "INT 3 3",
                "SEMICOLON ; null",
                "EOF  null",
            ]
        );
    }
}
