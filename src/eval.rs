use std::{borrow::Cow, cmp::Ordering, io::Write, rc::Rc};

use tracing::{debug, trace};

use crate::{
    config::Config,
    env::Environment,
    error::EvalError,
    lex::{Token, TokenKind},
    parse::Cursor,
    value::{Binding, Function, Value, ValueKind, Variable},
};

/// What a finished run leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<'de> {
    /// Value of the last statement, or of the `return` that ended a call.
    pub value: Option<Value<'de>>,
    pub environment: Environment<'de>,
}

/// Parses and evaluates in one pass over a token sequence.
///
/// A program gets one interpreter; every `run` call gets a fresh one over
/// the function body, with its own environment and the same output sink.
pub struct Interpreter<'de, 'out, W: Write + ?Sized> {
    cursor: Cursor<'de>,
    environment: Environment<'de>,
    allow_return: bool,
    depth: usize,
    config: Config,
    out: &'out mut W,
}

/// An element of an expression buffer.
#[derive(Debug, Clone)]
enum Operand<'de> {
    Token(Token<'de>),
    Value(Value<'de>),
}

impl Operand<'_> {
    fn is(&self, kind: TokenKind) -> bool {
        matches!(self, Operand::Token(token) if token.kind == kind)
    }
}

impl<'de, 'out, W: Write + ?Sized> Interpreter<'de, 'out, W> {
    pub fn new(tokens: impl Into<Rc<[Token<'de>]>>, config: Config, out: &'out mut W) -> Self {
        Interpreter {
            cursor: Cursor::new(tokens.into()),
            environment: Environment::new(),
            allow_return: false,
            depth: 0,
            config,
            out,
        }
    }

    /// Evaluates statements until the tokens run out or a `return` fires.
    pub fn run(mut self) -> Result<Outcome<'de>, EvalError> {
        let mut value = None;
        while !self.cursor.is_at_end() {
            if self.cursor.peek_kind() == Some(TokenKind::Semicolon) {
                self.cursor.advance();
                continue;
            }
            value = self.eval_statement()?;
        }
        Ok(Outcome {
            value,
            environment: self.environment,
        })
    }

    pub fn eval_statement(&mut self) -> Result<Option<Value<'de>>, EvalError> {
        let token = self.cursor.advance_or_eof("a statement")?;
        trace!(%token, depth = self.depth, "statement");
        self.expression(token)
    }

    fn expression(&mut self, token: Token<'de>) -> Result<Option<Value<'de>>, EvalError> {
        if let Some(declared) = token.kind.declared_type() {
            return self.declaration(token, declared);
        }
        let value = match token.kind {
            TokenKind::Ident => self.identifier(token)?,
            TokenKind::Int(n) => Value::Int(n),
            TokenKind::Float(n) => Value::Float(n),
            TokenKind::String => Value::Str(Cow::Borrowed(token.literal)),
            TokenKind::True => Value::Bool(true),
            TokenKind::False => Value::Bool(false),
            TokenKind::LeftParen => {
                return self.operation(token, Operand::Token(token)).map(Some);
            }
            TokenKind::Prog => return self.prog(),
            TokenKind::Run => return self.function_execution(),
            TokenKind::Return => return self.return_statement(token),
            _ => return self.reserved(token).map(|()| None),
        };
        self.literal(token, value).map(Some)
    }

    /// Continues from a literal (or a resolved variable) depending on what
    /// follows it.
    fn literal(&mut self, token: Token<'de>, value: Value<'de>) -> Result<Value<'de>, EvalError> {
        let Some(next) = self.cursor.peek() else {
            return Ok(value);
        };
        match value {
            Value::Int(_) | Value::Float(_) if next.kind.is_arithmetic() => {
                self.operation(token, Operand::Value(value))
            }
            _ if next.kind.is_comparison() => self.comparison(value),
            Value::Str(_) if next.kind == TokenKind::Dot => self.concatenation(token, value),
            Value::Str(_) if next.kind.is_arithmetic() => Err(EvalError::UnsupportedOperationType {
                found: value.kind(),
                line: next.line,
                span: next.span,
            }),
            // only strings join
            _ if next.kind == TokenKind::Dot => Err(EvalError::UnsupportedOperationType {
                found: value.kind(),
                line: next.line,
                span: next.span,
            }),
            value => Ok(value),
        }
    }

    fn identifier(&mut self, name: Token<'de>) -> Result<Value<'de>, EvalError> {
        if self.cursor.peek_kind() == Some(TokenKind::Equal) {
            return self.assignment(name);
        }
        self.lookup(name)
    }

    fn lookup(&self, name: Token<'de>) -> Result<Value<'de>, EvalError> {
        self.environment
            .value(name.literal)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable {
                name: name.literal.to_string(),
                line: name.line,
                span: name.span,
            })
    }

    /// Evaluates the expression starting at the next token; it must yield a value.
    fn value(&mut self, expected: &'static str) -> Result<Value<'de>, EvalError> {
        let token = self.cursor.advance_or_eof(expected)?;
        self.expression(token)?
            .ok_or(EvalError::ExpectedExpression {
                line: token.line,
                span: token.span,
            })
    }

    fn declaration(
        &mut self,
        ty: Token<'de>,
        declared: ValueKind,
    ) -> Result<Option<Value<'de>>, EvalError> {
        let name = self.cursor.expect(TokenKind::Ident, "a name after the type")?;
        if self.cursor.peek_kind() == Some(TokenKind::LeftParen) {
            return self.function_declaration(ty, name);
        }
        self.cursor.expect(TokenKind::Equal, "`=` or `(` after the name")?;

        let value = self.value("a value to initialise the variable with")?;
        let value = value
            .conform(declared)
            .map_err(|found| EvalError::VariableTypeMismatch {
                name: name.literal.to_string(),
                expected: declared,
                found,
                line: name.line,
                span: name.span,
            })?;
        self.environment.declare(
            name,
            Binding::Variable(Variable {
                name,
                value,
                declared,
            }),
        )?;
        Ok(None)
    }

    fn assignment(&mut self, name: Token<'de>) -> Result<Value<'de>, EvalError> {
        if self.environment.variable(name.literal).is_none() {
            return Err(EvalError::VariableNotDeclared {
                name: name.literal.to_string(),
                line: name.line,
                span: name.span,
            });
        }
        self.cursor.advance();
        let value = self.value("a value to assign")?;
        self.environment.assign(name, value)
    }

    /// `prog <ReturnType> <Name> ( <params> ) { <body> }`
    fn prog(&mut self) -> Result<Option<Value<'de>>, EvalError> {
        let return_type = self.cursor.expect_where(
            |token| token.kind.declared_type().is_some(),
            "a return type after `prog`",
        )?;
        let name = self.cursor.expect(TokenKind::Ident, "a function name")?;
        self.function_declaration(return_type, name)
    }

    fn function_declaration(
        &mut self,
        return_type: Token<'de>,
        name: Token<'de>,
    ) -> Result<Option<Value<'de>>, EvalError> {
        let params = self.cursor.params(name)?;
        let body = self.cursor.body()?;
        debug!(
            name = name.literal,
            params = params.len(),
            body = body.len(),
            "function declared"
        );
        self.environment.declare(
            name,
            Binding::Function(Function {
                name,
                return_type,
                params,
                body,
            }),
        )?;
        Ok(None)
    }

    /// `run <Name> ( <args> )`
    fn function_execution(&mut self) -> Result<Option<Value<'de>>, EvalError> {
        let name = self
            .cursor
            .expect(TokenKind::Ident, "a function name after `run`")?;
        if self.cursor.peek_kind() != Some(TokenKind::LeftParen) {
            return Err(EvalError::CallSyntaxError {
                name: name.literal.to_string(),
                line: name.line,
                span: name.span,
            });
        }
        self.cursor.advance();
        let Some(function) = self.environment.function(name.literal).cloned() else {
            return Err(EvalError::UndefinedFunction {
                name: name.literal.to_string(),
                line: name.line,
                span: name.span,
            });
        };

        let mut args = Vec::new();
        if self.cursor.peek_kind() != Some(TokenKind::RightParen) {
            loop {
                args.push(self.value("an argument")?);
                if self.cursor.peek_kind() != Some(TokenKind::Comma) {
                    break;
                }
                self.cursor.advance();
            }
        }
        self.cursor
            .expect(TokenKind::RightParen, "`)` to close the argument list")?;

        self.call(&function, name, args)
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(function = name.literal, depth = self.depth + 1)
    )]
    fn call(
        &mut self,
        function: &Function<'de>,
        name: Token<'de>,
        args: Vec<Value<'de>>,
    ) -> Result<Option<Value<'de>>, EvalError> {
        if self.depth >= self.config.max_call_depth {
            return Err(EvalError::RecursionLimit {
                name: name.literal.to_string(),
                limit: self.config.max_call_depth,
                line: name.line,
                span: name.span,
            });
        }
        if args.len() != function.params.len() {
            return Err(EvalError::ArgumentCountMismatch {
                name: name.literal.to_string(),
                expected: function.params.len(),
                found: args.len(),
                line: name.line,
                span: name.span,
            });
        }

        let mut environment = Environment::new();
        for (param, value) in function.params.iter().zip(args) {
            let value = value
                .conform(param.declared)
                .map_err(|found| EvalError::ArgumentTypeMismatch {
                    name: param.name.literal.to_string(),
                    expected: param.declared,
                    found,
                    line: name.line,
                    span: name.span,
                })?;
            environment.declare(
                param.name,
                Binding::Variable(Variable {
                    name: param.name,
                    value,
                    declared: param.declared,
                }),
            )?;
        }

        let nested = Interpreter {
            cursor: Cursor::new(Rc::clone(&function.body)),
            environment,
            allow_return: true,
            depth: self.depth + 1,
            config: self.config,
            out: &mut *self.out,
        };
        let outcome = nested.run()?;
        debug!(result = ?outcome.value, "returned");
        Ok(outcome.value)
    }

    fn return_statement(&mut self, token: Token<'de>) -> Result<Option<Value<'de>>, EvalError> {
        if !self.allow_return {
            return Err(EvalError::ReturnOutsideFunction {
                line: token.line,
                span: token.span,
            });
        }
        let value = match self.cursor.peek_kind() {
            None | Some(TokenKind::Semicolon) => None,
            Some(_) => {
                let next = self.cursor.advance_or_eof("a value to return")?;
                self.expression(next)?
            }
        };
        self.cursor.finish();
        Ok(value)
    }

    fn reserved(&mut self, token: Token<'de>) -> Result<(), EvalError> {
        match token.kind {
            TokenKind::Output => {
                let value = self.value("a value to output")?;
                writeln!(self.out, "{value}").map_err(|e| EvalError::OutputFailed {
                    reason: e.to_string(),
                    line: token.line,
                    span: token.span,
                })
            }
            TokenKind::Clear => {
                let name = self.cursor.expect(TokenKind::Ident, "a name to clear")?;
                self.environment.clear(name.literal);
                Ok(())
            }
            _ => {
                debug!(%token, "nothing to do for token at statement position");
                Ok(())
            }
        }
    }

    /// Takes the tokens of one expression: up to `;`, the end of input, or a
    /// `,`/`)` closing a parenthesis that was opened before the expression.
    fn collect(&mut self, first: Operand<'de>) -> Vec<Operand<'de>> {
        let mut depth = usize::from(first.is(TokenKind::LeftParen));
        let mut buffer = vec![first];
        while let Some(token) = self.cursor.peek() {
            match token.kind {
                TokenKind::Semicolon | TokenKind::Eof => break,
                TokenKind::Comma | TokenKind::RightParen if depth == 0 => break,
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => depth -= 1,
                _ => {}
            }
            self.cursor.advance();
            buffer.push(Operand::Token(token));
        }
        buffer
    }

    fn operation(&mut self, at: Token<'de>, first: Operand<'de>) -> Result<Value<'de>, EvalError> {
        let buffer = self.collect(first);
        self.reduce(buffer, at)
    }

    /// Collapses an arithmetic buffer to one value.
    ///
    /// Each step takes the first `(` and the first `)` after it, else the
    /// leftmost `*` or `/`, else the leftmost `+` or `-`. Nested parentheses
    /// pair with the first closing one; the `)` tokens this leaves behind are
    /// ignored at the end.
    fn reduce(
        &self,
        mut buffer: Vec<Operand<'de>>,
        at: Token<'de>,
    ) -> Result<Value<'de>, EvalError> {
        while buffer.len() > 1 {
            if let Some(open) = buffer.iter().position(|op| op.is(TokenKind::LeftParen)) {
                let Some(close) = buffer[open..]
                    .iter()
                    .position(|op| op.is(TokenKind::RightParen))
                    .map(|offset| open + offset)
                else {
                    return Err(invalid(at, "this `(` is never closed"));
                };
                let group = buffer[open + 1..=close].to_vec();
                let value = self.reduce(group, at)?;
                buffer.splice(open..=close, [Operand::Value(value)]);
                continue;
            }

            let Some(index) = buffer
                .iter()
                .position(|op| op.is(TokenKind::Star) || op.is(TokenKind::Slash))
                .or_else(|| {
                    buffer
                        .iter()
                        .position(|op| op.is(TokenKind::Plus) || op.is(TokenKind::Minus))
                })
            else {
                break;
            };
            let Operand::Token(operator) = buffer[index] else {
                unreachable!("operators are always tokens");
            };
            if index == 0 || index + 1 >= buffer.len() {
                return Err(invalid(operator, "this operator is missing an operand"));
            }

            let left = self.resolve(&buffer[index - 1])?;
            let right = self.resolve(&buffer[index + 1])?;
            let value = arithmetic(operator, left, right)?;
            trace!(operator = operator.literal, %value, "reduce");
            buffer.splice(index - 1..=index + 1, [Operand::Value(value)]);
        }

        let mut rest = buffer.into_iter();
        let Some(first) = rest.next() else {
            return Err(invalid(at, "empty expression"));
        };
        if let Some(stray) = rest.find(|op| !op.is(TokenKind::RightParen)) {
            return Err(match stray {
                Operand::Token(token) => invalid(token, "unexpected token in expression"),
                Operand::Value(_) => invalid(at, "missing operator between values"),
            });
        }
        self.resolve(&first)
    }

    /// An operand's value: identifiers are looked up, literals pass through.
    fn resolve(&self, operand: &Operand<'de>) -> Result<Value<'de>, EvalError> {
        let token = match operand {
            Operand::Value(value) => return Ok(value.clone()),
            Operand::Token(token) => *token,
        };
        match token.kind {
            TokenKind::Ident => self.lookup(token),
            TokenKind::Int(n) => Ok(Value::Int(n)),
            TokenKind::Float(n) => Ok(Value::Float(n)),
            TokenKind::String => Ok(Value::Str(Cow::Borrowed(token.literal))),
            TokenKind::True => Ok(Value::Bool(true)),
            TokenKind::False => Ok(Value::Bool(false)),
            _ => Err(invalid(token, "this is not a value")),
        }
    }

    /// `left op right` for `== != > >= < <=`; the right side is a full
    /// expression.
    fn comparison(&mut self, left: Value<'de>) -> Result<Value<'de>, EvalError> {
        let operator = self.cursor.advance_or_eof("a comparison operator")?;
        let right = self.value("a right-hand operand")?;
        compare(operator, &left, &right).map(Value::Bool)
    }

    /// Joins `a . b . c`, left to right.
    fn concatenation(
        &mut self,
        at: Token<'de>,
        first: Value<'de>,
    ) -> Result<Value<'de>, EvalError> {
        let mut buffer = self.collect(Operand::Value(first));
        while buffer.len() > 1 {
            let Some(index) = buffer.iter().position(|op| op.is(TokenKind::Dot)) else {
                return Err(invalid(at, "strings can only be joined with `.`"));
            };
            let Operand::Token(dot) = buffer[index] else {
                unreachable!("`.` is always a token");
            };
            if index == 0 || index + 1 >= buffer.len() {
                return Err(invalid(dot, "`.` is missing an operand"));
            }
            let left = self.resolve(&buffer[index - 1])?;
            let right = self.resolve(&buffer[index + 1])?;
            let Value::Str(left) = left else {
                return Err(EvalError::UnsupportedOperationType {
                    found: left.kind(),
                    line: dot.line,
                    span: dot.span,
                });
            };
            let joined = Value::Str(Cow::Owned(format!("{left}{right}")));
            buffer.splice(index - 1..=index + 1, [Operand::Value(joined)]);
        }
        match buffer.pop() {
            Some(operand) => self.resolve(&operand),
            None => Err(invalid(at, "empty expression")),
        }
    }
}

fn invalid(token: Token<'_>, reason: &str) -> EvalError {
    EvalError::InvalidOperation {
        reason: reason.to_string(),
        line: token.line,
        span: token.span,
    }
}

/// `+ - * /` on numbers. `+ - *` keep the left operand's type, so an int
/// on the left truncates a fractional result toward zero; `/` is always
/// `flt`.
fn arithmetic<'de>(
    operator: Token<'de>,
    left: Value<'de>,
    right: Value<'de>,
) -> Result<Value<'de>, EvalError> {
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        let found = if left.as_f64().is_none() {
            left.kind()
        } else {
            right.kind()
        };
        return Err(EvalError::UnsupportedOperationType {
            found,
            line: operator.line,
            span: operator.span,
        });
    };
    let overflow = || EvalError::IntegerOverflow {
        line: operator.line,
        span: operator.span,
    };

    let result = match operator.kind {
        TokenKind::Plus => a + b,
        TokenKind::Minus => a - b,
        TokenKind::Star => a * b,
        TokenKind::Slash => return Ok(Value::Float(a / b)),
        _ => return Err(invalid(operator, "not an arithmetic operator")),
    };
    Ok(match (&left, &right) {
        (Value::Int(x), Value::Int(y)) => {
            let exact = match operator.kind {
                TokenKind::Plus => x.checked_add(*y),
                TokenKind::Minus => x.checked_sub(*y),
                _ => x.checked_mul(*y),
            };
            Value::Int(exact.ok_or_else(overflow)?)
        }
        (Value::Int(_), _) => Value::Int(truncate(result).ok_or_else(overflow)?),
        _ => Value::Float(result),
    })
}

/// Drops the fraction; `None` when the value has no `i64` counterpart.
fn truncate(n: f64) -> Option<i64> {
    let n = n.trunc();
    // 2^63 is exact as f64, so the upper bound is exclusive
    (n.is_finite() && n >= i64::MIN as f64 && n < i64::MAX as f64).then_some(n as i64)
}

fn compare(operator: Token<'_>, left: &Value<'_>, right: &Value<'_>) -> Result<bool, EvalError> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let comparable = left.kind() == right.kind()
        || (left.as_f64().is_some() && right.as_f64().is_some());

    let ordered = |accept: fn(Ordering) -> bool| {
        if !comparable {
            return Err(EvalError::UnsupportedOperationType {
                found: right.kind(),
                line: operator.line,
                span: operator.span,
            });
        }
        Ok(ordering.is_some_and(accept))
    };

    match operator.kind {
        TokenKind::EqualEqual => Ok(ordering == Some(Ordering::Equal)),
        TokenKind::BangEqual => Ok(ordering != Some(Ordering::Equal)),
        TokenKind::Greater => ordered(Ordering::is_gt),
        TokenKind::GreaterEqual => ordered(Ordering::is_ge),
        TokenKind::Less => ordered(Ordering::is_lt),
        TokenKind::LessEqual => ordered(Ordering::is_le),
        _ => Err(EvalError::UnsupportedOperator {
            operator: operator.literal.to_string(),
            line: operator.line,
            span: operator.span,
        }),
    }
}
