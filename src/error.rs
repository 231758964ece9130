//! Runtime diagnostics and the crate-wide error type.
//!
//! Runtime errors carry the line and span of the token they were raised at
//! but not the source text; [`Error::into_report`] attaches it.

use std::fmt::Display;

use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

use crate::{lex::LexError, value::ValueKind};

#[derive(Error, Debug, Diagnostic, PartialEq)]
pub enum EvalError {
    #[error("Variable {name} is not defined")]
    #[diagnostic(code(hive::undefined_variable))]
    UndefinedVariable {
        name: String,
        line: usize,
        #[label("not defined in this scope")]
        span: SourceSpan,
    },

    #[error("Variable {name} is not declared")]
    #[diagnostic(
        code(hive::variable_not_declared),
        help("declare it first, e.g. `int {name} = 0;`")
    )]
    VariableNotDeclared {
        name: String,
        line: usize,
        #[label("assigned here")]
        span: SourceSpan,
    },

    #[error("Variable {name} is already defined")]
    #[diagnostic(code(hive::variable_already_declared))]
    VariableAlreadyDeclared {
        name: String,
        line: usize,
        #[label("declared again here")]
        span: SourceSpan,
    },

    #[error("Variable {name} type is {expected}, but got {found}")]
    #[diagnostic(
        code(hive::variable_type_mismatch),
        help("You likely attempted to assign a value with a type that does not match.")
    )]
    VariableTypeMismatch {
        name: String,
        expected: ValueKind,
        found: ValueKind,
        line: usize,
        #[label("expected {expected}")]
        span: SourceSpan,
    },

    #[error("{found} is not valid for this operation.")]
    #[diagnostic(
        code(hive::unsupported_operation_type),
        help(
            "You likely are using a value that cannot be 'just' added with regular operators, like a string."
        )
    )]
    UnsupportedOperationType {
        found: ValueKind,
        line: usize,
        #[label("this operation")]
        span: SourceSpan,
    },

    #[error("Attempted to use unsupported operator {operator} in a binary operation")]
    #[diagnostic(code(hive::unsupported_operator))]
    UnsupportedOperator {
        operator: String,
        line: usize,
        #[label("use one of == != > >= < <=")]
        span: SourceSpan,
    },

    #[error("Return statement outside of function.")]
    #[diagnostic(
        code(hive::return_outside_function),
        help(
            "You may have placed a return statement outside of a function. Make sure you are returning inside of a function."
        )
    )]
    ReturnOutsideFunction {
        line: usize,
        #[label("return here")]
        span: SourceSpan,
    },

    #[error("Expected `(` after function name {name}")]
    #[diagnostic(code(hive::call_syntax), help("call functions as `run {name}(...);`"))]
    CallSyntaxError {
        name: String,
        line: usize,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("Malformed parameter list for function {function}")]
    #[diagnostic(
        code(hive::malformed_function_parameter),
        help("each parameter is a type followed by a name, e.g. `int a, str b`")
    )]
    MalformedFunctionParameter {
        function: String,
        line: usize,
        #[label("unexpected `{found}`")]
        span: SourceSpan,
        found: String,
    },

    #[error("Invalid operation.")]
    #[diagnostic(code(hive::invalid_operation), help("{reason}"))]
    InvalidOperation {
        reason: String,
        line: usize,
        #[label("in this expression")]
        span: SourceSpan,
    },

    #[error("Function {name} is not defined")]
    #[diagnostic(code(hive::undefined_function))]
    UndefinedFunction {
        name: String,
        line: usize,
        #[label("called here")]
        span: SourceSpan,
    },

    #[error("Function {name} takes {expected} argument(s), but got {found}")]
    #[diagnostic(code(hive::argument_count_mismatch))]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
        line: usize,
        #[label("called here")]
        span: SourceSpan,
    },

    #[error("Argument {name} expected {expected}, but got {found}.")]
    #[diagnostic(
        code(hive::argument_type_mismatch),
        help(
            "You likely attempted to pass a value with a type that does not match, or maybe you forgot to pass an argument."
        )
    )]
    ArgumentTypeMismatch {
        name: String,
        expected: ValueKind,
        found: ValueKind,
        line: usize,
        #[label("called here")]
        span: SourceSpan,
    },

    #[error("Expected {expected}, found `{found}`")]
    #[diagnostic(code(hive::unexpected_token))]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        line: usize,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("Unexpected end of input, expected {expected}")]
    #[diagnostic(
        code(hive::unexpected_eof),
        help("the input ended early, possibly a missing `;`, `)` or `}}`")
    )]
    UnexpectedEof {
        expected: &'static str,
        line: usize,
        #[label("input ends here")]
        span: SourceSpan,
    },

    #[error("Expected an expression")]
    #[diagnostic(code(hive::expected_expression))]
    ExpectedExpression {
        line: usize,
        #[label("this produces no value")]
        span: SourceSpan,
    },

    #[error("Integer overflow")]
    #[diagnostic(code(hive::integer_overflow), help("use flt values for large numbers"))]
    IntegerOverflow {
        line: usize,
        #[label("this operation overflows")]
        span: SourceSpan,
    },

    #[error("Could not write program output: {reason}")]
    #[diagnostic(code(hive::output_failed))]
    OutputFailed {
        reason: String,
        line: usize,
        #[label("while running this statement")]
        span: SourceSpan,
    },

    #[error("Function {name} exceeded the call depth limit of {limit}")]
    #[diagnostic(
        code(hive::recursion_limit),
        help("raise the limit with `--max-call-depth`")
    )]
    RecursionLimit {
        name: String,
        limit: usize,
        line: usize,
        #[label("called here")]
        span: SourceSpan,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnterminatedString,
    InvalidNumber,
    UndefinedVariable,
    VariableNotDeclared,
    VariableAlreadyDeclared,
    VariableTypeMismatch,
    UnsupportedOperationType,
    UnsupportedOperator,
    ReturnOutsideFunction,
    CallSyntaxError,
    MalformedFunctionParameter,
    InvalidOperation,
    UndefinedFunction,
    ArgumentCountMismatch,
    ArgumentTypeMismatch,
    UnexpectedToken,
    UnexpectedEof,
    ExpectedExpression,
    IntegerOverflow,
    OutputFailed,
    RecursionLimit,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::UndefinedVariable { .. } => ErrorKind::UndefinedVariable,
            EvalError::VariableNotDeclared { .. } => ErrorKind::VariableNotDeclared,
            EvalError::VariableAlreadyDeclared { .. } => ErrorKind::VariableAlreadyDeclared,
            EvalError::VariableTypeMismatch { .. } => ErrorKind::VariableTypeMismatch,
            EvalError::UnsupportedOperationType { .. } => ErrorKind::UnsupportedOperationType,
            EvalError::UnsupportedOperator { .. } => ErrorKind::UnsupportedOperator,
            EvalError::ReturnOutsideFunction { .. } => ErrorKind::ReturnOutsideFunction,
            EvalError::CallSyntaxError { .. } => ErrorKind::CallSyntaxError,
            EvalError::MalformedFunctionParameter { .. } => ErrorKind::MalformedFunctionParameter,
            EvalError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            EvalError::UndefinedFunction { .. } => ErrorKind::UndefinedFunction,
            EvalError::ArgumentCountMismatch { .. } => ErrorKind::ArgumentCountMismatch,
            EvalError::ArgumentTypeMismatch { .. } => ErrorKind::ArgumentTypeMismatch,
            EvalError::UnexpectedToken { .. } => ErrorKind::UnexpectedToken,
            EvalError::UnexpectedEof { .. } => ErrorKind::UnexpectedEof,
            EvalError::ExpectedExpression { .. } => ErrorKind::ExpectedExpression,
            EvalError::IntegerOverflow { .. } => ErrorKind::IntegerOverflow,
            EvalError::OutputFailed { .. } => ErrorKind::OutputFailed,
            EvalError::RecursionLimit { .. } => ErrorKind::RecursionLimit,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            EvalError::UndefinedVariable { line, .. }
            | EvalError::VariableNotDeclared { line, .. }
            | EvalError::VariableAlreadyDeclared { line, .. }
            | EvalError::VariableTypeMismatch { line, .. }
            | EvalError::UnsupportedOperationType { line, .. }
            | EvalError::UnsupportedOperator { line, .. }
            | EvalError::ReturnOutsideFunction { line, .. }
            | EvalError::CallSyntaxError { line, .. }
            | EvalError::MalformedFunctionParameter { line, .. }
            | EvalError::InvalidOperation { line, .. }
            | EvalError::UndefinedFunction { line, .. }
            | EvalError::ArgumentCountMismatch { line, .. }
            | EvalError::ArgumentTypeMismatch { line, .. }
            | EvalError::UnexpectedToken { line, .. }
            | EvalError::UnexpectedEof { line, .. }
            | EvalError::ExpectedExpression { line, .. }
            | EvalError::IntegerOverflow { line, .. }
            | EvalError::OutputFailed { line, .. }
            | EvalError::RecursionLimit { line, .. } => *line,
        }
    }
}

/// Anything that stops a program run.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lex(LexError::UnterminatedString(_)) => ErrorKind::UnterminatedString,
            Error::Lex(LexError::InvalidNumber(_)) => ErrorKind::InvalidNumber,
            Error::Eval(e) => e.kind(),
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Error::Lex(e) => e.line(),
            Error::Eval(e) => e.line(),
        }
    }

    /// Process exit status for the CLI: 65 for malformed input, 70 for
    /// failures while running it.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Lex(_) => 65,
            Error::Eval(_) => 70,
        }
    }

    /// Renders into a report that can show the offending source.
    pub fn into_report(self, filename: &str, source: &str) -> Report {
        match self {
            // lexical errors already own their source
            Error::Lex(e) => Report::new(e),
            Error::Eval(e) => {
                Report::new(e).with_source_code(NamedSource::new(filename, source.to_string()))
            }
        }
    }
}
