use std::{borrow::Cow, fmt::Display, rc::Rc};

use crate::lex::Token;

/// A runtime literal. The variant is the value's type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'de> {
    Int(i64),
    Float(f64),
    Str(Cow<'de, str>),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Flt,
    Str,
    Bool,
}

impl<'de> Value<'de> {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Flt,
            Value::Str(_) => ValueKind::Str,
            Value::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Checks the value against a declared type.
    ///
    /// An int is promoted when the declared type is `flt`; every other
    /// mismatch hands back the kind that was found.
    pub fn conform(self, declared: ValueKind) -> Result<Value<'de>, ValueKind> {
        match (self, declared) {
            (Value::Int(n), ValueKind::Flt) => Ok(Value::Float(n as f64)),
            (value, declared) if value.kind() == declared => Ok(value),
            (value, _) => Err(value.kind()),
        }
    }
}

impl Display for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Int => write!(f, "int"),
            ValueKind::Flt => write!(f, "flt"),
            ValueKind::Str => write!(f, "str"),
            ValueKind::Bool => write!(f, "bool"),
        }
    }
}

/// A named, type-fixed storage location.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable<'de> {
    pub name: Token<'de>,
    pub value: Value<'de>,
    pub declared: ValueKind,
}

/// A typed parameter slot of a function; bound to a value only per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param<'de> {
    pub name: Token<'de>,
    pub declared: ValueKind,
}

/// A declared function. The body is kept as raw tokens and evaluated
/// afresh on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Function<'de> {
    pub name: Token<'de>,
    pub return_type: Token<'de>,
    pub params: Vec<Param<'de>>,
    pub body: Rc<[Token<'de>]>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding<'de> {
    Variable(Variable<'de>),
    Function(Function<'de>),
}

impl Display for Binding<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Variable(variable) => match &variable.value {
                Value::Str(s) => write!(f, "{} = \"{s}\"", variable.declared),
                value => write!(f, "{} = {value}", variable.declared),
            },
            Binding::Function(function) => {
                write!(f, "prog {}(", function.return_type.literal)?;
                for (i, param) in function.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", param.declared, param.name.literal)?;
                }
                write!(f, ")")
            }
        }
    }
}
