use std::{borrow::Cow, collections::HashMap, fmt::Display};

use tracing::debug;

use crate::{
    error::EvalError,
    lex::Token,
    value::{Binding, Function, Value, ValueKind, Variable},
};

/// Name → binding map for one program run or one function call.
///
/// Scopes never chain: a call starts from an empty environment holding
/// only its parameters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Environment<'de> {
    values: HashMap<Cow<'de, str>, Binding<'de>>,
}

impl<'de> Environment<'de> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding<'de>> {
        self.values.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable<'de>> {
        match self.values.get(name) {
            Some(Binding::Variable(variable)) => Some(variable),
            _ => None,
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function<'de>> {
        match self.values.get(name) {
            Some(Binding::Function(function)) => Some(function),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Introduces a new binding; a name can be declared once per environment.
    pub fn declare(&mut self, name: Token<'de>, binding: Binding<'de>) -> Result<(), EvalError> {
        if self.contains(name.literal) {
            return Err(EvalError::VariableAlreadyDeclared {
                name: name.literal.to_string(),
                line: name.line,
                span: name.span,
            });
        }
        debug!(name = name.literal, binding = %binding, "declare");
        self.values.insert(Cow::Borrowed(name.literal), binding);
        Ok(())
    }

    /// Replaces a variable's value, keeping its declared type.
    ///
    /// The value must conform to that type (ints promote to `flt`). Returns
    /// the value actually stored.
    pub fn assign(&mut self, name: Token<'de>, value: Value<'de>) -> Result<Value<'de>, EvalError> {
        let Some(Binding::Variable(variable)) = self.values.get_mut(name.literal) else {
            return Err(EvalError::VariableNotDeclared {
                name: name.literal.to_string(),
                line: name.line,
                span: name.span,
            });
        };
        let declared = variable.declared;
        let value = value
            .conform(declared)
            .map_err(|found| EvalError::VariableTypeMismatch {
                name: name.literal.to_string(),
                expected: declared,
                found,
                line: name.line,
                span: name.span,
            })?;
        debug!(name = name.literal, %value, "assign");
        variable.value = value.clone();
        Ok(value)
    }

    /// Removes a binding; absent names are ignored.
    pub fn clear(&mut self, name: &str) -> Option<Binding<'de>> {
        let removed = self.values.remove(name);
        debug!(name, removed = removed.is_some(), "clear");
        removed
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding<'de>)> {
        self.values.iter().map(|(name, binding)| (name.as_ref(), binding))
    }

    /// The value of a variable, if `name` is one.
    pub fn value(&self, name: &str) -> Option<&Value<'de>> {
        self.variable(name).map(|variable| &variable.value)
    }

    /// The declared type of a variable, if `name` is one.
    pub fn declared_type(&self, name: &str) -> Option<ValueKind> {
        self.variable(name).map(|variable| variable.declared)
    }
}

impl Display for Environment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|(name, _)| *name);
        for (name, binding) in entries {
            writeln!(f, "{name}: {binding}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use miette::SourceSpan;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::ErrorKind, lex::TokenKind};

    fn ident(name: &str) -> Token<'_> {
        Token {
            kind: TokenKind::Ident,
            literal: name,
            line: 1,
            span: SourceSpan::from(0..name.len()),
        }
    }

    fn int_var(name: &str, n: i64) -> Binding<'_> {
        Binding::Variable(Variable {
            name: ident(name),
            value: Value::Int(n),
            declared: ValueKind::Int,
        })
    }

    #[test]
    fn declare_then_lookup() {
        let mut env = Environment::new();
        env.declare(ident("x"), int_var("x", 1)).unwrap();
        assert_eq!(env.value("x"), Some(&Value::Int(1)));
        assert_eq!(env.declared_type("x"), Some(ValueKind::Int));
        assert!(env.function("x").is_none());
    }

    #[test]
    fn redeclaration_fails() {
        let mut env = Environment::new();
        env.declare(ident("x"), int_var("x", 1)).unwrap();
        let err = env.declare(ident("x"), int_var("x", 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VariableAlreadyDeclared);
        assert_eq!(env.value("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn assign_keeps_declared_type() {
        let mut env = Environment::new();
        env.declare(
            ident("ratio"),
            Binding::Variable(Variable {
                name: ident("ratio"),
                value: Value::Float(0.5),
                declared: ValueKind::Flt,
            }),
        )
        .unwrap();
        assert_eq!(
            env.assign(ident("ratio"), Value::Int(2)).unwrap(),
            Value::Float(2.0)
        );
        let err = env
            .assign(ident("ratio"), Value::Bool(true))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VariableTypeMismatch);
        assert_eq!(env.value("ratio"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn assign_to_unknown_fails() {
        let mut env = Environment::new();
        let err = env.assign(ident("ghost"), Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VariableNotDeclared);
    }

    #[test]
    fn clear_removes_and_tolerates_absent() {
        let mut env = Environment::new();
        env.declare(ident("x"), int_var("x", 1)).unwrap();
        assert!(env.clear("x").is_some());
        assert!(env.clear("x").is_none());
        assert!(env.is_empty());
    }

    #[test]
    fn display_is_sorted() {
        let mut env = Environment::new();
        env.declare(ident("b"), int_var("b", 2)).unwrap();
        env.declare(ident("a"), int_var("a", 1)).unwrap();
        assert_eq!(env.to_string(), "a: int = 1\nb: int = 2\n");
    }
}
