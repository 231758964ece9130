#![allow(dead_code)]

use hivescript::{Error, ErrorKind, Outcome};

/// Runs a program that must succeed; returns the outcome and what it printed.
pub fn run_ok(source: &str) -> (Outcome<'_>, String) {
    let mut out = Vec::new();
    let outcome = match hivescript::run(source, &mut out) {
        Ok(outcome) => outcome,
        Err(e) => panic!("program failed: {e}\n{source}"),
    };
    let printed = String::from_utf8(out).expect("output should be utf-8");
    (outcome, printed)
}

/// Runs a program that must fail; returns the error.
pub fn run_err(source: &str) -> Error {
    let mut out = Vec::new();
    match hivescript::run(source, &mut out) {
        Ok(outcome) => panic!("program should have failed, got {outcome:?}\n{source}"),
        Err(e) => e,
    }
}

pub fn error_kind(source: &str) -> ErrorKind {
    run_err(source).kind()
}
