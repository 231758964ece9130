//! HiveScript: a small typed scripting language.
//!
//! Source is lexed into tokens, then a single [`Interpreter`] parses and
//! evaluates them statement by statement. Function bodies are stored as raw
//! tokens and re-evaluated on every call in a fresh [`Environment`].
//!
//! Set `RUST_LOG=hivescript=debug` (or `trace`) together with
//! [`init_tracing`] to follow declarations, calls and expression reduction.

use std::{io::Write, sync::Once};

pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod lex;
pub mod parse;
pub mod value;

pub use config::Config;
pub use env::Environment;
pub use error::{Error, ErrorKind, EvalError};
pub use eval::{Interpreter, Outcome};
pub use lex::{LexError, Lexer, Token, TokenKind};
pub use value::{Binding, Function, Param, Value, ValueKind, Variable};

/// Tokenizes the whole source, ending with an `Eof` token.
pub fn lex<'de>(
    filename: Option<&'de str>,
    source: &'de str,
) -> Result<Vec<Token<'de>>, LexError> {
    Lexer::new(filename, source).collect()
}

/// Runs a program with the default [`Config`], writing `output` to `out`.
pub fn run<'de, W: Write + ?Sized>(source: &'de str, out: &mut W) -> Result<Outcome<'de>, Error> {
    run_with(None, source, Config::default(), out)
}

pub fn run_with<'de, W: Write + ?Sized>(
    filename: Option<&'de str>,
    source: &'de str,
    config: Config,
    out: &mut W,
) -> Result<Outcome<'de>, Error> {
    let tokens = lex(filename, source)?;
    let outcome = Interpreter::new(tokens, config, out).run()?;
    Ok(outcome)
}

static TRACING_INIT: Once = Once::new();

/// Installs a stderr subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}
