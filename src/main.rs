use std::fs;
use std::io::{Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use clap::Subcommand;
use hivescript::Config;
use hivescript::Lexer;
use hivescript::config::DEFAULT_MAX_CALL_DEPTH;
use miette::IntoDiagnostic;
use miette::WrapErr;

#[derive(Parser, Debug)]
#[command(name = "hive", version, about = "Run HiveScript programs")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the tokens of a script, one per line.
    Tokenize { filename: PathBuf },
    /// Interpret a script.
    Run {
        filename: PathBuf,

        /// Report how long lexing and evaluation took.
        #[arg(long)]
        time: bool,

        /// Print the final top-level variables and functions.
        #[arg(long)]
        dump_env: bool,

        /// How many nested `run` calls are allowed.
        #[arg(long, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
        max_call_depth: usize,
    },
}

fn read(filename: &Path) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

fn main() -> miette::Result<()> {
    hivescript::init_tracing();
    let args = Args::parse();

    match args.command {
        Commands::Tokenize { filename } => {
            let file_contents = read(&filename)?;
            let name = filename.display().to_string();

            let mut out = stdout().lock();
            for token in Lexer::new(Some(&name), &file_contents) {
                let token = match token {
                    Ok(token) => token,
                    Err(e) => {
                        eprintln!("[line {}] Error: {e}", e.line());
                        eprintln!("{:?}", miette::Report::new(e));
                        std::process::exit(65);
                    }
                };
                writeln!(out, "{token}").into_diagnostic()?;
            }
        }
        Commands::Run {
            filename,
            time,
            dump_env,
            max_call_depth,
        } => {
            let file_contents = read(&filename)?;
            let name = filename.display().to_string();
            let config = Config::default().with_max_call_depth(max_call_depth);

            let started = Instant::now();
            let mut out = stdout().lock();
            let result = hivescript::run_with(Some(&name), &file_contents, config, &mut out);
            out.flush().into_diagnostic()?;
            if time {
                eprintln!("Finished in {:?}", started.elapsed());
            }

            match result {
                Ok(outcome) => {
                    if dump_env {
                        write!(out, "{}", outcome.environment).into_diagnostic()?;
                    }
                }
                Err(e) => {
                    eprintln!("[line {}] Error: {e}", e.line());
                    let code = e.exit_code();
                    eprintln!("{:?}", e.into_report(&name, &file_contents));
                    std::process::exit(code);
                }
            }
        }
    }
    Ok(())
}
