//! Command-line driver.
//!
//! Exit status follows grep: 0 when anything matched, 1 when nothing
//! did, 2 on error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dwq::{render_valfile, Expr, Graph};

#[derive(Parser, Debug)]
#[command(
    name = "dwq",
    version,
    about = "Query DWARF debug information with a concatenative expression language"
)]
struct Args {
    /// The query expression. Without -e or -f the first positional
    /// argument is taken as the query.
    #[arg(short = 'e', long = "expr")]
    expr: Option<String>,

    /// Read the query from a file.
    #[arg(short = 'f', long = "file", conflicts_with = "expr")]
    file: Option<PathBuf>,

    /// Suppress normal output; only the exit status reports matches.
    #[arg(short = 'q', long = "quiet", visible_alias = "silent")]
    quiet: bool,

    /// Suppress messages about unreadable or malformed files.
    #[arg(short = 's', long = "no-messages")]
    no_messages: bool,

    /// Object files to query.
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = Args::parse();

    let query = match (&args.expr, &args.file) {
        (Some(expr), _) => expr.clone(),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("dwq: cannot read {}: {e}", path.display());
                return ExitCode::from(2);
            }
        },
        (None, None) => {
            if args.files.is_empty() {
                eprintln!("dwq: no query given");
                return ExitCode::from(2);
            }
            let first = args.files.remove(0);
            first.to_string_lossy().into_owned()
        }
    };

    let expr = match Expr::compile(&query) {
        Ok(expr) => expr,
        Err(e) => {
            eprintln!("dwq: {e}");
            return ExitCode::from(2);
        }
    };
    debug!(tree = %expr.tree(), "query compiled");

    let mut matched = false;
    let mut failed = false;

    if args.files.is_empty() {
        // No object files: run the query standalone. Useful for
        // constant pipelines and for checking a query parses.
        run_one(&expr, None, &args, &mut matched, &mut failed);
    } else {
        let files = std::mem::take(&mut args.files);
        for path in &files {
            match Graph::open(path) {
                Ok(graph) => run_one(&expr, Some(graph), &args, &mut matched, &mut failed),
                Err(e) => {
                    if !args.no_messages {
                        eprintln!("dwq: {}: {e:#}", path.display());
                    }
                    failed = true;
                }
            }
        }
    }

    if failed {
        ExitCode::from(2)
    } else if matched {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn run_one(
    expr: &Expr,
    graph: Option<std::sync::Arc<Graph>>,
    args: &Args,
    matched: &mut bool,
    failed: &mut bool,
) {
    let results = match graph {
        Some(graph) => expr.query(graph),
        None => expr.query_standalone(),
    };
    let results = match results {
        Ok(results) => results,
        Err(e) => {
            eprintln!("dwq: {e}");
            *failed = true;
            return;
        }
    };
    for row in results {
        match row {
            Ok(vf) => {
                *matched = true;
                if !args.quiet {
                    println!("{}", render_valfile(&vf));
                }
            }
            Err(e) => {
                eprintln!("dwq: {e}");
                *failed = true;
                return;
            }
        }
    }
}
