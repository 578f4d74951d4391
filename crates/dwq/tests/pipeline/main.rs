//! End-to-end tests: query source → tree → analysis → execution.
//!
//! Tests are organized into modules by stage. The parser and analysis
//! modules assert the parenthesized tree dumps; the execution modules
//! drive constant pipelines, which need no object file.

use dwq::{determine_stack_effects, parse_query, simplify, QueryError};

// Test modules
mod analysis;
mod flow;
mod literals;
mod parser;
mod stack;

// ============================================================================
// Test Helpers
// ============================================================================

/// Parse and dump, without stack-effect analysis.
pub fn parsed(input: &str) -> String {
    parse_query(input)
        .unwrap_or_else(|e| panic!("cannot parse {input:?}: {e}"))
        .to_string()
}

/// Parse, analyze, optionally simplify, and dump.
pub fn analyzed(input: &str, optimize: bool) -> String {
    let mut tree = parse_query(input).unwrap_or_else(|e| panic!("cannot parse {input:?}: {e}"));
    determine_stack_effects(&mut tree)
        .unwrap_or_else(|e| panic!("cannot analyze {input:?}: {e}"));
    if optimize {
        simplify(&mut tree);
    }
    tree.to_string()
}

/// Parse and analyze, expecting the analysis to fail; returns the error.
pub fn analysis_error(input: &str) -> QueryError {
    let mut tree = parse_query(input).unwrap_or_else(|e| panic!("cannot parse {input:?}: {e}"));
    determine_stack_effects(&mut tree)
        .err()
        .unwrap_or_else(|| panic!("analysis of {input:?} unexpectedly succeeded"))
}

/// Evaluate a standalone query and render each result row.
pub fn rows(input: &str) -> Vec<String> {
    dwq::eval_rows(input).unwrap_or_else(|e| panic!("eval failed for {input:?}: {e}"))
}
