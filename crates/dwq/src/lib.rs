//! dwq: grep for DWARF debug information.
//!
//! A query is written in a stack-oriented concatenative language with
//! alternation, iteration, captures and formatted interpolation. The
//! engine walks the DWARF trees of one or more object files and lazily
//! emits every stack state that satisfies the query.
//!
//! # Example
//!
//! ```
//! use dwq::eval_rows;
//!
//! // Queries over constants need no object file.
//! let rows = eval_rows("(1, 2, 3) 1 ?gt drop").unwrap();
//! assert_eq!(rows, ["2", "3"]);
//! ```

pub use dwq_core::{Brevity, Constant, Domain, Pos, QueryError, Result, Span};
pub use dwq_engine::{render_valfile, vtype, Expr, Results, Valfile, Value};
pub use dwq_graph::Graph;
pub use dwq_lang::{
    compile_query, determine_stack_effects, parse_query, simplify, Tree, TreeKind,
};

/// Evaluate a query with no object file bound and collect every
/// satisfying valfile.
pub fn eval(query: &str) -> Result<Vec<Valfile>> {
    let expr = Expr::compile(query)?;
    let mut out = Vec::new();
    for row in expr.query_standalone()? {
        out.push(row?);
    }
    Ok(out)
}

/// Evaluate a query with no object file bound and render each result in
/// the default format.
pub fn eval_rows(query: &str) -> Result<Vec<String>> {
    Ok(eval(query)?.iter().map(render_valfile).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_constants() {
        let rows = eval_rows("1 2 add").unwrap();
        assert_eq!(rows, ["3"]);
    }

    #[test]
    fn eval_reports_parse_errors() {
        assert!(matches!(eval("1 ("), Err(QueryError::Parse { .. })));
    }
}
