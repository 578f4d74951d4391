//! Engine entry: compile a query, bind it to a graph, iterate results.

use std::sync::Arc;

use tracing::debug;

use dwq_core::{Brevity, Result};
use dwq_graph::Graph;
use dwq_lang::{compile_query, Tree};

use crate::build::{build_pipeline, BuildCtx};
use crate::op::{Op, Origin};
use crate::valfile::Valfile;

/// A compiled query, ready to be bound to graphs.
pub struct Expr {
    tree: Tree,
    source: String,
}

impl Expr {
    /// Lex, parse, analyze and simplify a query string.
    pub fn compile(query: &str) -> Result<Expr> {
        let tree = compile_query(query, true)?;
        debug!(query, tree = %tree, "compiled");
        Ok(Expr {
            tree,
            source: query.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The analyzed tree, in the parenthesized dump form via `Display`.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Bind to a graph and return the lazy result iterator.
    pub fn query(&self, graph: Arc<Graph>) -> Result<Results> {
        self.bind(Some(graph))
    }

    /// Run without any object file; selectors will report a dwarf error
    /// if the query reaches for one.
    pub fn query_standalone(&self) -> Result<Results> {
        self.bind(None)
    }

    fn bind(&self, graph: Option<Arc<Graph>>) -> Result<Results> {
        let ctx = BuildCtx { graph };
        let root = build_pipeline(&self.tree, Box::new(Origin::new()), &ctx)?;
        Ok(Results { root, done: false })
    }
}

/// Lazy iterator over the valfiles that satisfy a query. An error aborts
/// the iteration: it is yielded once and the iterator then fuses.
pub struct Results {
    root: Box<dyn Op>,
    done: bool,
}

impl Iterator for Results {
    type Item = Result<Valfile>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.root.next() {
            Ok(Some(vf)) => Some(Ok(vf)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Default rendering of one satisfying valfile: all slots, bottom to
/// top, tab separated.
pub fn render_valfile(vf: &Valfile) -> String {
    vf.slots()
        .iter()
        .map(|v| v.show(Brevity::Full))
        .collect::<Vec<_>>()
        .join("\t")
}
