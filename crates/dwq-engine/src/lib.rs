//! Execution engine for dwq queries.
//!
//! The engine lowers an analyzed query tree into a pull-based pipeline
//! of operator nodes over valfiles (stack snapshots), evaluated lazily
//! against a DWARF graph.

pub mod build;
pub mod expr;
pub mod op;
pub mod pred;
pub mod valfile;
pub mod value;
pub mod value_dw;

pub use expr::{render_valfile, Expr, Results};
pub use pred::{Pred, PredResult};
pub use valfile::Valfile;
pub use value::{vtype, Value};
