//! Front-end of the dwq query language.
//!
//! The pipeline is: lex → parse → stack-effect analysis → (optional)
//! simplification. The resulting tree is what the execution engine lowers
//! into its operator graph.

pub mod effects;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod tree;

pub use effects::{determine_stack_effects, simplify};
pub use lexer::lex;
pub use parser::parse_query;
pub use tree::{Slots, Tree, TreeKind};

use dwq_core::Result;

/// Parse a query and run the full analysis, yielding a tree ready for
/// the engine.
pub fn compile_query(input: &str, optimize: bool) -> Result<Tree> {
    let mut tree = parse_query(input)?;
    determine_stack_effects(&mut tree)?;
    if optimize {
        simplify(&mut tree);
    }
    Ok(tree)
}
