//! Stack-effect inference and slot binding.
//!
//! The analysis walks the tree with an abstract stack depth. A slot index
//! is simply a position in the valfile's array, so pushing assigns the
//! current depth and popping retires the highest index. Alternation
//! branches must agree on their net effect; closure, protect and format
//! splice bodies must be net-zero; transform bodies must map their one
//! slot to itself. `MAYBE` and `CLOSE_PLUS` are rewritten here into the
//! forms the execution engine knows.

use num_traits::ToPrimitive;

use dwq_core::{QueryError, Result};

use crate::tree::{Tree, TreeKind};

/// Infer stack effects, assign slot indices and apply the closure
/// rewrites. Returns the resulting stack depth of the whole query.
pub fn determine_stack_effects(tree: &mut Tree) -> Result<usize> {
    let mut depth = 0usize;
    walk(
        tree,
        &mut depth,
        Ctx {
            floor: 0,
            ceiling: None,
        },
    )?;
    Ok(depth)
}

#[derive(Copy, Clone)]
struct Ctx {
    /// Lowest slot this subtree may read or pop.
    floor: usize,
    /// One past the highest slot this subtree may write, when bounded
    /// (transform bodies are confined to their own slot).
    ceiling: Option<usize>,
}

impl Ctx {
    /// Context for a body that runs on its own clone of the valfile.
    fn cloned(self) -> Ctx {
        Ctx {
            floor: self.floor,
            ceiling: None,
        }
    }
}

fn need(depth: usize, n: usize, ctx: Ctx, what: &str) -> Result<()> {
    if depth < ctx.floor + n {
        Err(QueryError::Underrun(format!(
            "{what} needs {n} value{} on the stack",
            if n == 1 { "" } else { "s" }
        )))
    } else {
        Ok(())
    }
}

fn push_slot(depth: &mut usize, ctx: Ctx, what: &str) -> Result<usize> {
    if let Some(ceiling) = ctx.ceiling {
        if *depth >= ceiling {
            return Err(QueryError::Unbalanced(format!(
                "{what} pushes beyond the transformed slot window"
            )));
        }
    }
    let slot = *depth;
    *depth += 1;
    Ok(slot)
}

fn walk(t: &mut Tree, depth: &mut usize, ctx: Ctx) -> Result<()> {
    match t.kind {
        TreeKind::Nop | TreeKind::Str => {}

        TreeKind::Cat => {
            for child in &mut t.children {
                walk(child, depth, ctx)?;
            }
        }

        TreeKind::Alt => {
            let base = *depth;
            let mut out: Option<usize> = None;
            for child in &mut t.children {
                let mut branch_depth = base;
                walk(child, &mut branch_depth, ctx)?;
                match out {
                    None => out = Some(branch_depth),
                    Some(expected) if expected == branch_depth => {}
                    Some(expected) => {
                        return Err(QueryError::Unbalanced(format!(
                            "alternation branches produce {expected} versus {branch_depth} values"
                        )));
                    }
                }
            }
            *depth = out.unwrap_or(base);
        }

        TreeKind::CloseStar => {
            let base = *depth;
            walk(&mut t.children[0], depth, ctx)?;
            if *depth != base {
                return Err(QueryError::Unbalanced(
                    "iteration body must have no net stack effect".into(),
                ));
            }
        }

        // X+ is X followed by X*.
        TreeKind::ClosePlus => {
            let body = t.children.remove(0);
            let star = Tree::internal(TreeKind::CloseStar, vec![body.clone()]);
            *t = Tree::internal(TreeKind::Cat, vec![body, star]);
            walk(t, depth, ctx)?;
        }

        // X? is X or nothing.
        TreeKind::Maybe => {
            let body = t.children.remove(0);
            *t = Tree::internal(TreeKind::Alt, vec![body, Tree::nop()]);
            walk(t, depth, ctx)?;
        }

        TreeKind::Assert => {
            walk_pred(&mut t.children[0], *depth, ctx)?;
        }

        TreeKind::Const => {
            t.slots.dst = Some(push_slot(depth, ctx, "constant")?);
        }

        TreeKind::EmptyList => {
            t.slots.dst = Some(push_slot(depth, ctx, "empty list")?);
        }

        TreeKind::SelUniverse | TreeKind::SelSection | TreeKind::SelUnit | TreeKind::SelWinfo => {
            t.slots.dst = Some(push_slot(depth, ctx, "selector")?);
        }

        TreeKind::Capture => {
            // The body runs on its own clone; whatever it does there, the
            // original stack only grows by the collected sequence.
            let mut body_depth = *depth;
            walk(&mut t.children[0], &mut body_depth, ctx.cloned())?;
            t.slots.dst = Some(push_slot(depth, ctx, "capture")?);
        }

        TreeKind::Protect => {
            need(*depth, 1, ctx, "protect")?;
            t.slots.a = Some(*depth - 1);
            t.slots.dst = Some(*depth); // scratch holding the saved value
            let base = *depth;
            walk(&mut t.children[0], depth, ctx)?;
            if *depth != base {
                return Err(QueryError::Unbalanced(
                    "protected body must have no net stack effect".into(),
                ));
            }
        }

        TreeKind::Transform => {
            let n = t.children[0]
                .cst
                .as_ref()
                .and_then(|c| c.value().to_usize())
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    QueryError::Unbalanced("transform count must be a positive integer".into())
                })?;
            need(*depth, n, ctx, "transform")?;
            let body = t.children[1].clone();
            t.expansion.clear();
            for i in 0..n {
                let slot = *depth - n + i;
                let mut copy = body.clone();
                let mut copy_depth = slot + 1;
                let copy_ctx = Ctx {
                    floor: slot,
                    ceiling: Some(slot + 1),
                };
                walk(&mut copy, &mut copy_depth, copy_ctx)?;
                if copy_depth != slot + 1 {
                    return Err(QueryError::Unbalanced(
                        "transform body must map one slot to one slot".into(),
                    ));
                }
                t.expansion.push(copy);
            }
        }

        TreeKind::Format => {
            for child in &mut t.children {
                if child.kind == TreeKind::Str {
                    continue;
                }
                let base = *depth;
                let mut splice_depth = *depth;
                walk(child, &mut splice_depth, ctx.cloned())?;
                if splice_depth != base {
                    return Err(QueryError::Unbalanced(
                        "format splice must have no net stack effect".into(),
                    ));
                }
                need(splice_depth, 1, ctx, "format splice")?;
                if child.slots.is_empty() {
                    child.slots.dst = Some(splice_depth - 1);
                }
            }
            if *depth == ctx.floor {
                t.slots.dst = Some(push_slot(depth, ctx, "format")?);
            } else {
                t.slots.dst = Some(*depth - 1);
            }
        }

        TreeKind::ShfDup => {
            need(*depth, 1, ctx, "dup")?;
            t.slots.a = Some(*depth - 1);
            t.slots.dst = Some(push_slot(depth, ctx, "dup")?);
        }

        TreeKind::ShfSwap => {
            need(*depth, 2, ctx, "swap")?;
            t.slots.a = Some(*depth - 2);
            t.slots.dst = Some(*depth - 1);
        }

        TreeKind::ShfOver => {
            need(*depth, 2, ctx, "over")?;
            t.slots.a = Some(*depth - 2);
            t.slots.dst = Some(push_slot(depth, ctx, "over")?);
        }

        TreeKind::ShfRot => {
            need(*depth, 3, ctx, "rot")?;
            t.slots.a = Some(*depth - 3);
            t.slots.dst = Some(*depth - 1);
        }

        TreeKind::ShfDrop => {
            need(*depth, 1, ctx, "drop")?;
            *depth -= 1;
            t.slots.dst = Some(*depth);
        }

        TreeKind::FAdd | TreeKind::FSub | TreeKind::FMul | TreeKind::FDiv | TreeKind::FMod => {
            need(*depth, 2, ctx, "arithmetic")?;
            t.slots.a = Some(*depth - 2);
            t.slots.b = Some(*depth - 1);
            *depth -= 1;
            t.slots.dst = Some(*depth - 1);
        }

        // Unary accessors replace the top slot in place.
        TreeKind::FParent
        | TreeKind::FChild
        | TreeKind::FAttribute
        | TreeKind::FPrev
        | TreeKind::FNext
        | TreeKind::FType
        | TreeKind::FOffset
        | TreeKind::FName
        | TreeKind::FTag
        | TreeKind::FForm
        | TreeKind::FValue
        | TreeKind::FPos
        | TreeKind::FCount
        | TreeKind::FEach
        | TreeKind::FAttrNamed => {
            need(*depth, 1, ctx, "accessor")?;
            t.slots.a = Some(*depth - 1);
            t.slots.dst = Some(*depth - 1);
        }

        _ => {
            return Err(QueryError::Unbalanced(format!(
                "predicate {} outside an assertion",
                t.kind.dump_name()
            )));
        }
    }
    Ok(())
}

fn walk_pred(t: &mut Tree, depth: usize, ctx: Ctx) -> Result<()> {
    match t.kind {
        TreeKind::PredNot => walk_pred(&mut t.children[0], depth, ctx),

        TreeKind::PredAnd | TreeKind::PredOr => {
            for child in &mut t.children {
                walk_pred(child, depth, ctx)?;
            }
            Ok(())
        }

        TreeKind::PredEq
        | TreeKind::PredNe
        | TreeKind::PredLt
        | TreeKind::PredGt
        | TreeKind::PredLe
        | TreeKind::PredGe
        | TreeKind::PredMatch
        | TreeKind::PredFind => {
            need(depth, 2, ctx, "comparison")?;
            t.slots.a = Some(depth - 2);
            t.slots.b = Some(depth - 1);
            Ok(())
        }

        TreeKind::PredAt | TreeKind::PredTag | TreeKind::PredRoot | TreeKind::PredEmpty => {
            need(depth, 1, ctx, "predicate")?;
            t.slots.a = Some(depth - 1);
            Ok(())
        }

        TreeKind::PredSubxAny => {
            let mut body_depth = depth;
            walk(&mut t.children[0], &mut body_depth, ctx.cloned())
        }

        _ => Err(QueryError::Unbalanced(format!(
            "operator {} inside a predicate",
            t.kind.dump_name()
        ))),
    }
}

/// Peephole simplification: NOP elimination inside CAT, CAT flattening,
/// all-NOP alternation folding.
pub fn simplify(tree: &mut Tree) {
    for child in &mut tree.children {
        simplify(child);
    }
    for copy in &mut tree.expansion {
        simplify(copy);
    }
    match tree.kind {
        TreeKind::Cat => {
            let children = tree.take_children();
            let mut out: Vec<Tree> = Vec::with_capacity(children.len());
            for child in children {
                match child.kind {
                    TreeKind::Nop => {}
                    TreeKind::Cat => out.extend(child.children),
                    _ => out.push(child),
                }
            }
            match out.len() {
                0 => *tree = Tree::nop(),
                1 => *tree = out.pop().unwrap(),
                _ => tree.children = out,
            }
        }
        TreeKind::Alt => {
            if tree.children.iter().all(|c| c.kind == TreeKind::Nop) {
                *tree = Tree::nop();
            }
        }
        _ => {}
    }
}
