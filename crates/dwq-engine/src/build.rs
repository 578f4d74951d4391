//! Lowering: analyzed tree to operator pipeline.

use std::sync::Arc;

use num_traits::ToPrimitive;

use dwq_core::{QueryError, Result};
use dwq_graph::Graph;
use dwq_lang::{Tree, TreeKind};

use crate::op::{
    Alt, Arith, ArithKind, Assert, Capture, CloseStar, Const, EmptyList, Expand, ExpandFn, Format,
    Op, Protect, Segment, SeedHandle, SelDies, Shuffle, ShuffleKind, WalkKind,
};
use crate::pred::{
    CmpOp, Pred, PredAt, PredCmp, PredEmpty, PredNot, PredRegex, PredRoot, PredSubxAny, PredTag,
};
use crate::value_dw;

/// What the pipeline gets bound to. Selectors fail at run time when no
/// graph is bound.
pub struct BuildCtx {
    pub graph: Option<Arc<Graph>>,
}

fn not_analyzed(what: &str) -> QueryError {
    QueryError::Unbalanced(format!("{what} reached the builder without analysis"))
}

fn slot(s: Option<usize>, what: &str) -> Result<usize> {
    s.ok_or_else(|| not_analyzed(what))
}

fn payload_code(tree: &Tree, what: &str) -> Result<u16> {
    tree.cst
        .as_ref()
        .and_then(|c| c.value().to_u16())
        .ok_or_else(|| not_analyzed(what))
}

fn bound_graph(ctx: &BuildCtx) -> Result<Arc<Graph>> {
    ctx.graph
        .clone()
        .ok_or_else(|| QueryError::Dwarf("no object file bound to the query".into()))
}

/// Build the operator chain for `tree`, pulling from `upstream`.
pub fn build_pipeline(tree: &Tree, upstream: Box<dyn Op>, ctx: &BuildCtx) -> Result<Box<dyn Op>> {
    Ok(match tree.kind {
        TreeKind::Nop => upstream,

        TreeKind::Cat => {
            let mut chain = upstream;
            for child in &tree.children {
                chain = build_pipeline(child, chain, ctx)?;
            }
            chain
        }

        TreeKind::Alt => {
            let mut branches = Vec::with_capacity(tree.children.len());
            for child in &tree.children {
                branches.push(build_sub(child, ctx)?);
            }
            Box::new(Alt::new(upstream, branches))
        }

        TreeKind::Assert => Box::new(Assert {
            upstream,
            pred: build_pred(&tree.children[0], ctx)?,
        }),

        TreeKind::Const => Box::new(Const {
            upstream,
            cst: tree.cst.clone().ok_or_else(|| not_analyzed("constant"))?,
            dst: slot(tree.slots.dst, "constant")?,
        }),

        TreeKind::EmptyList => Box::new(EmptyList {
            upstream,
            dst: slot(tree.slots.dst, "empty list")?,
        }),

        TreeKind::Capture => {
            let (seed, body) = build_sub(&tree.children[0], ctx)?;
            Box::new(Capture {
                upstream,
                seed,
                body,
                dst: slot(tree.slots.dst, "capture")?,
            })
        }

        TreeKind::CloseStar => {
            let (seed, body) = build_sub(&tree.children[0], ctx)?;
            Box::new(CloseStar::new(upstream, seed, body))
        }

        TreeKind::ClosePlus | TreeKind::Maybe => {
            return Err(not_analyzed(tree.kind.dump_name()));
        }

        TreeKind::Protect => {
            let (seed, body) = build_sub(&tree.children[0], ctx)?;
            Box::new(Protect::new(
                upstream,
                slot(tree.slots.a, "protect")?,
                seed,
                body,
            ))
        }

        TreeKind::Transform => {
            if tree.expansion.is_empty() {
                return Err(not_analyzed("transform"));
            }
            let mut chain = upstream;
            for copy in &tree.expansion {
                chain = build_pipeline(copy, chain, ctx)?;
            }
            chain
        }

        TreeKind::Format => {
            let mut segments = Vec::with_capacity(tree.children.len());
            for child in &tree.children {
                segments.push(if child.kind == TreeKind::Str {
                    Segment::Lit(
                        child
                            .text
                            .clone()
                            .ok_or_else(|| not_analyzed("format literal"))?,
                    )
                } else {
                    let (seed, body) = build_sub(child, ctx)?;
                    Segment::Splice { seed, body }
                });
            }
            Box::new(Format {
                upstream,
                dst: slot(tree.slots.dst, "format")?,
                segments,
            })
        }

        TreeKind::ShfDup => shuffle(upstream, ShuffleKind::Dup),
        TreeKind::ShfSwap => shuffle(upstream, ShuffleKind::Swap),
        TreeKind::ShfOver => shuffle(upstream, ShuffleKind::Over),
        TreeKind::ShfRot => shuffle(upstream, ShuffleKind::Rot),
        TreeKind::ShfDrop => shuffle(upstream, ShuffleKind::Drop),

        TreeKind::FAdd => arith(upstream, ArithKind::Add),
        TreeKind::FSub => arith(upstream, ArithKind::Sub),
        TreeKind::FMul => arith(upstream, ArithKind::Mul),
        TreeKind::FDiv => arith(upstream, ArithKind::Div),
        TreeKind::FMod => arith(upstream, ArithKind::Mod),

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
            let src = slot(tree.slots.a, "accessor")?;
            let dst = slot(tree.slots.dst, "accessor")?;
            let f: ExpandFn = match tree.kind {
                TreeKind::FParent => Box::new(move |vf| value_dw::expand_parent(vf.slot(src)?)),
                TreeKind::FChild => Box::new(move |vf| value_dw::expand_child(vf.slot(src)?)),
                TreeKind::FAttribute => {
                    Box::new(move |vf| value_dw::expand_attribute(vf.slot(src)?))
                }
                TreeKind::FPrev => Box::new(move |vf| value_dw::expand_prev(vf.slot(src)?)),
                TreeKind::FNext => Box::new(move |vf| value_dw::expand_next(vf.slot(src)?)),
                TreeKind::FType => Box::new(move |vf| value_dw::expand_type(vf.slot(src)?)),
                TreeKind::FOffset => Box::new(move |vf| value_dw::expand_offset(vf.slot(src)?)),
                TreeKind::FName => Box::new(move |vf| value_dw::expand_name(vf.slot(src)?)),
                TreeKind::FTag => Box::new(move |vf| value_dw::expand_tag(vf.slot(src)?)),
                TreeKind::FForm => Box::new(move |vf| value_dw::expand_form(vf.slot(src)?)),
                TreeKind::FValue => Box::new(move |vf| value_dw::expand_value(vf.slot(src)?)),
                TreeKind::FPos => Box::new(move |vf| value_dw::expand_pos(vf.slot(src)?)),
                TreeKind::FCount => Box::new(move |vf| value_dw::expand_count(vf.slot(src)?)),
                TreeKind::FEach => Box::new(move |vf| value_dw::expand_each(vf.slot(src)?)),
                TreeKind::FAttrNamed => {
                    let at = payload_code(tree, "attribute shorthand")?;
                    Box::new(move |vf| value_dw::expand_atval(at, vf.slot(src)?))
                }
                _ => unreachable!("accessor arm covers only accessor kinds"),
            };
            Box::new(Expand::new(upstream, dst, f))
        }

        TreeKind::SelUnit => {
            let graph = bound_graph(ctx);
            let dst = slot(tree.slots.dst, "selector")?;
            let f: ExpandFn = Box::new(move |_vf| {
                let graph = graph.as_ref().map_err(|e| e.clone())?;
                Ok(value_dw::units(graph))
            });
            Box::new(Expand::new(upstream, dst, f))
        }

        TreeKind::SelSection => {
            let graph = bound_graph(ctx);
            let dst = slot(tree.slots.dst, "selector")?;
            let f: ExpandFn = Box::new(move |_vf| {
                let graph = graph.as_ref().map_err(|e| e.clone())?;
                Ok(value_dw::sections(graph))
            });
            Box::new(Expand::new(upstream, dst, f))
        }

        TreeKind::SelWinfo => Box::new(SelDies::new(
            upstream,
            ctx.graph.clone(),
            slot(tree.slots.dst, "selector")?,
            WalkKind::Winfo,
        )),

        TreeKind::SelUniverse => Box::new(SelDies::new(
            upstream,
            ctx.graph.clone(),
            slot(tree.slots.dst, "selector")?,
            WalkKind::Universe,
        )),

        TreeKind::Str => return Err(not_analyzed("string outside a format")),

        _ => {
            return Err(QueryError::Unbalanced(format!(
                "predicate {} outside an assertion",
                tree.kind.dump_name()
            )));
        }
    })
}

fn shuffle(upstream: Box<dyn Op>, kind: ShuffleKind) -> Box<dyn Op> {
    Box::new(Shuffle { upstream, kind })
}

fn arith(upstream: Box<dyn Op>, kind: ArithKind) -> Box<dyn Op> {
    Box::new(Arith { upstream, kind })
}

/// Build a sub-pipeline over a fresh seed.
fn build_sub(tree: &Tree, ctx: &BuildCtx) -> Result<(SeedHandle, Box<dyn Op>)> {
    let (handle, seed_op) = SeedHandle::new();
    let body = build_pipeline(tree, Box::new(seed_op), ctx)?;
    Ok((handle, body))
}

pub fn build_pred(tree: &Tree, ctx: &BuildCtx) -> Result<Box<dyn Pred>> {
    Ok(match tree.kind {
        TreeKind::PredNot => Box::new(PredNot {
            inner: build_pred(&tree.children[0], ctx)?,
        }),

        TreeKind::PredAnd => Box::new(crate::pred::PredAnd {
            a: build_pred(&tree.children[0], ctx)?,
            b: build_pred(&tree.children[1], ctx)?,
        }),

        TreeKind::PredOr => Box::new(crate::pred::PredOr {
            a: build_pred(&tree.children[0], ctx)?,
            b: build_pred(&tree.children[1], ctx)?,
        }),

        TreeKind::PredEq
        | TreeKind::PredNe
        | TreeKind::PredLt
        | TreeKind::PredGt
        | TreeKind::PredLe
        | TreeKind::PredGe => {
            let op = match tree.kind {
                TreeKind::PredEq => CmpOp::Eq,
                TreeKind::PredNe => CmpOp::Ne,
                TreeKind::PredLt => CmpOp::Lt,
                TreeKind::PredGt => CmpOp::Gt,
                TreeKind::PredLe => CmpOp::Le,
                _ => CmpOp::Ge,
            };
            Box::new(PredCmp {
                op,
                a: slot(tree.slots.a, "comparison")?,
                b: slot(tree.slots.b, "comparison")?,
            })
        }

        TreeKind::PredMatch => Box::new(PredRegex::new(
            true,
            slot(tree.slots.a, "match")?,
            slot(tree.slots.b, "match")?,
        )),

        TreeKind::PredFind => Box::new(PredRegex::new(
            false,
            slot(tree.slots.a, "find")?,
            slot(tree.slots.b, "find")?,
        )),

        TreeKind::PredAt => Box::new(PredAt {
            at: payload_code(tree, "attribute predicate")?,
            a: slot(tree.slots.a, "attribute predicate")?,
        }),

        TreeKind::PredTag => Box::new(PredTag {
            tag: payload_code(tree, "tag predicate")?,
            a: slot(tree.slots.a, "tag predicate")?,
        }),

        TreeKind::PredRoot => Box::new(PredRoot {
            a: slot(tree.slots.a, "root predicate")?,
        }),

        TreeKind::PredEmpty => Box::new(PredEmpty {
            a: slot(tree.slots.a, "empty predicate")?,
        }),

        TreeKind::PredSubxAny => {
            let (seed, body) = build_sub(&tree.children[0], ctx)?;
            Box::new(PredSubxAny { seed, body })
        }

        _ => {
            return Err(QueryError::Unbalanced(format!(
                "operator {} inside a predicate",
                tree.kind.dump_name()
            )));
        }
    })
}
