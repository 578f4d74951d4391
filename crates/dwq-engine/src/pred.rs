//! Predicates: the gate evaluators behind `?…` and `!…`.
//!
//! A predicate inspects a valfile and answers yes, no, or fail. Fail
//! means the inspected slots had the wrong variants; the assertion
//! operator turns it into a `PredicateFailure`.

use std::cmp::Ordering;

use regex::Regex;

use dwq_core::{QueryError, Result};

use crate::op::{Op, SeedHandle};
use crate::valfile::Valfile;
use crate::value::Value;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PredResult {
    Yes,
    No,
    Fail,
}

impl PredResult {
    pub fn of(b: bool) -> PredResult {
        if b {
            PredResult::Yes
        } else {
            PredResult::No
        }
    }
}

pub trait Pred {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult>;
    fn name(&self) -> String;
}

pub struct PredNot {
    pub inner: Box<dyn Pred>,
}

impl Pred for PredNot {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        Ok(match self.inner.result(vf)? {
            PredResult::Yes => PredResult::No,
            PredResult::No => PredResult::Yes,
            PredResult::Fail => PredResult::Fail,
        })
    }

    fn name(&self) -> String {
        format!("not {}", self.inner.name())
    }
}

pub struct PredAnd {
    pub a: Box<dyn Pred>,
    pub b: Box<dyn Pred>,
}

impl Pred for PredAnd {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        Ok(match self.a.result(vf)? {
            PredResult::Fail => PredResult::Fail,
            PredResult::No => PredResult::No,
            PredResult::Yes => self.b.result(vf)?,
        })
    }

    fn name(&self) -> String {
        format!("({} and {})", self.a.name(), self.b.name())
    }
}

pub struct PredOr {
    pub a: Box<dyn Pred>,
    pub b: Box<dyn Pred>,
}

impl Pred for PredOr {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        Ok(match self.a.result(vf)? {
            PredResult::Fail => PredResult::Fail,
            PredResult::Yes => PredResult::Yes,
            PredResult::No => self.b.result(vf)?,
        })
    }

    fn name(&self) -> String {
        format!("({} or {})", self.a.name(), self.b.name())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    fn admits(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }

    fn name(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Gt => "gt",
            CmpOp::Le => "le",
            CmpOp::Ge => "ge",
        }
    }
}

/// Two-slot comparison under the value model's compare.
pub struct PredCmp {
    pub op: CmpOp,
    pub a: usize,
    pub b: usize,
}

impl Pred for PredCmp {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        let a = vf.slot(self.a)?;
        let b = vf.slot(self.b)?;
        Ok(match a.cmp_val(b) {
            Some(ord) => PredResult::of(self.op.admits(ord)),
            None => PredResult::Fail,
        })
    }

    fn name(&self) -> String {
        self.op.name().to_string()
    }
}

/// `?match` (whole-string) and `?find` (substring) over two string slots:
/// the subject below, the pattern on top.
pub struct PredRegex {
    pub whole: bool,
    pub a: usize,
    pub b: usize,
    cache: Option<(String, Regex)>,
}

impl PredRegex {
    pub fn new(whole: bool, a: usize, b: usize) -> Self {
        Self {
            whole,
            a,
            b,
            cache: None,
        }
    }

    fn compiled(&mut self, pattern: &str) -> Result<&Regex> {
        let stale = match &self.cache {
            Some((cached, _)) => cached != pattern,
            None => true,
        };
        if stale {
            let anchored;
            let source = if self.whole {
                anchored = format!("^(?:{pattern})$");
                &anchored
            } else {
                pattern
            };
            let re = Regex::new(source).map_err(|e| {
                QueryError::PredicateFailure(format!("bad pattern {pattern:?}: {e}"))
            })?;
            self.cache = Some((pattern.to_string(), re));
        }
        Ok(&self.cache.as_ref().unwrap().1)
    }
}

impl Pred for PredRegex {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        let (subject, pattern) = match (vf.slot(self.a)?.as_str(), vf.slot(self.b)?.as_str()) {
            (Some(s), Some(p)) => (s.to_string(), p.to_string()),
            _ => return Ok(PredResult::Fail),
        };
        let re = self.compiled(&pattern)?;
        Ok(PredResult::of(re.is_match(&subject)))
    }

    fn name(&self) -> String {
        if self.whole { "match" } else { "find" }.to_string()
    }
}

/// Does the DIE (or abbreviation) carry the named attribute?
pub struct PredAt {
    pub at: u16,
    pub a: usize,
}

impl Pred for PredAt {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        match vf.slot(self.a)? {
            Value::Die {
                graph,
                unit,
                offset,
                ..
            } => {
                let present = graph
                    .attr(*unit, *offset, gimli::DwAt(self.at))
                    .map_err(|e| QueryError::Dwarf(e.to_string()))?
                    .is_some();
                Ok(PredResult::of(present))
            }
            Value::Abbrev {
                graph, unit, code, ..
            } => Ok(PredResult::of(graph.abbrev(*unit, *code).is_some_and(
                |a| a.attributes().iter().any(|s| s.name().0 == self.at),
            ))),
            _ => Ok(PredResult::Fail),
        }
    }

    fn name(&self) -> String {
        format!("at {:#x}", self.at)
    }
}

/// Does the DIE (or abbreviation) have the given tag?
pub struct PredTag {
    pub tag: u16,
    pub a: usize,
}

impl Pred for PredTag {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        match vf.slot(self.a)? {
            Value::Die {
                graph,
                unit,
                offset,
                ..
            } => {
                let tag = graph
                    .tag(*unit, *offset)
                    .map_err(|e| QueryError::Dwarf(e.to_string()))?;
                Ok(PredResult::of(tag == self.tag))
            }
            Value::Abbrev { tag, .. } => Ok(PredResult::of(*tag == self.tag)),
            _ => Ok(PredResult::Fail),
        }
    }

    fn name(&self) -> String {
        format!("tag {:#x}", self.tag)
    }
}

/// Is the DIE a unit root (and not reached through an import)?
pub struct PredRoot {
    pub a: usize,
}

impl Pred for PredRoot {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        match vf.slot(self.a)? {
            Value::Die {
                graph,
                unit,
                offset,
                import_path,
                ..
            } => {
                let root = graph
                    .is_root(*unit, *offset)
                    .map_err(|e| QueryError::Dwarf(e.to_string()))?;
                let through_import = import_path.as_ref().is_some_and(|p| !p.is_empty());
                Ok(PredResult::of(root && !through_import))
            }
            _ => Ok(PredResult::Fail),
        }
    }

    fn name(&self) -> String {
        "root".to_string()
    }
}

/// Is the inspected slot an empty sequence, string, or address set?
pub struct PredEmpty {
    pub a: usize,
}

impl Pred for PredEmpty {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        match vf.slot(self.a)? {
            Value::Seq { elems, .. } => Ok(PredResult::of(elems.is_empty())),
            Value::Str { text, .. } => Ok(PredResult::of(text.is_empty())),
            Value::AddrSet { ranges, .. } => Ok(PredResult::of(ranges.is_empty())),
            _ => Ok(PredResult::Fail),
        }
    }

    fn name(&self) -> String {
        "empty".to_string()
    }
}

/// Does the embedded sub-pipeline produce anything on this valfile?
pub struct PredSubxAny {
    pub seed: SeedHandle,
    pub body: Box<dyn Op>,
}

impl Pred for PredSubxAny {
    fn result(&mut self, vf: &Valfile) -> Result<PredResult> {
        self.body.reset();
        self.seed.feed(vf.clone());
        Ok(PredResult::of(self.body.next()?.is_some()))
    }

    fn name(&self) -> String {
        "subx any".to_string()
    }
}
