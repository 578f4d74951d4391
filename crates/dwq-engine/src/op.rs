//! Operator nodes.
//!
//! Every operator pulls valfiles from its upstream and produces zero or
//! more valfiles per input through successive `next()` calls. Operators
//! that host sub-pipelines (alternation branches, closures, captures,
//! format splices) drive them through a seed: a one-slot upstream that
//! the host refills and resets between inputs.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::Zero;

use dwq_core::domain::DEC_DOM;
use dwq_core::{Brevity, Constant, QueryError, Result};
use dwq_graph::{CookedWalk, Graph, RawWalk};

use crate::pred::{Pred, PredResult};
use crate::valfile::Valfile;
use crate::value::Value;
use crate::value_dw;

pub trait Op {
    /// Produce the next valfile, or signal exhaustion. Exhaustion is
    /// sticky until the operator is reseeded through `reset`.
    fn next(&mut self) -> Result<Option<Valfile>>;

    /// Clear cursor state so the operator can run again from a fresh
    /// seed.
    fn reset(&mut self);
}

/// Produces exactly one empty valfile, then exhaustion.
pub struct Origin {
    done: bool,
}

impl Origin {
    pub fn new() -> Self {
        Self { done: false }
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::new()
    }
}

impl Op for Origin {
    fn next(&mut self) -> Result<Option<Valfile>> {
        if self.done {
            Ok(None)
        } else {
            self.done = true;
            Ok(Some(Valfile::new()))
        }
    }

    fn reset(&mut self) {
        self.done = false;
    }
}

/// Refillable upstream for sub-pipelines.
#[derive(Clone)]
pub struct SeedHandle(Rc<RefCell<Option<Valfile>>>);

impl SeedHandle {
    pub fn new() -> (SeedHandle, SeedOp) {
        let cell = Rc::new(RefCell::new(None));
        (SeedHandle(Rc::clone(&cell)), SeedOp(cell))
    }

    pub fn feed(&self, vf: Valfile) {
        *self.0.borrow_mut() = Some(vf);
    }
}

pub struct SeedOp(Rc<RefCell<Option<Valfile>>>);

impl Op for SeedOp {
    fn next(&mut self) -> Result<Option<Valfile>> {
        Ok(self.0.borrow_mut().take())
    }

    fn reset(&mut self) {
        *self.0.borrow_mut() = None;
    }
}

/// Forwards valfiles its predicate admits, drops the refused ones, and
/// raises on a predicate failure.
pub struct Assert {
    pub upstream: Box<dyn Op>,
    pub pred: Box<dyn Pred>,
}

impl Op for Assert {
    fn next(&mut self) -> Result<Option<Valfile>> {
        while let Some(vf) = self.upstream.next()? {
            match self.pred.result(&vf)? {
                PredResult::Yes => return Ok(Some(vf)),
                PredResult::No => continue,
                PredResult::Fail => {
                    return Err(QueryError::PredicateFailure(self.pred.name()));
                }
            }
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.upstream.reset();
    }
}

/// Writes a constant into its destination slot.
pub struct Const {
    pub upstream: Box<dyn Op>,
    pub cst: Constant,
    pub dst: usize,
}

impl Op for Const {
    fn next(&mut self) -> Result<Option<Valfile>> {
        match self.upstream.next()? {
            Some(mut vf) => {
                vf.write(self.dst, Value::constant(self.cst.clone()))?;
                Ok(Some(vf))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.upstream.reset();
    }
}

/// Pushes a fresh empty sequence.
pub struct EmptyList {
    pub upstream: Box<dyn Op>,
    pub dst: usize,
}

impl Op for EmptyList {
    fn next(&mut self) -> Result<Option<Valfile>> {
        match self.upstream.next()? {
            Some(mut vf) => {
                vf.write(self.dst, Value::seq(Vec::new()))?;
                Ok(Some(vf))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.upstream.reset();
    }
}

/// Stack shuffles.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ShuffleKind {
    Dup,
    Swap,
    Over,
    Rot,
    Drop,
}

pub struct Shuffle {
    pub upstream: Box<dyn Op>,
    pub kind: ShuffleKind,
}

impl Op for Shuffle {
    fn next(&mut self) -> Result<Option<Valfile>> {
        match self.upstream.next()? {
            Some(mut vf) => {
                match self.kind {
                    ShuffleKind::Dup => vf.dup()?,
                    ShuffleKind::Swap => vf.swap()?,
                    ShuffleKind::Over => vf.over()?,
                    ShuffleKind::Rot => vf.rot()?,
                    ShuffleKind::Drop => {
                        vf.pop()?;
                    }
                }
                Ok(Some(vf))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.upstream.reset();
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ArithKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Arithmetic over the top two constants. The result keeps the left
/// operand's domain when it is a plain literal domain.
pub struct Arith {
    pub upstream: Box<dyn Op>,
    pub kind: ArithKind,
}

fn as_constant(v: &Value) -> Result<&Constant> {
    v.as_constant().ok_or(QueryError::TypeMismatch {
        expected: "T_CONST",
        got: v.type_name(),
    })
}

impl Op for Arith {
    fn next(&mut self) -> Result<Option<Valfile>> {
        match self.upstream.next()? {
            Some(mut vf) => {
                let b = vf.pop()?;
                let a = vf.pop()?;
                let ca = as_constant(&a)?;
                let cb = as_constant(&b)?;
                let (x, y) = (ca.value(), cb.value());
                let value: BigInt = match self.kind {
                    ArithKind::Add => x + y,
                    ArithKind::Sub => x - y,
                    ArithKind::Mul => x * y,
                    ArithKind::Div => {
                        if y.is_zero() {
                            return Err(QueryError::DivisionByZero);
                        }
                        x / y
                    }
                    ArithKind::Mod => {
                        if y.is_zero() {
                            return Err(QueryError::DivisionByZero);
                        }
                        x % y
                    }
                };
                let dom = if ca.dom().plain() {
                    ca.dom()
                } else {
                    &DEC_DOM
                };
                vf.push(Value::constant(Constant::new(value, dom)));
                Ok(Some(vf))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.upstream.reset();
    }
}

pub type ExpandFn = Box<dyn Fn(&Valfile) -> Result<Vec<Value>>>;

/// The workhorse behind accessors and small selectors: per input valfile
/// it computes an expansion and emits one clone per produced value,
/// written into the destination slot.
pub struct Expand {
    pub upstream: Box<dyn Op>,
    pub dst: usize,
    pub f: ExpandFn,
    buffer: Option<(Valfile, std::vec::IntoIter<Value>)>,
}

impl Expand {
    pub fn new(upstream: Box<dyn Op>, dst: usize, f: ExpandFn) -> Self {
        Self {
            upstream,
            dst,
            f,
            buffer: None,
        }
    }
}

impl Op for Expand {
    fn next(&mut self) -> Result<Option<Valfile>> {
        loop {
            if let Some((base, iter)) = &mut self.buffer {
                if let Some(value) = iter.next() {
                    let mut out = base.clone();
                    out.write(self.dst, value)?;
                    return Ok(Some(out));
                }
                self.buffer = None;
            }
            match self.upstream.next()? {
                Some(vf) => {
                    let values = (self.f)(&vf)?;
                    self.buffer = Some((vf, values.into_iter()));
                }
                None => return Ok(None),
            }
        }
    }

    fn reset(&mut self) {
        self.buffer = None;
        self.upstream.reset();
    }
}

/// Which whole-graph DIE walk a selector performs.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WalkKind {
    /// Cooked: import-merged view.
    Winfo,
    /// Raw: physical order.
    Universe,
}

enum WalkState {
    Cooked(CookedWalk),
    Raw(RawWalk),
}

struct WalkCursor {
    base: Valfile,
    walk: WalkState,
    pos: usize,
    graph: Arc<Graph>,
}

/// Streams every DIE of the bound graph per input valfile.
pub struct SelDies {
    pub upstream: Box<dyn Op>,
    pub graph: Option<Arc<Graph>>,
    pub dst: usize,
    pub kind: WalkKind,
    state: Option<WalkCursor>,
}

impl SelDies {
    pub fn new(
        upstream: Box<dyn Op>,
        graph: Option<Arc<Graph>>,
        dst: usize,
        kind: WalkKind,
    ) -> Self {
        Self {
            upstream,
            graph,
            dst,
            kind,
            state: None,
        }
    }

    fn graph(&self) -> Result<&Arc<Graph>> {
        self.graph
            .as_ref()
            .ok_or_else(|| QueryError::Dwarf("no object file bound to the query".into()))
    }
}

impl Op for SelDies {
    fn next(&mut self) -> Result<Option<Valfile>> {
        loop {
            if let Some(cursor) = &mut self.state {
                let produced = match &mut cursor.walk {
                    WalkState::Cooked(w) => match w.next() {
                        Ok(Some(die)) => Some(value_dw::die_value(
                            Arc::clone(&cursor.graph),
                            die.unit,
                            die.offset,
                            Some(die.import_path),
                            true,
                        )),
                        Ok(None) => None,
                        Err(e) => return Err(QueryError::Dwarf(e.to_string())),
                    },
                    WalkState::Raw(w) => match w.next() {
                        Ok(Some((unit, offset))) => Some(value_dw::die_value(
                            Arc::clone(&cursor.graph),
                            unit,
                            offset,
                            None,
                            false,
                        )),
                        Ok(None) => None,
                        Err(e) => return Err(QueryError::Dwarf(e.to_string())),
                    },
                };
                match produced {
                    Some(mut die) => {
                        die.set_pos(cursor.pos);
                        cursor.pos += 1;
                        let mut out = cursor.base.clone();
                        out.write(self.dst, die)?;
                        return Ok(Some(out));
                    }
                    None => self.state = None,
                }
            }
            match self.upstream.next()? {
                Some(vf) => {
                    let graph = Arc::clone(self.graph()?);
                    let walk = match self.kind {
                        WalkKind::Winfo => WalkState::Cooked(CookedWalk::new(Arc::clone(&graph))),
                        WalkKind::Universe => WalkState::Raw(RawWalk::new(Arc::clone(&graph))),
                    };
                    self.state = Some(WalkCursor {
                        base: vf,
                        walk,
                        pos: 0,
                        graph,
                    });
                }
                None => return Ok(None),
            }
        }
    }

    fn reset(&mut self) {
        self.state = None;
        self.upstream.reset();
    }
}

/// One piece of a format template.
pub enum Segment {
    Lit(String),
    Splice { seed: SeedHandle, body: Box<dyn Op> },
}

/// Renders the template into the output slot. Each splice runs as a
/// sub-pipeline seeded with a clone of the current valfile; the string
/// renderings of all its produced top values are concatenated.
pub struct Format {
    pub upstream: Box<dyn Op>,
    pub dst: usize,
    pub segments: Vec<Segment>,
}

impl Op for Format {
    fn next(&mut self) -> Result<Option<Valfile>> {
        match self.upstream.next()? {
            Some(mut vf) => {
                let mut text = String::new();
                for segment in &mut self.segments {
                    match segment {
                        Segment::Lit(lit) => text.push_str(lit),
                        Segment::Splice { seed, body } => {
                            body.reset();
                            seed.feed(vf.clone());
                            while let Some(out) = body.next()? {
                                text.push_str(&out.top()?.show(Brevity::Brief));
                            }
                        }
                    }
                }
                vf.write(self.dst, Value::string(text))?;
                Ok(Some(vf))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) {
        for segment in &mut self.segments {
            if let Segment::Splice { body, .. } = segment {
                body.reset();
            }
        }
        self.upstream.reset();
    }
}

/// Runs the body, then restores the protected slot on every output, so
/// downstream keeps reading the pre-body value.
pub struct Protect {
    pub upstream: Box<dyn Op>,
    pub a: usize,
    pub seed: SeedHandle,
    pub body: Box<dyn Op>,
    saved: Option<Value>,
}

impl Protect {
    pub fn new(upstream: Box<dyn Op>, a: usize, seed: SeedHandle, body: Box<dyn Op>) -> Self {
        Self {
            upstream,
            a,
            seed,
            body,
            saved: None,
        }
    }
}

impl Op for Protect {
    fn next(&mut self) -> Result<Option<Valfile>> {
        loop {
            if let Some(saved) = &self.saved {
                match self.body.next()? {
                    Some(mut out) => {
                        out.write(self.a, saved.clone())?;
                        return Ok(Some(out));
                    }
                    None => self.saved = None,
                }
            }
            match self.upstream.next()? {
                Some(vf) => {
                    let saved = vf.slot(self.a)?.clone();
                    self.body.reset();
                    self.seed.feed(vf);
                    self.saved = Some(saved);
                }
                None => return Ok(None),
            }
        }
    }

    fn reset(&mut self) {
        self.saved = None;
        self.body.reset();
        self.upstream.reset();
    }
}

/// Alternation: for each upstream valfile, drain branch one on a clone,
/// then branch two, and so on, in declaration order.
pub struct Alt {
    pub upstream: Box<dyn Op>,
    pub branches: Vec<(SeedHandle, Box<dyn Op>)>,
    pending: Option<Valfile>,
    cur: usize,
    seeded: bool,
}

impl Alt {
    pub fn new(upstream: Box<dyn Op>, branches: Vec<(SeedHandle, Box<dyn Op>)>) -> Self {
        Self {
            upstream,
            branches,
            pending: None,
            cur: 0,
            seeded: false,
        }
    }
}

impl Op for Alt {
    fn next(&mut self) -> Result<Option<Valfile>> {
        loop {
            if let Some(vf) = &self.pending {
                if self.cur < self.branches.len() {
                    if !self.seeded {
                        let (seed, body) = &mut self.branches[self.cur];
                        body.reset();
                        seed.feed(vf.clone());
                        self.seeded = true;
                    }
                    match self.branches[self.cur].1.next()? {
                        Some(out) => return Ok(Some(out)),
                        None => {
                            self.cur += 1;
                            self.seeded = false;
                            continue;
                        }
                    }
                }
                self.pending = None;
            }
            match self.upstream.next()? {
                Some(vf) => {
                    self.pending = Some(vf);
                    self.cur = 0;
                    self.seeded = false;
                }
                None => return Ok(None),
            }
        }
    }

    fn reset(&mut self) {
        self.pending = None;
        self.cur = 0;
        self.seeded = false;
        for (_, body) in &mut self.branches {
            body.reset();
        }
        self.upstream.reset();
    }
}

/// Kleene star: the input verbatim, then every state reachable by
/// repeated application of the body. Breadth-first, and a state equal to
/// an already-emitted one (under the value model's compare) is visited
/// at most once, which bounds the iteration on cyclic graphs.
pub struct CloseStar {
    pub upstream: Box<dyn Op>,
    pub seed: SeedHandle,
    pub body: Box<dyn Op>,
    queue: VecDeque<Valfile>,
    visited: Vec<Valfile>,
    emit: VecDeque<Valfile>,
    body_active: bool,
}

impl CloseStar {
    pub fn new(upstream: Box<dyn Op>, seed: SeedHandle, body: Box<dyn Op>) -> Self {
        Self {
            upstream,
            seed,
            body,
            queue: VecDeque::new(),
            visited: Vec::new(),
            emit: VecDeque::new(),
            body_active: false,
        }
    }
}

impl Op for CloseStar {
    fn next(&mut self) -> Result<Option<Valfile>> {
        loop {
            if let Some(vf) = self.emit.pop_front() {
                return Ok(Some(vf));
            }
            if self.body_active {
                match self.body.next()? {
                    Some(out) => {
                        if !self.visited.iter().any(|seen| seen.same_state(&out)) {
                            self.visited.push(out.clone());
                            self.queue.push_back(out.clone());
                            self.emit.push_back(out);
                        }
                        continue;
                    }
                    None => self.body_active = false,
                }
            }
            if let Some(vf) = self.queue.pop_front() {
                self.body.reset();
                self.seed.feed(vf);
                self.body_active = true;
                continue;
            }
            match self.upstream.next()? {
                Some(vf) => {
                    self.visited.clear();
                    self.visited.push(vf.clone());
                    self.queue.push_back(vf.clone());
                    self.emit.push_back(vf);
                }
                None => return Ok(None),
            }
        }
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.visited.clear();
        self.emit.clear();
        self.body_active = false;
        self.body.reset();
        self.upstream.reset();
    }
}

/// Runs the body on a clone of the input, accumulates every produced top
/// value through the valfile's capture extension, and emits the input
/// with the collected sequence pushed on top.
pub struct Capture {
    pub upstream: Box<dyn Op>,
    pub seed: SeedHandle,
    pub body: Box<dyn Op>,
    pub dst: usize,
}

impl Op for Capture {
    fn next(&mut self) -> Result<Option<Valfile>> {
        match self.upstream.next()? {
            Some(mut vf) => {
                self.body.reset();
                self.seed.feed(vf.clone());
                while let Some(out) = self.body.next()? {
                    // A body output that ended with an empty stack
                    // contributes nothing.
                    if let Ok(top) = out.top() {
                        vf.capture_push(top.clone());
                    }
                }
                let elems = vf.take_capture();
                vf.write(self.dst, Value::seq(elems))?;
                Ok(Some(vf))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.body.reset();
        self.upstream.reset();
    }
}
