//! Whole-graph DIE traversals.
//!
//! `RawWalk` visits every DIE in physical order. `CookedWalk` presents the
//! merged view: a `DW_TAG_imported_unit` DIE is replaced by the content of
//! the unit it imports, and every DIE reached through imports carries the
//! chain of importing DIE offsets that disambiguates it.

use std::sync::Arc;

use anyhow::bail;

use crate::graph::Graph;
use crate::Result;

/// Imports nested deeper than this indicate a reference cycle.
const MAX_IMPORT_DEPTH: usize = 64;

/// A DIE yielded by the cooked walk.
#[derive(Clone, Debug)]
pub struct CookedDie {
    pub unit: usize,
    pub offset: u64,
    /// Offsets of the `DW_TAG_imported_unit` DIEs traversed to reach this
    /// DIE; empty when it was reached directly.
    pub import_path: Arc<Vec<u64>>,
}

/// Every DIE of every unit, physical order.
pub struct RawWalk {
    graph: Arc<Graph>,
    next_unit: usize,
    pending: Vec<(usize, u64)>,
}

impl RawWalk {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self {
            graph,
            next_unit: 0,
            pending: Vec::new(),
        }
    }

    pub fn next(&mut self) -> Result<Option<(usize, u64)>> {
        loop {
            if let Some((unit, offset)) = self.pending.pop() {
                let mut children = self.graph.children(unit, offset)?;
                children.reverse();
                self.pending.extend(children.into_iter().map(|c| (unit, c)));
                return Ok(Some((unit, offset)));
            }
            if self.next_unit >= self.graph.unit_count() {
                return Ok(None);
            }
            let unit = self.next_unit;
            self.next_unit += 1;
            self.pending.push((unit, self.graph.unit_root(unit)?));
        }
    }
}

struct CookedFrame {
    unit: usize,
    offset: u64,
    import_path: Arc<Vec<u64>>,
}

/// Every DIE of every unit with imported units merged in place.
pub struct CookedWalk {
    graph: Arc<Graph>,
    next_unit: usize,
    pending: Vec<CookedFrame>,
}

impl CookedWalk {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self {
            graph,
            next_unit: 0,
            pending: Vec::new(),
        }
    }

    pub fn next(&mut self) -> Result<Option<CookedDie>> {
        loop {
            if let Some(frame) = self.pending.pop() {
                if self.graph.tag(frame.unit, frame.offset)? == gimli::DW_TAG_imported_unit.0 {
                    self.splice_import(&frame)?;
                    continue;
                }
                self.push_children(frame.unit, frame.offset, &frame.import_path)?;
                return Ok(Some(CookedDie {
                    unit: frame.unit,
                    offset: frame.offset,
                    import_path: frame.import_path,
                }));
            }
            if self.next_unit >= self.graph.unit_count() {
                return Ok(None);
            }
            let unit = self.next_unit;
            self.next_unit += 1;
            self.pending.push(CookedFrame {
                unit,
                offset: self.graph.unit_root(unit)?,
                import_path: Arc::new(Vec::new()),
            });
        }
    }

    fn push_children(&mut self, unit: usize, offset: u64, path: &Arc<Vec<u64>>) -> Result<()> {
        let mut children = self.graph.children(unit, offset)?;
        children.reverse();
        for child in children {
            self.pending.push(CookedFrame {
                unit,
                offset: child,
                import_path: Arc::clone(path),
            });
        }
        Ok(())
    }

    /// Replace an imported_unit DIE by the children of the imported
    /// unit's root, with the import path extended by the importing DIE.
    fn splice_import(&mut self, frame: &CookedFrame) -> Result<()> {
        if frame.import_path.len() >= MAX_IMPORT_DEPTH {
            bail!("import chain deeper than {MAX_IMPORT_DEPTH}, assuming a cycle");
        }
        let Some(attr) = self
            .graph
            .attr(frame.unit, frame.offset, gimli::DW_AT_import)?
        else {
            return Ok(());
        };
        let Some((target_unit, target_off)) = self.graph.resolve_ref(frame.unit, &attr.value())?
        else {
            return Ok(());
        };
        let mut path = frame.import_path.as_ref().clone();
        path.push(frame.offset);
        self.push_children(target_unit, target_off, &Arc::new(path))
    }
}
