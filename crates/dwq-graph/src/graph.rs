//! The graph over one object file's debug information.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context};
use object::{Object, ObjectSection};
use tracing::debug;

use crate::Result;

pub type Reader = gimli::EndianSlice<'static, gimli::RunTimeEndian>;

/// Sentinel parent offset for DIEs with no parent (unit roots).
pub const NONE_OFFSET: u64 = u64::MAX;

/// One decoded location-list element: an address range and its
/// expression, pre-split into (offset within expression, opcode) pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoclistEntry {
    pub low: u64,
    pub high: u64,
    pub ops: Vec<(u64, u8)>,
}

/// A graph we want to explore: one object file's DWARF tree plus the
/// caches that make repeated navigation cheap.
pub struct Graph {
    file_name: String,
    dwarf: gimli::Dwarf<Reader>,
    units: Vec<gimli::Unit<Reader>>,
    /// Global .debug_info offset of each unit header, parallel to `units`.
    unit_offsets: Vec<u64>,
    /// unit index -> (die offset -> parent offset or NONE_OFFSET).
    /// Built lazily, one unit at a time.
    parents: Mutex<HashMap<usize, Arc<HashMap<u64, u64>>>>,
}

impl Graph {
    /// Open an object file and prime the unit list.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Graph>> {
        let path = path.as_ref();
        let file_data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        // The engine hands out values that borrow section data for the
        // process lifetime; leak the buffer to get 'static slices.
        let file_data: &'static [u8] = Box::leak(file_data.into_boxed_slice());

        let object_file = object::File::parse(file_data)
            .with_context(|| format!("parsing {} as an object file", path.display()))?;

        let endian = if object_file.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        let load_section = |id: gimli::SectionId| -> std::result::Result<Reader, gimli::Error> {
            let data = object_file
                .section_by_name(id.name())
                .and_then(|section| section.data().ok())
                .unwrap_or(&[]);
            Ok(gimli::EndianSlice::new(data, endian))
        };

        let dwarf = gimli::Dwarf::load(load_section)?;

        let mut units = Vec::new();
        let mut unit_offsets = Vec::new();
        let mut headers = dwarf.units();
        while let Some(header) = headers.next()? {
            let offset = header
                .offset()
                .as_debug_info_offset()
                .map(|o| o.0 as u64)
                .unwrap_or(NONE_OFFSET);
            units.push(dwarf.unit(header)?);
            unit_offsets.push(offset);
        }

        debug!(file = %path.display(), units = units.len(), "opened dwarf graph");

        Ok(Arc::new(Graph {
            file_name: path.display().to_string(),
            dwarf,
            units,
            unit_offsets,
            parents: Mutex::new(HashMap::new()),
        }))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn dwarf(&self) -> &gimli::Dwarf<Reader> {
        &self.dwarf
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn unit(&self, idx: usize) -> &gimli::Unit<Reader> {
        &self.units[idx]
    }

    /// Global .debug_info offset of the unit header.
    pub fn unit_offset(&self, idx: usize) -> u64 {
        self.unit_offsets[idx]
    }

    /// .debug_abbrev offset of the unit's abbreviation table.
    pub fn unit_abbrev_offset(&self, idx: usize) -> u64 {
        self.units[idx].header.debug_abbrev_offset().0 as u64
    }

    /// Index of the unit whose DIE range contains a global offset.
    pub fn unit_containing(&self, offset: u64) -> Option<usize> {
        match self.unit_offsets.binary_search(&offset) {
            Ok(idx) => Some(idx),
            Err(0) => None,
            Err(idx) => Some(idx - 1),
        }
    }

    fn unit_off(&self, unit: usize, offset: u64) -> Result<gimli::UnitOffset> {
        gimli::DebugInfoOffset(offset as usize)
            .to_unit_offset(&self.units[unit].header)
            .ok_or_else(|| anyhow!("offset {offset:#x} is outside unit {unit}"))
    }

    fn global_off(&self, unit: usize, offset: gimli::UnitOffset) -> u64 {
        offset
            .to_debug_info_offset(&self.units[unit].header)
            .map(|o| o.0 as u64)
            .unwrap_or(NONE_OFFSET)
    }

    /// Global offset of the unit's root DIE.
    pub fn unit_root(&self, unit: usize) -> Result<u64> {
        let u = &self.units[unit];
        let mut entries = u.entries();
        match entries.next_dfs()? {
            Some((_, entry)) => Ok(self.global_off(unit, entry.offset())),
            None => bail!("unit {unit} has no root DIE"),
        }
    }

    /// Borrow the DIE at a global offset.
    pub fn entry(
        &self,
        unit: usize,
        offset: u64,
    ) -> Result<gimli::DebuggingInformationEntry<'_, '_, Reader>> {
        let off = self.unit_off(unit, offset)?;
        Ok(self.units[unit].entry(off)?)
    }

    /// DIE tag code.
    pub fn tag(&self, unit: usize, offset: u64) -> Result<u16> {
        Ok(self.entry(unit, offset)?.tag().0)
    }

    /// Global offsets of a DIE's children, in physical order.
    pub fn children(&self, unit: usize, offset: u64) -> Result<Vec<u64>> {
        let u = &self.units[unit];
        let off = self.unit_off(unit, offset)?;
        let mut tree = u.entries_tree(Some(off))?;
        let root = tree.root()?;
        let mut out = Vec::new();
        let mut iter = root.children();
        while let Some(child) = iter.next()? {
            out.push(self.global_off(unit, child.entry().offset()));
        }
        Ok(out)
    }

    fn parent_map(&self, unit: usize) -> Result<Arc<HashMap<u64, u64>>> {
        if let Some(map) = self.parents.lock().unwrap().get(&unit) {
            return Ok(Arc::clone(map));
        }

        let u = &self.units[unit];
        let mut map = HashMap::new();
        let mut stack: Vec<u64> = Vec::new();
        let mut entries = u.entries();
        let mut depth = 0isize;
        while let Some((delta, entry)) = entries.next_dfs()? {
            depth += delta;
            stack.truncate(depth.max(0) as usize);
            let offset = self.global_off(unit, entry.offset());
            map.insert(offset, stack.last().copied().unwrap_or(NONE_OFFSET));
            stack.push(offset);
        }

        let map = Arc::new(map);
        self.parents
            .lock()
            .unwrap()
            .insert(unit, Arc::clone(&map));
        Ok(map)
    }

    /// Raw parent of a DIE, `None` at the unit root.
    pub fn parent(&self, unit: usize, offset: u64) -> Result<Option<u64>> {
        let map = self.parent_map(unit)?;
        match map.get(&offset) {
            Some(&NONE_OFFSET) => Ok(None),
            Some(&parent) => Ok(Some(parent)),
            None => bail!("no DIE at offset {offset:#x} in unit {unit}"),
        }
    }

    pub fn is_root(&self, unit: usize, offset: u64) -> Result<bool> {
        Ok(self.parent(unit, offset)?.is_none())
    }

    /// Siblings of a DIE in its raw parent's child list, as
    /// (previous, next) global offsets.
    pub fn siblings(&self, unit: usize, offset: u64) -> Result<(Option<u64>, Option<u64>)> {
        let Some(parent) = self.parent(unit, offset)? else {
            return Ok((None, None));
        };
        let children = self.children(unit, parent)?;
        let idx = children
            .iter()
            .position(|&c| c == offset)
            .ok_or_else(|| anyhow!("DIE {offset:#x} missing from its parent's children"))?;
        let prev = idx.checked_sub(1).map(|i| children[i]);
        let next = children.get(idx + 1).copied();
        Ok((prev, next))
    }

    /// All attributes of a DIE.
    pub fn attributes(&self, unit: usize, offset: u64) -> Result<Vec<gimli::Attribute<Reader>>> {
        let entry = self.entry(unit, offset)?;
        let mut out = Vec::new();
        let mut attrs = entry.attrs();
        while let Some(attr) = attrs.next()? {
            out.push(attr);
        }
        Ok(out)
    }

    /// A named attribute of a DIE, if present.
    pub fn attr(
        &self,
        unit: usize,
        offset: u64,
        name: gimli::DwAt,
    ) -> Result<Option<gimli::Attribute<Reader>>> {
        Ok(self
            .attributes(unit, offset)?
            .into_iter()
            .find(|a| a.name() == name))
    }

    /// Resolve a string-class attribute value.
    pub fn attr_string(
        &self,
        unit: usize,
        value: gimli::AttributeValue<Reader>,
    ) -> Result<Option<String>> {
        match self.dwarf.attr_string(&self.units[unit], value) {
            Ok(r) => Ok(Some(r.to_string_lossy().into_owned())),
            Err(_) => Ok(None),
        }
    }

    /// The DIE's DW_AT_name, if present.
    pub fn die_name(&self, unit: usize, offset: u64) -> Result<Option<String>> {
        match self.attr(unit, offset, gimli::DW_AT_name)? {
            Some(attr) => self.attr_string(unit, attr.value()),
            None => Ok(None),
        }
    }

    /// Decode a ranges-class attribute value into [low, high) pairs.
    pub fn ranges(
        &self,
        unit: usize,
        value: gimli::AttributeValue<Reader>,
    ) -> Result<Vec<(u64, u64)>> {
        let u = &self.units[unit];
        let mut out = Vec::new();
        if let Some(mut iter) = self.dwarf.attr_ranges(u, value)? {
            while let Some(range) = iter.next()? {
                out.push((range.begin, range.end));
            }
        }
        Ok(out)
    }

    /// Decode a loclist-class attribute value into elements.
    pub fn loclist(
        &self,
        unit: usize,
        value: gimli::AttributeValue<Reader>,
    ) -> Result<Vec<LoclistEntry>> {
        let u = &self.units[unit];
        let mut out = Vec::new();
        if let Some(mut iter) = self.dwarf.attr_locations(u, value)? {
            while let Some(entry) = iter.next()? {
                out.push(LoclistEntry {
                    low: entry.range.begin,
                    high: entry.range.end,
                    ops: self.expression_ops(unit, entry.data.clone())?,
                });
            }
        }
        Ok(out)
    }

    /// Split a DWARF expression into (offset, opcode) pairs, letting
    /// gimli consume each operation's operands.
    pub fn expression_ops(
        &self,
        unit: usize,
        expression: gimli::Expression<Reader>,
    ) -> Result<Vec<(u64, u8)>> {
        let encoding = self.units[unit].encoding();
        let start = expression.0;
        let mut reader = start;
        let mut out = Vec::new();
        while !reader.is_empty() {
            let offset = (start.len() - reader.len()) as u64;
            let code = gimli::Reader::read_u8(&mut reader.clone())?;
            gimli::Operation::parse(&mut reader, encoding)?;
            out.push((offset, code));
        }
        Ok(out)
    }

    /// Abbreviation declarations of a unit's table, in code order.
    ///
    /// gimli exposes abbreviations only by code; declarations are probed
    /// from 1 upward, which covers the dense tables compilers emit.
    pub fn abbrevs(&self, unit: usize) -> Vec<&gimli::Abbreviation> {
        let abbreviations = &self.units[unit].abbreviations;
        let mut out = Vec::new();
        let mut code = 1u64;
        while let Some(abbrev) = abbreviations.get(code) {
            out.push(abbrev);
            code += 1;
        }
        out
    }

    /// One abbreviation by code.
    pub fn abbrev(&self, unit: usize, code: u64) -> Option<&gimli::Abbreviation> {
        self.units[unit].abbreviations.get(code)
    }

    /// Resolve a reference-class attribute value to (unit, global offset).
    pub fn resolve_ref(
        &self,
        unit: usize,
        value: &gimli::AttributeValue<Reader>,
    ) -> Result<Option<(usize, u64)>> {
        match value {
            gimli::AttributeValue::UnitRef(off) => {
                let global = self.global_off(unit, *off);
                Ok(Some((unit, global)))
            }
            gimli::AttributeValue::DebugInfoRef(off) => {
                let global = off.0 as u64;
                match self.unit_containing(global) {
                    Some(target) => Ok(Some((target, global))),
                    None => bail!("dangling .debug_info reference {global:#x}"),
                }
            }
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("file_name", &self.file_name)
            .field("units", &self.units.len())
            .finish()
    }
}
