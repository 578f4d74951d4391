//! The runtime value model.
//!
//! A closed sum over everything a query can put on the stack. Every
//! variant supplies the same capability set: a registered type tag, a
//! positional index, deep cloning, ordering within its variant (compare
//! across variants is a distinguished failure), and brevity-parameterized
//! rendering.

use std::cmp::Ordering;
use std::sync::Arc;

use num_bigint::BigInt;

use dwq_core::domain::{ADDR_DOM, AT_DOM, FORM_DOM, OP_DOM, TAG_DOM};
use dwq_core::{Brevity, Constant, Domain};
use dwq_graph::Graph;

/// Registered value-type tags. Codes are assigned once, at startup order,
/// and stay stable for the program lifetime.
pub mod vtype {
    pub const CONST: u8 = 1;
    pub const STR: u8 = 2;
    pub const SEQ: u8 = 3;
    pub const DWARF: u8 = 4;
    pub const CU: u8 = 5;
    pub const DIE: u8 = 6;
    pub const ATTR: u8 = 7;
    pub const ABBREV_UNIT: u8 = 8;
    pub const ABBREV: u8 = 9;
    pub const ABBREV_ATTR: u8 = 10;
    pub const LOCLIST_ELEM: u8 = 11;
    pub const LOCLIST_OP: u8 = 12;
    pub const ADDR_SET: u8 = 13;
    pub const ADDR_RANGE: u8 = 14;

    static NAMES: &[(u8, &str)] = &[
        (CONST, "T_CONST"),
        (STR, "T_STR"),
        (SEQ, "T_SEQ"),
        (DWARF, "T_DWARF"),
        (CU, "T_CU"),
        (DIE, "T_DIE"),
        (ATTR, "T_ATTR"),
        (ABBREV_UNIT, "T_ABBREV_UNIT"),
        (ABBREV, "T_ABBREV"),
        (ABBREV_ATTR, "T_ABBREV_ATTR"),
        (LOCLIST_ELEM, "T_LOCLIST_ELEM"),
        (LOCLIST_OP, "T_LOCLIST_OP"),
        (ADDR_SET, "T_ADDR_SET"),
        (ADDR_RANGE, "T_ADDR_RANGE"),
    ];

    /// Display name of a registered type code.
    pub fn name(code: u8) -> &'static str {
        NAMES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, n)| *n)
            .unwrap_or("T_UNKNOWN")
    }
}

/// The `T_*` domain: renders a value-type code by its registered name.
/// Brief rendering strips the `T_` prefix.
pub struct TypeDomain;

impl Domain for TypeDomain {
    fn show(&self, v: &BigInt, brv: Brevity) -> String {
        use num_traits::ToPrimitive;
        let name = v
            .to_u8()
            .map(vtype::name)
            .unwrap_or("T_UNKNOWN");
        match brv {
            Brevity::Full => name.to_string(),
            Brevity::Brief => name.strip_prefix("T_").unwrap_or(name).to_string(),
        }
    }

    fn name(&self) -> &'static str {
        "T_*"
    }
}

pub static TYPE_DOM: TypeDomain = TypeDomain;

/// A runtime value on the stack.
#[derive(Clone, Debug)]
pub enum Value {
    /// Wide integer with a rendering domain.
    Const { cst: Constant, pos: usize },
    /// Byte string (escapes already processed).
    Str { text: String, pos: usize },
    /// Ordered list of values.
    Seq { elems: Arc<Vec<Value>>, pos: usize },
    /// An opened object file.
    Dwarf { graph: Arc<Graph>, pos: usize },
    /// A compile unit.
    Cu {
        graph: Arc<Graph>,
        unit: usize,
        pos: usize,
    },
    /// A debugging information entry. Cooked DIEs come from the
    /// import-merged walk and carry the chain of importing DIEs.
    Die {
        graph: Arc<Graph>,
        unit: usize,
        offset: u64,
        import_path: Option<Arc<Vec<u64>>>,
        cooked: bool,
        pos: usize,
    },
    /// An attribute of a DIE.
    Attr {
        graph: Arc<Graph>,
        unit: usize,
        die: u64,
        at: u16,
        form: u16,
        pos: usize,
    },
    /// One unit's abbreviation table.
    AbbrevUnit {
        graph: Arc<Graph>,
        unit: usize,
        pos: usize,
    },
    /// One abbreviation declaration.
    Abbrev {
        graph: Arc<Graph>,
        unit: usize,
        code: u64,
        tag: u16,
        has_children: bool,
        pos: usize,
    },
    /// One attribute specification of an abbreviation.
    AbbrevAttr {
        at: u16,
        form: u16,
        index: u64,
        pos: usize,
    },
    /// One location-list element: a range and its expression opcodes.
    LoclistElem {
        low: u64,
        high: u64,
        ops: Arc<Vec<(u64, u8)>>,
        pos: usize,
    },
    /// A single location expression opcode.
    LoclistOp { offset: u64, code: u8, pos: usize },
    /// Union of address ranges (coverage).
    AddrSet {
        ranges: Arc<Vec<(u64, u64)>>,
        pos: usize,
    },
    /// One [low, high) address range.
    AddrRange {
        low: Constant,
        high: Constant,
        pos: usize,
    },
}

fn graph_key(graph: &Arc<Graph>) -> usize {
    Arc::as_ptr(graph) as usize
}

impl Value {
    pub fn constant(cst: Constant) -> Value {
        Value::Const { cst, pos: 0 }
    }

    pub fn string(text: impl Into<String>) -> Value {
        Value::Str {
            text: text.into(),
            pos: 0,
        }
    }

    pub fn seq(elems: Vec<Value>) -> Value {
        Value::Seq {
            elems: Arc::new(elems),
            pos: 0,
        }
    }

    /// Build an address range with addr-domain endpoints.
    pub fn addr_range(low: u64, high: u64) -> Value {
        Value::AddrRange {
            low: Constant::new(BigInt::from(low), &ADDR_DOM),
            high: Constant::new(BigInt::from(high), &ADDR_DOM),
            pos: 0,
        }
    }

    pub fn type_code(&self) -> u8 {
        match self {
            Value::Const { .. } => vtype::CONST,
            Value::Str { .. } => vtype::STR,
            Value::Seq { .. } => vtype::SEQ,
            Value::Dwarf { .. } => vtype::DWARF,
            Value::Cu { .. } => vtype::CU,
            Value::Die { .. } => vtype::DIE,
            Value::Attr { .. } => vtype::ATTR,
            Value::AbbrevUnit { .. } => vtype::ABBREV_UNIT,
            Value::Abbrev { .. } => vtype::ABBREV,
            Value::AbbrevAttr { .. } => vtype::ABBREV_ATTR,
            Value::LoclistElem { .. } => vtype::LOCLIST_ELEM,
            Value::LoclistOp { .. } => vtype::LOCLIST_OP,
            Value::AddrSet { .. } => vtype::ADDR_SET,
            Value::AddrRange { .. } => vtype::ADDR_RANGE,
        }
    }

    pub fn type_name(&self) -> &'static str {
        vtype::name(self.type_code())
    }

    /// Positional index within the producing sequence.
    pub fn pos(&self) -> usize {
        match self {
            Value::Const { pos, .. }
            | Value::Str { pos, .. }
            | Value::Seq { pos, .. }
            | Value::Dwarf { pos, .. }
            | Value::Cu { pos, .. }
            | Value::Die { pos, .. }
            | Value::Attr { pos, .. }
            | Value::AbbrevUnit { pos, .. }
            | Value::Abbrev { pos, .. }
            | Value::AbbrevAttr { pos, .. }
            | Value::LoclistElem { pos, .. }
            | Value::LoclistOp { pos, .. }
            | Value::AddrSet { pos, .. }
            | Value::AddrRange { pos, .. } => *pos,
        }
    }

    pub fn set_pos(&mut self, new_pos: usize) {
        match self {
            Value::Const { pos, .. }
            | Value::Str { pos, .. }
            | Value::Seq { pos, .. }
            | Value::Dwarf { pos, .. }
            | Value::Cu { pos, .. }
            | Value::Die { pos, .. }
            | Value::Attr { pos, .. }
            | Value::AbbrevUnit { pos, .. }
            | Value::Abbrev { pos, .. }
            | Value::AbbrevAttr { pos, .. }
            | Value::LoclistElem { pos, .. }
            | Value::LoclistOp { pos, .. }
            | Value::AddrSet { pos, .. }
            | Value::AddrRange { pos, .. } => *pos = new_pos,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Value::Const { cst, .. } => Some(cst),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq { elems, .. } => Some(elems),
            _ => None,
        }
    }

    /// Total order within a variant; `None` across variants.
    pub fn cmp_val(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Const { cst: a, .. }, Const { cst: b, .. }) => Some(a.cmp(b)),
            (Str { text: a, .. }, Str { text: b, .. }) => Some(a.cmp(b)),
            (Seq { elems: a, .. }, Seq { elems: b, .. }) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.cmp_val(y)? {
                        Ordering::Equal => {}
                        other => return Some(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Dwarf { graph: a, .. }, Dwarf { graph: b, .. }) => {
                Some(graph_key(a).cmp(&graph_key(b)))
            }
            (
                Cu {
                    graph: ga, unit: ua, ..
                },
                Cu {
                    graph: gb, unit: ub, ..
                },
            ) => Some((graph_key(ga), ua).cmp(&(graph_key(gb), ub))),
            (
                Die {
                    graph: ga,
                    offset: oa,
                    import_path: pa,
                    cooked: ca,
                    ..
                },
                Die {
                    graph: gb,
                    offset: ob,
                    import_path: pb,
                    cooked: cb,
                    ..
                },
            ) => {
                let base = (graph_key(ga), oa).cmp(&(graph_key(gb), ob));
                if base != Ordering::Equal {
                    return Some(base);
                }
                // Import paths refine identity only when both sides are
                // cooked and carry one.
                match (pa, pb) {
                    (Some(a), Some(b)) if *ca && *cb => Some(a.cmp(b)),
                    _ => Some(Ordering::Equal),
                }
            }
            (
                Attr {
                    graph: ga,
                    die: da,
                    at: aa,
                    ..
                },
                Attr {
                    graph: gb,
                    die: db,
                    at: ab,
                    ..
                },
            ) => Some((graph_key(ga), da, aa).cmp(&(graph_key(gb), db, ab))),
            (
                AbbrevUnit {
                    graph: ga, unit: ua, ..
                },
                AbbrevUnit {
                    graph: gb, unit: ub, ..
                },
            ) => Some((graph_key(ga), ua).cmp(&(graph_key(gb), ub))),
            (
                Abbrev {
                    graph: ga,
                    unit: ua,
                    code: ca,
                    ..
                },
                Abbrev {
                    graph: gb,
                    unit: ub,
                    code: cb,
                    ..
                },
            ) => Some((graph_key(ga), ua, ca).cmp(&(graph_key(gb), ub, cb))),
            (
                AbbrevAttr {
                    at: aa,
                    form: fa,
                    index: ia,
                    ..
                },
                AbbrevAttr {
                    at: ab,
                    form: fb,
                    index: ib,
                    ..
                },
            ) => Some((aa, fa, ia).cmp(&(ab, fb, ib))),
            (
                LoclistElem {
                    low: la,
                    high: ha,
                    ops: oa,
                    ..
                },
                LoclistElem {
                    low: lb,
                    high: hb,
                    ops: ob,
                    ..
                },
            ) => Some((la, ha, oa.as_ref()).cmp(&(lb, hb, ob.as_ref()))),
            (
                LoclistOp {
                    offset: oa,
                    code: ca,
                    ..
                },
                LoclistOp {
                    offset: ob,
                    code: cb,
                    ..
                },
            ) => Some((oa, ca).cmp(&(ob, cb))),
            (AddrSet { ranges: a, .. }, AddrSet { ranges: b, .. }) => {
                Some(a.as_ref().cmp(b.as_ref()))
            }
            (
                AddrRange {
                    low: la, high: ha, ..
                },
                AddrRange {
                    low: lb, high: hb, ..
                },
            ) => Some(la.cmp(lb).then_with(|| ha.cmp(hb))),
            _ => None,
        }
    }

    /// Total order over all values: variant code first, then the
    /// within-variant order. This is the key the closure operators use
    /// for their visited sets.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        self.type_code()
            .cmp(&other.type_code())
            .then_with(|| self.cmp_val(other).unwrap_or(Ordering::Equal))
    }

    /// Render the value. Brief rendering strips prefixes and omits the
    /// trailing attribute list on DIEs.
    pub fn show(&self, brv: Brevity) -> String {
        match self {
            Value::Const { cst, .. } => cst.show(brv),
            Value::Str { text, .. } => text.clone(),
            Value::Seq { elems, .. } => {
                let inner: Vec<String> =
                    elems.iter().map(|v| v.show(Brevity::Brief)).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Dwarf { graph, .. } => format!("<Dwarf \"{}\">", graph.file_name()),
            Value::Cu { graph, unit, .. } => format!("CU {:#x}", graph.unit_offset(*unit)),
            Value::Die {
                graph,
                unit,
                offset,
                ..
            } => {
                let tag = graph
                    .tag(*unit, *offset)
                    .map(|t| TAG_DOM.show(&BigInt::from(t), Brevity::Brief))
                    .unwrap_or_else(|_| "???".to_string());
                let mut out = format!("[{offset:x}] {tag}");
                if brv == Brevity::Full {
                    if let Ok(attrs) = graph.attributes(*unit, *offset) {
                        if !attrs.is_empty() {
                            let names: Vec<String> = attrs
                                .iter()
                                .map(|a| {
                                    AT_DOM.show(&BigInt::from(a.name().0), Brevity::Brief)
                                })
                                .collect();
                            out.push_str(&format!(" ({})", names.join(", ")));
                        }
                    }
                }
                out
            }
            Value::Attr { at, form, .. } => format!(
                "{} ({})",
                AT_DOM.show(&BigInt::from(*at), brv),
                FORM_DOM.show(&BigInt::from(*form), brv)
            ),
            Value::AbbrevUnit { graph, unit, .. } => {
                format!("abbrev unit {:#x}", graph.unit_abbrev_offset(*unit))
            }
            Value::Abbrev {
                code,
                tag,
                has_children,
                ..
            } => {
                let tag = TAG_DOM.show(&BigInt::from(*tag), brv);
                match brv {
                    Brevity::Full => format!(
                        "[{code}] {tag}, children:{}",
                        if *has_children { "yes" } else { "no" }
                    ),
                    Brevity::Brief => format!("[{code}] {tag}"),
                }
            }
            Value::AbbrevAttr {
                at, form, index, ..
            } => format!(
                "{}: {} ({})",
                index,
                AT_DOM.show(&BigInt::from(*at), brv),
                FORM_DOM.show(&BigInt::from(*form), brv)
            ),
            Value::LoclistElem { low, high, ops, .. } => {
                let inner: Vec<String> = ops
                    .iter()
                    .map(|(_, code)| OP_DOM.show(&BigInt::from(*code), Brevity::Brief))
                    .collect();
                format!("{low:#x}..{high:#x}:[{}]", inner.join(", "))
            }
            Value::LoclistOp { offset, code, .. } => match brv {
                Brevity::Full => format!(
                    "{offset:#x}:{}",
                    OP_DOM.show(&BigInt::from(*code), Brevity::Full)
                ),
                Brevity::Brief => OP_DOM.show(&BigInt::from(*code), Brevity::Brief),
            },
            Value::AddrSet { ranges, .. } => {
                let inner: Vec<String> = ranges
                    .iter()
                    .map(|(l, h)| format!("[{l:#x}, {h:#x})"))
                    .collect();
                inner.join(", ")
            }
            Value::AddrRange { low, high, .. } => {
                format!("[{}, {})", low.show(brv), high.show(brv))
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_val(other) == Some(Ordering::Equal)
    }
}

/// Coalesce raw [low, high) pairs into a sorted, non-overlapping union.
pub fn coalesce_ranges(mut ranges: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    ranges.retain(|(l, h)| l < h);
    ranges.sort_unstable();
    let mut out: Vec<(u64, u64)> = Vec::with_capacity(ranges.len());
    for (low, high) in ranges {
        match out.last_mut() {
            Some((_, prev_high)) if low <= *prev_high => {
                *prev_high = (*prev_high).max(high);
            }
            _ => out.push((low, high)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_are_stable() {
        assert_eq!(Value::constant(Constant::dec(1)).type_code(), vtype::CONST);
        assert_eq!(Value::string("x").type_code(), vtype::STR);
        assert_eq!(Value::seq(vec![]).type_code(), vtype::SEQ);
        assert_eq!(vtype::name(vtype::DIE), "T_DIE");
    }

    #[test]
    fn type_domain_brevity() {
        let v = BigInt::from(vtype::CONST);
        assert_eq!(TYPE_DOM.show(&v, Brevity::Full), "T_CONST");
        assert_eq!(TYPE_DOM.show(&v, Brevity::Brief), "CONST");
    }

    #[test]
    fn cross_variant_compare_fails() {
        let a = Value::constant(Constant::dec(1));
        let b = Value::string("1");
        assert_eq!(a.cmp_val(&b), None);
        assert_ne!(a, b);
    }

    #[test]
    fn sequences_compare_lexicographically() {
        let a = Value::seq(vec![Value::constant(Constant::dec(1))]);
        let b = Value::seq(vec![
            Value::constant(Constant::dec(1)),
            Value::constant(Constant::dec(2)),
        ]);
        assert_eq!(a.cmp_val(&b), Some(Ordering::Less));
        let c = Value::seq(vec![Value::string("x")]);
        assert_eq!(a.cmp_val(&c), None);
    }

    #[test]
    fn antisymmetry_gives_equality() {
        let a = Value::constant(Constant::dec(5));
        let b = Value::constant(Constant::dec(5));
        assert_eq!(a.cmp_val(&b), Some(Ordering::Equal));
        assert_eq!(b.cmp_val(&a), Some(Ordering::Equal));
        assert_eq!(a, b);
    }

    #[test]
    fn ranges_coalesce() {
        assert_eq!(
            coalesce_ranges(vec![(10, 20), (15, 25), (30, 40), (40, 50), (5, 5)]),
            vec![(10, 25), (30, 50)]
        );
    }

    #[test]
    fn addr_range_renders_half_open() {
        let r = Value::addr_range(0x10, 0x20);
        assert_eq!(r.show(Brevity::Full), "[0x10, 0x20)");
    }

    #[test]
    fn seq_renders_brief_elements() {
        let s = Value::seq(vec![
            Value::constant(Constant::dec(1)),
            Value::string("x"),
        ]);
        assert_eq!(s.show(Brevity::Full), "[1, x]");
    }
}
