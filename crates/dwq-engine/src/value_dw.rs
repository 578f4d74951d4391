//! DWARF-derived values: construction from gimli entities and the
//! expansion semantics of the DIE/value accessors.
//!
//! Every accessor here is an *expander*: given one input value it yields
//! zero or more output values, which is exactly the shape the fan-out
//! operator drives. Positional indices are assigned over each expansion.

use std::sync::Arc;

use num_bigint::BigInt;

use dwq_core::domain::{
    ACCESS_DOM, ADDR_DOM, AT_DOM, ATE_DOM, CC_DOM, DEC_DOM, DS_DOM, END_DOM, FORM_DOM, HEX_DOM,
    ID_DOM, INL_DOM, LANG_DOM, ORD_DOM, TAG_DOM, VIRTUALITY_DOM, VIS_DOM,
};
use dwq_core::{Constant, QueryError, Result};
use dwq_graph::{Graph, Reader};

use crate::value::{coalesce_ranges, Value, TYPE_DOM};

/// Imports nested deeper than this indicate a reference cycle.
const MAX_IMPORT_DEPTH: usize = 64;

fn dw<T>(r: anyhow::Result<T>) -> Result<T> {
    r.map_err(|e| QueryError::Dwarf(e.to_string()))
}

fn mismatch(expected: &'static str, got: &Value) -> QueryError {
    QueryError::TypeMismatch {
        expected,
        got: got.type_name(),
    }
}

fn hex_const(v: u64) -> Value {
    Value::constant(Constant::new(BigInt::from(v), &HEX_DOM))
}

fn dec_const(v: impl Into<BigInt>) -> Value {
    Value::constant(Constant::new(v.into(), &DEC_DOM))
}

fn positioned(mut values: Vec<Value>) -> Vec<Value> {
    for (i, v) in values.iter_mut().enumerate() {
        v.set_pos(i);
    }
    values
}

pub fn die_value(
    graph: Arc<Graph>,
    unit: usize,
    offset: u64,
    import_path: Option<Arc<Vec<u64>>>,
    cooked: bool,
) -> Value {
    Value::Die {
        graph,
        unit,
        offset,
        import_path,
        cooked,
        pos: 0,
    }
}

/// One compile-unit value per unit of the graph.
pub fn units(graph: &Arc<Graph>) -> Vec<Value> {
    positioned(
        (0..graph.unit_count())
            .map(|unit| Value::Cu {
                graph: Arc::clone(graph),
                unit,
                pos: 0,
            })
            .collect(),
    )
}

/// One abbreviation-unit value per unit of the graph.
pub fn sections(graph: &Arc<Graph>) -> Vec<Value> {
    positioned(
        (0..graph.unit_count())
            .map(|unit| Value::AbbrevUnit {
                graph: Arc::clone(graph),
                unit,
                pos: 0,
            })
            .collect(),
    )
}

/// Children of a DIE, a unit's root, or a table's abbreviations.
pub fn expand_child(v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Die {
            graph,
            unit,
            offset,
            import_path,
            cooked,
            ..
        } => {
            if *cooked {
                let path = import_path
                    .clone()
                    .unwrap_or_else(|| Arc::new(Vec::new()));
                let mut out = Vec::new();
                cooked_children(graph, *unit, *offset, &path, &mut out)?;
                Ok(positioned(out))
            } else {
                let children = dw(graph.children(*unit, *offset))?;
                Ok(positioned(
                    children
                        .into_iter()
                        .map(|c| die_value(Arc::clone(graph), *unit, c, None, false))
                        .collect(),
                ))
            }
        }
        Value::Dwarf { graph, .. } => Ok(units(graph)),
        Value::Cu { graph, unit, .. } => {
            let root = dw(graph.unit_root(*unit))?;
            Ok(positioned(vec![die_value(
                Arc::clone(graph),
                *unit,
                root,
                Some(Arc::new(Vec::new())),
                true,
            )]))
        }
        Value::AbbrevUnit { graph, unit, .. } => Ok(positioned(
            graph
                .abbrevs(*unit)
                .into_iter()
                .map(|a| Value::Abbrev {
                    graph: Arc::clone(graph),
                    unit: *unit,
                    code: a.code(),
                    tag: a.tag().0,
                    has_children: a.has_children(),
                    pos: 0,
                })
                .collect(),
        )),
        other => Err(mismatch("T_DIE", other)),
    }
}

/// Children in the merged view: an imported_unit child stands for the
/// content of the unit it imports.
fn cooked_children(
    graph: &Arc<Graph>,
    unit: usize,
    offset: u64,
    path: &Arc<Vec<u64>>,
    out: &mut Vec<Value>,
) -> Result<()> {
    if path.len() >= MAX_IMPORT_DEPTH {
        return Err(QueryError::Dwarf(format!(
            "import chain deeper than {MAX_IMPORT_DEPTH}, assuming a cycle"
        )));
    }
    for child in dw(graph.children(unit, offset))? {
        if dw(graph.tag(unit, child))? == gimli::DW_TAG_imported_unit.0 {
            let Some(attr) = dw(graph.attr(unit, child, gimli::DW_AT_import))? else {
                continue;
            };
            let Some((target_unit, target_off)) = dw(graph.resolve_ref(unit, &attr.value()))?
            else {
                continue;
            };
            let mut extended = path.as_ref().clone();
            extended.push(child);
            cooked_children(graph, target_unit, target_off, &Arc::new(extended), out)?;
        } else {
            out.push(die_value(
                Arc::clone(graph),
                unit,
                child,
                Some(Arc::clone(path)),
                true,
            ));
        }
    }
    Ok(())
}

/// Parent of a DIE; zero outputs at a root. A compile unit's parent is
/// its file. In the merged view the parent of an imported subtree's top
/// is the importing DIE's parent.
pub fn expand_parent(v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Cu { graph, .. } => Ok(positioned(vec![Value::Dwarf {
            graph: Arc::clone(graph),
            pos: 0,
        }])),
        Value::Die {
            graph,
            unit,
            offset,
            import_path,
            cooked,
            ..
        } => {
            if let Some(parent) = dw(graph.parent(*unit, *offset))? {
                return Ok(positioned(vec![die_value(
                    Arc::clone(graph),
                    *unit,
                    parent,
                    import_path.clone(),
                    *cooked,
                )]));
            }
            // At a raw unit root. If we got here through an import, step
            // back out to the importing DIE's parent.
            if *cooked {
                if let Some(path) = import_path {
                    if let Some((&importer, rest)) = path.split_last() {
                        let importer_unit =
                            graph.unit_containing(importer).ok_or_else(|| {
                                QueryError::Dwarf(format!(
                                    "importing DIE {importer:#x} outside any unit"
                                ))
                            })?;
                        if let Some(parent) = dw(graph.parent(importer_unit, importer))? {
                            return Ok(positioned(vec![die_value(
                                Arc::clone(graph),
                                importer_unit,
                                parent,
                                Some(Arc::new(rest.to_vec())),
                                true,
                            )]));
                        }
                    }
                }
            }
            Ok(Vec::new())
        }
        other => Err(mismatch("T_DIE", other)),
    }
}

pub fn expand_prev(v: &Value) -> Result<Vec<Value>> {
    sibling(v, |prev, _next| prev)
}

pub fn expand_next(v: &Value) -> Result<Vec<Value>> {
    sibling(v, |_prev, next| next)
}

fn sibling(
    v: &Value,
    pick: impl Fn(Option<u64>, Option<u64>) -> Option<u64>,
) -> Result<Vec<Value>> {
    match v {
        Value::Die {
            graph,
            unit,
            offset,
            import_path,
            cooked,
            ..
        } => {
            let (prev, next) = dw(graph.siblings(*unit, *offset))?;
            Ok(positioned(
                pick(prev, next)
                    .map(|s| {
                        die_value(Arc::clone(graph), *unit, s, import_path.clone(), *cooked)
                    })
                    .into_iter()
                    .collect(),
            ))
        }
        other => Err(mismatch("T_DIE", other)),
    }
}

/// Attributes of a DIE, or attribute specifications of an abbreviation.
pub fn expand_attribute(v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Die {
            graph,
            unit,
            offset,
            ..
        } => {
            let attrs = dw(graph.attributes(*unit, *offset))?;
            Ok(positioned(
                attrs
                    .iter()
                    .map(|a| Value::Attr {
                        graph: Arc::clone(graph),
                        unit: *unit,
                        die: *offset,
                        at: a.name().0,
                        form: form_of(&a.value()),
                        pos: 0,
                    })
                    .collect(),
            ))
        }
        Value::Abbrev {
            graph, unit, code, ..
        } => {
            let Some(abbrev) = graph.abbrev(*unit, *code) else {
                return Err(QueryError::Dwarf(format!(
                    "abbreviation {code} vanished from its table"
                )));
            };
            Ok(positioned(
                abbrev
                    .attributes()
                    .iter()
                    .enumerate()
                    .map(|(i, spec)| Value::AbbrevAttr {
                        at: spec.name().0,
                        form: spec.form().0,
                        index: i as u64,
                        pos: 0,
                    })
                    .collect(),
            ))
        }
        other => Err(mismatch("T_DIE", other)),
    }
}

/// Value(s) of an attribute.
pub fn expand_value(v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Attr {
            graph,
            unit,
            die,
            at,
            ..
        } => match dw(graph.attr(*unit, *die, gimli::DwAt(*at)))? {
            Some(attr) => Ok(positioned(attr_to_values(graph, *unit, attr.value())?)),
            None => Ok(Vec::new()),
        },
        other => Err(mismatch("T_ATTR", other)),
    }
}

/// `@name` shorthand: the named attribute's value(s) on a DIE, zero
/// outputs when the attribute is absent.
pub fn expand_atval(at: u16, v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Die {
            graph,
            unit,
            offset,
            ..
        } => match dw(graph.attr(*unit, *offset, gimli::DwAt(at)))? {
            Some(attr) => Ok(positioned(attr_to_values(graph, *unit, attr.value())?)),
            None => Ok(Vec::new()),
        },
        other => Err(mismatch("T_DIE", other)),
    }
}

pub fn expand_offset(v: &Value) -> Result<Vec<Value>> {
    let out = match v {
        Value::Die { offset, .. } => hex_const(*offset),
        Value::Cu { graph, unit, .. } => hex_const(graph.unit_offset(*unit)),
        Value::AbbrevUnit { graph, unit, .. } => hex_const(graph.unit_abbrev_offset(*unit)),
        Value::AbbrevAttr { index, .. } => dec_const(*index),
        Value::LoclistOp { offset, .. } => hex_const(*offset),
        other => return Err(mismatch("T_DIE", other)),
    };
    Ok(positioned(vec![out]))
}

pub fn expand_name(v: &Value) -> Result<Vec<Value>> {
    let out = match v {
        Value::Die {
            graph,
            unit,
            offset,
            ..
        } => {
            return Ok(positioned(
                dw(graph.die_name(*unit, *offset))?
                    .map(Value::string)
                    .into_iter()
                    .collect(),
            ));
        }
        Value::Attr { at, .. } | Value::AbbrevAttr { at, .. } => {
            Value::constant(Constant::new(BigInt::from(*at), &AT_DOM))
        }
        Value::Dwarf { graph, .. } => Value::string(graph.file_name()),
        other => return Err(mismatch("T_DIE", other)),
    };
    Ok(positioned(vec![out]))
}

pub fn expand_tag(v: &Value) -> Result<Vec<Value>> {
    let tag = match v {
        Value::Die {
            graph,
            unit,
            offset,
            ..
        } => dw(graph.tag(*unit, *offset))?,
        Value::Abbrev { tag, .. } => *tag,
        other => return Err(mismatch("T_DIE", other)),
    };
    Ok(positioned(vec![Value::constant(Constant::new(
        BigInt::from(tag),
        &TAG_DOM,
    ))]))
}

pub fn expand_form(v: &Value) -> Result<Vec<Value>> {
    let form = match v {
        Value::Attr { form, .. } | Value::AbbrevAttr { form, .. } => *form,
        other => return Err(mismatch("T_ATTR", other)),
    };
    Ok(positioned(vec![Value::constant(Constant::new(
        BigInt::from(form),
        &FORM_DOM,
    ))]))
}

/// The value's type tag, in the `T_*` domain.
pub fn expand_type(v: &Value) -> Result<Vec<Value>> {
    Ok(positioned(vec![Value::constant(Constant::new(
        BigInt::from(v.type_code()),
        &TYPE_DOM,
    ))]))
}

pub fn expand_pos(v: &Value) -> Result<Vec<Value>> {
    Ok(positioned(vec![dec_const(v.pos())]))
}

pub fn expand_count(v: &Value) -> Result<Vec<Value>> {
    let count = match v {
        Value::Seq { elems, .. } => elems.len(),
        Value::Str { text, .. } => text.len(),
        Value::AddrSet { ranges, .. } => ranges.len(),
        Value::LoclistElem { ops, .. } => ops.len(),
        other => return Err(mismatch("T_SEQ", other)),
    };
    Ok(positioned(vec![dec_const(count)]))
}

pub fn expand_each(v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Seq { elems, .. } => Ok(positioned(elems.as_ref().clone())),
        Value::AddrSet { ranges, .. } => Ok(positioned(
            ranges.iter().map(|&(l, h)| Value::addr_range(l, h)).collect(),
        )),
        Value::LoclistElem { ops, .. } => Ok(positioned(
            ops.iter()
                .map(|&(offset, code)| Value::LoclistOp {
                    offset,
                    code,
                    pos: 0,
                })
                .collect(),
        )),
        other => Err(mismatch("T_SEQ", other)),
    }
}

/// Convert one gimli attribute value into engine values. Most classes
/// yield exactly one value; loclists yield one per element.
pub fn attr_to_values(
    graph: &Arc<Graph>,
    unit: usize,
    value: gimli::AttributeValue<Reader>,
) -> Result<Vec<Value>> {
    use gimli::AttributeValue as AV;

    let one = |v: Value| Ok(vec![v]);
    match value {
        AV::Addr(a) => one(Value::constant(Constant::new(BigInt::from(a), &ADDR_DOM))),
        AV::DebugAddrIndex(index) => {
            let addr = graph
                .dwarf()
                .address(graph.unit(unit), index)
                .map_err(|e| QueryError::Dwarf(e.to_string()))?;
            one(Value::constant(Constant::new(BigInt::from(addr), &ADDR_DOM)))
        }

        AV::Data1(v) => one(dec_const(v)),
        AV::Data2(v) => one(dec_const(v)),
        AV::Data4(v) => one(dec_const(v)),
        AV::Data8(v) => one(dec_const(v)),
        AV::Udata(v) => one(dec_const(v)),
        AV::Sdata(v) => one(dec_const(v)),
        AV::Flag(b) => one(dec_const(b as u64)),
        AV::FileIndex(v) => one(dec_const(v)),

        AV::Block(block) => {
            let bytes = gimli::Reader::to_slice(&block)
                .map_err(|e| QueryError::Dwarf(e.to_string()))?;
            one(Value::seq(bytes.iter().map(|&b| dec_const(b)).collect()))
        }

        AV::Exprloc(expression) => {
            let ops = dw(graph.expression_ops(unit, expression))?;
            one(Value::LoclistElem {
                low: 0,
                high: u64::MAX,
                ops: Arc::new(ops),
                pos: 0,
            })
        }

        AV::UnitRef(_) | AV::DebugInfoRef(_) => {
            match dw(graph.resolve_ref(unit, &value))? {
                Some((target_unit, target_off)) => one(die_value(
                    Arc::clone(graph),
                    target_unit,
                    target_off,
                    None,
                    false,
                )),
                None => Ok(Vec::new()),
            }
        }

        AV::LocationListsRef(_) | AV::DebugLocListsIndex(_) => {
            let entries = dw(graph.loclist(unit, value))?;
            Ok(entries
                .into_iter()
                .map(|e| Value::LoclistElem {
                    low: e.low,
                    high: e.high,
                    ops: Arc::new(e.ops),
                    pos: 0,
                })
                .collect())
        }

        AV::RangeListsRef(_) | AV::DebugRngListsIndex(_) => {
            let ranges = coalesce_ranges(dw(graph.ranges(unit, value))?);
            one(Value::AddrSet {
                ranges: Arc::new(ranges),
                pos: 0,
            })
        }

        AV::String(_)
        | AV::DebugStrRef(_)
        | AV::DebugLineStrRef(_)
        | AV::DebugStrOffsetsIndex(_) => match dw(graph.attr_string(unit, value))? {
            Some(s) => one(Value::string(s)),
            None => Ok(Vec::new()),
        },

        AV::Language(l) => one(Value::constant(Constant::new(BigInt::from(l.0), &LANG_DOM))),
        AV::Encoding(e) => one(Value::constant(Constant::new(BigInt::from(e.0), &ATE_DOM))),
        AV::DecimalSign(d) => one(Value::constant(Constant::new(BigInt::from(d.0), &DS_DOM))),
        AV::Endianity(e) => one(Value::constant(Constant::new(BigInt::from(e.0), &END_DOM))),
        AV::Accessibility(a) => {
            one(Value::constant(Constant::new(BigInt::from(a.0), &ACCESS_DOM)))
        }
        AV::Visibility(v) => one(Value::constant(Constant::new(BigInt::from(v.0), &VIS_DOM))),
        AV::Virtuality(v) => one(Value::constant(Constant::new(
            BigInt::from(v.0),
            &VIRTUALITY_DOM,
        ))),
        AV::IdentifierCase(i) => {
            one(Value::constant(Constant::new(BigInt::from(i.0), &ID_DOM)))
        }
        AV::CallingConvention(c) => {
            one(Value::constant(Constant::new(BigInt::from(c.0), &CC_DOM)))
        }
        AV::Inline(i) => one(Value::constant(Constant::new(BigInt::from(i.0), &INL_DOM))),
        AV::Ordering(o) => one(Value::constant(Constant::new(BigInt::from(o.0), &ORD_DOM))),

        AV::SecOffset(o) => one(hex_const(o as u64)),

        other => one(Value::string(format!("{other:?}"))),
    }
}

/// Reconstruct the attribute's form from the shape gimli parsed it into.
pub fn form_of(value: &gimli::AttributeValue<Reader>) -> u16 {
    use gimli::AttributeValue as AV;
    let form = match value {
        AV::Addr(_) => gimli::DW_FORM_addr,
        AV::DebugAddrIndex(_) => gimli::DW_FORM_addrx,
        AV::Block(_) => gimli::DW_FORM_block,
        AV::Data1(_) => gimli::DW_FORM_data1,
        AV::Data2(_) => gimli::DW_FORM_data2,
        AV::Data4(_) => gimli::DW_FORM_data4,
        AV::Data8(_) => gimli::DW_FORM_data8,
        AV::Sdata(_) => gimli::DW_FORM_sdata,
        AV::Udata(_) | AV::FileIndex(_) => gimli::DW_FORM_udata,
        AV::Exprloc(_) => gimli::DW_FORM_exprloc,
        AV::Flag(_) => gimli::DW_FORM_flag,
        AV::UnitRef(_) => gimli::DW_FORM_ref4,
        AV::DebugInfoRef(_) => gimli::DW_FORM_ref_addr,
        AV::String(_) => gimli::DW_FORM_string,
        AV::DebugStrRef(_) => gimli::DW_FORM_strp,
        AV::DebugLineStrRef(_) => gimli::DW_FORM_line_strp,
        AV::DebugStrOffsetsIndex(_) => gimli::DW_FORM_strx,
        AV::DebugLocListsIndex(_) => gimli::DW_FORM_loclistx,
        AV::DebugRngListsIndex(_) => gimli::DW_FORM_rnglistx,
        AV::SecOffset(_) | AV::LocationListsRef(_) | AV::RangeListsRef(_) => {
            gimli::DW_FORM_sec_offset
        }
        AV::Language(_)
        | AV::Encoding(_)
        | AV::DecimalSign(_)
        | AV::Endianity(_)
        | AV::Accessibility(_)
        | AV::Visibility(_)
        | AV::Virtuality(_)
        | AV::IdentifierCase(_)
        | AV::CallingConvention(_)
        | AV::Inline(_)
        | AV::Ordering(_) => gimli::DW_FORM_data1,
        _ => gimli::DW_FORM_udata,
    };
    form.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwq_core::Brevity;

    #[test]
    fn type_expansion_is_variant_tagged() {
        let v = Value::string("x");
        let out = expand_type(&v).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].show(Brevity::Full), "T_STR");
        assert_eq!(out[0].show(Brevity::Brief), "STR");
    }

    #[test]
    fn each_repositions_elements() {
        let seq = Value::seq(vec![Value::string("a"), Value::string("b")]);
        let out = expand_each(&seq).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].pos(), 0);
        assert_eq!(out[1].pos(), 1);
    }

    #[test]
    fn count_covers_counted_variants() {
        assert_eq!(
            expand_count(&Value::string("abc")).unwrap()[0],
            Value::constant(Constant::dec(3))
        );
        assert_eq!(
            expand_count(&Value::seq(vec![])).unwrap()[0],
            Value::constant(Constant::dec(0))
        );
        assert!(expand_count(&Value::constant(Constant::dec(1))).is_err());
    }

    #[test]
    fn accessors_reject_wrong_variants() {
        let c = Value::constant(Constant::dec(1));
        assert!(matches!(
            expand_child(&c),
            Err(QueryError::TypeMismatch { .. })
        ));
        assert!(matches!(
            expand_each(&c),
            Err(QueryError::TypeMismatch { .. })
        ));
    }
}
