//! Constant domains.
//!
//! A domain is the strategy that turns a raw integer into text and that
//! decides which other constants it compares against symbolically. Plain
//! literal domains (decimal, hex, octal) exist so a constant remembers the
//! base it was written in; the DWARF domains render known codes by name,
//! straight out of gimli's constant tables.

use std::collections::HashMap;
use std::sync::OnceLock;

use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

use crate::constant::Constant;

/// How much of a value's rendering to emit.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Brevity {
    Full,
    Brief,
}

/// Rendering and comparison strategy for a constant.
///
/// Domain identity is pointer identity; all domains are `'static` objects.
pub trait Domain: Sync {
    /// Render `v` under this domain.
    fn show(&self, v: &BigInt, brv: Brevity) -> String;

    /// Domain name, e.g. `DW_TAG_*`.
    fn name(&self) -> &'static str;

    /// Plain literal domains compare with each other by value alone.
    fn plain(&self) -> bool {
        false
    }
}

fn hex_str(v: &BigInt) -> String {
    if v.sign() == Sign::Minus {
        format!("-0x{:x}", v.magnitude())
    } else {
        format!("0x{:x}", v.magnitude())
    }
}

/// Decimal literals.
pub struct DecDomain;

impl Domain for DecDomain {
    fn show(&self, v: &BigInt, _brv: Brevity) -> String {
        v.to_string()
    }

    fn name(&self) -> &'static str {
        "dec"
    }

    fn plain(&self) -> bool {
        true
    }
}

/// Hexadecimal literals (`0x…`).
pub struct HexDomain;

impl Domain for HexDomain {
    fn show(&self, v: &BigInt, _brv: Brevity) -> String {
        hex_str(v)
    }

    fn name(&self) -> &'static str {
        "hex"
    }

    fn plain(&self) -> bool {
        true
    }
}

/// Octal literals (`0…`).
pub struct OctDomain;

impl Domain for OctDomain {
    fn show(&self, v: &BigInt, _brv: Brevity) -> String {
        if v.sign() == Sign::Minus {
            format!("-0{:o}", v.magnitude())
        } else {
            format!("0{:o}", v.magnitude())
        }
    }

    fn name(&self) -> &'static str {
        "oct"
    }

    fn plain(&self) -> bool {
        true
    }
}

/// Address constants. Hex rendering with one distinguished member,
/// `DW_ADDR_none`, standing in for "no address".
pub struct AddrDomain;

/// The numeric value of `DW_ADDR_none`.
pub fn addr_none() -> BigInt {
    BigInt::from(u64::MAX)
}

impl Domain for AddrDomain {
    fn show(&self, v: &BigInt, _brv: Brevity) -> String {
        if *v == addr_none() {
            "DW_ADDR_none".to_string()
        } else {
            hex_str(v)
        }
    }

    fn name(&self) -> &'static str {
        "addr"
    }
}

pub static DEC_DOM: DecDomain = DecDomain;
pub static HEX_DOM: HexDomain = HexDomain;
pub static OCT_DOM: OctDomain = OctDomain;
pub static ADDR_DOM: AddrDomain = AddrDomain;

/// A DWARF constant family, backed by gimli's name tables.
pub struct DwDomain {
    name: &'static str,
    prefix: &'static str,
    lookup: fn(u64) -> Option<&'static str>,
    /// Exclusive bound for building the reverse (name → code) table.
    limit: u64,
    reverse: OnceLock<HashMap<&'static str, u64>>,
}

impl DwDomain {
    const fn new(
        name: &'static str,
        prefix: &'static str,
        lookup: fn(u64) -> Option<&'static str>,
        limit: u64,
    ) -> Self {
        Self {
            name,
            prefix,
            lookup,
            limit,
            reverse: OnceLock::new(),
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Known name for a code, if any.
    pub fn known_name(&self, code: u64) -> Option<&'static str> {
        (self.lookup)(code)
    }

    fn reverse_table(&self) -> &HashMap<&'static str, u64> {
        self.reverse.get_or_init(|| {
            let mut table = HashMap::new();
            for code in 0..self.limit {
                if let Some(name) = (self.lookup)(code) {
                    table.entry(name).or_insert(code);
                }
            }
            table
        })
    }

    /// Code for a fully spelled-out constant name, if known.
    pub fn code_by_name(&self, name: &str) -> Option<u64> {
        if !name.starts_with(self.prefix) {
            return None;
        }
        self.reverse_table().get(name).copied()
    }
}

impl Domain for DwDomain {
    fn show(&self, v: &BigInt, brv: Brevity) -> String {
        if let Some(code) = v.to_u64() {
            if let Some(name) = (self.lookup)(code) {
                return match brv {
                    Brevity::Full => name.to_string(),
                    Brevity::Brief => name.strip_prefix(self.prefix).unwrap_or(name).to_string(),
                };
            }
        }
        hex_str(v)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

macro_rules! dw_domains {
    ($($static_name:ident: ($dom:literal, $prefix:literal, $ctor:ident as $width:ty, $limit:expr);)*) => {
        $(
            pub static $static_name: DwDomain = DwDomain::new(
                $dom,
                $prefix,
                |code| gimli::$ctor(code as $width).static_string(),
                $limit,
            );
        )*

        static ALL_DW_DOMAINS: &[&DwDomain] = &[$(&$static_name),*];
    };
}

dw_domains! {
    TAG_DOM: ("DW_TAG_*", "DW_TAG_", DwTag as u16, 0x1_0000);
    AT_DOM: ("DW_AT_*", "DW_AT_", DwAt as u16, 0x1_0000);
    FORM_DOM: ("DW_FORM_*", "DW_FORM_", DwForm as u16, 0x1_0000);
    LANG_DOM: ("DW_LANG_*", "DW_LANG_", DwLang as u16, 0x1_0000);
    INL_DOM: ("DW_INL_*", "DW_INL_", DwInl as u8, 0x100);
    ATE_DOM: ("DW_ATE_*", "DW_ATE_", DwAte as u8, 0x100);
    ACCESS_DOM: ("DW_ACCESS_*", "DW_ACCESS_", DwAccess as u8, 0x100);
    VIS_DOM: ("DW_VIS_*", "DW_VIS_", DwVis as u8, 0x100);
    VIRTUALITY_DOM: ("DW_VIRTUALITY_*", "DW_VIRTUALITY_", DwVirtuality as u8, 0x100);
    ID_DOM: ("DW_ID_*", "DW_ID_", DwId as u8, 0x100);
    CC_DOM: ("DW_CC_*", "DW_CC_", DwCc as u8, 0x100);
    ORD_DOM: ("DW_ORD_*", "DW_ORD_", DwOrd as u8, 0x100);
    DSC_DOM: ("DW_DSC_*", "DW_DSC_", DwDsc as u8, 0x100);
    DS_DOM: ("DW_DS_*", "DW_DS_", DwDs as u8, 0x100);
    OP_DOM: ("DW_OP_*", "DW_OP_", DwOp as u8, 0x100);
    END_DOM: ("DW_END_*", "DW_END_", DwEnd as u8, 0x100);
}

/// Resolve a spelled-out DWARF constant (`DW_TAG_compile_unit`,
/// `DW_FORM_strp`, …) to a constant in its domain. `DW_ADDR_none` is the
/// one synthetic member outside gimli's tables.
pub fn known_constant(name: &str) -> Option<Constant> {
    if name == "DW_ADDR_none" {
        return Some(Constant::new(addr_none(), &ADDR_DOM));
    }
    for dom in ALL_DW_DOMAINS {
        if let Some(code) = dom.code_by_name(name) {
            return Some(Constant::new(BigInt::from(code), *dom));
        }
    }
    None
}
