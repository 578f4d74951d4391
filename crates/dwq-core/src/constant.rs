//! Wide integer constants with symbolic domains.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;

use crate::domain::{Brevity, Domain, DEC_DOM};

/// An arbitrary-precision signed integer paired with the domain that
/// renders and symbolically classifies it.
#[derive(Clone)]
pub struct Constant {
    value: BigInt,
    dom: &'static dyn Domain,
}

impl Constant {
    pub fn new(value: BigInt, dom: &'static dyn Domain) -> Self {
        Self { value, dom }
    }

    /// A plain decimal constant.
    pub fn dec(value: impl Into<BigInt>) -> Self {
        Self::new(value.into(), &DEC_DOM)
    }

    pub fn value(&self) -> &BigInt {
        &self.value
    }

    pub fn dom(&self) -> &'static dyn Domain {
        self.dom
    }

    pub fn show(&self, brv: Brevity) -> String {
        self.dom.show(&self.value, brv)
    }

    /// Sort key component for the domain: plain literal domains collapse
    /// into one family, symbolic domains order by name.
    fn dom_key(&self) -> &'static str {
        if self.dom.plain() {
            ""
        } else {
            self.dom.name()
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Constant {}

impl PartialOrd for Constant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Constant {
    /// Numeric value first, then domain family. Two literals written in
    /// different bases are the same constant; a bare `17` and a
    /// `DW_TAG_*`-tagged 17 are distinct but deterministically ordered.
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.dom_key().cmp(other.dom_key()))
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.show(Brevity::Full))
    }
}

impl fmt::Debug for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constant({})", self.show(Brevity::Full))
    }
}
