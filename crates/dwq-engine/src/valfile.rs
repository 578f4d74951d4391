//! The valfile: the unit of data flowing through the pipeline.
//!
//! An ordered, indexed stack of owned values. Slot indices assigned by
//! the stack-effect analysis index directly into the array. The small
//! extension holds the sequence a capture operator is accumulating.

use std::cmp::Ordering;

use dwq_core::{QueryError, Result};

use crate::value::Value;

#[derive(Clone, Debug, Default)]
pub struct Valfile {
    slots: Vec<Value>,
    capture: Vec<Value>,
}

impl PartialEq for Valfile {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots && self.capture == other.capture
    }
}

impl Valfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.slots.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.slots
            .pop()
            .ok_or_else(|| QueryError::Underrun("pop on an empty stack".into()))
    }

    pub fn top(&self) -> Result<&Value> {
        self.slots
            .last()
            .ok_or_else(|| QueryError::Underrun("no top of stack".into()))
    }

    pub fn slot(&self, idx: usize) -> Result<&Value> {
        self.slots
            .get(idx)
            .ok_or_else(|| QueryError::Underrun(format!("slot {idx} is not defined")))
    }

    /// Write a value at a slot: replaces a defined slot, extends the
    /// stack by one when writing just past the top.
    pub fn write(&mut self, idx: usize, value: Value) -> Result<()> {
        match idx.cmp(&self.slots.len()) {
            Ordering::Less => {
                self.slots[idx] = value;
                Ok(())
            }
            Ordering::Equal => {
                self.slots.push(value);
                Ok(())
            }
            Ordering::Greater => Err(QueryError::Underrun(format!(
                "slot {idx} is past the top of the stack"
            ))),
        }
    }

    /// All slots, bottom to top.
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    pub fn dup(&mut self) -> Result<()> {
        let top = self.top()?.clone();
        self.slots.push(top);
        Ok(())
    }

    pub fn swap(&mut self) -> Result<()> {
        let len = self.slots.len();
        if len < 2 {
            return Err(QueryError::Underrun("swap needs 2 values".into()));
        }
        self.slots.swap(len - 1, len - 2);
        Ok(())
    }

    pub fn over(&mut self) -> Result<()> {
        let len = self.slots.len();
        if len < 2 {
            return Err(QueryError::Underrun("over needs 2 values".into()));
        }
        let value = self.slots[len - 2].clone();
        self.slots.push(value);
        Ok(())
    }

    /// a b c -> b c a
    pub fn rot(&mut self) -> Result<()> {
        let len = self.slots.len();
        if len < 3 {
            return Err(QueryError::Underrun("rot needs 3 values".into()));
        }
        let bottom = self.slots.remove(len - 3);
        self.slots.push(bottom);
        Ok(())
    }

    /// Stage a value into the capture extension.
    pub fn capture_push(&mut self, value: Value) {
        self.capture.push(value);
    }

    /// Take the accumulated capture sequence.
    pub fn take_capture(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.capture)
    }

    /// Slot-wise equality under the value model's compare. Cross-variant
    /// slots make two valfiles unequal rather than failing.
    pub fn same_state(&self, other: &Valfile) -> bool {
        self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(other.slots.iter())
                .all(|(a, b)| a.total_cmp(b) == Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwq_core::Constant;

    fn int(v: i64) -> Value {
        Value::constant(Constant::dec(v))
    }

    #[test]
    fn push_pop() {
        let mut vf = Valfile::new();
        vf.push(int(1));
        vf.push(int(2));
        assert_eq!(vf.depth(), 2);
        assert_eq!(vf.pop().unwrap(), int(2));
        assert_eq!(vf.pop().unwrap(), int(1));
        assert!(vf.pop().is_err());
    }

    #[test]
    fn write_replaces_or_extends() {
        let mut vf = Valfile::new();
        vf.write(0, int(1)).unwrap();
        vf.write(0, int(2)).unwrap();
        assert_eq!(vf.depth(), 1);
        assert_eq!(vf.slot(0).unwrap(), &int(2));
        vf.write(1, int(3)).unwrap();
        assert_eq!(vf.depth(), 2);
        assert!(vf.write(5, int(4)).is_err());
    }

    #[test]
    fn shuffles() {
        let mut vf = Valfile::new();
        vf.push(int(3));
        vf.push(int(2));
        vf.push(int(1));

        vf.rot().unwrap(); // 3 2 1 -> 2 1 3
        assert_eq!(vf.slots(), &[int(2), int(1), int(3)]);

        vf.swap().unwrap(); // 2 1 3 -> 2 3 1
        assert_eq!(vf.slots(), &[int(2), int(3), int(1)]);

        vf.over().unwrap(); // 2 3 1 -> 2 3 1 3
        assert_eq!(vf.slots(), &[int(2), int(3), int(1), int(3)]);

        vf.dup().unwrap();
        assert_eq!(vf.depth(), 5);
    }

    #[test]
    fn same_state_ignores_capture() {
        let mut a = Valfile::new();
        let mut b = Valfile::new();
        a.push(int(1));
        b.push(int(1));
        a.capture_push(int(9));
        assert!(a.same_state(&b));
        b.push(int(2));
        assert!(!a.same_state(&b));
    }
}
