//! Name-keyed boundary collections.
//!
//! `NamedOperands` marks which operands a graph exposes as outputs;
//! `NamedInputs` and `NamedOutputs` carry buffers across the compute
//! boundary. All three are ordered maps, so iteration order is the name
//! order and build plans are reproducible.

use std::collections::BTreeMap;

use crate::operand::Operand;

/// The declared outputs of a graph under construction.
///
/// Setting an already-bound name overwrites it, last write wins.
#[derive(Debug, Clone, Default)]
pub struct NamedOperands {
    records: BTreeMap<String, Operand>,
}

impl NamedOperands {
    pub fn new() -> NamedOperands {
        NamedOperands::default()
    }

    pub fn set(&mut self, name: impl Into<String>, operand: Operand) {
        self.records.insert(name.into(), operand);
    }

    pub fn get(&self, name: &str) -> Option<&Operand> {
        self.records.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &Operand)> {
        self.records.iter().map(|(n, o)| (n.as_str(), o))
    }
}

/// Input buffers for one compute call, keyed by input name.
#[derive(Debug, Default)]
pub struct NamedInputs<'a> {
    records: BTreeMap<String, &'a [u8]>,
}

impl<'a> NamedInputs<'a> {
    pub fn new() -> NamedInputs<'a> {
        NamedInputs::default()
    }

    pub fn set(&mut self, name: impl Into<String>, data: &'a [u8]) {
        self.records.insert(name.into(), data);
    }

    pub fn get(&self, name: &str) -> Option<&'a [u8]> {
        self.records.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|n| n.as_str())
    }
}

/// Output buffers for one compute call, keyed by output name.
#[derive(Debug, Default)]
pub struct NamedOutputs<'a> {
    records: BTreeMap<String, &'a mut [u8]>,
}

impl<'a> NamedOutputs<'a> {
    pub fn new() -> NamedOutputs<'a> {
        NamedOutputs::default()
    }

    pub fn set(&mut self, name: impl Into<String>, data: &'a mut [u8]) {
        self.records.insert(name.into(), data);
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut [u8]> {
        self.records.get_mut(name).map(|b| &mut **b)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|n| n.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;
    use crate::model::{OperandFact, OutletId};

    fn operand(node: usize) -> Operand {
        Operand::Valid {
            outlet: OutletId::new(node, 0),
            fact: OperandFact::dt_shape(DatumType::F32, [1]),
        }
    }

    #[test]
    fn last_write_wins() {
        let mut outputs = NamedOperands::new();
        outputs.set("y", operand(0));
        outputs.set("y", operand(1));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs.get("y").unwrap().outlet().unwrap().node, 1);
    }

    #[test]
    fn records_iterate_in_name_order() {
        let mut outputs = NamedOperands::new();
        outputs.set("b", operand(0));
        outputs.set("a", operand(1));
        let names: Vec<&str> = outputs.records().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
