//! Constant tensors baked into the graph.

use std::fmt;
use std::sync::Arc;

use crate::backend::BackendGraph;
use crate::datum::DatumType;
use crate::errors::GraphResult;
use crate::model::{Node, OperandFact};
use crate::operand::OperandDescriptor;
use crate::ops::{InputRef, Operator};
use crate::{ensure_valid, invalid, tvec, TVec};

/// A constant value with its raw buffer.
#[derive(Clone)]
pub struct Constant {
    descriptor: OperandDescriptor,
    data: Arc<Vec<u8>>,
}

impl Constant {
    pub fn new(descriptor: OperandDescriptor, data: impl Into<Vec<u8>>) -> Constant {
        Constant { descriptor, data: Arc::new(data.into()) }
    }

    /// Synthesizes a one-element constant from a scalar value. The shape is
    /// empty: scalars broadcast as `[1]`.
    pub fn scalar(value: f32, datum_type: DatumType) -> Constant {
        let data: Vec<u8> = match datum_type {
            DatumType::F32 => value.to_ne_bytes().to_vec(),
            DatumType::F16 => half::f16::from_f32(value).to_ne_bytes().to_vec(),
            DatumType::I32 => (value as i32).to_ne_bytes().to_vec(),
            DatumType::U32 => (value as u32).to_ne_bytes().to_vec(),
            DatumType::I8 => (value as i8).to_ne_bytes().to_vec(),
            DatumType::U8 => (value as u8).to_ne_bytes().to_vec(),
        };
        Constant { descriptor: OperandDescriptor::new(datum_type, []), data: Arc::new(data) }
    }

    pub fn descriptor(&self) -> &OperandDescriptor {
        &self.descriptor
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Reads the buffer as integers. Only meaningful for I32 and U32
    /// constants; used by operators taking constant index tables (Pad).
    pub fn as_i32s(&self) -> GraphResult<Vec<i32>> {
        match self.descriptor.datum_type {
            DatumType::I32 => Ok(self
                .data
                .chunks_exact(4)
                .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect()),
            DatumType::U32 => Ok(self
                .data
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]) as i32)
                .collect()),
            dt => invalid!("constant of type {} cannot be read as integers", dt),
        }
    }
}

impl fmt::Debug for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Constant {{ {} {:?}, {} bytes }}",
            self.descriptor.datum_type,
            &*self.descriptor.dimensions,
            self.data.len()
        )
    }
}

impl Operator for Constant {
    fn name(&self) -> &'static str {
        "Constant"
    }

    fn output_facts(&self, _inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
        ensure_valid!(
            self.descriptor.dimensions.iter().all(|&d| d > 0),
            "constant has non-positive dimensions {:?}",
            &*self.descriptor.dimensions
        );
        let fact = OperandFact::dt_shape(self.descriptor.datum_type, &*self.descriptor.dimensions);
        let expected = fact.volume() * fact.datum_type.size_of();
        ensure_valid!(
            self.data.len() == expected,
            "constant buffer holds {} bytes, expected {} for {} elements of {}",
            self.data.len(),
            expected,
            fact.volume(),
            fact.datum_type
        );
        Ok(tvec!(fact))
    }

    fn lower(&self, node: &Node, graph: &mut dyn BackendGraph) -> GraphResult<()> {
        graph.add_constant(node, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_length_must_match_descriptor() {
        let ok = Constant::new(OperandDescriptor::new(DatumType::F32, [2, 2]), vec![0u8; 16]);
        assert!(ok.output_facts(&[]).is_ok());
        let short = Constant::new(OperandDescriptor::new(DatumType::F32, [2, 2]), vec![0u8; 12]);
        assert!(short.output_facts(&[]).is_err());
    }

    #[test]
    fn scalar_synthesizes_one_element() {
        let k = Constant::scalar(1.5, DatumType::F16);
        let facts = k.output_facts(&[]).unwrap();
        assert_eq!(facts[0].rank(), 0);
        assert_eq!(facts[0].volume(), 1);
        assert_eq!(k.data().len(), 2);
    }

    #[test]
    fn integer_table_roundtrip() {
        let values: Vec<u8> = [1i32, 0, 2, 3].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let k = Constant::new(OperandDescriptor::new(DatumType::I32, [2, 2]), values);
        assert_eq!(k.as_i32s().unwrap(), vec![1, 0, 2, 3]);
    }
}
