use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::bytecode::op::Op;

/// A compiled unit: the instruction stream plus its constant pool. The
/// top-level program is one unit; every function body and class body is a
/// nested unit reached through a `Code` constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub ops: Vec<Op>,
    pub consts: Vec<Const>,
}

/// Constant pool entry.
///
/// `Name` entries carry the identifiers that by-name instructions
/// (`LOAD_NESTED`, `STORE_NESTED`, `LOAD_ATTR`, `STORE_ATTR`) refer to;
/// they are not pushable values on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    Null,
    Num(i64),
    Str(String),
    Name(String),
    Code(Rc<CodeUnit>),
}

impl CodeUnit {
    pub fn new() -> CodeUnit {
        CodeUnit {
            ops: Vec::new(),
            consts: Vec::new(),
        }
    }

    /// Intern a constant, reusing an existing pool entry when one matches.
    pub fn add_const(&mut self, c: Const) -> usize {
        if let Some(idx) = self.consts.iter().position(|e| *e == c) {
            return idx;
        }
        self.consts.push(c);
        self.consts.len() - 1
    }

    /// Serialize for `.slc` output.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserialize a `.slc` image.
    pub fn from_bytes(bytes: &[u8]) -> Result<CodeUnit, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

impl Default for CodeUnit {
    fn default() -> Self {
        CodeUnit::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::BinOp;

    #[test]
    fn test_add_const_interns_duplicates() {
        let mut unit = CodeUnit::new();
        let a = unit.add_const(Const::Num(1));
        let b = unit.add_const(Const::Name("x".to_string()));
        let c = unit.add_const(Const::Num(1));
        assert_eq!(a, c);
        assert_ne!(a, b);
        // A name and a string with the same text are distinct entries.
        let d = unit.add_const(Const::Str("x".to_string()));
        assert_ne!(b, d);
        assert_eq!(unit.consts.len(), 3);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut inner = CodeUnit::new();
        let k = inner.add_const(Const::Num(42));
        inner.ops.push(Op::LoadConst(k));

        let mut unit = CodeUnit::new();
        let code = unit.add_const(Const::Code(Rc::new(inner)));
        let name = unit.add_const(Const::Name("f".to_string()));
        unit.ops.extend([
            Op::LoadConst(code),
            Op::MakeFunction(1),
            Op::StoreNested(name),
            Op::CallFunction(0),
            Op::BinaryOp(BinOp::Add),
            Op::JumpFront(-3),
        ]);

        let bytes = unit.to_bytes().unwrap();
        let back = CodeUnit::from_bytes(&bytes).unwrap();
        assert_eq!(back, unit);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(CodeUnit::from_bytes(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
