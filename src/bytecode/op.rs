use serde::{Deserialize, Serialize};

/// One bytecode instruction, operands inline.
///
/// Jump operands are relative to the instruction after the jump: an offset
/// of 0 falls through, and negative offsets jump backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Push constant pool entry `idx`.
    LoadConst(usize),
    /// Pop a value and bind it, by name (`Name` const `idx`), on the
    /// environment chain; push the value back.
    StoreNested(usize),
    /// Push the value bound to `Name` const `idx` on the environment chain.
    LoadNested(usize),
    /// Push slot `slot` of the call frame `level` hops out.
    LoadLocal(usize, usize),
    /// Pop a value into slot `slot` of the call frame `level` hops out; push
    /// the value back.
    StoreLocal(usize, usize),
    /// Pop right then left operand, push `left op right`.
    BinaryOp(BinOp),
    /// Pop a number, push its negation.
    Negative,
    /// Pop a value; when falsy, jump by the relative offset.
    JumpIfFalse(i32),
    /// Unconditional relative jump.
    JumpFront(i32),
    /// Pop a `Code` value, push a function closing over the current
    /// environment; `frame_size` slots per call frame.
    MakeFunction(usize),
    /// Pop `argc` arguments then the callee, push the call result.
    CallFunction(usize),
    /// Pop parent (or null) then the class name, run `Code` const `idx` in a
    /// fresh class environment, push the class.
    MakeClass(usize),
    /// Pop the object then the value, set attribute `Name` const `idx`;
    /// push the value back.
    StoreAttr(usize),
    /// Pop an object, push its attribute `Name` const `idx`.
    LoadAttr(usize),
    /// Pop `len` elements (first pushed is element 0), push an array.
    MakeArray(usize),
    /// Pop index then array, push the element.
    GetArrayItem,
    /// Pop index, array, then value; store the element and push the value
    /// back.
    SetArrayItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn from_symbol(sym: &str) -> Option<BinOp> {
        Some(match sym {
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::LoadConst(_) => "LOAD_CONST",
            Op::StoreNested(_) => "STORE_NESTED",
            Op::LoadNested(_) => "LOAD_NESTED",
            Op::LoadLocal(_, _) => "LOAD_LOCAL",
            Op::StoreLocal(_, _) => "STORE_LOCAL",
            Op::BinaryOp(_) => "BINARY_OP",
            Op::Negative => "NEGATIVE",
            Op::JumpIfFalse(_) => "JUMP_IF_FALSE",
            Op::JumpFront(_) => "JUMP_FRONT",
            Op::MakeFunction(_) => "MAKE_FUNCTION",
            Op::CallFunction(_) => "CALL_FUNCTION",
            Op::MakeClass(_) => "MAKE_CLASS",
            Op::StoreAttr(_) => "STORE_ATTR",
            Op::LoadAttr(_) => "LOAD_ATTR",
            Op::MakeArray(_) => "MAKE_ARRAY",
            Op::GetArrayItem => "GET_ARRAY_ITEM",
            Op::SetArrayItem => "SET_ARRAY_ITEM",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binop_symbol_round_trip() {
        for sym in ["<", ">", "<=", ">=", "==", "!=", "+", "-", "*", "/", "%"] {
            let op = BinOp::from_symbol(sym).unwrap();
            assert_eq!(op.symbol(), sym);
        }
        assert_eq!(BinOp::from_symbol("="), None);
        assert_eq!(BinOp::from_symbol("&&"), None);
    }

    #[test]
    fn test_op_names() {
        assert_eq!(Op::LoadConst(0).name(), "LOAD_CONST");
        assert_eq!(Op::JumpFront(-4).name(), "JUMP_FRONT");
        assert_eq!(Op::SetArrayItem.name(), "SET_ARRAY_ITEM");
    }
}
