pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod resolve;
pub mod verify;

pub use ir::{CodeUnit, Const};
pub use op::{BinOp, Op};
