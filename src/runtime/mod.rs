pub mod eval;
pub mod runtime_error;
pub mod vm;
