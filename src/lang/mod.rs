pub mod env;
pub mod node;
pub mod value;
