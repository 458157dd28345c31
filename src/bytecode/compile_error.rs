use crate::lang::node::Node;

#[derive(Debug, Clone)]
pub enum CompileError {
    /// The left side of `=` is not a name, attribute, or element target
    BadAssignTarget { found: String },
    /// A binary operator the emitter has no instruction for
    UnknownOperator { op: String },
    /// Internal emitter error (shouldn't happen in normal use)
    Internal(String),
}

impl CompileError {
    pub fn bad_assign_target(node: &Node) -> Self {
        CompileError::BadAssignTarget {
            found: node.to_string(),
        }
    }

    pub fn unknown_operator(op: &str) -> Self {
        CompileError::UnknownOperator { op: op.to_string() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::BadAssignTarget { found } => {
                write!(f, "cannot assign to '{}'", found)
            }
            CompileError::UnknownOperator { op } => {
                write!(f, "unknown operator '{}'", op)
            }
            CompileError::Internal(msg) => write!(f, "internal compile error: {}", msg),
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CompileError::bad_assign_target(&Node::Number(3));
        assert_eq!(err.to_string(), "cannot assign to '3'");

        let err = CompileError::unknown_operator("&&");
        assert_eq!(err.to_string(), "unknown operator '&&'");

        let err = CompileError::internal("const pool overflow");
        assert!(err.to_string().contains("const pool overflow"));
    }
}
