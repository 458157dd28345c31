#[derive(Debug)]
pub struct RuntimeError {
    pub message: String,
    pub call_stack: Vec<String>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.message)?;

        if !self.call_stack.is_empty() {
            write!(f, "\n  call stack:")?;

            for (i, frame) in self.call_stack.iter().rev().enumerate() {
                write!(f, "\n    {}: {}", i, frame)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    pub fn new(msg: &str) -> Self {
        RuntimeError {
            message: msg.to_string(),
            call_stack: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.call_stack.push(context.to_string());
        self
    }

    pub fn type_error(expected: &str, found: &str) -> Self {
        RuntimeError::new(&format!("expected {}, found {}", expected, found))
    }

    pub fn not_callable(found: &str) -> Self {
        RuntimeError::new(&format!("value of type {} is not callable", found))
    }

    pub fn division_by_zero() -> Self {
        RuntimeError::new("division by zero")
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        RuntimeError::new(&format!(
            "array index {} out of bounds (length {})",
            index, len
        ))
    }

    pub fn no_attribute(type_name: &str, attr: &str) -> Self {
        RuntimeError::new(&format!("{} has no attribute '{}'", type_name, attr))
    }

    pub fn not_implemented(what: &str) -> Self {
        RuntimeError::new(&format!("{} is not implemented", what))
    }

    pub fn internal(msg: &str) -> Self {
        RuntimeError::new(&format!("internal: {}", msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_call_stack() {
        let err = RuntimeError::new("boom")
            .with_context("inner")
            .with_context("outer");
        let text = err.to_string();
        assert!(text.starts_with("runtime error: boom"));
        assert!(text.contains("0: outer"));
        assert!(text.contains("1: inner"));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(
            RuntimeError::type_error("number", "string").message,
            "expected number, found string"
        );
        assert_eq!(
            RuntimeError::index_out_of_bounds(5, 3).message,
            "array index 5 out of bounds (length 3)"
        );
    }
}
