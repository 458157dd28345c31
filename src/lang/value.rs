use std::cell::RefCell;
use std::rc::Rc;

use crate::bytecode::ir::CodeUnit;
use crate::lang::env::EnvRef;
use crate::lang::node::Node;

/// Runtime value in the Slate language.
///
/// Compound values share structure: an `Array` aliased by two bindings is one
/// array, and mutation through either alias is visible through both. The same
/// holds for the environments captured inside functions, classes and
/// instances.
#[derive(Clone)]
pub enum Value {
    Null,
    Number(i64),
    Bool(bool),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Function>),
    /// A function read off an instance, bound to that instance.
    Method(Rc<Function>, Rc<Instance>),
    Class(Rc<ClassInfo>),
    Instance(Rc<Instance>),
    /// A compiled code object travelling through the constant pool; only
    /// ever observed between `LOAD_CONST` and `MAKE_FUNCTION`.
    Code(Rc<CodeUnit>),
}

/// The body of a function value: compiled bytecode from the emitter, or a
/// retained AST block when the function was created by the tree-walk engine.
pub enum FnBody {
    Code(Rc<CodeUnit>),
    Ast { params: Vec<String>, block: Rc<Node> },
}

/// A function value: code plus the environment in effect at its definition
/// site. `frame_size` is the slot count of the frame a call allocates
/// (meaningful only for compiled bodies).
pub struct Function {
    pub name: String,
    pub body: FnBody,
    pub env: EnvRef,
    pub frame_size: usize,
}

/// A class: its name and the member environment its body populated.
pub struct ClassInfo {
    pub name: String,
    pub members: EnvRef,
}

/// An instance: its own field environment, parented to the class's member
/// environment.
pub struct Instance {
    pub class_name: String,
    pub fields: EnvRef,
}

impl Value {
    pub fn array(elems: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elems)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
            Value::Method(_, _) => "method",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Code(_) => "code",
        }
    }

    /// Truthiness for `if`/`while` conditions: null, false, zero and empty
    /// strings/arrays are false, everything else is true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Method(f1, i1), Value::Method(f2, i2)) => {
                Rc::ptr_eq(f1, f2) && Rc::ptr_eq(i1, i2)
            }
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, item) in a.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Function(func) => write!(f, "<func {}>", func.name),
            Value::Method(func, inst) => {
                write!(f, "<method {}.{}>", inst.class_name, func.name)
            }
            Value::Class(c) => write!(f, "<class {}>", c.name),
            Value::Instance(i) => write!(f, "<instance of {}>", i.class_name),
            Value::Code(_) => write!(f, "<code>"),
        }
    }
}

// Environments alias freely (captured frames, the class/instance back
// reference), so Debug stays shallow instead of deriving a walk over the
// whole object graph.
impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<func {}>", self.name)
    }
}

impl std::fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<instance of {}>", self.class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0).truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Number(-1).truthy());
        assert!(Value::Str("x".to_string()).truthy());
        assert!(Value::array(vec![Value::Null]).truthy());
        assert!(!Value::array(vec![]).truthy());
    }

    #[test]
    fn test_array_equality_is_structural() {
        let a = Value::array(vec![Value::Number(1), Value::Number(2)]);
        let b = Value::array(vec![Value::Number(1), Value::Number(2)]);
        assert_eq!(a, b);
        let c = Value::array(vec![Value::Number(9)]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_array_display() {
        let a = Value::array(vec![Value::Number(1), Value::Str("x".to_string())]);
        assert_eq!(a.to_string(), "[1, x]");
    }
}
