//! Abstract syntax tree of the Slate language.
//!
//! The tree is produced by the parser and consumed three ways: the resolver
//! annotates identifier leaves in place, the bytecode emitter lowers the
//! annotated tree, and the tree-walk evaluator interprets it directly.
//! Child arity is enforced by construction: each variant stores exactly the
//! children its shape requires.

/// An identifier leaf, carrying write-once resolution state.
///
/// `slot`/`level` start at -1 (unresolved). The resolver fills them exactly
/// once; -1 after resolution means the name is addressed dynamically by name
/// at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct NameRef {
    pub name: String,
    pub slot: i32,
    pub level: i32,
}

impl NameRef {
    pub fn new(name: impl Into<String>) -> Self {
        NameRef {
            name: name.into(),
            slot: -1,
            level: -1,
        }
    }

    /// True once the resolver has assigned a (slot, level) address.
    pub fn is_local(&self) -> bool {
        self.slot >= 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: String,
    pub left: Box<Node>,
    pub right: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfExpr {
    pub cond: Box<Node>,
    pub then: Box<Node>,
    pub els: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileExpr {
    pub cond: Box<Node>,
    pub body: Box<Node>,
}

/// A function (or method) definition.
///
/// `frame_size` is -1 until the resolver has walked the body; afterwards it
/// is the fixed slot count of the function's runtime frame (parameters,
/// locals, and the reserved receiver slot for methods).
#[derive(Debug, Clone, PartialEq)]
pub struct DefExpr {
    pub name: NameRef,
    pub params: Vec<String>,
    pub body: Box<Node>,
    pub frame_size: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefExpr {
    pub name: String,
    pub parent: Option<NameRef>,
    pub members: Vec<Node>,
}

/// One segment of a member-access chain: `a.b(c)[d]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Call(Vec<Node>),
    Index(Box<Node>),
    Attr(String),
}

/// A head expression followed by call/index/attribute segments, walked left
/// to right.
#[derive(Debug, Clone, PartialEq)]
pub struct PostfixExpr {
    pub head: Box<Node>,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(i64),
    Str(String),
    Name(NameRef),
    /// The empty statement (a bare separator).
    Empty,
    Binary(BinaryExpr),
    Negate(Box<Node>),
    Block(Vec<Node>),
    If(IfExpr),
    While(WhileExpr),
    Def(DefExpr),
    Class(ClassDefExpr),
    Array(Vec<Node>),
    Postfix(PostfixExpr),
}

impl Node {
    pub fn name(text: impl Into<String>) -> Node {
        Node::Name(NameRef::new(text))
    }

    pub fn binary(op: impl Into<String>, left: Node, right: Node) -> Node {
        Node::Binary(BinaryExpr {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}

/// Deterministic s-expression rendering: list nodes print as
/// `( child child ... )`, leaves print their literal text. This textual form
/// is the contract the parser tests assert against.
impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Number(n) => write!(f, "{}", n),
            Node::Str(s) => write!(f, "{}", s),
            Node::Name(n) => write!(f, "{}", n.name),
            Node::Empty => write!(f, "()"),
            Node::Binary(b) => write!(f, "( {} {} {} )", b.left, b.op, b.right),
            Node::Negate(x) => write!(f, "( - {} )", x),
            Node::Block(stmts) => {
                write!(f, "(")?;
                for stmt in stmts {
                    write!(f, " {}", stmt)?;
                }
                write!(f, " )")
            }
            Node::If(i) => match &i.els {
                Some(e) => write!(f, "( if {} {} else {} )", i.cond, i.then, e),
                None => write!(f, "( if {} {} )", i.cond, i.then),
            },
            Node::While(w) => write!(f, "( while {} {} )", w.cond, w.body),
            Node::Def(d) => {
                write!(f, "( def {} (", d.name.name)?;
                for p in &d.params {
                    write!(f, " {}", p)?;
                }
                write!(f, " ) {} )", d.body)
            }
            Node::Class(c) => {
                write!(f, "( class {}", c.name)?;
                if let Some(p) = &c.parent {
                    write!(f, " extends {}", p.name)?;
                }
                write!(f, " (")?;
                for m in &c.members {
                    write!(f, " {}", m)?;
                }
                write!(f, " ) )")
            }
            Node::Array(elems) => {
                write!(f, "( array")?;
                for e in elems {
                    write!(f, " {}", e)?;
                }
                write!(f, " )")
            }
            Node::Postfix(p) => {
                write!(f, "( {}", p.head)?;
                for seg in &p.segments {
                    match seg {
                        Segment::Call(args) => {
                            write!(f, " (")?;
                            for a in args {
                                write!(f, " {}", a)?;
                            }
                            write!(f, " )")?;
                        }
                        Segment::Index(i) => write!(f, " [ {} ]", i)?,
                        Segment::Attr(name) => write!(f, " . {}", name)?,
                    }
                }
                write!(f, " )")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_render() {
        let node = Node::binary(
            "+",
            Node::Number(1),
            Node::binary("*", Node::Number(2), Node::Number(3)),
        );
        assert_eq!(node.to_string(), "( 1 + ( 2 * 3 ) )");
    }

    #[test]
    fn test_name_starts_unresolved() {
        let n = NameRef::new("x");
        assert_eq!(n.slot, -1);
        assert_eq!(n.level, -1);
        assert!(!n.is_local());
    }

    #[test]
    fn test_postfix_render() {
        let node = Node::Postfix(PostfixExpr {
            head: Box::new(Node::name("a")),
            segments: vec![
                Segment::Attr("b".to_string()),
                Segment::Call(vec![Node::name("c")]),
                Segment::Index(Box::new(Node::name("d"))),
            ],
        });
        assert_eq!(node.to_string(), "( a . b ( c ) [ d ] )");
    }

    #[test]
    fn test_leaf_render_is_bare() {
        assert_eq!(Node::Number(7).to_string(), "7");
        assert_eq!(Node::name("x").to_string(), "x");
        assert_eq!(Node::Str("hi".to_string()).to_string(), "hi");
    }
}
