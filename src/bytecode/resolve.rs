use crate::lang::node::{DefExpr, NameRef, Node, Segment};

/// Static scope resolution, run over the AST before emission.
///
/// The resolver assigns (slot, level) addresses to every identifier that
/// lives in a function frame and leaves the rest dynamic, to be looked up by
/// name through the environment chain at run time. Frame sizes fall out of
/// the same walk and are recorded on each `def` node.
///
/// Addressing searches only the contiguous chain of enclosing function
/// scopes: a class body or the global scope ends the chain, so names bound
/// there stay dynamic. Assigning to a name not yet visible in the chain
/// declares a fresh slot in the innermost function scope; outside any
/// function scope the assignment stays dynamic.
///
/// Resolution is idempotent: an identifier whose slot is already set is
/// never touched again.
pub struct Resolver {
    scopes: Vec<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Global,
    ClassBody,
    Function,
}

struct Scope {
    kind: ScopeKind,
    slots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveError {
    pub message: String,
}

impl ResolveError {
    fn assign_to_this() -> ResolveError {
        ResolveError {
            message: "cannot assign to 'this'".to_string(),
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resolve error: {}", self.message)
    }
}

impl std::error::Error for ResolveError {}

pub fn resolve_program(stmts: &mut [Node]) -> Result<(), ResolveError> {
    let mut resolver = Resolver::new();
    for stmt in stmts {
        resolver.resolve(stmt)?;
    }
    Ok(())
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            scopes: vec![Scope {
                kind: ScopeKind::Global,
                slots: Vec::new(),
            }],
        }
    }

    pub fn resolve(&mut self, node: &mut Node) -> Result<(), ResolveError> {
        match node {
            Node::Number(_) | Node::Str(_) | Node::Empty => Ok(()),
            Node::Name(name) => {
                self.resolve_read(name);
                Ok(())
            }
            Node::Binary(bin) => {
                if bin.op == "=" {
                    self.resolve(&mut bin.right)?;
                    self.resolve_target(&mut bin.left)
                } else {
                    self.resolve(&mut bin.left)?;
                    self.resolve(&mut bin.right)
                }
            }
            Node::Negate(inner) => self.resolve(inner),
            Node::Block(stmts) => {
                for stmt in stmts {
                    self.resolve(stmt)?;
                }
                Ok(())
            }
            Node::If(ifx) => {
                self.resolve(&mut ifx.cond)?;
                self.resolve(&mut ifx.then)?;
                if let Some(els) = &mut ifx.els {
                    self.resolve(els)?;
                }
                Ok(())
            }
            Node::While(whx) => {
                self.resolve(&mut whx.cond)?;
                self.resolve(&mut whx.body)?;
                Ok(())
            }
            Node::Def(def) => self.resolve_def(def),
            Node::Class(class) => {
                // The class name is always bound dynamically; only the
                // parent reference resolves like an ordinary read.
                if let Some(parent) = &mut class.parent {
                    self.resolve_read(parent);
                }
                self.scopes.push(Scope {
                    kind: ScopeKind::ClassBody,
                    slots: Vec::new(),
                });
                let result = class
                    .members
                    .iter_mut()
                    .try_for_each(|member| self.resolve(member));
                self.scopes.pop();
                result
            }
            Node::Array(elems) => {
                for elem in elems {
                    self.resolve(elem)?;
                }
                Ok(())
            }
            Node::Postfix(post) => {
                self.resolve(&mut post.head)?;
                for seg in &mut post.segments {
                    match seg {
                        Segment::Call(args) => {
                            for arg in args {
                                self.resolve(arg)?;
                            }
                        }
                        Segment::Index(idx) => self.resolve(idx)?,
                        Segment::Attr(_) => {}
                    }
                }
                Ok(())
            }
        }
    }

    fn resolve_def(&mut self, def: &mut DefExpr) -> Result<(), ResolveError> {
        // Resolution state is write-once. A resolved frame size means the
        // body's slots are already assigned; rebuilding the scope here would
        // re-count only the parameters and shrink the frame.
        if def.frame_size >= 0 {
            return Ok(());
        }

        // The function's name belongs to the scope the `def` appears in;
        // recursive references inside the body reach it through the
        // captured environment chain.
        self.resolve_write(&mut def.name);

        let in_class_body = self.scopes.last().map(|s| s.kind) == Some(ScopeKind::ClassBody);
        let mut scope = Scope {
            kind: ScopeKind::Function,
            slots: Vec::new(),
        };
        if in_class_body {
            // Slot 0 carries the receiver; arguments bind from slot 1.
            scope.slots.push("this".to_string());
        }
        for param in &def.params {
            scope.slots.push(param.clone());
        }
        self.scopes.push(scope);
        let result = self.resolve(&mut def.body);
        let frame_size = self.scopes.pop().map(|s| s.slots.len()).unwrap_or(0);
        def.frame_size = frame_size as i32;
        result
    }

    fn resolve_target(&mut self, target: &mut Node) -> Result<(), ResolveError> {
        match target {
            Node::Name(name) => {
                if name.name == "this" {
                    return Err(ResolveError::assign_to_this());
                }
                self.resolve_write(name);
                Ok(())
            }
            // Attribute and element stores resolve their operands as reads;
            // target-shape validation belongs to the emitter.
            _ => self.resolve(target),
        }
    }

    /// Address a read: search the contiguous chain of enclosing function
    /// scopes; a miss leaves the identifier dynamic.
    fn resolve_read(&mut self, name: &mut NameRef) {
        if name.is_local() {
            return;
        }
        if let Some((slot, level)) = self.find_in_fun_chain(&name.name) {
            name.slot = slot as i32;
            name.level = level as i32;
        }
    }

    /// Address a write: use an existing slot if the chain holds one,
    /// otherwise declare a fresh slot in the innermost function scope. With
    /// no function scope active the write stays dynamic.
    fn resolve_write(&mut self, name: &mut NameRef) {
        if name.is_local() {
            return;
        }
        if let Some((slot, level)) = self.find_in_fun_chain(&name.name) {
            name.slot = slot as i32;
            name.level = level as i32;
            return;
        }
        let innermost = self
            .scopes
            .last_mut()
            .filter(|s| s.kind == ScopeKind::Function);
        if let Some(scope) = innermost {
            scope.slots.push(name.name.clone());
            name.slot = (scope.slots.len() - 1) as i32;
            name.level = 0;
        }
    }

    fn find_in_fun_chain(&self, name: &str) -> Option<(usize, usize)> {
        let mut level = 0;
        for scope in self.scopes.iter().rev() {
            if scope.kind != ScopeKind::Function {
                return None;
            }
            if let Some(slot) = scope.slots.iter().position(|s| s == name) {
                return Some((slot, level));
            }
            level += 1;
        }
        None
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;

    fn resolved(source: &str) -> Vec<Node> {
        let mut stmts = Parser::from_source(source).parse().unwrap();
        resolve_program(&mut stmts).unwrap();
        stmts
    }

    fn as_def(node: &Node) -> &DefExpr {
        match node {
            Node::Def(def) => def,
            other => panic!("expected def, got {}", other),
        }
    }

    #[test]
    fn test_global_names_stay_dynamic() {
        let stmts = resolved("a = 1\nb = a + 2");
        match &stmts[0] {
            Node::Binary(bin) => match &*bin.left {
                Node::Name(name) => {
                    assert_eq!(name.slot, -1);
                    assert_eq!(name.level, -1);
                }
                other => panic!("unexpected target {}", other),
            },
            other => panic!("unexpected node {}", other),
        }
    }

    #[test]
    fn test_params_and_locals_get_slots() {
        let stmts = resolved("def f(a, b) { c = a + b\nc }");
        let def = as_def(&stmts[0]);
        assert_eq!(def.name.slot, -1);
        assert_eq!(def.frame_size, 3);

        // c is declared by its first assignment, after the two parameters.
        let body = match &*def.body {
            Node::Block(stmts) => stmts,
            other => panic!("unexpected body {}", other),
        };
        match &body[0] {
            Node::Binary(bin) => match &*bin.left {
                Node::Name(c) => {
                    assert_eq!((c.slot, c.level), (2, 0));
                }
                other => panic!("unexpected target {}", other),
            },
            other => panic!("unexpected node {}", other),
        }
        match &body[1] {
            Node::Name(c) => assert_eq!((c.slot, c.level), (2, 0)),
            other => panic!("unexpected node {}", other),
        }
    }

    #[test]
    fn test_nested_function_addresses_outer_slots() {
        let stmts = resolved("def outer(x) { def inner() { x }\ninner() }");
        let outer = as_def(&stmts[0]);
        // outer's frame: x, inner.
        assert_eq!(outer.frame_size, 2);

        let body = match &*outer.body {
            Node::Block(stmts) => stmts,
            other => panic!("unexpected body {}", other),
        };
        let inner = as_def(&body[0]);
        assert_eq!((inner.name.slot, inner.name.level), (1, 0));
        assert_eq!(inner.frame_size, 0);
        match &*inner.body {
            Node::Block(stmts) => match &stmts[0] {
                Node::Name(x) => assert_eq!((x.slot, x.level), (0, 1)),
                other => panic!("unexpected node {}", other),
            },
            other => panic!("unexpected body {}", other),
        }
    }

    #[test]
    fn test_recursive_global_function_reads_its_name_dynamically() {
        let stmts = resolved("def fabi(n) { if n < 2 { n } else { fabi(n - 1) + fabi(n - 2) } }");
        let def = as_def(&stmts[0]);
        assert_eq!(def.name.slot, -1);
        assert_eq!(def.frame_size, 1);
    }

    #[test]
    fn test_method_reserves_receiver_slot() {
        let stmts = resolved("class Point {\ndef move(dx) { this\ndx }\n}");
        let class = match &stmts[0] {
            Node::Class(c) => c,
            other => panic!("unexpected node {}", other),
        };
        let def = as_def(&class.members[0]);
        // Slot 0 is this, so the parameter lands in slot 1.
        assert_eq!(def.frame_size, 2);
        let body = match &*def.body {
            Node::Block(stmts) => stmts,
            other => panic!("unexpected body {}", other),
        };
        match &body[0] {
            Node::Name(this) => assert_eq!((this.slot, this.level), (0, 0)),
            other => panic!("unexpected node {}", other),
        }
        match &body[1] {
            Node::Name(dx) => assert_eq!((dx.slot, dx.level), (1, 0)),
            other => panic!("unexpected node {}", other),
        }
    }

    #[test]
    fn test_class_body_breaks_the_function_chain() {
        // y is assigned in the class body, so the method's read of y cannot
        // be slot-addressed.
        let stmts = resolved("def f() { class C {\ny = 1\ndef m() { y }\n} }");
        let f = as_def(&stmts[0]);
        let body = match &*f.body {
            Node::Block(stmts) => stmts,
            other => panic!("unexpected body {}", other),
        };
        let class = match &body[0] {
            Node::Class(c) => c,
            other => panic!("unexpected node {}", other),
        };
        let m = as_def(&class.members[1]);
        match &*m.body {
            Node::Block(stmts) => match &stmts[0] {
                Node::Name(y) => assert_eq!(y.slot, -1),
                other => panic!("unexpected node {}", other),
            },
            other => panic!("unexpected body {}", other),
        }
    }

    #[test]
    fn test_assign_to_this_is_rejected() {
        let mut stmts = Parser::from_source("class C {\ndef m() { this = 1 }\n}")
            .parse()
            .unwrap();
        let err = resolve_program(&mut stmts).unwrap_err();
        assert!(err.message.contains("this"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut stmts = Parser::from_source("def f(a) { b = a\nb }").parse().unwrap();
        resolve_program(&mut stmts).unwrap();
        let first = stmts.clone();
        resolve_program(&mut stmts).unwrap();
        assert_eq!(stmts, first);
        // The first-assignment local `b` keeps its slot; the frame must not
        // shrink back to the parameter count on a second pass.
        match &stmts[0] {
            Node::Def(def) => assert_eq!(def.frame_size, 2),
            other => panic!("unexpected node {}", other),
        }
    }
}
