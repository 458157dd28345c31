use std::rc::Rc;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::{CodeUnit, Const};
use crate::bytecode::op::{BinOp, Op};
use crate::lang::node::{ClassDefExpr, DefExpr, NameRef, Node, PostfixExpr, Segment};

/// Lowers a resolved AST into a [`CodeUnit`]. Each function body and class
/// body becomes its own nested unit with its own constant pool, stored as a
/// `Code` constant of the enclosing unit.
///
/// The input must have been through the resolver first: the emitter picks
/// `LOAD_LOCAL`/`STORE_LOCAL` or `LOAD_NESTED`/`STORE_NESTED` purely from
/// the (slot, level) annotations the resolver left behind.
pub struct Emitter {
    unit: CodeUnit,
}

pub fn compile_program(stmts: &[Node]) -> Result<CodeUnit, CompileError> {
    let mut emitter = Emitter::new();
    for stmt in stmts {
        emitter.emit(stmt)?;
    }
    Ok(emitter.finish())
}

impl Emitter {
    pub fn new() -> Emitter {
        Emitter {
            unit: CodeUnit::new(),
        }
    }

    pub fn finish(self) -> CodeUnit {
        self.unit
    }

    fn emit_op(&mut self, op: Op) -> usize {
        self.unit.ops.push(op);
        self.unit.ops.len() - 1
    }

    /// Point the placeholder jump at `idx` to the next emitted instruction.
    /// Offsets count from the instruction after the jump.
    fn patch_jump(&mut self, idx: usize) -> Result<(), CompileError> {
        let target = self.unit.ops.len();
        let offset = target as i32 - idx as i32 - 1;
        match self.unit.ops.get_mut(idx) {
            Some(Op::JumpIfFalse(slot)) | Some(Op::JumpFront(slot)) => {
                *slot = offset;
                Ok(())
            }
            _ => Err(CompileError::internal("patch target is not a jump")),
        }
    }

    pub fn emit(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Number(n) => {
                let idx = self.unit.add_const(Const::Num(*n));
                self.emit_op(Op::LoadConst(idx));
                Ok(())
            }
            Node::Str(s) => {
                let idx = self.unit.add_const(Const::Str(s.clone()));
                self.emit_op(Op::LoadConst(idx));
                Ok(())
            }
            Node::Empty => Ok(()),
            Node::Name(name) => {
                self.emit_load(name);
                Ok(())
            }
            Node::Binary(bin) => {
                if bin.op == "=" {
                    self.emit(&bin.right)?;
                    self.emit_store(&bin.left)
                } else {
                    // Right first, so the left operand sits on top for the
                    // binary instruction.
                    self.emit(&bin.right)?;
                    self.emit(&bin.left)?;
                    let op = BinOp::from_symbol(&bin.op)
                        .ok_or_else(|| CompileError::unknown_operator(&bin.op))?;
                    self.emit_op(Op::BinaryOp(op));
                    Ok(())
                }
            }
            Node::Negate(inner) => {
                self.emit(inner)?;
                self.emit_op(Op::Negative);
                Ok(())
            }
            Node::Block(stmts) => {
                for stmt in stmts {
                    self.emit(stmt)?;
                }
                Ok(())
            }
            Node::If(ifx) => {
                self.emit(&ifx.cond)?;
                let jf = self.emit_op(Op::JumpIfFalse(0));
                self.emit(&ifx.then)?;
                match &ifx.els {
                    Some(els) => {
                        let out = self.emit_op(Op::JumpFront(0));
                        self.patch_jump(jf)?;
                        self.emit(els)?;
                        self.patch_jump(out)
                    }
                    None => self.patch_jump(jf),
                }
            }
            Node::While(whx) => {
                let loop_start = self.unit.ops.len();
                self.emit(&whx.cond)?;
                let jf = self.emit_op(Op::JumpIfFalse(0));
                self.emit(&whx.body)?;
                let back = self.emit_op(Op::JumpFront(0));
                let offset = loop_start as i32 - back as i32 - 1;
                self.unit.ops[back] = Op::JumpFront(offset);
                self.patch_jump(jf)
            }
            Node::Def(def) => self.emit_def(def),
            Node::Class(class) => self.emit_class(class),
            Node::Array(elems) => {
                for elem in elems {
                    self.emit(elem)?;
                }
                self.emit_op(Op::MakeArray(elems.len()));
                Ok(())
            }
            Node::Postfix(post) => {
                self.emit(&post.head)?;
                for seg in &post.segments {
                    self.emit_segment(seg)?;
                }
                Ok(())
            }
        }
    }

    fn emit_load(&mut self, name: &NameRef) {
        if name.is_local() {
            self.emit_op(Op::LoadLocal(name.slot as usize, name.level as usize));
        } else {
            let idx = self.unit.add_const(Const::Name(name.name.clone()));
            self.emit_op(Op::LoadNested(idx));
        }
    }

    /// Emit the store for an assignment target; the value to store is
    /// already on the stack, and every store instruction pushes it back.
    fn emit_store(&mut self, target: &Node) -> Result<(), CompileError> {
        match target {
            Node::Name(name) => {
                if name.is_local() {
                    self.emit_op(Op::StoreLocal(name.slot as usize, name.level as usize));
                } else {
                    let idx = self.unit.add_const(Const::Name(name.name.clone()));
                    self.emit_op(Op::StoreNested(idx));
                }
                Ok(())
            }
            Node::Postfix(post) => self.emit_postfix_store(post),
            other => Err(CompileError::bad_assign_target(other)),
        }
    }

    fn emit_postfix_store(&mut self, post: &PostfixExpr) -> Result<(), CompileError> {
        let (last, prefix) = match post.segments.split_last() {
            Some(pair) => pair,
            None => return Err(CompileError::internal("postfix without segments")),
        };
        match last {
            Segment::Attr(attr) => {
                // Stack: value, object.
                self.emit(&post.head)?;
                for seg in prefix {
                    self.emit_segment(seg)?;
                }
                let idx = self.unit.add_const(Const::Name(attr.clone()));
                self.emit_op(Op::StoreAttr(idx));
                Ok(())
            }
            Segment::Index(index) => {
                // Stack: value, array, index.
                self.emit(&post.head)?;
                for seg in prefix {
                    self.emit_segment(seg)?;
                }
                self.emit(index)?;
                self.emit_op(Op::SetArrayItem);
                Ok(())
            }
            Segment::Call(_) => Err(CompileError::bad_assign_target(&Node::Postfix(post.clone()))),
        }
    }

    fn emit_segment(&mut self, seg: &Segment) -> Result<(), CompileError> {
        match seg {
            Segment::Call(args) => {
                for arg in args {
                    self.emit(arg)?;
                }
                self.emit_op(Op::CallFunction(args.len()));
                Ok(())
            }
            Segment::Index(index) => {
                self.emit(index)?;
                self.emit_op(Op::GetArrayItem);
                Ok(())
            }
            Segment::Attr(attr) => {
                let idx = self.unit.add_const(Const::Name(attr.clone()));
                self.emit_op(Op::LoadAttr(idx));
                Ok(())
            }
        }
    }

    fn emit_def(&mut self, def: &DefExpr) -> Result<(), CompileError> {
        if def.frame_size < 0 {
            return Err(CompileError::internal(format!(
                "unresolved function '{}'",
                def.name.name
            )));
        }
        let mut body = Emitter::new();
        body.emit(&def.body)?;

        let name_idx = self.unit.add_const(Const::Str(def.name.name.clone()));
        let code_idx = self.unit.add_const(Const::Code(Rc::new(body.finish())));
        self.emit_op(Op::LoadConst(name_idx));
        self.emit_op(Op::LoadConst(code_idx));
        self.emit_op(Op::MakeFunction(def.frame_size as usize));
        self.emit_store(&Node::Name(def.name.clone()))
    }

    fn emit_class(&mut self, class: &ClassDefExpr) -> Result<(), CompileError> {
        let mut body = Emitter::new();
        for member in &class.members {
            body.emit(member)?;
        }
        let code_idx = self.unit.add_const(Const::Code(Rc::new(body.finish())));

        // MAKE_CLASS pops the parent (or null) and then the class name.
        let name_idx = self.unit.add_const(Const::Str(class.name.clone()));
        self.emit_op(Op::LoadConst(name_idx));
        match &class.parent {
            Some(parent) => self.emit_load(parent),
            None => {
                let null_idx = self.unit.add_const(Const::Null);
                self.emit_op(Op::LoadConst(null_idx));
            }
        }
        self.emit_op(Op::MakeClass(code_idx));

        // Class names always bind dynamically.
        let store_idx = self.unit.add_const(Const::Name(class.name.clone()));
        self.emit_op(Op::StoreNested(store_idx));
        Ok(())
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Emitter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::resolve::resolve_program;
    use crate::frontend::parser::Parser;

    fn compile(source: &str) -> CodeUnit {
        let mut stmts = Parser::from_source(source).parse().unwrap();
        resolve_program(&mut stmts).unwrap();
        compile_program(&stmts).unwrap()
    }

    fn name_idx(unit: &CodeUnit, name: &str) -> usize {
        unit.consts
            .iter()
            .position(|c| *c == Const::Name(name.to_string()))
            .unwrap()
    }

    #[test]
    fn test_arithmetic_emits_right_then_left() {
        let unit = compile("1 + 2 * 3");
        assert_eq!(
            unit.consts,
            vec![Const::Num(3), Const::Num(2), Const::Num(1)]
        );
        assert_eq!(
            unit.ops,
            vec![
                Op::LoadConst(0),
                Op::LoadConst(1),
                Op::BinaryOp(BinOp::Mul),
                Op::LoadConst(2),
                Op::BinaryOp(BinOp::Add),
            ]
        );
    }

    #[test]
    fn test_if_without_else_jumps_over_then() {
        let unit = compile("if a { 1 }");
        let a = name_idx(&unit, "a");
        assert_eq!(
            unit.ops,
            vec![
                Op::LoadNested(a),
                Op::JumpIfFalse(1),
                Op::LoadConst(1),
            ]
        );
    }

    #[test]
    fn test_if_else_jump_offsets() {
        let unit = compile("if a { 1 } else { 2 }");
        let a = name_idx(&unit, "a");
        assert_eq!(unit.ops[0], Op::LoadNested(a));
        // Skip the then block and its exit jump.
        assert_eq!(unit.ops[1], Op::JumpIfFalse(2));
        assert_eq!(unit.ops[3], Op::JumpFront(1));
        assert_eq!(unit.ops.len(), 5);
    }

    #[test]
    fn test_while_loop_jump_arithmetic() {
        let unit = compile("a = 3\nwhile a > 0 { a = a - 1 }");
        // Layout: 2 store ops, 3 condition ops, JUMP_IF_FALSE, 4 body ops,
        // JUMP_FRONT back to the condition.
        assert_eq!(unit.ops.len(), 11);
        assert_eq!(unit.ops[5], Op::JumpIfFalse(5));
        assert_eq!(unit.ops[10], Op::JumpFront(-9));
    }

    #[test]
    fn test_chained_assignment_reuses_stored_value() {
        let unit = compile("a = b = 7");
        let a = name_idx(&unit, "a");
        let b = name_idx(&unit, "b");
        assert_eq!(
            unit.ops,
            vec![
                Op::LoadConst(0),
                Op::StoreNested(b),
                Op::StoreNested(a),
            ]
        );
    }

    #[test]
    fn test_function_definition_nests_a_unit() {
        let unit = compile("def inc(x) { x + 1 }");
        assert_eq!(
            unit.ops,
            vec![
                Op::LoadConst(0),
                Op::LoadConst(1),
                Op::MakeFunction(1),
                Op::StoreNested(2),
            ]
        );
        assert_eq!(unit.consts[0], Const::Str("inc".to_string()));
        assert_eq!(unit.consts[2], Const::Name("inc".to_string()));
        match &unit.consts[1] {
            Const::Code(body) => {
                assert_eq!(
                    body.ops,
                    vec![
                        Op::LoadConst(0),
                        Op::LoadLocal(0, 0),
                        Op::BinaryOp(BinOp::Add),
                    ]
                );
            }
            other => panic!("expected code const, got {:?}", other),
        }
    }

    #[test]
    fn test_call_emits_args_then_dispatch() {
        let unit = compile("f(1, 2)");
        let f = name_idx(&unit, "f");
        assert_eq!(
            unit.ops,
            vec![
                Op::LoadNested(f),
                Op::LoadConst(1),
                Op::LoadConst(2),
                Op::CallFunction(2),
            ]
        );
    }

    #[test]
    fn test_class_pushes_name_then_parent() {
        let unit = compile("class Point {\nx = 0\n}");
        assert_eq!(unit.ops.len(), 4);
        assert_eq!(unit.ops[2], Op::MakeClass(0));
        match (&unit.ops[0], &unit.ops[1]) {
            (Op::LoadConst(name), Op::LoadConst(null)) => {
                assert_eq!(unit.consts[*name], Const::Str("Point".to_string()));
                assert_eq!(unit.consts[*null], Const::Null);
            }
            other => panic!("unexpected prologue {:?}", other),
        }
        assert_eq!(unit.ops[3], Op::StoreNested(name_idx(&unit, "Point")));
    }

    #[test]
    fn test_attribute_store_order() {
        let unit = compile("p.x = 3");
        let p = name_idx(&unit, "p");
        let x = name_idx(&unit, "x");
        assert_eq!(
            unit.ops,
            vec![Op::LoadConst(0), Op::LoadNested(p), Op::StoreAttr(x)]
        );
    }

    #[test]
    fn test_element_store_order() {
        let unit = compile("a[i] = 9");
        let a = name_idx(&unit, "a");
        let i = name_idx(&unit, "i");
        assert_eq!(
            unit.ops,
            vec![
                Op::LoadConst(0),
                Op::LoadNested(a),
                Op::LoadNested(i),
                Op::SetArrayItem,
            ]
        );
    }

    #[test]
    fn test_array_literal() {
        let unit = compile("[1, 2, 3]");
        assert_eq!(unit.ops.len(), 4);
        assert_eq!(unit.ops[3], Op::MakeArray(3));
    }

    #[test]
    fn test_bad_assignment_target_is_rejected() {
        let mut stmts = Parser::from_source("1 = 2").parse().unwrap();
        resolve_program(&mut stmts).unwrap();
        let err = compile_program(&stmts).unwrap_err();
        assert!(matches!(err, CompileError::BadAssignTarget { .. }));

        let mut stmts = Parser::from_source("f() = 2").parse().unwrap();
        resolve_program(&mut stmts).unwrap();
        let err = compile_program(&stmts).unwrap_err();
        assert!(matches!(err, CompileError::BadAssignTarget { .. }));
    }
}
