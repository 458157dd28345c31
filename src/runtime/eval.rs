use std::rc::Rc;

use crate::bytecode::BinOp;
use crate::lang::env::{self, Env, EnvRef};
use crate::lang::node::{Node, PostfixExpr, Segment};
use crate::lang::value::{FnBody, Function, Value};
use crate::runtime::runtime_error::RuntimeError;
use crate::runtime::vm::{apply_binop, load_attr};

/// Direct AST interpreter, used by the REPL-less quick path (`--tree`) and
/// as a cross-check for the bytecode engine. It runs on unresolved trees:
/// every variable is addressed by name through nested environments, so the
/// resolver and emitter never enter the picture.
///
/// Classes are deliberately left to the bytecode engine; everything else
/// evaluates to the same results the VM produces.
pub struct Interp {
    max_depth: usize,
    depth: usize,
}

pub fn eval_program(stmts: &[Node], env: &EnvRef) -> Result<Value, RuntimeError> {
    let mut interp = Interp::new();
    let mut last = Value::Null;
    for stmt in stmts {
        last = interp.eval(stmt, env)?;
    }
    Ok(last)
}

impl Interp {
    pub fn new() -> Interp {
        Interp {
            max_depth: 1000,
            depth: 0,
        }
    }

    pub fn eval(&mut self, node: &Node, env: &EnvRef) -> Result<Value, RuntimeError> {
        match node {
            Node::Number(n) => Ok(Value::Number(*n)),
            Node::Str(s) => Ok(Value::Str(s.clone())),
            Node::Empty => Ok(Value::Null),
            Node::Name(name) => match env::get_val(env, &name.name) {
                Some(val) => Ok(val),
                None => {
                    eprintln!("warning: '{}' is not assigned", name.name);
                    Ok(Value::Null)
                }
            },
            Node::Binary(bin) => {
                if bin.op == "=" {
                    let val = self.eval(&bin.right, env)?;
                    self.assign(&bin.left, val, env)
                } else {
                    let left = self.eval(&bin.left, env)?;
                    let right = self.eval(&bin.right, env)?;
                    let op = BinOp::from_symbol(&bin.op).ok_or_else(|| {
                        RuntimeError::new(&format!("unknown operator '{}'", bin.op))
                    })?;
                    apply_binop(op, &left, &right)
                }
            }
            Node::Negate(inner) => match self.eval(inner, env)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(RuntimeError::type_error("number", other.type_name())),
            },
            Node::Block(stmts) => {
                let mut last = Value::Null;
                for stmt in stmts {
                    last = self.eval(stmt, env)?;
                }
                Ok(last)
            }
            Node::If(ifx) => {
                if self.eval(&ifx.cond, env)?.truthy() {
                    self.eval(&ifx.then, env)
                } else if let Some(els) = &ifx.els {
                    self.eval(els, env)
                } else {
                    Ok(Value::Null)
                }
            }
            Node::While(whx) => {
                let mut last = Value::Null;
                while self.eval(&whx.cond, env)?.truthy() {
                    last = self.eval(&whx.body, env)?;
                }
                Ok(last)
            }
            Node::Def(def) => {
                let func = Value::Function(Rc::new(Function {
                    name: def.name.name.clone(),
                    body: FnBody::Ast {
                        params: def.params.clone(),
                        block: Rc::new((*def.body).clone()),
                    },
                    env: env.clone(),
                    frame_size: 0,
                }));
                env::set_val(env, &def.name.name, func.clone());
                Ok(func)
            }
            Node::Class(class) => Err(RuntimeError::new(&format!(
                "class '{}' requires the bytecode engine",
                class.name
            ))),
            Node::Array(elems) => {
                let mut vals = Vec::with_capacity(elems.len());
                for elem in elems {
                    vals.push(self.eval(elem, env)?);
                }
                Ok(Value::array(vals))
            }
            Node::Postfix(post) => {
                let mut val = self.eval(&post.head, env)?;
                for seg in &post.segments {
                    val = self.eval_segment(val, seg, env)?;
                }
                Ok(val)
            }
        }
    }

    fn eval_segment(
        &mut self,
        target: Value,
        seg: &Segment,
        env: &EnvRef,
    ) -> Result<Value, RuntimeError> {
        match seg {
            Segment::Call(arg_nodes) => {
                let mut args = Vec::with_capacity(arg_nodes.len());
                for arg in arg_nodes {
                    args.push(self.eval(arg, env)?);
                }
                self.call(target, args)
            }
            Segment::Index(index) => {
                let index = match self.eval(index, env)? {
                    Value::Number(n) => n,
                    other => {
                        return Err(RuntimeError::type_error("number", other.type_name()));
                    }
                };
                match target {
                    Value::Array(array) => {
                        let elems = array.borrow();
                        if index < 0 || index as usize >= elems.len() {
                            return Err(RuntimeError::index_out_of_bounds(index, elems.len()));
                        }
                        Ok(elems[index as usize].clone())
                    }
                    other => Err(RuntimeError::type_error("array", other.type_name())),
                }
            }
            Segment::Attr(attr) => load_attr(&target, attr),
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let func = match callee {
            Value::Function(func) => func,
            other => return Err(RuntimeError::not_callable(other.type_name())),
        };
        let (params, block) = match &func.body {
            FnBody::Ast { params, block } => (params, block),
            FnBody::Code(_) => {
                return Err(RuntimeError::internal(&format!(
                    "function '{}' has a compiled body",
                    func.name
                )));
            }
        };
        if args.len() != params.len() {
            return Err(RuntimeError::new(&format!(
                "'{}' expects {} arguments, got {}",
                func.name,
                params.len(),
                args.len()
            )));
        }
        if self.depth >= self.max_depth {
            return Err(RuntimeError::new(&format!(
                "call depth limit exceeded ({})",
                self.max_depth
            )));
        }

        // Parameters live in a fresh frame under the captured environment
        // and shadow outer bindings of the same name.
        let frame = Env::new_nested(Some(func.env.clone()));
        for (param, arg) in params.iter().zip(args) {
            env::define(&frame, param, arg);
        }

        self.depth += 1;
        let result = self
            .eval(block, &frame)
            .map_err(|e| e.with_context(&func.name));
        self.depth -= 1;
        result
    }

    fn assign(&mut self, target: &Node, val: Value, env: &EnvRef) -> Result<Value, RuntimeError> {
        match target {
            Node::Name(name) => {
                if name.name == "this" {
                    return Err(RuntimeError::new("cannot assign to 'this'"));
                }
                env::set_val(env, &name.name, val.clone());
                Ok(val)
            }
            Node::Postfix(post) => self.assign_postfix(post, val, env),
            other => Err(RuntimeError::new(&format!("cannot assign to '{}'", other))),
        }
    }

    fn assign_postfix(
        &mut self,
        post: &PostfixExpr,
        val: Value,
        env: &EnvRef,
    ) -> Result<Value, RuntimeError> {
        let (last, prefix) = match post.segments.split_last() {
            Some(pair) => pair,
            None => return Err(RuntimeError::internal("postfix without segments")),
        };
        let mut target = self.eval(&post.head, env)?;
        for seg in prefix {
            target = self.eval_segment(target, seg, env)?;
        }
        match last {
            Segment::Index(index) => {
                let index = match self.eval(index, env)? {
                    Value::Number(n) => n,
                    other => {
                        return Err(RuntimeError::type_error("number", other.type_name()));
                    }
                };
                match target {
                    Value::Array(array) => {
                        let mut elems = array.borrow_mut();
                        let len = elems.len();
                        if index < 0 || index as usize >= len {
                            return Err(RuntimeError::index_out_of_bounds(index, len));
                        }
                        elems[index as usize] = val.clone();
                        Ok(val)
                    }
                    other => Err(RuntimeError::type_error("array", other.type_name())),
                }
            }
            Segment::Attr(attr) => match target {
                Value::Instance(inst) => {
                    env::set_val(&inst.fields, attr, val.clone());
                    Ok(val)
                }
                Value::Class(class) => {
                    env::set_val(&class.members, attr, val.clone());
                    Ok(val)
                }
                other => Err(RuntimeError::type_error(
                    "instance or class",
                    other.type_name(),
                )),
            },
            Segment::Call(_) => Err(RuntimeError::new("cannot assign to a call")),
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}
