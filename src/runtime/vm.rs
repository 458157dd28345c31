use std::rc::Rc;

use crate::bytecode::verify::check_unit;
use crate::bytecode::{BinOp, CodeUnit, Const, Op};
use crate::lang::env::{self, Env, EnvRef, Receiver};
use crate::lang::value::{ClassInfo, FnBody, Function, Instance, Value};
use crate::runtime::runtime_error::RuntimeError;

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub max_call_depth: usize,
    pub max_steps: Option<usize>,
    pub max_stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_call_depth: 1000,
            max_steps: None,
            max_stack_size: 10_000,
        }
    }
}

/// The bytecode interpreter. One `Vm` can run any number of units; the
/// safety counters reset on each top-level [`Vm::run`].
///
/// There is no return instruction: a unit's result is whatever sits on top
/// of its operand stack when the instruction pointer runs off the end, and
/// an empty stack yields null. Calls recurse into a nested execution with a
/// fresh stack, so language-level call depth is bounded by `max_call_depth`
/// rather than by the host stack alone.
pub struct Vm {
    config: VmConfig,
    call_depth: usize,
    steps: usize,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Vm {
            config,
            call_depth: 0,
            steps: 0,
        }
    }

    /// Verify and execute a top-level unit against `env`.
    pub fn run(&mut self, unit: &CodeUnit, env: &EnvRef) -> Result<Value, RuntimeError> {
        check_unit(unit).map_err(|e| RuntimeError::new(&e.message))?;
        self.steps = 0;
        self.call_depth = 0;
        self.exec_unit(unit, env)
    }

    fn check_limits(&mut self, stack: &[Value]) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::new(&format!(
                    "execution step limit exceeded ({})",
                    max
                )));
            }
        }

        if stack.len() > self.config.max_stack_size {
            return Err(RuntimeError::new(&format!(
                "stack size limit exceeded ({})",
                self.config.max_stack_size
            )));
        }

        Ok(())
    }

    fn exec_unit(&mut self, unit: &CodeUnit, env: &EnvRef) -> Result<Value, RuntimeError> {
        let mut stack: Vec<Value> = Vec::new();
        let mut ip: i64 = 0;

        while (ip as usize) < unit.ops.len() {
            let op = unit.ops[ip as usize];
            ip += 1;
            self.check_limits(&stack)?;

            match op {
                Op::LoadConst(idx) => {
                    stack.push(const_value(unit, idx)?);
                }
                Op::StoreNested(idx) => {
                    let name = name_const(unit, idx)?;
                    let val = pop(&mut stack)?;
                    env::set_val(env, name, val.clone());
                    stack.push(val);
                }
                Op::LoadNested(idx) => {
                    let name = name_const(unit, idx)?;
                    match env::get_val(env, name) {
                        Some(val) => stack.push(val),
                        None => {
                            eprintln!("warning: '{}' is not assigned", name);
                            stack.push(Value::Null);
                        }
                    }
                }
                Op::LoadLocal(slot, level) => {
                    let val = env::get_local(env, level, slot).ok_or_else(|| {
                        RuntimeError::internal(&format!("no local at slot {} level {}", slot, level))
                    })?;
                    stack.push(val);
                }
                Op::StoreLocal(slot, level) => {
                    let val = pop(&mut stack)?;
                    if !env::set_local(env, level, slot, val.clone()) {
                        return Err(RuntimeError::internal(&format!(
                            "no local at slot {} level {}",
                            slot, level
                        )));
                    }
                    stack.push(val);
                }
                Op::BinaryOp(bin) => {
                    let left = pop(&mut stack)?;
                    let right = pop(&mut stack)?;
                    stack.push(apply_binop(bin, &left, &right)?);
                }
                Op::Negative => match pop(&mut stack)? {
                    Value::Number(n) => stack.push(Value::Number(-n)),
                    other => {
                        return Err(RuntimeError::type_error("number", other.type_name()));
                    }
                },
                Op::JumpIfFalse(offset) => {
                    let cond = pop(&mut stack)?;
                    if !cond.truthy() {
                        ip += offset as i64;
                    }
                }
                Op::JumpFront(offset) => {
                    ip += offset as i64;
                }
                Op::MakeFunction(frame_size) => {
                    let code = match pop(&mut stack)? {
                        Value::Code(code) => code,
                        other => {
                            return Err(RuntimeError::type_error("code", other.type_name()));
                        }
                    };
                    let name = match pop(&mut stack)? {
                        Value::Str(name) => name,
                        other => {
                            return Err(RuntimeError::type_error("string", other.type_name()));
                        }
                    };
                    stack.push(Value::Function(Rc::new(Function {
                        name,
                        body: FnBody::Code(code),
                        env: env.clone(),
                        frame_size,
                    })));
                }
                Op::CallFunction(argc) => {
                    let mut args = Vec::with_capacity(argc);
                    for _ in 0..argc {
                        args.push(pop(&mut stack)?);
                    }
                    args.reverse();
                    let callee = pop(&mut stack)?;
                    stack.push(self.call_value(callee, args)?);
                }
                Op::MakeClass(code_idx) => {
                    let body = code_const(unit, code_idx)?;
                    let parent = pop(&mut stack)?;
                    if parent != Value::Null {
                        return Err(RuntimeError::not_implemented("class inheritance"));
                    }
                    let name = match pop(&mut stack)? {
                        Value::Str(name) => name,
                        other => {
                            return Err(RuntimeError::type_error("string", other.type_name()));
                        }
                    };

                    let members = Env::new_class(None);
                    self.exec_unit(&body, &members)
                        .map_err(|e| e.with_context(&format!("class {}", name)))?;
                    let class = Rc::new(ClassInfo {
                        name,
                        members: members.clone(),
                    });
                    env::set_receiver(&members, Receiver::Class(Rc::downgrade(&class)));
                    stack.push(Value::Class(class));
                }
                Op::StoreAttr(idx) => {
                    let name = name_const(unit, idx)?;
                    let target = pop(&mut stack)?;
                    let val = pop(&mut stack)?;
                    match &target {
                        Value::Instance(inst) => env::set_val(&inst.fields, name, val.clone()),
                        Value::Class(class) => env::set_val(&class.members, name, val.clone()),
                        other => {
                            return Err(RuntimeError::type_error(
                                "instance or class",
                                other.type_name(),
                            ));
                        }
                    }
                    stack.push(val);
                }
                Op::LoadAttr(idx) => {
                    let name = name_const(unit, idx)?;
                    let target = pop(&mut stack)?;
                    stack.push(load_attr(&target, name)?);
                }
                Op::MakeArray(len) => {
                    let mut elems = Vec::with_capacity(len);
                    for _ in 0..len {
                        elems.push(pop(&mut stack)?);
                    }
                    elems.reverse();
                    stack.push(Value::array(elems));
                }
                Op::GetArrayItem => {
                    let index = pop_index(&mut stack)?;
                    let array = pop_array(&mut stack)?;
                    let elems = array.borrow();
                    let val = index_checked(&elems, index)?;
                    stack.push(val);
                }
                Op::SetArrayItem => {
                    let index = pop_index(&mut stack)?;
                    let array = pop_array(&mut stack)?;
                    let val = pop(&mut stack)?;
                    {
                        let mut elems = array.borrow_mut();
                        let len = elems.len();
                        let slot = elems
                            .get_mut(index_in_bounds(index, len)?)
                            .ok_or_else(|| RuntimeError::index_out_of_bounds(index, len))?;
                        *slot = val.clone();
                    }
                    stack.push(val);
                }
            }
        }

        Ok(stack.pop().unwrap_or(Value::Null))
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(func) => {
                let frame = Env::new_fun(func.frame_size, Some(func.env.clone()));
                bind_args(&frame, &args, 0)?;
                self.call_code(&func, &frame)
            }
            Value::Method(func, inst) => {
                let frame = Env::new_fun(func.frame_size, Some(func.env.clone()));
                env::set_local(&frame, 0, 0, Value::Instance(inst));
                bind_args(&frame, &args, 1)?;
                self.call_code(&func, &frame)
            }
            // Constructing an instance; call arguments are ignored, the
            // constructor always takes zero of its own.
            Value::Class(class) => self.construct(&class),
            other => Err(RuntimeError::not_callable(other.type_name())),
        }
    }

    fn construct(&mut self, class: &Rc<ClassInfo>) -> Result<Value, RuntimeError> {
        let fields = Env::new_class(Some(class.members.clone()));
        let inst = Rc::new(Instance {
            class_name: class.name.clone(),
            fields: fields.clone(),
        });
        env::set_receiver(&fields, Receiver::Instance(Rc::downgrade(&inst)));

        // A function stored under the class's own name is its constructor;
        // a class without one constructs bare.
        match env::get_val(&class.members, &class.name) {
            Some(Value::Function(ctor)) => {
                let frame = Env::new_fun(ctor.frame_size, Some(ctor.env.clone()));
                env::set_local(&frame, 0, 0, Value::Instance(inst.clone()));
                self.call_code(&ctor, &frame)?;
            }
            Some(other) => {
                return Err(RuntimeError::type_error("function", other.type_name())
                    .with_context(&format!("constructor of {}", class.name)));
            }
            None => {}
        }

        Ok(Value::Instance(inst))
    }

    fn call_code(&mut self, func: &Function, frame: &EnvRef) -> Result<Value, RuntimeError> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(RuntimeError::new(&format!(
                "call depth limit exceeded ({})",
                self.config.max_call_depth
            )));
        }
        let code = match &func.body {
            FnBody::Code(code) => code.clone(),
            FnBody::Ast { .. } => {
                return Err(RuntimeError::internal(&format!(
                    "function '{}' has no compiled body",
                    func.name
                )));
            }
        };
        self.call_depth += 1;
        let result = self
            .exec_unit(&code, frame)
            .map_err(|e| e.with_context(&func.name));
        self.call_depth -= 1;
        result
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    stack
        .pop()
        .ok_or_else(|| RuntimeError::internal("operand stack underflow"))
}

fn pop_index(stack: &mut Vec<Value>) -> Result<i64, RuntimeError> {
    match pop(stack)? {
        Value::Number(n) => Ok(n),
        other => Err(RuntimeError::type_error("number", other.type_name())),
    }
}

fn pop_array(
    stack: &mut Vec<Value>,
) -> Result<Rc<std::cell::RefCell<Vec<Value>>>, RuntimeError> {
    match pop(stack)? {
        Value::Array(a) => Ok(a),
        other => Err(RuntimeError::type_error("array", other.type_name())),
    }
}

fn index_in_bounds(index: i64, len: usize) -> Result<usize, RuntimeError> {
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::index_out_of_bounds(index, len));
    }
    Ok(index as usize)
}

fn index_checked(elems: &[Value], index: i64) -> Result<Value, RuntimeError> {
    Ok(elems[index_in_bounds(index, elems.len())?].clone())
}

fn bind_args(frame: &EnvRef, args: &[Value], first_slot: usize) -> Result<(), RuntimeError> {
    for (i, arg) in args.iter().enumerate() {
        if !env::set_local(frame, 0, first_slot + i, arg.clone()) {
            return Err(RuntimeError::new(&format!(
                "too many arguments ({} given)",
                args.len()
            )));
        }
    }
    Ok(())
}

fn const_value(unit: &CodeUnit, idx: usize) -> Result<Value, RuntimeError> {
    match unit.consts.get(idx) {
        Some(Const::Null) => Ok(Value::Null),
        Some(Const::Num(n)) => Ok(Value::Number(*n)),
        Some(Const::Str(s)) => Ok(Value::Str(s.clone())),
        Some(Const::Name(n)) => Ok(Value::Str(n.clone())),
        Some(Const::Code(code)) => Ok(Value::Code(code.clone())),
        None => Err(RuntimeError::internal(&format!(
            "constant index {} out of bounds",
            idx
        ))),
    }
}

fn name_const(unit: &CodeUnit, idx: usize) -> Result<&str, RuntimeError> {
    match unit.consts.get(idx) {
        Some(Const::Name(n)) => Ok(n),
        _ => Err(RuntimeError::internal(&format!(
            "constant {} is not a name",
            idx
        ))),
    }
}

fn code_const(unit: &CodeUnit, idx: usize) -> Result<Rc<CodeUnit>, RuntimeError> {
    match unit.consts.get(idx) {
        Some(Const::Code(code)) => Ok(code.clone()),
        _ => Err(RuntimeError::internal(&format!(
            "constant {} is not code",
            idx
        ))),
    }
}

/// Attribute read; a function read off an instance comes back bound as a
/// method.
pub(crate) fn load_attr(target: &Value, name: &str) -> Result<Value, RuntimeError> {
    match target {
        Value::Instance(inst) => match env::get_val(&inst.fields, name) {
            Some(Value::Function(func)) => Ok(Value::Method(func, inst.clone())),
            Some(val) => Ok(val),
            None => Err(RuntimeError::no_attribute(
                &format!("instance of {}", inst.class_name),
                name,
            )),
        },
        Value::Class(class) => env::get_val(&class.members, name)
            .ok_or_else(|| RuntimeError::no_attribute(&format!("class {}", class.name), name)),
        other => Err(RuntimeError::type_error(
            "instance or class",
            other.type_name(),
        )),
    }
}

/// Shared by the VM and the tree-walk evaluator.
pub fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    use Value::{Bool, Number, Str};

    match op {
        BinOp::Eq => return Ok(Bool(left == right)),
        BinOp::Ne => return Ok(Bool(left != right)),
        _ => {}
    }

    match (left, right) {
        (Number(a), Number(b)) => match op {
            BinOp::Add => Ok(Number(a + b)),
            BinOp::Sub => Ok(Number(a - b)),
            BinOp::Mul => Ok(Number(a * b)),
            BinOp::Div => {
                if *b == 0 {
                    Err(RuntimeError::division_by_zero())
                } else {
                    Ok(Number(a / b))
                }
            }
            BinOp::Mod => {
                if *b == 0 {
                    Err(RuntimeError::division_by_zero())
                } else {
                    Ok(Number(a % b))
                }
            }
            BinOp::Lt => Ok(Bool(a < b)),
            BinOp::Gt => Ok(Bool(a > b)),
            BinOp::Le => Ok(Bool(a <= b)),
            BinOp::Ge => Ok(Bool(a >= b)),
            BinOp::Eq | BinOp::Ne => unreachable!(),
        },
        (Str(a), Str(b)) => match op {
            BinOp::Add => Ok(Str(format!("{}{}", a, b))),
            BinOp::Lt => Ok(Bool(a < b)),
            BinOp::Gt => Ok(Bool(a > b)),
            BinOp::Le => Ok(Bool(a <= b)),
            BinOp::Ge => Ok(Bool(a >= b)),
            _ => Err(RuntimeError::new(&format!(
                "operator '{}' not supported for strings",
                op.symbol()
            ))),
        },
        _ => Err(RuntimeError::new(&format!(
            "operator '{}' not supported for {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}
