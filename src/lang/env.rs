use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::lang::value::{ClassInfo, Instance, Value};

pub type EnvRef = Rc<RefCell<Env>>;

/// Environment frame. Three kinds:
///
/// - `Nested`: a plain by-name frame (the global frame, and any frame where
///   names stay dynamic). Reads walk outward; writes land on the frame that
///   already holds the name, or define in the nearest by-name frame.
/// - `Class`: a by-name frame for a class body or an instance, carrying a
///   back reference to the object it belongs to so that `this` resolves.
/// - `Fun`: a slot-addressed call frame. Local access goes by (level, slot);
///   by-name access skips straight to the outer frame.
pub enum Env {
    Nested(NestedEnv),
    Class(ClassEnv),
    Fun(FunEnv),
}

pub struct NestedEnv {
    vals: HashMap<String, Value>,
    outer: Option<EnvRef>,
}

pub struct ClassEnv {
    vals: HashMap<String, Value>,
    outer: Option<EnvRef>,
    receiver: Receiver,
}

pub struct FunEnv {
    slots: Vec<Value>,
    outer: Option<EnvRef>,
}

/// What a class environment belongs to. Held weakly: the class/instance owns
/// its environment, so a strong pointer here would make a cycle.
#[derive(Clone)]
pub enum Receiver {
    Unset,
    Class(Weak<ClassInfo>),
    Instance(Weak<Instance>),
}

impl Env {
    pub fn new_nested(outer: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(Env::Nested(NestedEnv {
            vals: HashMap::new(),
            outer,
        })))
    }

    pub fn new_class(outer: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(Env::Class(ClassEnv {
            vals: HashMap::new(),
            outer,
            receiver: Receiver::Unset,
        })))
    }

    pub fn new_fun(frame_size: usize, outer: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(Env::Fun(FunEnv {
            slots: vec![Value::Null; frame_size],
            outer,
        })))
    }

    fn outer(&self) -> Option<EnvRef> {
        match self {
            Env::Nested(e) => e.outer.clone(),
            Env::Class(e) => e.outer.clone(),
            Env::Fun(e) => e.outer.clone(),
        }
    }

    fn local_get(&self, name: &str) -> Option<Value> {
        match self {
            Env::Nested(e) => e.vals.get(name).cloned(),
            Env::Class(e) => {
                if name == "this" {
                    return e.receiver.to_value();
                }
                e.vals.get(name).cloned()
            }
            // Fun frames hold no names; dynamic lookups pass through.
            Env::Fun(_) => None,
        }
    }

    /// Assign `name` in this frame if it is already present here; report
    /// whether the assignment happened.
    fn local_set_if_present(&mut self, name: &str, val: &Value) -> bool {
        match self {
            Env::Nested(e) => match e.vals.get_mut(name) {
                Some(slot) => {
                    *slot = val.clone();
                    true
                }
                None => false,
            },
            Env::Class(e) => match e.vals.get_mut(name) {
                Some(slot) => {
                    *slot = val.clone();
                    true
                }
                None => false,
            },
            Env::Fun(_) => false,
        }
    }
}

/// Read `name`, walking the frame chain outward. `None` when no frame holds
/// it.
pub fn get_val(env: &EnvRef, name: &str) -> Option<Value> {
    if let Some(v) = env.borrow().local_get(name) {
        return Some(v);
    }
    let outer = env.borrow().outer();
    match outer {
        Some(o) => get_val(&o, name),
        None => None,
    }
}

/// Write `name`: assign on the innermost frame that already holds it,
/// otherwise define it in the nearest by-name frame.
pub fn set_val(env: &EnvRef, name: &str, val: Value) {
    if try_set(env, name, &val) {
        return;
    }
    define_nearest(env, name, val);
}

fn try_set(env: &EnvRef, name: &str, val: &Value) -> bool {
    if env.borrow_mut().local_set_if_present(name, val) {
        return true;
    }
    let outer = env.borrow().outer();
    match outer {
        Some(o) => try_set(&o, name, val),
        None => false,
    }
}

fn define_nearest(env: &EnvRef, name: &str, val: Value) {
    let is_fun = matches!(&*env.borrow(), Env::Fun(_));
    if !is_fun {
        define(env, name, val);
        return;
    }
    let outer = env.borrow().outer();
    match outer {
        Some(o) => define_nearest(&o, name, val),
        None => define(env, name, val),
    }
}

/// Insert `name` directly into this frame, shadowing any outer binding.
/// Defining on a `Fun` frame is a misuse; those are slot-addressed.
pub fn define(env: &EnvRef, name: &str, val: Value) {
    match &mut *env.borrow_mut() {
        Env::Nested(e) => {
            e.vals.insert(name.to_string(), val);
        }
        Env::Class(e) => {
            e.vals.insert(name.to_string(), val);
        }
        Env::Fun(_) => {}
    }
}

/// Read slot `slot` of the `Fun` frame `level` hops out along the chain of
/// enclosing `Fun` frames. `None` when the chain is shorter than `level` or
/// the slot index is out of range.
pub fn get_local(env: &EnvRef, level: usize, slot: usize) -> Option<Value> {
    let frame = climb(env, level)?;
    let guard = frame.borrow();
    match &*guard {
        Env::Fun(e) => e.slots.get(slot).cloned(),
        _ => None,
    }
}

/// Write slot `slot` of the `Fun` frame `level` hops out. Reports success.
pub fn set_local(env: &EnvRef, level: usize, slot: usize, val: Value) -> bool {
    let frame = match climb(env, level) {
        Some(f) => f,
        None => return false,
    };
    let mut guard = frame.borrow_mut();
    match &mut *guard {
        Env::Fun(e) => match e.slots.get_mut(slot) {
            Some(s) => {
                *s = val;
                true
            }
            None => false,
        },
        _ => false,
    }
}

fn climb(env: &EnvRef, level: usize) -> Option<EnvRef> {
    let mut cur = env.clone();
    for _ in 0..level {
        let outer = cur.borrow().outer();
        cur = outer?;
    }
    if matches!(&*cur.borrow(), Env::Fun(_)) {
        Some(cur)
    } else {
        None
    }
}

/// Attach the class or instance a `Class` environment belongs to. No effect
/// on other frame kinds.
pub fn set_receiver(env: &EnvRef, receiver: Receiver) {
    if let Env::Class(e) = &mut *env.borrow_mut() {
        e.receiver = receiver;
    }
}

impl Receiver {
    fn to_value(&self) -> Option<Value> {
        match self {
            Receiver::Unset => None,
            Receiver::Class(w) => w.upgrade().map(Value::Class),
            Receiver::Instance(w) => w.upgrade().map(Value::Instance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_get_walks_outward() {
        let global = Env::new_nested(None);
        define(&global, "a", Value::Number(1));
        let inner = Env::new_nested(Some(global.clone()));
        define(&inner, "b", Value::Number(2));

        assert_eq!(get_val(&inner, "a"), Some(Value::Number(1)));
        assert_eq!(get_val(&inner, "b"), Some(Value::Number(2)));
        assert_eq!(get_val(&global, "b"), None);
        assert_eq!(get_val(&inner, "missing"), None);
    }

    #[test]
    fn test_set_assigns_where_found() {
        let global = Env::new_nested(None);
        define(&global, "a", Value::Number(1));
        let inner = Env::new_nested(Some(global.clone()));

        set_val(&inner, "a", Value::Number(9));
        assert_eq!(get_val(&global, "a"), Some(Value::Number(9)));
        // Inner frame did not grow a shadowing binding.
        assert_eq!(inner.borrow().local_get("a"), None);
    }

    #[test]
    fn test_set_defines_in_nearest_when_absent() {
        let global = Env::new_nested(None);
        let inner = Env::new_nested(Some(global.clone()));

        set_val(&inner, "fresh", Value::Number(7));
        assert_eq!(inner.borrow().local_get("fresh"), Some(Value::Number(7)));
        assert_eq!(global.borrow().local_get("fresh"), None);
    }

    #[test]
    fn test_fun_frame_skips_name_lookup_to_outer() {
        let global = Env::new_nested(None);
        define(&global, "g", Value::Number(3));
        let frame = Env::new_fun(2, Some(global.clone()));

        assert_eq!(get_val(&frame, "g"), Some(Value::Number(3)));
        // A by-name write from inside a call frame lands outside it.
        set_val(&frame, "h", Value::Number(4));
        assert_eq!(global.borrow().local_get("h"), Some(Value::Number(4)));
    }

    #[test]
    fn test_local_slots_by_level() {
        let global = Env::new_nested(None);
        let outer = Env::new_fun(1, Some(global));
        assert!(set_local(&outer, 0, 0, Value::Number(10)));
        let inner = Env::new_fun(2, Some(outer.clone()));
        assert!(set_local(&inner, 0, 1, Value::Number(20)));

        assert_eq!(get_val(&outer, "x"), None);
        assert_eq!(get_local(&inner, 0, 1), Some(Value::Number(20)));
        assert_eq!(get_local(&inner, 1, 0), Some(Value::Number(10)));
        assert_eq!(get_local(&inner, 0, 5), None);
        assert_eq!(get_local(&inner, 2, 0), None);
    }

    #[test]
    fn test_class_env_resolves_this_via_receiver() {
        let members = Env::new_class(None);
        let class = Rc::new(crate::lang::value::ClassInfo {
            name: "Point".to_string(),
            members: members.clone(),
        });
        set_receiver(&members, Receiver::Class(Rc::downgrade(&class)));

        match get_val(&members, "this") {
            Some(Value::Class(c)) => assert_eq!(c.name, "Point"),
            other => panic!("expected class receiver, got {:?}", other),
        }
    }
}
