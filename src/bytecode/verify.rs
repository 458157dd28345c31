use crate::bytecode::ir::{CodeUnit, Const};
use crate::bytecode::op::Op;

#[derive(Debug)]
pub struct VerifyError {
    pub message: String,
}

impl VerifyError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "verify error: {}", self.message)
    }
}

impl std::error::Error for VerifyError {}

/// Static checks run before execution: every constant index must be in
/// bounds and point at the right kind of pool entry, and every jump must
/// land inside the unit (one past the end counts as a normal exit). Nested
/// code units are checked recursively, so a verified top-level unit implies
/// verified function and class bodies.
///
/// NOTE: this is a linear scan, not control-flow analysis; stack depth is
/// left to the VM's own limits.
pub fn check_unit(unit: &CodeUnit) -> Result<(), VerifyError> {
    for (ip, op) in unit.ops.iter().enumerate() {
        match op {
            Op::LoadConst(idx) => {
                check_const(unit, ip, *idx)?;
            }
            Op::StoreNested(idx) | Op::LoadNested(idx) | Op::StoreAttr(idx) | Op::LoadAttr(idx) => {
                match check_const(unit, ip, *idx)? {
                    Const::Name(_) => {}
                    other => {
                        return Err(VerifyError::new(format!(
                            "ip={}: {} expects a name constant, found {:?}",
                            ip,
                            op.name(),
                            other
                        )));
                    }
                }
            }
            Op::MakeClass(idx) => match check_const(unit, ip, *idx)? {
                Const::Code(_) => {}
                other => {
                    return Err(VerifyError::new(format!(
                        "ip={}: MAKE_CLASS expects a code constant, found {:?}",
                        ip, other
                    )));
                }
            },
            Op::JumpIfFalse(offset) | Op::JumpFront(offset) => {
                let target = ip as i64 + 1 + *offset as i64;
                if target < 0 || target > unit.ops.len() as i64 {
                    return Err(VerifyError::new(format!(
                        "ip={}: jump target {} outside unit of {} ops",
                        ip,
                        target,
                        unit.ops.len()
                    )));
                }
            }
            Op::LoadLocal(_, _)
            | Op::StoreLocal(_, _)
            | Op::BinaryOp(_)
            | Op::Negative
            | Op::MakeFunction(_)
            | Op::CallFunction(_)
            | Op::MakeArray(_)
            | Op::GetArrayItem
            | Op::SetArrayItem => {}
        }
    }

    for c in &unit.consts {
        if let Const::Code(inner) = c {
            check_unit(inner)?;
        }
    }

    Ok(())
}

fn check_const<'a>(unit: &'a CodeUnit, ip: usize, idx: usize) -> Result<&'a Const, VerifyError> {
    unit.consts.get(idx).ok_or_else(|| {
        VerifyError::new(format!(
            "ip={}: constant index {} out of bounds ({} consts)",
            ip,
            idx,
            unit.consts.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_valid_unit_passes() {
        let mut unit = CodeUnit::new();
        let k = unit.add_const(Const::Num(1));
        let n = unit.add_const(Const::Name("a".to_string()));
        unit.ops = vec![Op::LoadConst(k), Op::StoreNested(n), Op::JumpIfFalse(0)];
        assert!(check_unit(&unit).is_ok());
    }

    #[test]
    fn test_const_index_out_of_bounds() {
        let mut unit = CodeUnit::new();
        unit.ops = vec![Op::LoadConst(3)];
        let err = check_unit(&unit).unwrap_err();
        assert!(err.message.contains("out of bounds"));
    }

    #[test]
    fn test_name_op_rejects_non_name_const() {
        let mut unit = CodeUnit::new();
        let k = unit.add_const(Const::Num(1));
        unit.ops = vec![Op::LoadNested(k)];
        let err = check_unit(&unit).unwrap_err();
        assert!(err.message.contains("name constant"));
    }

    #[test]
    fn test_jump_out_of_range() {
        let mut unit = CodeUnit::new();
        unit.ops = vec![Op::JumpFront(5)];
        let err = check_unit(&unit).unwrap_err();
        assert!(err.message.contains("jump target"));

        let mut unit = CodeUnit::new();
        unit.ops = vec![Op::JumpFront(-2)];
        assert!(check_unit(&unit).is_err());
    }

    #[test]
    fn test_jump_to_end_is_a_normal_exit() {
        let mut unit = CodeUnit::new();
        let k = unit.add_const(Const::Num(1));
        unit.ops = vec![Op::LoadConst(k), Op::JumpIfFalse(0)];
        assert!(check_unit(&unit).is_ok());
    }

    #[test]
    fn test_nested_units_are_checked() {
        let mut bad = CodeUnit::new();
        bad.ops = vec![Op::LoadConst(9)];

        let mut unit = CodeUnit::new();
        let code = unit.add_const(Const::Code(Rc::new(bad)));
        let name = unit.add_const(Const::Str("f".to_string()));
        unit.ops = vec![Op::LoadConst(name), Op::LoadConst(code), Op::MakeFunction(0)];
        assert!(check_unit(&unit).is_err());
    }
}
