use crate::bytecode::ir::{CodeUnit, Const};
use crate::bytecode::op::Op;

/// Print disassembly of a compiled unit and every nested unit.
pub fn print_unit(unit: &CodeUnit) {
    println!("=== BYTECODE ===\n");
    print_code_unit("main", unit, 0);
}

fn print_code_unit(name: &str, unit: &CodeUnit, indent: usize) {
    let prefix = "  ".repeat(indent);

    println!("{}════════════════════════════════════════", prefix);
    println!("{} {}", prefix, name);
    println!(
        "{} {} instructions, {} constants",
        prefix,
        unit.ops.len(),
        unit.consts.len()
    );
    println!("{}════════════════════════════════════════", prefix);
    print!("{}", disassemble_to_string(unit, indent));
    println!();

    // Nested units, in pool order.
    for (idx, c) in unit.consts.iter().enumerate() {
        if let Const::Code(inner) = c {
            print_code_unit(&format!("code[{}]", idx), inner, indent + 1);
        }
    }
}

/// Render one unit's instruction listing, marking jump targets.
pub fn disassemble_to_string(unit: &CodeUnit, indent: usize) -> String {
    let jump_targets = collect_jump_targets(&unit.ops);
    let prefix = "  ".repeat(indent);
    let mut out = String::new();

    for (ip, op) in unit.ops.iter().enumerate() {
        let marker = if jump_targets.contains(&ip) { "► " } else { "  " };
        out.push_str(&format!(
            "{}{:04} {}{}\n",
            prefix,
            ip,
            marker,
            render_op(unit, ip, op)
        ));
    }
    out
}

fn collect_jump_targets(ops: &[Op]) -> Vec<usize> {
    let mut targets = Vec::new();
    for (ip, op) in ops.iter().enumerate() {
        let offset = match op {
            Op::JumpIfFalse(offset) | Op::JumpFront(offset) => *offset,
            _ => continue,
        };
        let target = (ip as i32 + 1 + offset) as usize;
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

fn render_op(unit: &CodeUnit, ip: usize, op: &Op) -> String {
    match op {
        Op::LoadConst(idx) => format!("LOAD_CONST      {} ({})", idx, render_const(unit, *idx)),
        Op::StoreNested(idx) => format!("STORE_NESTED    {} ({})", idx, render_const(unit, *idx)),
        Op::LoadNested(idx) => format!("LOAD_NESTED     {} ({})", idx, render_const(unit, *idx)),
        Op::LoadLocal(slot, level) => format!("LOAD_LOCAL      {} {}", slot, level),
        Op::StoreLocal(slot, level) => format!("STORE_LOCAL     {} {}", slot, level),
        Op::BinaryOp(bin) => format!("BINARY_OP       {}", bin.symbol()),
        Op::Negative => "NEGATIVE".to_string(),
        Op::JumpIfFalse(offset) => {
            format!("JUMP_IF_FALSE   {} (→ {})", offset, ip as i32 + 1 + offset)
        }
        Op::JumpFront(offset) => {
            format!("JUMP_FRONT      {} (→ {})", offset, ip as i32 + 1 + offset)
        }
        Op::MakeFunction(size) => format!("MAKE_FUNCTION   {}", size),
        Op::CallFunction(argc) => format!("CALL_FUNCTION   {}", argc),
        Op::MakeClass(idx) => format!("MAKE_CLASS      {}", idx),
        Op::StoreAttr(idx) => format!("STORE_ATTR      {} ({})", idx, render_const(unit, *idx)),
        Op::LoadAttr(idx) => format!("LOAD_ATTR       {} ({})", idx, render_const(unit, *idx)),
        Op::MakeArray(len) => format!("MAKE_ARRAY      {}", len),
        Op::GetArrayItem => "GET_ARRAY_ITEM".to_string(),
        Op::SetArrayItem => "SET_ARRAY_ITEM".to_string(),
    }
}

fn render_const(unit: &CodeUnit, idx: usize) -> String {
    match unit.consts.get(idx) {
        Some(Const::Null) => "null".to_string(),
        Some(Const::Num(n)) => n.to_string(),
        Some(Const::Str(s)) => format!("{:?}", s),
        Some(Const::Name(n)) => format!("name {}", n),
        Some(Const::Code(inner)) => format!("code, {} ops", inner.ops.len()),
        None => "?".to_string(),
    }
}

/// Count instructions across a unit and every nested unit.
pub fn count_ops(unit: &CodeUnit) -> usize {
    let mut total = unit.ops.len();
    for c in &unit.consts {
        if let Const::Code(inner) = c {
            total += count_ops(inner);
        }
    }
    total
}
