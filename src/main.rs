mod bytecode;
mod frontend;
mod lang;
mod runtime;

use std::{env, fs, path::Path};

use crate::bytecode::compile::compile_program;
use crate::bytecode::disasm::{count_ops, print_unit};
use crate::bytecode::ir::CodeUnit;
use crate::bytecode::resolve::resolve_program;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::frontend::token_dumper::TokenDumper;
use crate::lang::env::Env;
use crate::lang::value::Value;
use crate::runtime::eval::eval_program;
use crate::runtime::vm::Vm;

fn main() {
    let args: Vec<String> = env::args().collect();

    let tokens_only = args.contains(&"--tokens".to_string());
    let no_color = args.contains(&"--no-color".to_string());
    let ast = args.contains(&"--ast".to_string());
    let tree = args.contains(&"--tree".to_string());
    let disasm = args.contains(&"--disasm".to_string());
    let compile_only = args.contains(&"--compile".to_string());

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage();
        return;
    }

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    let filename = match filename {
        Some(filename) => filename,
        None => {
            print_usage();
            return;
        }
    };

    match extension(filename) {
        Some("sl") => run_source_file(filename, tokens_only, no_color, ast, tree, disasm, compile_only),
        Some("slc") => run_compiled_file(filename, disasm),
        _ => {
            eprintln!("Error: expected a .sl or .slc file, got {}", filename);
            std::process::exit(1);
        }
    }
}

fn extension(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|e| e.to_str())
}

fn print_usage() {
    println!("SLATE - a small class-based scripting language");
    println!();
    println!("Usage:");
    println!("  slate <file.sl>             Compile and run a program");
    println!("  slate <file.slc>            Run a compiled program");
    println!("  slate --tokens <file.sl>    Show tokens only");
    println!("  slate --ast <file.sl>       Show the parsed tree");
    println!("  slate --tree <file.sl>      Run with the tree-walk evaluator");
    println!("  slate --disasm <file>       Show disassembly instead of running");
    println!("  slate --compile <file.sl>   Write <file.slc> and exit");
    println!("  slate --no-color            Disable ANSI colors in token dump");
    println!("  slate --help, -h            Show this help");
}

fn run_source_file(
    filename: &str,
    tokens_only: bool,
    no_color: bool,
    ast: bool,
    tree: bool,
    disasm: bool,
    compile_only: bool,
) {
    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            std::process::exit(1);
        }
    };

    if tokens_only {
        dump_tokens(&source, no_color);
        return;
    }

    let mut stmts = match Parser::from_source(&source).parse() {
        Ok(stmts) => stmts,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            std::process::exit(1);
        }
    };

    if ast {
        for stmt in &stmts {
            println!("{}", stmt);
        }
        return;
    }

    if tree {
        match eval_program(&stmts, &Env::new_nested(None)) {
            Ok(result) => print_result(&result),
            Err(e) => {
                eprintln!("Runtime error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = resolve_program(&mut stmts) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let unit = match compile_program(&stmts) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("Compile error: {}", e);
            std::process::exit(1);
        }
    };

    if disasm {
        print_unit(&unit);
        println!("{} instructions total", count_ops(&unit));
        return;
    }

    if compile_only {
        write_compiled(filename, &unit);
        return;
    }

    run_unit(&unit);
}

fn run_compiled_file(filename: &str, disasm: bool) {
    let bytes = match fs::read(filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            std::process::exit(1);
        }
    };

    let unit = match CodeUnit::from_bytes(&bytes) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("Failed to load '{}': {}", filename, e);
            std::process::exit(1);
        }
    };

    if disasm {
        print_unit(&unit);
        println!("{} instructions total", count_ops(&unit));
        return;
    }

    run_unit(&unit);
}

fn run_unit(unit: &CodeUnit) {
    let global = Env::new_nested(None);
    match Vm::new().run(unit, &global) {
        Ok(result) => print_result(&result),
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_result(result: &Value) {
    if *result != Value::Null {
        println!("{}", result);
    }
}

fn write_compiled(filename: &str, unit: &CodeUnit) {
    let out = Path::new(filename).with_extension("slc");
    let bytes = match unit.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to serialize: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = fs::write(&out, bytes) {
        eprintln!("Failed to write '{}': {}", out.display(), e);
        std::process::exit(1);
    }
    println!("wrote {}", out.display());
}

fn dump_tokens(source: &str, no_color: bool) {
    let mut lexer = Lexer::new(source);

    match lexer.tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            dumper.dump(&tokens);
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            std::process::exit(1);
        }
    }
}
