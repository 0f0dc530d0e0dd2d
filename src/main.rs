use std::process;

fn main() {
    let mut dump_ir = false;
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    args.retain(|arg| {
        if arg == "--dump-ir" {
            dump_ir = true;
            false
        } else {
            true
        }
    });

    if args.is_empty() {
        eprintln!("usage: lyre [--dump-ir] EXPR...");
        process::exit(2);
    }

    let source = args.join(" ");
    let program = match lyre::read_program(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            process::exit(1);
        }
    };

    let mut compiler = match lyre::Compiler::new() {
        Ok(compiler) => compiler,
        Err(e) => {
            eprintln!("JIT error: {}", e);
            process::exit(1);
        }
    };
    compiler.dump_ir(dump_ir);

    match compiler.run(&program) {
        Ok(result) => println!("{}", result),
        Err(e) => {
            eprintln!("Compile error: {}", e);
            process::exit(1);
        }
    }
}
