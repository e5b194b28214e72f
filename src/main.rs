//! The `egel` command line driver: batch evaluation, one-shot commands, and
//! the interactive loop.

use std::env;
use std::process;

use egel::eval::Eval;
use egel::machine::Machine;
use egel::modules::{ModuleManager, Options};
use egel::repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const FALLBACK_INCLUDE: &str = "/usr/local/lib/egel";

fn print_usage() {
    eprintln!("Usage: egel [options] [filename] [arguments]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    -h, --help           display usage");
    eprintln!("    -v, --version        display version");
    eprintln!("    -,  --interact       interactive mode (default)");
    eprintln!("    -I, --include <dir>  add include directory");
    eprintln!("    -e, --eval <text>    evaluate command");
    eprintln!("    -T, --tokens         output all tokens (debug)");
    eprintln!("    -U, --unparse        output the parse tree (debug)");
    eprintln!("    -X, --check          output analyzed tree (debug)");
    eprintln!("    -D, --desugar        output desugared tree (debug)");
    eprintln!("    -C, --lift           output combinator lifted tree (debug)");
    eprintln!("    -B, --bytes          output bytecode (debug)");
}

fn print_version() {
    println!("egel {}", VERSION);
}

struct Arguments {
    options: Options,
    filename: Option<String>,
    command: Option<String>,
    app_args: Vec<String>,
}

fn parse_args() -> Result<Arguments, String> {
    let argv: Vec<String> = env::args().collect();
    let mut options = Options::new();
    let mut filename: Option<String> = None;
    let mut command = None;
    let mut app_args = Vec::new();
    let mut explicit_include = false;

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-" | "--interact" => options.interactive = true,
            "-I" | "--include" => {
                i += 1;
                let dir = argv.get(i).ok_or("missing directory after -I")?;
                options.add_include_path(dir);
                explicit_include = true;
            }
            "-e" | "--eval" => {
                i += 1;
                let text = argv.get(i).ok_or("missing text after -e")?;
                command = Some(text.clone());
            }
            "-T" | "--tokens" => options.dump_tokens = true,
            "-U" | "--unparse" => options.dump_parse = true,
            "-X" | "--check" => options.dump_identified = true,
            "-D" | "--desugar" => options.dump_desugared = true,
            "-C" | "--lift" => options.dump_lifted = true,
            "-B" | "--bytes" => options.dump_bytecode = true,
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {}", arg));
            }
            arg => {
                if filename.is_none() {
                    filename = Some(arg.to_string());
                } else {
                    app_args.push(arg.to_string());
                }
            }
        }
        i += 1;
    }

    // the local directory applies when no include was given; the
    // environment contributes either way
    if !explicit_include {
        options.add_include_path("./");
    }
    match env::var("EGEL_INCLUDE") {
        Ok(dir) => options.add_include_path(dir),
        Err(_) => options.add_include_path(FALLBACK_INCLUDE),
    }

    Ok(Arguments {
        options,
        filename,
        command,
        app_args,
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("EGEL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("options error: {}, try -h.", e);
            process::exit(1);
        }
    };

    let machine = Machine::new();
    {
        let mut app_args = Vec::new();
        if let Some(f) = &args.filename {
            app_args.push(f.clone());
        }
        app_args.extend(args.app_args.iter().cloned());
        machine.set_args(app_args);
    }

    let interactive = args.options.interactive;
    let manager = match ModuleManager::new(args.options, machine) {
        Ok(mm) => mm,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    let mut eval = Eval::new(manager);

    if let Some(f) = &args.filename {
        if let Err(e) = eval.eval_load(f) {
            eprintln!("{}", e);
            process::exit(1);
        }
        eval.eval_values();
    }

    if let Some(command) = &args.command {
        if let Err(e) = eval.eval_command(command) {
            eprintln!("{}", e);
            process::exit(1);
        }
    } else if args.filename.is_none() || interactive {
        repl::run(&mut eval);
    } else if let Err(e) = eval.eval_main() {
        eprintln!("{}", e);
        process::exit(1);
    }
}
