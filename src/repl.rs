//! The interactive loop: rustyline editing with persistent history.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::eval::Eval;

fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|h| h.join(".egel_history"))
}

pub fn run(eval: &mut Eval) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("cannot initialize line editor: {}", e);
            return;
        }
    };
    let history = history_path();
    if let Some(h) = &history {
        let _ = rl.load_history(h);
    }

    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                if let Err(e) = eval.eval_command(line) {
                    eprintln!("{}", e);
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("input error: {}", e);
                break;
            }
        }
    }

    if let Some(h) = &history {
        let _ = rl.save_history(h);
    }
}
