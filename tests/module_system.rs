//! Module loading: include paths, transitive imports, idempotence, and the
//! interaction between loaded modules and the interactive evaluator.

mod common;

use std::fs;
use std::path::PathBuf;

use common::{eval_capture, eval_one, evaluator_with_options};

use egel::modules::Options;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("egel_tests").join(name);
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn options_for(dir: &PathBuf) -> Options {
    let mut o = Options::new();
    o.add_include_path(dir);
    o
}

#[test]
fn test_load_and_call() {
    let dir = scratch_dir("load_and_call");
    fs::write(
        dir.join("arith.eg"),
        "def double = [x -> x + x]\ndef quad = [x -> double (double x)]\n",
    )
    .unwrap();

    let mut e = evaluator_with_options(options_for(&dir));
    eval_capture(&mut e, "import \"arith.eg\"");
    assert_eq!(eval_one(&mut e, "quad 10"), "40");
}

#[test]
fn test_transitive_import_is_shared() {
    let dir = scratch_dir("transitive");
    fs::write(dir.join("base.eg"), "data unit\ndef base = 10\n").unwrap();
    fs::write(
        dir.join("left.eg"),
        "import \"base.eg\"\ndef left = base + 1\n",
    )
    .unwrap();
    fs::write(
        dir.join("right.eg"),
        "import \"base.eg\"\ndef right = base + 2\n",
    )
    .unwrap();
    fs::write(
        dir.join("top.eg"),
        "import \"left.eg\"\nimport \"right.eg\"\ndef top = left + right\n",
    )
    .unwrap();

    let mut e = evaluator_with_options(options_for(&dir));
    eval_capture(&mut e, "import \"top.eg\"");
    assert_eq!(eval_one(&mut e, "top"), "23");

    // the shared dependency loaded exactly once
    let infos = e.machine().module_infos();
    assert_eq!(infos.iter().filter(|i| i.name == "base.eg").count(), 1);
}

#[test]
fn test_reloading_is_idempotent() {
    let dir = scratch_dir("idempotent");
    fs::write(dir.join("once.eg"), "def once = 1\n").unwrap();

    let mut e = evaluator_with_options(options_for(&dir));
    eval_capture(&mut e, "import \"once.eg\"");
    let symbols_before = e.machine().symbol_count();
    let modules_before = e.machine().module_infos().len();

    eval_capture(&mut e, "import \"once.eg\"");
    assert_eq!(e.machine().symbol_count(), symbols_before);
    assert_eq!(e.machine().module_infos().len(), modules_before);
    assert_eq!(eval_one(&mut e, "once"), "1");
}

#[test]
fn test_import_before_direct_load() {
    // loading A that imports B before B is seen directly still yields a
    // single copy of B, and B's exports stay visible
    let dir = scratch_dir("import_order");
    fs::write(dir.join("b.eg"), "def shared = 7\n").unwrap();
    fs::write(dir.join("a.eg"), "import \"b.eg\"\ndef user = shared * 2\n").unwrap();

    let mut e = evaluator_with_options(options_for(&dir));
    eval_capture(&mut e, "import \"a.eg\"");
    eval_capture(&mut e, "import \"b.eg\"");

    assert_eq!(eval_one(&mut e, "user"), "14");
    assert_eq!(eval_one(&mut e, "shared"), "7");
    let infos = e.machine().module_infos();
    assert_eq!(infos.iter().filter(|i| i.name == "b.eg").count(), 1);
}

#[test]
fn test_missing_import_reports_position() {
    let dir = scratch_dir("missing");
    let mut e = evaluator_with_options(options_for(&dir));
    let r = e.eval_command("import \"nowhere.eg\"");
    match r {
        Err(egel::Error::Io(_, msg)) => assert!(msg.contains("nowhere.eg"), "{}", msg),
        other => panic!("expected io error, got {:?}", other),
    }
}

#[test]
fn test_module_namespaces() {
    let dir = scratch_dir("namespaced");
    fs::write(
        dir.join("shapes.eg"),
        "namespace Shape (\n  data circle, square\n  def area = [circle -> 3 | square -> 4]\n)\n",
    )
    .unwrap();

    let mut e = evaluator_with_options(options_for(&dir));
    eval_capture(&mut e, "import \"shapes.eg\"");
    assert_eq!(eval_one(&mut e, "Shape::area Shape::square"), "4");
    eval_capture(&mut e, "using Shape");
    assert_eq!(eval_one(&mut e, "area circle"), "3");
}

#[test]
fn test_module_vals_reduce_at_load() {
    let dir = scratch_dir("vals");
    fs::write(dir.join("v.eg"), "val answer = 6 * 7\n").unwrap();

    let mut e = evaluator_with_options(options_for(&dir));
    eval_capture(&mut e, "import \"v.eg\"");
    e.eval_values();
    assert_eq!(eval_one(&mut e, "answer"), "42");
}

#[test]
fn test_query_modules() {
    let mut e = evaluator_with_options(Options::new());
    let rr = eval_capture(&mut e, "System::query_modules");
    assert_eq!(rr.len(), 1);
    // at least the four internal modules are listed
    let r = eval_one(
        &mut e,
        "def len = [nil -> 0 | (cons _ xx) -> 1 + (len xx)]; len System::query_modules",
    );
    let n: i64 = r.parse().unwrap_or(0);
    assert!(n >= 4, "expected at least 4 modules, got {}", r);
}
