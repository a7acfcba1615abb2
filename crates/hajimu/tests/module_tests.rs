use std::fs;
use std::path::{Path, PathBuf};

use hajimu::error::UncaughtError;
use hajimu::*;
use pretty_assertions::assert_eq;

/// A scratch directory unique to one test.
struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("hajimu-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Scratch(dir)
    }

    fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.0.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn run_file(ctx: EvalContext, path: &Path) -> (hajimu::Result<Value>, String) {
    let out = OutputBuffer::new();
    let mut interp = Interpreter::with_output(ctx, out.clone());
    let result = interp.run_file(path);
    (result, out.contents())
}

fn output(ctx: EvalContext, path: &Path) -> String {
    match run_file(ctx, path) {
        (Ok(_), out) => out,
        (Err(e), out) => panic!("program failed: {}\noutput so far:\n{}", e, out),
    }
}

fn error_kind(path: &Path) -> ErrorKind {
    match run_file(EvalContext::default(), path).0 {
        Err(HajimuError::Runtime(UncaughtError(e))) => e.kind,
        other => panic!("expected an uncaught error, got {:?}", other.map(|v| v.to_string())),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Source Modules
// ═══════════════════════════════════════════════════════════════════════

const GREETING: &str = r##"
公開 関数 挨拶(名前)
    返す "こんにちは、#{名前}"
終わり

公開 定数 版 = 2

関数 内部()
    返す "秘密"
終わり
"##;

#[test]
fn test_import_binds_exports_directly() {
    let dir = Scratch::new("direct");
    dir.write("挨拶.jp", GREETING);
    let main = dir.write("main.jp", "取り込む \"挨拶\"\n表示(挨拶(\"世界\"), 版)");
    assert_eq!(output(EvalContext::default(), &main), "こんにちは、世界 2\n");
}

#[test]
fn test_import_alias_is_a_map_of_exports() {
    let dir = Scratch::new("alias");
    dir.write("挨拶.jp", GREETING);
    let main = dir.write(
        "main.jp",
        "取り込む \"挨拶\" として g\n表示(g[\"挨拶\"](\"猫\"))\n表示(g.キー())",
    );
    assert_eq!(
        output(EvalContext::default(), &main),
        "こんにちは、猫\n[\"挨拶\", \"版\"]\n"
    );
}

#[test]
fn test_private_bindings_are_not_exported() {
    let dir = Scratch::new("private");
    dir.write("挨拶.jp", GREETING);
    let main = dir.write("main.jp", "取り込む \"挨拶\"\n内部()");
    assert_eq!(error_kind(&main), ErrorKind::NameError);
}

#[test]
fn test_module_runs_once() {
    let dir = Scratch::new("once");
    dir.write("副作用.jp", "表示(\"読み込み\")\n公開 変数 値 = 1");
    let main = dir.write(
        "main.jp",
        "取り込む \"副作用\" として a\n取り込む \"副作用\" として b\n表示(a.値 + b.値)",
    );
    assert_eq!(output(EvalContext::default(), &main), "読み込み\n2\n");
}

#[test]
fn test_directory_module_uses_main_file() {
    let dir = Scratch::new("package");
    dir.write("道具/main.jp", "公開 関数 倍(x)\n 返す x * 2\n終わり");
    let main = dir.write("main.jp", "取り込む \"道具\"\n表示(倍(21))");
    assert_eq!(output(EvalContext::default(), &main), "42\n");
}

#[test]
fn test_search_path_roots() {
    let lib = Scratch::new("roots-lib");
    lib.write("共有.jp", "公開 定数 名前 = \"共有\"");
    let app = Scratch::new("roots-app");
    let main = app.write("main.jp", "取り込む \"共有\"\n表示(名前)");

    let mut ctx = EvalContext::default();
    ctx.prepend_search_path(lib.path());
    assert_eq!(output(ctx, &main), "共有\n");
}

#[test]
fn test_compiled_module_imports_like_source() {
    let dir = Scratch::new("compiled");
    let bytes = bytecode::compile("公開 関数 足す(a, b)\n 返す a + b\n終わり").unwrap();
    dir.write("算術.hjp", bytes);
    let main = dir.write("main.jp", "取り込む \"算術\"\n表示(足す(2, 3))");
    assert_eq!(output(EvalContext::default(), &main), "5\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_module() {
    let dir = Scratch::new("missing");
    let main = dir.write("main.jp", "取り込む \"どこにもない\"");
    assert_eq!(error_kind(&main), ErrorKind::ImportError);
}

#[test]
fn test_import_cycle_is_an_error() {
    let dir = Scratch::new("cycle");
    dir.write("甲.jp", "取り込む \"乙\"\n公開 定数 a = 1");
    dir.write("乙.jp", "取り込む \"甲\"\n公開 定数 b = 2");
    let main = dir.write("main.jp", "取り込む \"甲\"");
    assert_eq!(error_kind(&main), ErrorKind::ImportError);
}

#[test]
fn test_module_error_is_reported_as_import_error_with_cause() {
    let dir = Scratch::new("broken");
    dir.write("壊れ.jp", "1/0 を 整数で");
    let main = dir.write(
        "main.jp",
        "試す\n 取り込む \"壊れ\"\n捕まえる e\n 表示(e.種類, e.原因.種類)\n終わり",
    );
    assert_eq!(output(EvalContext::default(), &main), "ImportError DivisionError\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Compiled Programs
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_run_compiled_program_file() {
    let dir = Scratch::new("program");
    let src = "変数 合計 = 0\n繰り返す i を 1 から 4 まで\n 合計 += i\n終わり\n表示(合計)";
    let compiled = dir.write("prog.hjp", bytecode::compile(src).unwrap());
    let source = dir.write("prog.jp", src);
    assert_eq!(output(EvalContext::default(), &compiled), "10\n");
    assert_eq!(output(EvalContext::default(), &source), "10\n");
}
