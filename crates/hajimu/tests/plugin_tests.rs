use std::ffi::c_char;
use std::sync::atomic::{AtomicPtr, Ordering};

use hajimu::error::UncaughtError;
use hajimu::plugin::abi::{
    HajimuRuntime, HajimuStr, HajimuValue, PluginFunction, PluginInfo, ValueTag,
};
use hajimu::*;
use pretty_assertions::assert_eq;

// ═══════════════════════════════════════════════════════════════════════
// An in-process math plugin
// ═══════════════════════════════════════════════════════════════════════

static RUNTIME: AtomicPtr<HajimuRuntime> = AtomicPtr::new(std::ptr::null_mut());

unsafe fn args<'a>(ptr: *const HajimuValue, argc: usize) -> &'a [HajimuValue] {
    std::slice::from_raw_parts(ptr, argc)
}

unsafe extern "C" fn square(ptr: *const HajimuValue, argc: usize) -> HajimuValue {
    match args(ptr, argc)[0].as_number() {
        Some(n) => HajimuValue::number(n * n),
        None => HajimuValue::error(c"数値が必要です"),
    }
}

unsafe extern "C" fn factorial(ptr: *const HajimuValue, argc: usize) -> HajimuValue {
    match args(ptr, argc)[0].as_number() {
        Some(n) if n >= 0.0 => HajimuValue::number((1..=n as u64).product::<u64>() as f64),
        _ => HajimuValue::error(c"負でない数値が必要です"),
    }
}

unsafe extern "C" fn total(ptr: *const HajimuValue, argc: usize) -> HajimuValue {
    let sum = args(ptr, argc).iter().filter_map(HajimuValue::as_number).sum();
    HajimuValue::number(sum)
}

unsafe extern "C" fn greeting(_: *const HajimuValue, _: usize) -> HajimuValue {
    HajimuValue::static_str(c"こんにちは")
}

unsafe extern "C" fn length(ptr: *const HajimuValue, argc: usize) -> HajimuValue {
    let arg = &args(ptr, argc)[0];
    match arg.kind() {
        Some(ValueTag::Array | ValueTag::Map) => HajimuValue::number(arg.payload.list.len as f64),
        Some(ValueTag::String) => HajimuValue::number(arg.payload.string.len as f64),
        _ => HajimuValue::error(c"配列か文字列が必要です"),
    }
}

/// `適用(f, x)` calls `f(x)` back through the runtime table.
unsafe extern "C" fn apply(ptr: *const HajimuValue, argc: usize) -> HajimuValue {
    let args = args(ptr, argc);
    let runtime = RUNTIME.load(Ordering::Acquire);
    if runtime.is_null() || args[0].kind() != Some(ValueTag::Callable) {
        return HajimuValue::error(c"関数が必要です");
    }
    ((*runtime).call)(args[0].payload.handle, &args[1], 1)
}

unsafe extern "C" fn announce(_: *const HajimuValue, _: usize) -> HajimuValue {
    let runtime = RUNTIME.load(Ordering::Acquire);
    if !runtime.is_null() {
        ((*runtime).print)(HajimuStr::from_static(c"プラグインより"));
    }
    HajimuValue::null()
}

unsafe extern "C" fn set_runtime(ptr: *const HajimuValue, argc: usize) -> HajimuValue {
    if let Some(table) = args(ptr, argc).first() {
        RUNTIME.store(table.payload.pointer as *mut HajimuRuntime, Ordering::Release);
    }
    HajimuValue::null()
}

const fn entry(
    name: &'static std::ffi::CStr,
    entry: hajimu::plugin::abi::EntryFn,
    min_args: u32,
    max_args: i32,
) -> PluginFunction {
    PluginFunction {
        name: name.as_ptr() as *const c_char,
        entry: Some(entry),
        min_args,
        max_args,
    }
}

static FUNCTIONS: [PluginFunction; 8] = [
    entry(c"二乗", square, 1, 1),
    entry(c"階乗", factorial, 1, 1),
    entry(c"合計", total, 0, -1),
    entry(c"挨拶", greeting, 0, 0),
    entry(c"長さ", length, 1, 1),
    entry(c"適用", apply, 2, 2),
    entry(c"告知", announce, 0, 0),
    entry(c"__hajimu_runtime_set__", set_runtime, 1, 1),
];

static INFO: PluginInfo = PluginInfo {
    name: c"math_plugin".as_ptr(),
    version: c"1.0.0".as_ptr(),
    author: c"テスト".as_ptr(),
    description: c"".as_ptr(),
    functions: FUNCTIONS.as_ptr(),
    function_count: FUNCTIONS.len(),
    free_value: None,
};

unsafe extern "C" fn init() -> *const PluginInfo {
    &INFO
}

fn run(src: &str) -> String {
    plugin::register_static("math_plugin", init).unwrap();
    let out = OutputBuffer::new();
    let mut interp = Interpreter::with_output(EvalContext::default(), out.clone());
    if let Err(e) = interp.run_source("<plugin>", src) {
        panic!("program failed: {}\noutput so far:\n{}", e, out.contents());
    }
    out.contents()
}

fn run_err(src: &str) -> ErrorKind {
    plugin::register_static("math_plugin", init).unwrap();
    let mut interp = Interpreter::with_output(EvalContext::default(), OutputBuffer::new());
    match interp.run_source("<plugin>", src) {
        Err(HajimuError::Runtime(UncaughtError(e))) => e.kind,
        other => panic!("expected an uncaught error, got {:?}", other.map(|v| v.to_string())),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_plugin_entries_through_alias() {
    let src = "取り込む \"math_plugin\" として plug\n表示(plug[\"二乗\"](5))\n表示(plug[\"階乗\"](6))";
    assert_eq!(run(src), "25\n720\n");
}

#[test]
fn test_plugin_metadata() {
    let plugin = plugin::register_static("math_plugin", init).unwrap();
    assert_eq!(plugin.name, "math_plugin");
    assert_eq!(plugin.version, "1.0.0");
    assert_eq!(plugin.author.as_deref(), Some("テスト"));
    assert_eq!(plugin.description, None);
    let names: Vec<_> = plugin.function_names().collect();
    assert_eq!(names, vec!["二乗", "階乗", "合計", "挨拶", "長さ", "適用", "告知"]);
}

#[test]
fn test_plugin_values_cross_the_boundary() {
    let src = "取り込む \"math_plugin\"\n\
               表示(合計(1, 2, 3.5), 挨拶())\n\
               表示(長さ([1, [2, 3], {a: 1}]), 長さ({x: 1, y: 2}), 長さ(\"abc\"))";
    assert_eq!(run(src), "6.5 こんにちは\n3 2 3\n");
}

#[test]
fn test_plugin_calls_back_into_interpreter() {
    let src = "取り込む \"math_plugin\"\n\
               変数 倍率 = 10\n\
               表示(適用(関数(x) { 返す x * 倍率 }, 4))\n\
               告知()";
    assert_eq!(run(src), "40\nプラグインより\n");
}

#[test]
fn test_plugin_error_result_raises_plugin_error() {
    assert_eq!(run_err("取り込む \"math_plugin\"\n二乗(\"x\")"), ErrorKind::PluginError);
    let src = "取り込む \"math_plugin\"\n試す\n 階乗(-1)\n捕まえる e\n 表示(e.種類)\n終わり";
    assert_eq!(run(src), "PluginError\n");
}

#[test]
fn test_plugin_arity_is_checked_before_the_call() {
    assert_eq!(run_err("取り込む \"math_plugin\"\n二乗(1, 2)"), ErrorKind::ArityError);
}

#[test]
fn test_missing_plugin_file() {
    let err = plugin::load(std::path::Path::new("/nonexistent/math_plugin.hjp")).unwrap_err();
    assert!(matches!(err, hajimu::error::PluginError::NotFound(_)));
}

#[test]
fn test_import_manifest_with_missing_library() {
    let dir = std::env::temp_dir().join(format!("hajimu-plugin-import-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let manifest = bytecode::Manifest {
        name: "外部".into(),
        library: "libhajimu_absent.so".into(),
        entries: vec![bytecode::ManifestEntry {
            name: "二乗".into(),
            min_args: 1,
            max_args: Some(1),
        }],
        ..bytecode::Manifest::default()
    };
    std::fs::write(dir.join("外部.hjp"), bytecode::encode_manifest(&manifest)).unwrap();
    let main = dir.join("main.jp");
    std::fs::write(
        &main,
        "試す\n 取り込む \"外部\"\n捕まえる e\n 表示(e.種類)\n終わり\n取り込む \"外部\"",
    )
    .unwrap();

    let out = OutputBuffer::new();
    let mut interp = Interpreter::with_output(EvalContext::default(), out.clone());
    match interp.run_file(&main) {
        Err(HajimuError::Runtime(UncaughtError(e))) => {
            assert_eq!(e.kind, ErrorKind::PluginError);
            assert!(e.message.contains("libhajimu_absent.so"), "{}", e.message);
        }
        other => panic!("expected a plugin error, got {:?}", other.map(|v| v.to_string())),
    }
    assert_eq!(out.contents(), "PluginError\n");
    let _ = std::fs::remove_dir_all(&dir);
}
