use pretty_assertions::assert_eq;

use super::*;
use crate::error::ErrorKind;

fn interp() -> (Interpreter, OutputBuffer) {
    let out = OutputBuffer::new();
    let interp = Interpreter::with_output(EvalContext::default(), out.clone());
    (interp, out)
}

/// Run `src` and return what it printed.
fn output(src: &str) -> String {
    let (mut interp, out) = interp();
    if let Err(e) = interp.run_source("<test>", src) {
        panic!("program failed: {}\n{}", e, out.contents());
    }
    out.contents()
}

/// Run `src`, expecting an uncaught error; return its kind.
fn error_kind(src: &str) -> ErrorKind {
    let (mut interp, _) = interp();
    match interp.run_source("<test>", src) {
        Err(HajimuError::Runtime(UncaughtError(e))) => e.kind,
        other => panic!("expected a runtime error, got {:?}", other.map(|v| v.to_string())),
    }
}

fn eval(src: &str) -> Value {
    let (mut interp, _) = interp();
    interp
        .eval_expression(src)
        .unwrap_or_else(|e| panic!("{} failed: {}", src, e))
}

// ═══════════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
    assert_eq!(eval("7 % 3"), Value::Number(1.0));
    assert_eq!(eval("-7 % 3"), Value::Number(-1.0));
    assert_eq!(eval("1 / 0").to_string(), "Infinity");
}

#[test]
fn test_integer_mode_division_by_zero() {
    assert_eq!(error_kind("1/0 を 整数で"), ErrorKind::DivisionError);
    assert_eq!(eval("7 / 2 を 整数で"), Value::Number(3.0));
}

#[test]
fn test_integer_operations_refuse_numbers_beyond_i64() {
    assert_eq!(error_kind("表示(1e20 % 7)"), ErrorKind::TypeError);
    assert_eq!(error_kind("表示(1e19 + 1 を 整数で)"), ErrorKind::TypeError);
    assert_eq!(eval("9007199254740992 % 7"), Value::Number(4.0));
}

#[test]
fn test_string_concatenation_and_interpolation() {
    assert_eq!(output("変数 名 = \"世界\"\n表示(\"こんにちは、#{名}\" + \"!\")"), "こんにちは、世界!\n");
}

#[test]
fn test_logical_short_circuit() {
    let src = "変数 n = 0\n関数 f() { n += 1; 返す 真 }\n偽 かつ f()\n真 または f()\n表示(n)";
    assert_eq!(output(src), "0\n");
}

#[test]
fn test_comparison_of_mixed_types_is_false_for_equality() {
    assert_eq!(eval("1 == \"1\""), Value::Bool(false));
    assert_eq!(eval("[1, 2] == [1, 2]"), Value::Bool(true));
}

#[test]
fn test_undefined_name() {
    assert_eq!(error_kind("表示(未定義)"), ErrorKind::NameError);
}

#[test]
fn test_const_reassignment() {
    assert_eq!(error_kind("定数 x = 1\nx = 2"), ErrorKind::TypeError);
}

// ═══════════════════════════════════════════════════════════════════════
// Collections
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_particle_append() {
    assert_eq!(output("変数 x = [1,2,3]; x に 4 を 追加する; 表示(x の 長さ)"), "4\n");
}

#[test]
fn test_negative_index_and_out_of_range() {
    assert_eq!(eval("[1, 2, 3][-1]"), Value::Number(3.0));
    assert_eq!(error_kind("表示([1][5])"), ErrorKind::IndexError);
}

#[test]
fn test_map_access() {
    let src = "変数 m = {名前: \"ハジム\", \"年\": 3}\nm.年 += 1\n表示(m[\"名前\"], m.年, m.無い)";
    assert_eq!(output(src), "ハジム 4 無\n");
}

#[test]
fn test_arrays_alias() {
    assert_eq!(output("変数 a = [1]\n変数 b = a\nb.追加(2)\n表示(a)"), "[1, 2]\n");
}

#[test]
fn test_higher_order_methods() {
    let src = "変数 xs = [3, 1, 2]\n\
               表示(xs.変換(関数(x) 返す x * 2 終わり))\n\
               表示(xs.絞り込み(関数(x) 返す x > 1 終わり))\n\
               表示(xs.畳み込み(関数(a, x) 返す a + x 終わり, 0))\n\
               表示(xs.並べ替え(), xs)";
    assert_eq!(output(src), "[6, 2, 4]\n[3, 2]\n6\n[1, 2, 3] [3, 1, 2]\n");
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("\"a,b,c\".分割(\",\").長さ"), Value::Number(3.0));
    assert_eq!(eval("\"  はい \".前後削除()"), Value::string("はい"));
    assert_eq!(eval("\"日本語\"[1]"), Value::string("本"));
}

// ═══════════════════════════════════════════════════════════════════════
// Control Flow
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_loops() {
    let src = "変数 合計 = 0\n\
               繰り返す i を 1 から 10 まで\n\
                 もし i == 3 なら\n 次へ\n 終わり\n\
                 もし i == 8 なら\n 抜ける\n 終わり\n\
                 合計 += i\n\
               終わり\n\
               表示(合計)";
    assert_eq!(output(src), "25\n");
}

#[test]
fn test_for_each_over_map_keys_and_string() {
    let src = "繰り返す k を {a: 1, b: 2} から\n表示(k)\n終わり\n繰り返す c を \"あい\" から { 表示(c) }";
    assert_eq!(output(src), "a\nb\nあ\nい\n");
}

#[test]
fn test_recursive_factorial() {
    let src = "関数 階乗(n)\n もし n <= 1 なら\n 返す 1\n 終わり\n 返す n * 階乗(n - 1)\n終わり\n表示(階乗(10))";
    assert_eq!(output(src), "3628800\n");
}

#[test]
fn test_hoisted_function() {
    assert_eq!(output("表示(f())\n関数 f() { 返す 42 }"), "42\n");
}

#[test]
fn test_function_without_return_yields_null() {
    assert_eq!(output("関数 f() { 1 + 1 }\n表示(f())"), "無\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Functions and Closures
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_closure_sees_current_binding() {
    let src = "関数 作る()\n 変数 n = 0\n 返す 関数() { n += 1; 返す n }\n終わり\n\
               変数 c = 作る()\nc()\nc()\n表示(c())";
    assert_eq!(output(src), "3\n");
}

#[test]
fn test_defaults_and_rest() {
    let src = "関数 f(a, b = a * 2, ...残り) { 返す [a, b, 残り] }\n表示(f(1))\n表示(f(1, 5, 6, 7))";
    assert_eq!(output(src), "[1, 2, []]\n[1, 5, [6, 7]]\n");
}

#[test]
fn test_arity_error_skips_body() {
    let (mut interp, out) = interp();
    let result = interp.run_source("<test>", "関数 f(a) { 表示(\"入った\") }\nf(1, 2)");
    assert!(matches!(
        result,
        Err(HajimuError::Runtime(UncaughtError(ref e))) if e.kind == ErrorKind::ArityError
    ));
    assert_eq!(out.contents(), "");
}

#[test]
fn test_stack_overflow() {
    let ctx = EvalContext::with_max_call_depth(64);
    let mut interp = Interpreter::with_output(ctx, OutputBuffer::new());
    let err = interp
        .run_source("<test>", "関数 f(n) { 返す f(n + 1) }\nf(0)")
        .unwrap_err();
    assert!(matches!(
        err,
        HajimuError::Runtime(UncaughtError(ref e)) if e.kind == ErrorKind::StackOverflow
    ));
}
#[test]
fn test_interrupt_stops_a_running_loop() {
    let ctx = EvalContext::default();
    let handle = ctx.clone();
    let mut interp = Interpreter::with_output(ctx, OutputBuffer::new());
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        handle.interrupt();
    });
    let err = interp.run_source("<test>", "繰り返す\n 変数 x = 1\n終わり").unwrap_err();
    stopper.join().unwrap();
    assert!(matches!(
        err,
        HajimuError::Runtime(UncaughtError(ref e)) if e.kind == ErrorKind::CancelledError
    ));
}

// ═══════════════════════════════════════════════════════════════════════
// Classes
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_class_with_initializer_and_inheritance() {
    let src = "型 動物\n\
                 変数 名前 = \"名無し\"\n\
                 関数 初期化(名前)\n 自分.名前 = 名前\n 終わり\n\
                 関数 紹介()\n 返す \"#{自分.名前}: #{自分.鳴く()}\"\n 終わり\n\
                 関数 鳴く()\n 返す \"...\"\n 終わり\n\
               終わり\n\
               型 犬 継承 動物\n\
                 関数 鳴く()\n 返す \"ワン\"\n 終わり\n\
               終わり\n\
               表示(犬(\"ポチ\").紹介())\n\
               表示(型名(犬(\"ポチ\")))";
    assert_eq!(output(src), "ポチ: ワン\n犬\n");
}

#[test]
fn test_positional_fields_without_initializer() {
    let src = "型 点\n 変数 x = 0\n 変数 y = 0\n終わり\n変数 p = 点(3)\n表示(p.x, p.y)";
    assert_eq!(output(src), "3 0\n");
}

#[test]
fn test_unknown_attribute() {
    assert_eq!(error_kind("型 点 終わり\n表示(点().無い)"), ErrorKind::AttributeError);
}

// ═══════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_catch_exposes_kind_and_message() {
    let src = "試す { 1/0 を 整数で } 捕まえる e { 表示(e.種類) }";
    assert_eq!(output(src), "DivisionError\n");
}

#[test]
fn test_thrown_value_is_wrapped() {
    let src = "試す\n 投げる {コード: 7}\n捕まえる e\n 表示(e.種類, e.値.コード)\n終わり";
    assert_eq!(output(src), "UserError 7\n");
}

#[test]
fn test_catch_filter_falls_through() {
    let src = "試す\n 試す\n  投げる \"x\"\n 捕まえる e が TypeError\n  表示(\"型\")\n 終わり\n\
               捕まえる e\n 表示(\"外\")\n終わり";
    assert_eq!(output(src), "外\n");
}

#[test]
fn test_finally_runs_on_every_path() {
    let src = "関数 f(k)\n\
                 繰り返す i を 1 から 2 まで\n\
                   試す\n\
                     もし k == 1 なら\n 返す \"返\"\n 終わり\n\
                     もし k == 2 なら\n 抜ける\n 終わり\n\
                     もし k == 3 なら\n 次へ\n 終わり\n\
                     もし k == 4 なら\n 投げる \"投\"\n 終わり\n\
                   捕まえる e\n 表示(\"捕\")\n\
                   最後に\n 表示(\"最後\", k, i)\n\
                   終わり\n\
                 終わり\n\
               終わり\n\
               f(1)\nf(2)\nf(3)";
    assert_eq!(output(src), "最後 1 1\n最後 2 1\n最後 3 1\n最後 3 2\n");
}

#[test]
fn test_error_raised_in_handler_gets_cause() {
    let src = "試す\n 試す\n  投げる \"一\"\n 捕まえる e\n  投げる \"二\"\n 終わり\n\
               捕まえる e\n 表示(e.メッセージ, e.原因.メッセージ)\n終わり";
    assert_eq!(output(src), "二 一\n");
}

#[test]
fn test_stack_trace_frames() {
    let src = "関数 内()\n 投げる \"x\"\n終わり\n関数 外()\n 内()\n終わり\n\
               試す\n 外()\n捕まえる e\n 表示(e.スタック[0].関数, e.スタック[0].行)\n終わり";
    assert_eq!(output(src), "内 2\n");
}

// ═══════════════════════════════════════════════════════════════════════
// Concurrency
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_async_block_and_await() {
    let src = "変数 p = 非同期\n 返す 20 + 1\n終わり\n表示(待つ p * 2)";
    assert_eq!(output(src), "42\n");
}

#[test]
fn test_rejected_promise_raises_on_await() {
    let src = "変数 p = 非同期 { 投げる \"失敗\" }\n試す\n 待つ p\n捕まえる e\n 表示(e.メッセージ)\n終わり";
    assert_eq!(output(src), "失敗\n");
}

#[test]
fn test_with_lock_releases_on_error() {
    let src = "変数 m = ミューテックス作成()\n\
               試す\n 排他 m\n  投げる \"x\"\n 終わり\n捕まえる e\n終わり\n\
               表示(m.ロック中())";
    assert_eq!(output(src), "偽\n");
}

#[test]
fn test_await_timeout() {
    let src = "試す\n 制限時間待機(タイマー(1000), 10)\n捕まえる e\n 表示(e.種類)\n終わり";
    assert_eq!(output(src), "TimeoutError\n");
}

#[test]
fn test_range_bounds_and_length_cap() {
    assert_eq!(eval("範囲(3)").to_string(), "[0, 1, 2]");
    assert_eq!(eval("範囲(5, 0, -2)").to_string(), "[5, 3, 1]");
    assert_eq!(eval("範囲(0, 1, 0.25)").to_string(), "[0, 0.25, 0.5, 0.75]");
    assert_eq!(eval("範囲(3, 1)").to_string(), "[]");
    assert_eq!(error_kind("範囲(1e18)"), ErrorKind::ValueError);
    assert_eq!(error_kind("範囲(0, 1 / 0)"), ErrorKind::ValueError);
    assert_eq!(error_kind("範囲(0, 1, 0)"), ErrorKind::ValueError);
}
