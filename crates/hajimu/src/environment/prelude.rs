//! Standard prelude with built-in functions

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexmap::{IndexMap, IndexSet};

use super::Environment;
use crate::error::ErrorKind;
use crate::eval::args::{self, arg};
use crate::eval::{await_value, builtin_method, settle, sort_values, Interpreter, Signal};
use crate::runtime::{
    self, select, AtomicCounter, Channel, Mutex, Promise, RwLock, SelectCase, Selected, Semaphore,
    ThreadHandle, WaitGroup,
};
use crate::span::Span;
use crate::value::{BuiltinFn, ErrorValue, HashableValue, Value};

/// Globals that forward to the method of the same name on their first
/// argument, so `xs に 4 を 追加する` reads like `xs.追加(4)`.
const FORWARDED: &[&str] = &[
    "追加", "送信", "受信", "閉じる", "ロック", "解放", "獲得", "完了", "待機", "合流", "キャンセル",
    "キー", "値一覧", "含む", "結合", "分割", "置換", "並べ替え", "変換", "絞り込み", "畳み込み",
    "各要素", "逆順", "取り出す",
];

/// Nesting depth past which JSON conversion gives up (cyclic data).
const MAX_JSON_DEPTH: usize = 128;

/// Longest array `範囲` will build.
const MAX_RANGE_LEN: usize = 10_000_000;

impl Environment {
    /// Create an environment with standard built-in functions.
    pub fn with_prelude() -> Self {
        let env = Self::new();
        env.load_prelude();
        env
    }

    /// Load the standard prelude into this environment.
    pub fn load_prelude(&self) {
        // Output and inspection
        self.define_builtin(BuiltinFn::new("表示", 0, None, builtin_print));
        self.define_builtin(BuiltinFn::fixed("型名", 1, builtin_type_name));
        self.define_builtin(BuiltinFn::fixed("長さ", 1, builtin_len));

        // Conversions
        self.define_builtin(BuiltinFn::fixed("文字列", 1, builtin_to_string));
        self.define_builtin(BuiltinFn::fixed("数値", 1, builtin_to_number));
        self.define_builtin(BuiltinFn::fixed("整数", 1, builtin_to_integer));
        self.define_builtin(BuiltinFn::new("JSON化", 1, Some(2), builtin_to_json));
        self.define_builtin(BuiltinFn::fixed("JSON解析", 1, builtin_parse_json));

        // Math
        self.define_builtin(BuiltinFn::fixed("絶対値", 1, |_, a| unary_math("絶対値", a, f64::abs)));
        self.define_builtin(BuiltinFn::fixed("平方根", 1, |_, a| unary_math("平方根", a, f64::sqrt)));
        self.define_builtin(BuiltinFn::fixed("切り捨て", 1, |_, a| unary_math("切り捨て", a, f64::floor)));
        self.define_builtin(BuiltinFn::fixed("切り上げ", 1, |_, a| unary_math("切り上げ", a, f64::ceil)));
        self.define_builtin(BuiltinFn::fixed("四捨五入", 1, |_, a| unary_math("四捨五入", a, f64::round)));
        self.define_builtin(BuiltinFn::fixed("べき乗", 2, builtin_pow));
        self.define_builtin(BuiltinFn::new("最大", 1, None, |_, a| extremum("最大", a, f64::max)));
        self.define_builtin(BuiltinFn::new("最小", 1, None, |_, a| extremum("最小", a, f64::min)));
        self.define_builtin(BuiltinFn::new("範囲", 1, Some(3), builtin_range));

        // Collections
        self.define_builtin(BuiltinFn::fixed("一意", 1, builtin_unique));
        self.define_builtin(BuiltinFn::new("並べ替え", 1, Some(2), builtin_sort));

        // Errors
        self.define_builtin(BuiltinFn::new("エラー", 1, Some(2), builtin_error));
        self.define_builtin(BuiltinFn::new("エラー作成", 2, Some(3), builtin_make_error));

        // Files and time
        self.define_builtin(BuiltinFn::fixed("ファイル読み込み", 1, builtin_read_file));
        self.define_builtin(BuiltinFn::fixed("ファイル書き込み", 2, builtin_write_file));
        self.define_builtin(BuiltinFn::fixed("時刻", 0, builtin_now));
        self.define_builtin(BuiltinFn::fixed("スリープ", 1, builtin_sleep));

        // Concurrency
        self.define_builtin(BuiltinFn::new("チャネル作成", 0, Some(1), builtin_channel));
        self.define_builtin(BuiltinFn::fixed("ミューテックス作成", 0, |_, _| {
            Ok(Value::Mutex(Arc::new(Mutex::new())))
        }));
        self.define_builtin(BuiltinFn::fixed("読み書きロック作成", 0, |_, _| {
            Ok(Value::RwLock(Arc::new(RwLock::new())))
        }));
        self.define_builtin(BuiltinFn::new("セマフォ作成", 0, Some(1), builtin_semaphore));
        self.define_builtin(BuiltinFn::new("アトミック作成", 0, Some(1), builtin_atomic));
        self.define_builtin(BuiltinFn::fixed("待機グループ作成", 0, |_, _| {
            Ok(Value::WaitGroup(Arc::new(WaitGroup::new())))
        }));
        self.define_builtin(BuiltinFn::new("スレッド作成", 1, None, builtin_spawn_thread));
        self.define_builtin(BuiltinFn::new("タスク実行", 1, None, builtin_spawn_task));
        self.define_builtin(BuiltinFn::fixed("全て待つ", 1, |_, a| combine("全て待つ", a, Promise::all)));
        self.define_builtin(BuiltinFn::fixed("競争", 1, |_, a| combine("競争", a, Promise::race)));
        self.define_builtin(BuiltinFn::fixed("タイマー", 1, builtin_timer));
        self.define_builtin(BuiltinFn::fixed("制限時間待機", 2, builtin_await_timeout));
        self.define_builtin(BuiltinFn::fixed("キャンセル済み", 0, |_, _| {
            Ok(Value::Bool(runtime::is_cancelled()))
        }));
        self.define_builtin(BuiltinFn::fixed("キャンセル確認", 0, builtin_check_cancelled));
        self.define_builtin(BuiltinFn::new("選択", 1, Some(2), builtin_select));

        for name in FORWARDED {
            if !self.contains_local(name) {
                self.define_builtin(forwarder(name));
            }
        }
    }
}

fn forwarder(name: &'static str) -> BuiltinFn {
    BuiltinFn::new(name, 1, None, move |interp, args| {
        let receiver = &args[0];
        match builtin_method(receiver, name) {
            Some(method) => interp.call(&Value::Builtin(method), args[1..].to_vec()),
            None => Err(Signal::type_error(format!(
                "{} に {} はありません",
                receiver.type_name(),
                name
            ))),
        }
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Function Implementations
// ═══════════════════════════════════════════════════════════════════════

fn builtin_print(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let line: Vec<String> = args.iter().map(Value::to_string).collect();
    interp.print_line(&line.join(" "));
    Ok(Value::Null)
}

fn builtin_type_name(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(match &args[0] {
        Value::Instance(instance) => Value::string(&instance.class.name),
        Value::Error(error) => Value::string(error.kind.name()),
        other => Value::string(other.type_name()),
    })
}

fn builtin_len(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.read().len(),
        Value::Map(entries) => entries.read().len(),
        Value::Channel(ch) => ch.len(),
        other => {
            return Err(Signal::type_error(format!(
                "{} には長さがありません",
                other.type_name()
            )))
        }
    };
    Ok(Value::from(len))
}

fn builtin_to_string(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(Value::from(args[0].to_string()))
}

fn parse_number(text: &str) -> Result<f64, Signal> {
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).map(|n| n as f64).ok(),
        None => trimmed.parse::<f64>().ok(),
    };
    parsed.ok_or_else(|| Signal::value_error(format!("数値に変換できません: {:?}", text)))
}

fn builtin_to_number(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => parse_number(s).map(Value::Number),
        other => Err(Signal::type_error(format!(
            "{} は数値に変換できません",
            other.type_name()
        ))),
    }
}

fn builtin_to_integer(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let n = args::number("整数", &builtin_to_number(interp, args)?)?;
    if !n.is_finite() {
        return Err(Signal::value_error(format!("{} は整数に変換できません", n)));
    }
    Ok(Value::Number(n.trunc()))
}

fn unary_math(func: &str, args: &[Value], op: fn(f64) -> f64) -> Result<Value, Signal> {
    Ok(Value::Number(op(args::number(func, &args[0])?)))
}

fn builtin_pow(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let base = args::number("べき乗", &args[0])?;
    let exp = args::number("べき乗", &args[1])?;
    Ok(Value::Number(base.powf(exp)))
}

/// `最大(1, 5, 3)` or `最大([1, 5, 3])`.
fn extremum(func: &str, args: &[Value], pick: fn(f64, f64) -> f64) -> Result<Value, Signal> {
    let items = match args {
        [Value::Array(items)] => items.read().clone(),
        _ => args.to_vec(),
    };
    let mut best: Option<f64> = None;
    for item in &items {
        let n = args::number(func, item)?;
        best = Some(best.map_or(n, |b| pick(b, n)));
    }
    best.map(Value::Number)
        .ok_or_else(|| Signal::value_error(format!("{} には 1 つ以上の値が必要です", func)))
}

/// `範囲(n)` is `0..n`, `範囲(a, b)` is `a..b`, with an optional step;
/// the end is excluded.
fn builtin_range(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let (start, end) = match args {
        [end] => (0.0, args::number("範囲", end)?),
        [start, end, ..] => (args::number("範囲", start)?, args::number("範囲", end)?),
        [] => return Err(Signal::value_error("範囲 には終点が必要です")),
    };
    let step = match args.get(2) {
        Some(step) => args::number("範囲", step)?,
        None => 1.0,
    };
    if step == 0.0 || !step.is_finite() {
        return Err(Signal::value_error("範囲 の刻みは 0 以外の有限の数値です"));
    }
    let count = ((end - start) / step).ceil().max(0.0);
    if count.is_nan() || count > MAX_RANGE_LEN as f64 {
        return Err(Signal::value_error(format!(
            "範囲 の要素数は {} 以下です",
            MAX_RANGE_LEN
        )));
    }
    let items = (0..count as usize)
        .map(|k| Value::Number(start + k as f64 * step))
        .collect();
    Ok(Value::array(items))
}

/// Order-preserving de-duplication. Unhashable values fall back to
/// equality against what was kept.
fn builtin_unique(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let items = args::array("一意", &args[0])?.read().clone();
    let mut seen = IndexSet::new();
    let mut kept = Vec::new();
    for item in items {
        match HashableValue::new(item.clone()) {
            Some(key) => {
                if seen.insert(key) {
                    kept.push(item);
                }
            }
            None if !kept.contains(&item) => kept.push(item),
            None => {}
        }
    }
    Ok(Value::array(kept))
}

fn builtin_sort(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let mut items = args::array("並べ替え", &args[0])?.read().clone();
    let compare = match arg(args, 1) {
        Value::Null => None,
        f => Some(args::callable("並べ替え", f)?.clone()),
    };
    sort_values(interp, &mut items, compare.as_ref())?;
    Ok(Value::array(items))
}

fn builtin_error(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let message = args[0].to_string();
    let mut error = ErrorValue::new(ErrorKind::UserError, message);
    if let Some(cause) = args.get(1).filter(|c| !c.is_null()) {
        error = error.with_cause(cause.clone());
    }
    Ok(error.into())
}

fn builtin_make_error(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let kind_name = args::string("エラー作成", &args[0])?;
    let kind = ErrorKind::from_name(kind_name)
        .ok_or_else(|| Signal::value_error(format!("未知のエラー種類です: {}", kind_name)))?;
    let mut error = ErrorValue::new(kind, args[1].to_string());
    if let Some(cause) = args.get(2).filter(|c| !c.is_null()) {
        error = error.with_cause(cause.clone());
    }
    Ok(error.into())
}

// ═══════════════════════════════════════════════════════════════════════
// JSON
// ═══════════════════════════════════════════════════════════════════════

fn builtin_to_json(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let json = to_json(&args[0], 0)?;
    let text = if arg(args, 1).is_truthy() {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map(Value::from)
        .map_err(|e| Signal::value_error(format!("JSON に変換できません: {}", e)))
}

fn to_json(value: &Value, depth: usize) -> Result<serde_json::Value, Signal> {
    if depth > MAX_JSON_DEPTH {
        return Err(Signal::value_error("JSON に変換できません: 入れ子が深すぎます"));
    }
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => match value.as_integer() {
            Some(i) => serde_json::Value::from(i),
            None => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .ok_or_else(|| Signal::value_error(format!("{} は JSON で表せません", n)))?,
        },
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Array(items) => serde_json::Value::Array(
            items
                .read()
                .iter()
                .map(|v| to_json(v, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(entries) => object(entries.read().iter(), depth)?,
        Value::Instance(instance) => object(instance.fields.read().iter(), depth)?,
        other => {
            return Err(Signal::type_error(format!(
                "{} は JSON に変換できません",
                other.type_name()
            )))
        }
    })
}

fn object<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
    depth: usize,
) -> Result<serde_json::Value, Signal> {
    let mut object = serde_json::Map::new();
    for (k, v) in entries {
        object.insert(k.clone(), to_json(v, depth + 1)?);
    }
    Ok(serde_json::Value::Object(object))
}

fn builtin_parse_json(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let text = args::string("JSON解析", &args[0])?;
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Signal::value_error(format!("JSON を解析できません: {}", e)))?;
    Ok(from_json(json))
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(entries) => Value::map(
            entries
                .into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<IndexMap<_, _>>(),
        ),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Files and Time
// ═══════════════════════════════════════════════════════════════════════

fn io_error(path: &str, e: std::io::Error) -> Signal {
    Signal::error(ErrorKind::IOError, format!("{}: {}", path, e))
}

fn builtin_read_file(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let path = args::string("ファイル読み込み", &args[0])?;
    std::fs::read_to_string(path)
        .map(Value::from)
        .map_err(|e| io_error(path, e))
}

fn builtin_write_file(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let path = args::string("ファイル書き込み", &args[0])?;
    std::fs::write(path, args[1].to_string()).map_err(|e| io_error(path, e))?;
    Ok(Value::Null)
}

/// Seconds since the Unix epoch.
fn builtin_now(_: &mut Interpreter, _: &[Value]) -> Result<Value, Signal> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    Ok(Value::Number(elapsed.as_secs_f64()))
}

fn millis(func: &str, v: &Value) -> Result<Duration, Signal> {
    let ms = args::number(func, v)?;
    if ms.is_nan() || ms < 0.0 || ms.is_infinite() {
        return Err(Signal::value_error(format!("{} には 0 以上のミリ秒が必要です", func)));
    }
    Ok(Duration::from_secs_f64(ms / 1000.0))
}

fn builtin_sleep(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    std::thread::sleep(millis("スリープ", &args[0])?);
    Ok(Value::Null)
}

// ═══════════════════════════════════════════════════════════════════════
// Concurrency
// ═══════════════════════════════════════════════════════════════════════

fn builtin_channel(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let capacity = match arg(args, 0) {
        Value::Null => 0,
        cap => args::count("チャネル作成", cap)?,
    };
    Ok(Value::Channel(Arc::new(Channel::new(capacity))))
}

fn builtin_semaphore(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let permits = match arg(args, 0) {
        Value::Null => 1,
        n => args::count("セマフォ作成", n)?,
    };
    Ok(Value::Semaphore(Arc::new(Semaphore::new(permits))))
}

fn builtin_atomic(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let initial = match arg(args, 0) {
        Value::Null => 0,
        n => args::integer("アトミック作成", n)?,
    };
    Ok(Value::Atomic(Arc::new(AtomicCounter::new(initial))))
}

/// `スレッド作成(f, 引数...)`: run `f` on a dedicated OS thread.
fn builtin_spawn_thread(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let f = args::callable("スレッド作成", &args[0])?.clone();
    let rest = args[1..].to_vec();
    let mut task = interp.fork();
    let handle = ThreadHandle::spawn("thread", move || settle(task.call(&f, rest)))?;
    Ok(Value::Thread(handle))
}

/// `タスク実行(f, 引数...)`: run `f` on the worker pool.
fn builtin_spawn_task(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let f = args::callable("タスク実行", &args[0])?.clone();
    let rest = args[1..].to_vec();
    let mut task = interp.fork();
    let promise = interp
        .shared()
        .scheduler()
        .spawn(move || settle(task.call(&f, rest)));
    Ok(Value::Promise(promise))
}

/// Promises from an array; plain values count as already fulfilled.
fn promises(func: &str, v: &Value) -> Result<Vec<Arc<Promise>>, Signal> {
    let items = args::array(func, v)?.read().clone();
    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Promise(p) => p,
            other => Promise::resolved(other),
        })
        .collect())
}

fn combine(
    func: &str,
    args: &[Value],
    op: fn(Vec<Arc<Promise>>) -> Arc<Promise>,
) -> Result<Value, Signal> {
    Ok(Value::Promise(op(promises(func, &args[0])?)))
}

fn builtin_timer(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let delay = millis("タイマー", &args[0])?;
    Ok(Value::Promise(interp.shared().scheduler().timer(delay)))
}

fn builtin_await_timeout(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let timeout = millis("制限時間待機", &args[1])?;
    await_value(interp, args[0].clone(), Some(timeout), Span::default())
}

fn builtin_check_cancelled(_: &mut Interpreter, _: &[Value]) -> Result<Value, Signal> {
    if runtime::is_cancelled() {
        return Err(Signal::error(ErrorKind::CancelledError, "タスクはキャンセルされました"));
    }
    Ok(Value::Null)
}

/// `選択([ch1, [ch2, 値]], 既定)`: a bare channel receives, a
/// `[channel, value]` pair sends. With a truthy second argument nothing
/// blocks and `番号` is -1 when no case was ready.
fn builtin_select(_: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let items = args::array("選択", &args[0])?.read().clone();
    let mut cases = Vec::with_capacity(items.len());
    for item in &items {
        cases.push(match item {
            Value::Channel(ch) => SelectCase::Recv(Arc::clone(ch)),
            Value::Array(pair) => match pair.read().as_slice() {
                [Value::Channel(ch), value] => SelectCase::Send(Arc::clone(ch), value.clone()),
                _ => return Err(Signal::type_error("送信の選択肢は [チャネル, 値] です")),
            },
            other => {
                return Err(Signal::type_error(format!(
                    "{} は選択肢に使えません",
                    other.type_name()
                )))
            }
        });
    }
    if cases.is_empty() {
        return Err(Signal::value_error("選択 には 1 つ以上の選択肢が必要です"));
    }

    let (index, value) = match select(&cases, arg(args, 1).is_truthy())? {
        Selected::Received { index, value } => (index as f64, value.unwrap_or(Value::Null)),
        Selected::Sent { index } => (index as f64, Value::Null),
        Selected::Default => (-1.0, Value::Null),
    };
    Ok(Value::map_from([
        ("番号", Value::Number(index)),
        ("値", value),
    ]))
}
