//! Builtin properties and methods of strings, collections and runtime
//! objects
//!
//! Methods are looked up by name on the receiver's kind and come back as
//! a [`BuiltinFn`] that has already captured the receiver, so arity errors
//! count only the arguments the program wrote. Most methods answer to a
//! Japanese and an English name.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ErrorKind;
use crate::runtime::{AtomicCounter, Channel, Mutex, Promise, RwLock, Semaphore, ThreadHandle, WaitGroup};
use crate::span::Span;
use crate::value::{ArrayRef, BuiltinFn, MapRef, Value};

use super::args::{self, arg};
use super::concurrency::await_value;
use super::{settle, Interpreter, Signal};

type Method<T> = fn(&mut Interpreter, &T, &[Value]) -> Result<Value, Signal>;

/// Arity bounds and implementation of one method.
type Entry<T> = (usize, Option<usize>, Method<T>);

fn m<T>(min: usize, max: usize, func: Method<T>) -> Entry<T> {
    (min, Some(max), func)
}

fn variadic<T>(min: usize, func: Method<T>) -> Entry<T> {
    (min, None, func)
}

fn bind<T>(name: &str, receiver: &T, (min, max, func): Entry<T>) -> BuiltinFn
where
    T: Clone + Send + Sync + 'static,
{
    let receiver = receiver.clone();
    BuiltinFn::new(name, min, max, move |interp, args| func(interp, &receiver, args))
}

/// A non-callable property such as `長さ`.
pub(crate) fn property(receiver: &Value, name: &str) -> Option<Value> {
    if !matches!(name, "長さ" | "length") {
        return None;
    }
    match receiver {
        Value::String(s) => Some(Value::from(s.chars().count())),
        Value::Array(items) => Some(Value::from(items.read().len())),
        Value::Map(entries) => Some(Value::from(entries.read().len())),
        Value::Channel(ch) => Some(Value::from(ch.len())),
        _ => None,
    }
}

/// The method `name` of `receiver`, bound to it.
pub(crate) fn method(receiver: &Value, name: &str) -> Option<BuiltinFn> {
    Some(match receiver {
        Value::String(s) => bind(name, s, string_method(name)?),
        Value::Array(items) => bind(name, items, array_method(name)?),
        Value::Map(entries) => bind(name, entries, map_method(name)?),
        Value::Promise(p) => bind(name, p, promise_method(name)?),
        Value::Channel(ch) => bind(name, ch, channel_method(name)?),
        Value::Mutex(mx) => bind(name, mx, mutex_method(name)?),
        Value::RwLock(rw) => bind(name, rw, rwlock_method(name)?),
        Value::Semaphore(sem) => bind(name, sem, semaphore_method(name)?),
        Value::Atomic(counter) => bind(name, counter, atomic_method(name)?),
        Value::WaitGroup(wg) => bind(name, wg, waitgroup_method(name)?),
        Value::Thread(thread) => bind(name, thread, thread_method(name)?),
        _ => return None,
    })
}

/// Clamp a `[start, end)` character or element range, counting negative
/// positions from the end.
fn slice_bounds(start: i64, end: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |i: i64| -> usize {
        let i = if i < 0 { len as i64 + i } else { i };
        i.clamp(0, len as i64) as usize
    };
    let start = clamp(start);
    let end = end.map_or(len, clamp);
    (start, end.max(start))
}

fn optional_integer(func: &str, args: &[Value], i: usize) -> Result<Option<i64>, Signal> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => args::integer(func, v).map(Some),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Strings
// ═══════════════════════════════════════════════════════════════════════

fn string_method(name: &str) -> Option<Entry<Arc<str>>> {
    Some(match name {
        "大文字" | "upper" => m(0, 0, |_, s, _| Ok(Value::from(s.to_uppercase()))),
        "小文字" | "lower" => m(0, 0, |_, s, _| Ok(Value::from(s.to_lowercase()))),
        "前後削除" | "trim" => m(0, 0, |_, s, _| Ok(Value::string(s.trim()))),
        "含む" | "contains" => m(1, 1, |_, s, args| {
            Ok(Value::Bool(s.contains(args::string("含む", &args[0])?)))
        }),
        "始まる" | "starts_with" => m(1, 1, |_, s, args| {
            Ok(Value::Bool(s.starts_with(args::string("始まる", &args[0])?)))
        }),
        "終わる" | "ends_with" => m(1, 1, |_, s, args| {
            Ok(Value::Bool(s.ends_with(args::string("終わる", &args[0])?)))
        }),
        "分割" | "split" => m(0, 1, |_, s, args| {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Null => s.split_whitespace().map(Value::string).collect(),
                sep => {
                    let sep = args::string("分割", sep)?;
                    if sep.is_empty() {
                        s.chars().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        s.split(sep).map(Value::string).collect()
                    }
                }
            };
            Ok(Value::array(parts))
        }),
        "置換" | "replace" => m(2, 2, |_, s, args| {
            let from = args::string("置換", &args[0])?;
            let to = args::string("置換", &args[1])?;
            Ok(Value::from(s.replace(from, to)))
        }),
        "切り出し" | "slice" => m(1, 2, |_, s, args| {
            let chars: Vec<char> = s.chars().collect();
            let start = args::integer("切り出し", &args[0])?;
            let end = optional_integer("切り出し", args, 1)?;
            let (from, to) = slice_bounds(start, end, chars.len());
            Ok(Value::from(chars[from..to].iter().collect::<String>()))
        }),
        "位置" | "index_of" => m(1, 1, |_, s, args| {
            let needle = args::string("位置", &args[0])?;
            Ok(match s.find(needle) {
                Some(byte) => Value::from(s[..byte].chars().count()),
                None => Value::Number(-1.0),
            })
        }),
        "繰り返し" | "repeat" => m(1, 1, |_, s, args| {
            Ok(Value::from(s.repeat(args::count("繰り返し", &args[0])?)))
        }),
        "文字一覧" | "chars" => m(0, 0, |_, s, _| {
            Ok(Value::array(s.chars().map(|c| Value::string(c.to_string())).collect()))
        }),
        _ => return None,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Arrays
// ═══════════════════════════════════════════════════════════════════════

fn array_method(name: &str) -> Option<Entry<ArrayRef>> {
    Some(match name {
        "追加" | "push" => variadic(1, |_, items, args| {
            items.write().extend(args.iter().cloned());
            Ok(Value::Null)
        }),
        "取り出す" | "pop" => m(0, 0, |_, items, _| Ok(items.write().pop().unwrap_or(Value::Null))),
        "先頭取り出し" | "shift" => m(0, 0, |_, items, _| {
            let mut items = items.write();
            Ok(if items.is_empty() { Value::Null } else { items.remove(0) })
        }),
        "挿入" | "insert" => m(2, 2, |_, items, args| {
            let mut items = items.write();
            let at = args::count("挿入", &args[0])?;
            if at > items.len() {
                return Err(Signal::error(
                    ErrorKind::IndexError,
                    format!("挿入位置 {} は範囲外です (長さ {})", at, items.len()),
                ));
            }
            items.insert(at, args[1].clone());
            Ok(Value::Null)
        }),
        "削除" | "remove" => m(1, 1, |_, items, args| {
            let mut items = items.write();
            let i = args::integer("削除", &args[0])?;
            match args::resolve_index(i, items.len()) {
                Some(i) => Ok(items.remove(i)),
                None => Err(Signal::error(
                    ErrorKind::IndexError,
                    format!("添字 {} は範囲外です (長さ {})", i, items.len()),
                )),
            }
        }),
        "含む" | "contains" => m(1, 1, |_, items, args| {
            Ok(Value::Bool(items.read().contains(&args[0])))
        }),
        "位置" | "index_of" => m(1, 1, |_, items, args| {
            Ok(match items.read().iter().position(|v| *v == args[0]) {
                Some(i) => Value::from(i),
                None => Value::Number(-1.0),
            })
        }),
        "結合" | "join" => m(0, 1, |_, items, args| {
            let sep = match arg(args, 0) {
                Value::Null => ",",
                sep => args::string("結合", sep)?,
            };
            let parts: Vec<String> = items.read().iter().map(Value::to_string).collect();
            Ok(Value::from(parts.join(sep)))
        }),
        "逆順" | "reverse" => m(0, 0, |_, items, _| {
            Ok(Value::array(items.read().iter().rev().cloned().collect()))
        }),
        "並べ替え" | "sort" => m(0, 1, |interp, items, args| {
            let mut sorted = items.read().clone();
            let compare = match arg(args, 0) {
                Value::Null => None,
                f => Some(args::callable("並べ替え", f)?.clone()),
            };
            sort_values(interp, &mut sorted, compare.as_ref())?;
            Ok(Value::array(sorted))
        }),
        "切り出し" | "slice" => m(1, 2, |_, items, args| {
            let items = items.read();
            let start = args::integer("切り出し", &args[0])?;
            let end = optional_integer("切り出し", args, 1)?;
            let (from, to) = slice_bounds(start, end, items.len());
            Ok(Value::array(items[from..to].to_vec()))
        }),
        "変換" | "map" => m(1, 1, |interp, items, args| {
            let f = args::callable("変換", &args[0])?;
            let snapshot = items.read().clone();
            let mut out = Vec::with_capacity(snapshot.len());
            for item in snapshot {
                out.push(interp.call(f, vec![item])?);
            }
            Ok(Value::array(out))
        }),
        "絞り込み" | "filter" => m(1, 1, |interp, items, args| {
            let f = args::callable("絞り込み", &args[0])?;
            let snapshot = items.read().clone();
            let mut out = Vec::new();
            for item in snapshot {
                if interp.call(f, vec![item.clone()])?.is_truthy() {
                    out.push(item);
                }
            }
            Ok(Value::array(out))
        }),
        "畳み込み" | "reduce" => m(1, 2, |interp, items, args| {
            let f = args::callable("畳み込み", &args[0])?;
            let mut snapshot = items.read().clone().into_iter();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => snapshot.next().ok_or_else(|| {
                    Signal::value_error("空の配列は初期値なしで畳み込めません")
                })?,
            };
            for item in snapshot {
                acc = interp.call(f, vec![acc, item])?;
            }
            Ok(acc)
        }),
        "各要素" | "each" => m(1, 1, |interp, items, args| {
            let f = args::callable("各要素", &args[0])?;
            let snapshot = items.read().clone();
            for item in snapshot {
                interp.call(f, vec![item])?;
            }
            Ok(Value::Null)
        }),
        "合計" | "sum" => m(0, 0, |_, items, _| {
            let mut total = 0.0;
            for item in items.read().iter() {
                total += args::number("合計", item)?;
            }
            Ok(Value::Number(total))
        }),
        "最初" | "first" => m(0, 0, |_, items, _| {
            Ok(items.read().first().cloned().unwrap_or(Value::Null))
        }),
        "最後" | "last" => m(0, 0, |_, items, _| {
            Ok(items.read().last().cloned().unwrap_or(Value::Null))
        }),
        _ => return None,
    })
}

/// Sort numbers or strings in natural order, or by a comparison function
/// returning a negative, zero or positive number.
pub(crate) fn sort_values(
    interp: &mut Interpreter,
    items: &mut [Value],
    compare: Option<&Value>,
) -> Result<(), Signal> {
    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let ordering = match compare {
            Some(f) => interp.call(f, vec![a.clone(), b.clone()]).and_then(|r| {
                r.as_number()
                    .map(|n| n.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
                    .ok_or_else(|| Signal::type_error("比較関数は数値を返す必要があります"))
            }),
            None => natural_order(a, b),
        };
        ordering.unwrap_or_else(|e| {
            failure = Some(e);
            Ordering::Equal
        })
    });
    failure.map_or(Ok(()), Err)
}

fn natural_order(a: &Value, b: &Value) -> Result<Ordering, Signal> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(x.partial_cmp(y).unwrap_or(Ordering::Equal)),
        (Value::String(x), Value::String(y)) => Ok(x.as_bytes().cmp(y.as_bytes())),
        _ => Err(Signal::type_error(format!(
            "{} と {} は比較できません",
            a.type_name(),
            b.type_name()
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Maps
// ═══════════════════════════════════════════════════════════════════════

fn map_method(name: &str) -> Option<Entry<MapRef>> {
    Some(match name {
        "キー" | "keys" => m(0, 0, |_, entries, _| {
            Ok(Value::array(entries.read().keys().map(Value::string).collect()))
        }),
        "値一覧" | "values" => m(0, 0, |_, entries, _| {
            Ok(Value::array(entries.read().values().cloned().collect()))
        }),
        "項目" | "entries" => m(0, 0, |_, entries, _| {
            Ok(Value::array(
                entries
                    .read()
                    .iter()
                    .map(|(k, v)| Value::array(vec![Value::string(k), v.clone()]))
                    .collect(),
            ))
        }),
        "含む" | "has" => m(1, 1, |_, entries, args| {
            let key = args::string("含む", &args[0])?;
            Ok(Value::Bool(entries.read().contains_key(key)))
        }),
        "取得" | "get" => m(1, 2, |_, entries, args| {
            let key = args::string("取得", &args[0])?;
            Ok(entries
                .read()
                .get(key)
                .cloned()
                .unwrap_or_else(|| arg(args, 1).clone()))
        }),
        "設定" | "set" => m(2, 2, |_, entries, args| {
            let key = args::string("設定", &args[0])?;
            entries.write().insert(key.to_string(), args[1].clone());
            Ok(Value::Null)
        }),
        "削除" | "remove" => m(1, 1, |_, entries, args| {
            let key = args::string("削除", &args[0])?;
            Ok(entries.write().shift_remove(key).unwrap_or(Value::Null))
        }),
        _ => return None,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Promises and Threads
// ═══════════════════════════════════════════════════════════════════════

fn promise_method(name: &str) -> Option<Entry<Arc<Promise>>> {
    Some(match name {
        "そして" | "then" => m(1, 1, |interp, p, args| chain(interp, p, &args[0], true)),
        "失敗時" | "catch" => m(1, 1, |interp, p, args| chain(interp, p, &args[0], false)),
        "キャンセル" | "cancel" => m(0, 0, |_, p, _| {
            p.cancel();
            Ok(Value::Null)
        }),
        "状態" | "state" => m(0, 0, |_, p, _| Ok(Value::string(p.state().label()))),
        "待つ" | "await" => m(0, 1, |interp, p, args| {
            let timeout = match arg(args, 0) {
                Value::Null => None,
                ms => Some(Duration::from_millis(args::count("待つ", ms)? as u64)),
            };
            await_value(interp, Value::Promise(Arc::clone(p)), timeout, Span::default())
        }),
        _ => return None,
    })
}

/// `then` / `catch`: a new promise settled by `callback` once `p` settles
/// the way the callback handles. The callback runs on the pool; whatever
/// it returns is adopted, so returning a promise chains it.
fn chain(
    interp: &Interpreter,
    p: &Arc<Promise>,
    callback: &Value,
    on_fulfilled: bool,
) -> Result<Value, Signal> {
    let callback = args::callable(if on_fulfilled { "そして" } else { "失敗時" }, callback)?.clone();
    let next = Promise::new();
    let result = Value::Promise(Arc::clone(&next));
    let task = interp.fork();

    p.on_settle(move |outcome| {
        let outcome = outcome.clone();
        let shared = Arc::clone(task.shared());
        shared.scheduler().submit(move || {
            let mut task = task;
            let outcome = match (outcome, on_fulfilled) {
                (Ok(value), true) => {
                    let args = callback_args(&callback, value);
                    settle(task.call(&callback, args))
                }
                (Err(error), false) => {
                    let args = callback_args(&callback, Value::Error(error));
                    settle(task.call(&callback, args))
                }
                (passthrough, _) => passthrough,
            };
            next.adopt(outcome);
        });
    });
    Ok(result)
}

/// A user callback declared without parameters is called without the
/// settled value.
fn callback_args(callback: &Value, value: Value) -> Vec<Value> {
    match callback {
        Value::Function(closure) if closure.def.params.is_empty() => Vec::new(),
        _ => vec![value],
    }
}

fn thread_method(name: &str) -> Option<Entry<Arc<ThreadHandle>>> {
    Some(match name {
        "合流" | "join" => m(0, 0, |_, thread, _| thread.join().map_err(Signal::Error)),
        "完了" | "is_finished" => m(0, 0, |_, thread, _| Ok(Value::Bool(thread.is_finished()))),
        _ => return None,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Channels
// ═══════════════════════════════════════════════════════════════════════

fn channel_method(name: &str) -> Option<Entry<Arc<Channel>>> {
    Some(match name {
        "送信" | "send" => m(1, 1, |_, ch, args| {
            ch.send(args[0].clone())?;
            Ok(Value::Null)
        }),
        "受信" | "recv" => m(0, 0, |_, ch, _| Ok(ch.recv().unwrap_or(Value::Null))),
        // `{値, 閉}` tells a received `無` apart from a closed, drained channel
        "受信結果" | "recv_result" => m(0, 0, |_, ch, _| {
            let received = ch.recv();
            Ok(Value::map_from([
                ("閉", Value::Bool(received.is_none())),
                ("値", received.unwrap_or(Value::Null)),
            ]))
        }),
        "試行受信" | "try_recv" => m(0, 0, |_, ch, _| Ok(ch.try_recv().unwrap_or(Value::Null))),
        "閉じる" | "close" => m(0, 0, |_, ch, _| {
            ch.close();
            Ok(Value::Null)
        }),
        "閉じている" | "is_closed" => m(0, 0, |_, ch, _| Ok(Value::Bool(ch.is_closed()))),
        "容量" | "capacity" => m(0, 0, |_, ch, _| Ok(Value::from(ch.capacity()))),
        _ => return None,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Locks and Counters
// ═══════════════════════════════════════════════════════════════════════

fn mutex_method(name: &str) -> Option<Entry<Arc<Mutex>>> {
    Some(match name {
        "ロック" | "lock" => m(0, 0, |_, mx, _| {
            mx.lock()?;
            Ok(Value::Null)
        }),
        "解放" | "unlock" => m(0, 0, |_, mx, _| {
            mx.unlock()?;
            Ok(Value::Null)
        }),
        "試行" | "try_lock" => m(0, 0, |_, mx, _| Ok(Value::Bool(mx.try_lock()?))),
        "ロック中" | "is_locked" => m(0, 0, |_, mx, _| Ok(Value::Bool(mx.is_locked()))),
        _ => return None,
    })
}

fn rwlock_method(name: &str) -> Option<Entry<Arc<RwLock>>> {
    Some(match name {
        "読み取りロック" | "read_lock" => m(0, 0, |_, rw, _| {
            rw.read_lock();
            Ok(Value::Null)
        }),
        "読み取り解放" | "read_unlock" => m(0, 0, |_, rw, _| {
            rw.read_unlock()?;
            Ok(Value::Null)
        }),
        "書き込みロック" | "write_lock" => m(0, 0, |_, rw, _| {
            rw.write_lock();
            Ok(Value::Null)
        }),
        "書き込み解放" | "write_unlock" => m(0, 0, |_, rw, _| {
            rw.write_unlock()?;
            Ok(Value::Null)
        }),
        "読み取り数" | "readers" => m(0, 0, |_, rw, _| Ok(Value::from(rw.readers()))),
        _ => return None,
    })
}

fn semaphore_method(name: &str) -> Option<Entry<Arc<Semaphore>>> {
    Some(match name {
        "獲得" | "acquire" => m(0, 0, |_, sem, _| {
            sem.acquire();
            Ok(Value::Null)
        }),
        "解放" | "release" => m(0, 0, |_, sem, _| {
            sem.release();
            Ok(Value::Null)
        }),
        "試行" | "try_acquire" => m(0, 0, |_, sem, _| Ok(Value::Bool(sem.try_acquire()))),
        "残り" | "available" => m(0, 0, |_, sem, _| Ok(Value::from(sem.available()))),
        _ => return None,
    })
}

fn atomic_method(name: &str) -> Option<Entry<Arc<AtomicCounter>>> {
    Some(match name {
        "取得" | "get" => m(0, 0, |_, c, _| Ok(Value::from(c.get()))),
        "設定" | "set" => m(1, 1, |_, c, args| {
            c.set(args::integer("設定", &args[0])?);
            Ok(Value::Null)
        }),
        "加算" | "add" => m(1, 1, |_, c, args| {
            Ok(Value::from(c.add(args::integer("加算", &args[0])?)))
        }),
        "増加" | "increment" => m(0, 0, |_, c, _| Ok(Value::from(c.add(1)))),
        "減少" | "decrement" => m(0, 0, |_, c, _| Ok(Value::from(c.add(-1)))),
        "比較交換" | "compare_and_set" => m(2, 2, |_, c, args| {
            let expected = args::integer("比較交換", &args[0])?;
            let new = args::integer("比較交換", &args[1])?;
            Ok(Value::Bool(c.compare_and_set(expected, new)))
        }),
        _ => return None,
    })
}

fn waitgroup_method(name: &str) -> Option<Entry<Arc<WaitGroup>>> {
    Some(match name {
        "追加" | "add" => m(0, 1, |_, wg, args| {
            let delta = optional_integer("追加", args, 0)?.unwrap_or(1);
            wg.add(delta)?;
            Ok(Value::Null)
        }),
        "完了" | "done" => m(0, 0, |_, wg, _| {
            wg.done()?;
            Ok(Value::Null)
        }),
        "待機" | "wait" => m(0, 0, |_, wg, _| {
            wg.wait();
            Ok(Value::Null)
        }),
        "数" | "count" => m(0, 0, |_, wg, _| Ok(Value::from(wg.count()))),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn call(receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, Signal> {
        let mut interp = Interpreter::new();
        let method = method(receiver, name).expect("method exists");
        interp.call(&Value::Builtin(method), args)
    }

    #[test]
    fn test_slice_bounds_clamp() {
        assert_eq!(slice_bounds(1, None, 5), (1, 5));
        assert_eq!(slice_bounds(-2, None, 5), (3, 5));
        assert_eq!(slice_bounds(3, Some(1), 5), (3, 3));
        assert_eq!(slice_bounds(-9, Some(99), 5), (0, 5));
    }

    #[test]
    fn test_string_methods_count_characters() {
        let s = Value::string("こんにちは");
        assert_eq!(property(&s, "長さ"), Some(Value::Number(5.0)));
        assert_eq!(
            call(&s, "切り出し", vec![Value::Number(1.0), Value::Number(3.0)]).ok(),
            Some(Value::string("んに"))
        );
        assert_eq!(call(&s, "位置", vec![Value::string("ち")]).ok(), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_push_mutates_shared_array() {
        let xs = Value::array(vec![Value::Number(1.0)]);
        let alias = xs.clone();
        call(&xs, "追加", vec![Value::Number(2.0), Value::Number(3.0)]).expect("push");
        assert_eq!(alias.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn test_sort_natural_and_mixed() {
        let xs = Value::array(vec![Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(call(&xs, "並べ替え", vec![]).ok().map(|v| v.to_string()), Some("[1, 2, 3]".to_string()));

        let mixed = Value::array(vec![Value::Number(1.0), Value::string("a")]);
        assert!(call(&mixed, "sort", vec![]).is_err());
    }

    #[test]
    fn test_arity_counts_written_arguments() {
        let s = Value::string("abc");
        let err = call(&s, "置換", vec![Value::string("a")]).err();
        let kind = err.as_ref().and_then(|e| e.as_error()).map(|e| e.kind);
        assert_eq!(kind, Some(ErrorKind::ArityError));
    }

    #[test]
    fn test_unknown_method() {
        assert!(method(&Value::Number(1.0), "追加").is_none());
        assert!(method(&Value::string("x"), "存在しない").is_none());
    }
}
