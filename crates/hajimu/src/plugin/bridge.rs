//! Value marshalling and the call bridge
//!
//! Arguments are lowered into an [`Arena`] that owns every string and list
//! the plugin sees, so nothing needs freeing on the plugin side. Callables
//! and opaque values are entered in a process-wide handle table for the
//! duration of the call.
//!
//! Callbacks through [`HajimuRuntime::call`] run on a forked interpreter
//! kept on a thread-local stack, one entry per native call in progress.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use dashmap::DashMap;
use indexmap::IndexMap;

use super::abi::{
    str_text, HajimuList, HajimuRuntime, HajimuStr, HajimuValue, Payload, ValueTag, ABI_VERSION,
};
use crate::error::{ErrorKind, PluginError};
use crate::eval::{Interpreter, Signal};
use crate::value::{ErrorValue, NativeFn, Value};

/// Nesting past which a value is treated as cyclic.
const MAX_DEPTH: usize = 64;

/// Callback table handed to plugins that declare the runtime entry.
pub(crate) static RUNTIME: HajimuRuntime = HajimuRuntime {
    version: ABI_VERSION,
    call: runtime_call,
    print: runtime_print,
};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn handles() -> &'static DashMap<u64, Value> {
    static HANDLES: OnceLock<DashMap<u64, Value>> = OnceLock::new();
    HANDLES.get_or_init(DashMap::new)
}

struct Caller {
    interp: Interpreter,
    arena: Arena,
}

thread_local! {
    static CALLERS: RefCell<Vec<Caller>> = const { RefCell::new(Vec::new()) };
}

// ═══════════════════════════════════════════════════════════════════════
// Arena
// ═══════════════════════════════════════════════════════════════════════

/// Owns the memory behind lowered values. Boxed slices never move, so
/// pointers stay valid while the arena grows.
#[derive(Default)]
pub(crate) struct Arena {
    bytes: Vec<Box<[u8]>>,
    lists: Vec<Box<[HajimuValue]>>,
    keys: Vec<Box<[HajimuStr]>>,
    handles: Vec<u64>,
}

impl Arena {
    fn text(&mut self, s: &str) -> HajimuStr {
        let mut buf = Vec::with_capacity(s.len() + 1);
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
        let buf = buf.into_boxed_slice();
        let out = HajimuStr {
            ptr: buf.as_ptr().cast(),
            len: s.len(),
        };
        self.bytes.push(buf);
        out
    }

    fn handle(&mut self, value: &Value) -> u64 {
        let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        handles().insert(id, value.clone());
        self.handles.push(id);
        id
    }

    fn tagged(tag: ValueTag, payload: Payload) -> HajimuValue {
        HajimuValue {
            tag: tag as u32,
            payload,
        }
    }

    fn error(&mut self, message: &str) -> HajimuValue {
        Self::tagged(
            ValueTag::Error,
            Payload {
                string: self.text(message),
            },
        )
    }

    /// Lower `value` into its C form.
    pub(crate) fn lower(&mut self, value: &Value, depth: usize) -> Result<HajimuValue, PluginError> {
        if depth > MAX_DEPTH {
            return Err(PluginError::Unconvertible("深く入れ子になった値".into()));
        }
        Ok(match value {
            Value::Null => HajimuValue::null(),
            Value::Bool(b) => HajimuValue::boolean(*b),
            Value::Number(n) => HajimuValue::number(*n),
            Value::String(s) => Self::tagged(ValueTag::String, Payload { string: self.text(s) }),
            Value::Error(e) => self.error(&e.message),
            Value::Array(items) => {
                let snapshot = items.read().clone();
                let lowered = snapshot
                    .iter()
                    .map(|v| self.lower(v, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_boxed_slice();
                let list = HajimuList {
                    items: lowered.as_ptr(),
                    keys: std::ptr::null(),
                    len: lowered.len(),
                };
                self.lists.push(lowered);
                Self::tagged(ValueTag::Array, Payload { list })
            }
            Value::Map(entries) => {
                let snapshot: Vec<(String, Value)> = entries
                    .read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut keys = Vec::with_capacity(snapshot.len());
                let mut items = Vec::with_capacity(snapshot.len());
                for (k, v) in &snapshot {
                    keys.push(self.text(k));
                    items.push(self.lower(v, depth + 1)?);
                }
                let (keys, items) = (keys.into_boxed_slice(), items.into_boxed_slice());
                let list = HajimuList {
                    items: items.as_ptr(),
                    keys: keys.as_ptr(),
                    len: items.len(),
                };
                self.lists.push(items);
                self.keys.push(keys);
                Self::tagged(ValueTag::Map, Payload { list })
            }
            v if v.is_callable() => Self::tagged(
                ValueTag::Callable,
                Payload {
                    handle: self.handle(v),
                },
            ),
            other => Self::tagged(
                ValueTag::Opaque,
                Payload {
                    handle: self.handle(other),
                },
            ),
        })
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for id in self.handles.drain(..) {
            handles().remove(&id);
        }
    }
}

/// Raise a [`Value`] from its C form.
///
/// # Safety
/// Pointers inside `value` must be valid for the lengths they claim.
pub(crate) unsafe fn lift(value: &HajimuValue, depth: usize) -> Result<Value, String> {
    if depth > MAX_DEPTH {
        return Err("値の入れ子が深すぎます".into());
    }
    let Some(tag) = value.kind() else {
        return Err(format!("未知の型タグ {}", value.tag));
    };
    let p = &value.payload;
    Ok(match tag {
        ValueTag::Null => Value::Null,
        ValueTag::Bool => Value::Bool(p.boolean),
        ValueTag::Number => Value::Number(p.number),
        ValueTag::String => Value::from(str_text(p.string)),
        ValueTag::Error => ErrorValue::new(ErrorKind::PluginError, str_text(p.string)).into(),
        ValueTag::Array => {
            let items = list_items(p.list);
            Value::array(
                items
                    .iter()
                    .map(|v| lift(v, depth + 1))
                    .collect::<Result<_, _>>()?,
            )
        }
        ValueTag::Map => {
            let items = list_items(p.list);
            if p.list.keys.is_null() && !items.is_empty() {
                return Err("辞書にキーがありません".into());
            }
            let keys = if items.is_empty() {
                &[][..]
            } else {
                std::slice::from_raw_parts(p.list.keys, items.len())
            };
            let mut entries = IndexMap::with_capacity(items.len());
            for (k, v) in keys.iter().zip(items) {
                entries.insert(str_text(*k), lift(v, depth + 1)?);
            }
            Value::map(entries)
        }
        ValueTag::Callable | ValueTag::Opaque => handles()
            .get(&p.handle)
            .map(|v| v.value().clone())
            .ok_or_else(|| format!("無効なハンドル {}", p.handle))?,
    })
}

unsafe fn list_items<'a>(list: HajimuList) -> &'a [HajimuValue] {
    if list.items.is_null() || list.len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(list.items, list.len)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Calls
// ═══════════════════════════════════════════════════════════════════════

fn plugin_error(e: PluginError) -> Signal {
    Signal::error(ErrorKind::PluginError, e.to_string())
}

/// Invoke a native entry with interpreter values. Arity has already been
/// checked by the caller.
pub(crate) fn call_native(
    interp: &mut Interpreter,
    native: &NativeFn,
    args: &[Value],
) -> Result<Value, Signal> {
    let mut arena = Arena::default();
    let lowered = args
        .iter()
        .map(|v| arena.lower(v, 0))
        .collect::<Result<Vec<_>, _>>()
        .map_err(plugin_error)?;

    CALLERS.with(|stack| {
        stack.borrow_mut().push(Caller {
            interp: interp.fork(),
            arena: Arena::default(),
        })
    });
    // SAFETY: `lowered` and everything it points to lives in `arena`
    // until after the entry returns.
    let mut out = unsafe { (native.entry)(lowered.as_ptr(), lowered.len()) };
    let caller = CALLERS.with(|stack| stack.borrow_mut().pop());

    let function = format!("{}::{}", native.plugin, native.name);
    // SAFETY: the plugin owns `out` until `release` runs below.
    let result = unsafe {
        match out.kind() {
            Some(ValueTag::Error) => Err(str_text(out.payload.string)),
            _ => lift(&out, 0),
        }
    }
    .map_err(|message| PluginError::CallFailed { function, message });
    if let Some(release) = native.release {
        unsafe { release(&mut out) };
    }
    drop(caller);
    drop(arena);
    result.map_err(plugin_error)
}

/// Pass the callback table to a plugin's runtime entry.
pub(crate) fn install_runtime(entry: super::abi::EntryFn) {
    let table = HajimuValue {
        tag: ValueTag::Opaque as u32,
        payload: Payload {
            pointer: std::ptr::addr_of!(RUNTIME).cast(),
        },
    };
    // SAFETY: `RUNTIME` is static.
    unsafe { entry(&table, 1) };
}

unsafe extern "C" fn runtime_call(handle: u64, args: *const HajimuValue, argc: usize) -> HajimuValue {
    let Some(callee) = handles().get(&handle).map(|v| v.value().clone()) else {
        return HajimuValue::error(c"無効なハンドルです");
    };
    let Some(mut caller) = CALLERS.with(|stack| stack.borrow_mut().pop()) else {
        return HajimuValue::error(c"プラグイン呼び出しの外からは呼び出せません");
    };

    let raw = if args.is_null() || argc == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(args, argc)
    };
    let lifted = raw.iter().map(|v| lift(v, 0)).collect::<Result<Vec<_>, _>>();

    let out = match lifted {
        Err(message) => caller.arena.error(&message),
        Ok(args) => match caller.interp.call(&callee, args) {
            Ok(value) => caller
                .arena
                .lower(&value, 0)
                .unwrap_or_else(|e| caller.arena.error(&e.to_string())),
            Err(signal) => {
                let message = match signal.as_error() {
                    Some(e) => e.to_string(),
                    None => "制御フローがプラグインを越えました".to_string(),
                };
                caller.arena.error(&message)
            }
        },
    };
    CALLERS.with(|stack| stack.borrow_mut().push(caller));
    out
}

unsafe extern "C" fn runtime_print(text: HajimuStr) {
    let text = str_text(text);
    CALLERS.with(|stack| match stack.borrow().last() {
        Some(caller) => caller.interp.print_line(&text),
        None => tracing::warn!(%text, "plugin printed outside a call"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lower_and_lift_nested() {
        let value = Value::map_from([
            ("名前", Value::from("ハジム")),
            ("数", Value::array(vec![Value::Number(1.0), Value::Null])),
        ]);
        let mut arena = Arena::default();
        let lowered = arena.lower(&value, 0).unwrap();
        let lifted = unsafe { lift(&lowered, 0) }.unwrap();
        assert_eq!(lifted.to_string(), value.to_string());
    }

    #[test]
    fn test_handles_released_with_arena() {
        let f = Value::builtin(crate::value::BuiltinFn::fixed("f", 0, |_, _| Ok(Value::Null)));
        let id = {
            let mut arena = Arena::default();
            let lowered = arena.lower(&f, 0).unwrap();
            assert_eq!(lowered.kind(), Some(ValueTag::Callable));
            let id = unsafe { lowered.payload.handle };
            assert!(handles().contains_key(&id));
            id
        };
        assert!(!handles().contains_key(&id));
    }

    #[test]
    fn test_cyclic_array_is_rejected() {
        let items = Value::array(vec![]);
        if let Value::Array(inner) = &items {
            inner.write().push(items.clone());
        }
        let mut arena = Arena::default();
        assert!(matches!(
            arena.lower(&items, 0),
            Err(PluginError::Unconvertible(_))
        ));
    }
}
