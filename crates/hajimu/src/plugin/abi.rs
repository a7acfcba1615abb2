//! C ABI shared with native plugins
//!
//! A plugin exports `hajimu_plugin_init`, returning a [`PluginInfo`] that
//! lists its entries. Arguments and results cross the boundary as
//! [`HajimuValue`], a tagged union over the base value kinds. Values the
//! plugin cannot look inside (instances, promises, channels) travel as
//! opaque handles; callables travel as handles the plugin may hand back to
//! [`HajimuRuntime::call`].
//!
//! Memory passed *into* a plugin belongs to the runtime and is valid until
//! the entry returns. Memory in a returned value belongs to the plugin; the
//! runtime copies it and then calls [`PluginInfo::free_value`] when the
//! plugin provides one.

use std::ffi::{c_char, c_void, CStr};
use std::ptr;

/// ABI revision passed in [`HajimuRuntime::version`].
pub const ABI_VERSION: u32 = 1;

/// Symbol every native plugin exports.
pub const INIT_SYMBOL: &[u8] = b"hajimu_plugin_init\0";

/// Reserved entry receiving the runtime callback table.
pub const RUNTIME_SET_ENTRY: &str = "__hajimu_runtime_set__";

/// Discriminant of a [`HajimuValue`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    /// `無`
    Null = 0,
    /// `payload.boolean`
    Bool = 1,
    /// `payload.number`
    Number = 2,
    /// `payload.string`
    String = 3,
    /// `payload.list`, `keys` null
    Array = 4,
    /// `payload.list`, one key per item
    Map = 5,
    /// `payload.string` holds the message
    Error = 6,
    /// `payload.handle` names a callable
    Callable = 7,
    /// `payload.handle` names a value the plugin cannot inspect, or
    /// `payload.pointer` for runtime-provided tables
    Opaque = 8,
}

impl ValueTag {
    /// Decode a raw tag; `None` for values this runtime does not know.
    pub fn from_raw(raw: u32) -> Option<ValueTag> {
        Some(match raw {
            0 => ValueTag::Null,
            1 => ValueTag::Bool,
            2 => ValueTag::Number,
            3 => ValueTag::String,
            4 => ValueTag::Array,
            5 => ValueTag::Map,
            6 => ValueTag::Error,
            7 => ValueTag::Callable,
            8 => ValueTag::Opaque,
            _ => return None,
        })
    }
}

/// UTF-8 bytes, NUL-terminated; `len` excludes the terminator.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HajimuStr {
    /// First byte
    pub ptr: *const c_char,
    /// Byte length
    pub len: usize,
}

impl HajimuStr {
    /// Borrow a C string literal.
    pub const fn from_static(s: &'static CStr) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.to_bytes().len(),
        }
    }
}

/// Items of an array, or the items and keys of a map.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HajimuList {
    /// `len` values
    pub items: *const HajimuValue,
    /// `len` keys for a map, null for an array
    pub keys: *const HajimuStr,
    /// Element count
    pub len: usize,
}

/// Payload of a [`HajimuValue`], selected by its tag.
#[repr(C)]
#[derive(Clone, Copy)]
pub union Payload {
    /// `Bool`
    pub boolean: bool,
    /// `Number`
    pub number: f64,
    /// `String` and `Error`
    pub string: HajimuStr,
    /// `Array` and `Map`
    pub list: HajimuList,
    /// `Callable` and `Opaque`
    pub handle: u64,
    /// `Opaque` tables owned by the runtime
    pub pointer: *const c_void,
}

/// A value crossing the plugin boundary.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HajimuValue {
    /// A [`ValueTag`] as `u32`
    pub tag: u32,
    /// Tag-selected payload
    pub payload: Payload,
}

impl HajimuValue {
    /// `無`
    pub const fn null() -> Self {
        Self {
            tag: ValueTag::Null as u32,
            payload: Payload { handle: 0 },
        }
    }

    /// A boolean.
    pub const fn boolean(b: bool) -> Self {
        Self {
            tag: ValueTag::Bool as u32,
            payload: Payload { boolean: b },
        }
    }

    /// A number.
    pub const fn number(n: f64) -> Self {
        Self {
            tag: ValueTag::Number as u32,
            payload: Payload { number: n },
        }
    }

    /// A string borrowed from static memory.
    pub const fn static_str(s: &'static CStr) -> Self {
        Self {
            tag: ValueTag::String as u32,
            payload: Payload {
                string: HajimuStr::from_static(s),
            },
        }
    }

    /// An error carrying a static message.
    pub const fn error(message: &'static CStr) -> Self {
        Self {
            tag: ValueTag::Error as u32,
            payload: Payload {
                string: HajimuStr::from_static(message),
            },
        }
    }

    /// The tag, if known.
    pub fn kind(&self) -> Option<ValueTag> {
        ValueTag::from_raw(self.tag)
    }

    /// The number payload, when this is a number.
    pub fn as_number(&self) -> Option<f64> {
        // SAFETY: the tag says `number` is the active field.
        (self.kind() == Some(ValueTag::Number)).then(|| unsafe { self.payload.number })
    }
}

impl std::fmt::Debug for HajimuValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HajimuValue({:?})", self.kind())
    }
}

/// Signature of every plugin entry.
pub type EntryFn = unsafe extern "C" fn(args: *const HajimuValue, argc: usize) -> HajimuValue;

/// Releases memory inside a value the plugin returned.
pub type FreeFn = unsafe extern "C" fn(value: *mut HajimuValue);

/// Signature of `hajimu_plugin_init`.
pub type InitFn = unsafe extern "C" fn() -> *const PluginInfo;

/// One exported entry.
#[repr(C)]
#[derive(Debug)]
pub struct PluginFunction {
    /// NUL-terminated UTF-8 name
    pub name: *const c_char,
    /// The function; null entries are skipped
    pub entry: Option<EntryFn>,
    /// Fewest accepted arguments
    pub min_args: u32,
    /// Most accepted arguments; negative for variadic
    pub max_args: i32,
}

/// What `hajimu_plugin_init` returns.
#[repr(C)]
#[derive(Debug)]
pub struct PluginInfo {
    /// Plugin name
    pub name: *const c_char,
    /// Version string
    pub version: *const c_char,
    /// Author, may be null
    pub author: *const c_char,
    /// One-line description, may be null
    pub description: *const c_char,
    /// `function_count` entries
    pub functions: *const PluginFunction,
    /// Length of `functions`
    pub function_count: usize,
    /// Called on every value an entry returns, after it has been copied
    pub free_value: Option<FreeFn>,
}

// Plugin tables are immutable data, usually `static` in the plugin.
unsafe impl Sync for PluginFunction {}
unsafe impl Send for PluginFunction {}
unsafe impl Sync for PluginInfo {}
unsafe impl Send for PluginInfo {}

impl PluginInfo {
    /// The entry table as a slice.
    ///
    /// # Safety
    /// `functions` must point to `function_count` valid entries.
    pub unsafe fn entries(&self) -> &[PluginFunction] {
        if self.functions.is_null() || self.function_count == 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.functions, self.function_count)
    }
}

/// Callbacks a plugin may use to reach back into the interpreter. Passed
/// as an `Opaque` pointer to [`RUNTIME_SET_ENTRY`].
#[repr(C)]
pub struct HajimuRuntime {
    /// [`ABI_VERSION`]
    pub version: u32,
    /// Call the callable behind a handle received as an argument. Strings
    /// and lists in the result stay valid until the current entry returns.
    pub call: unsafe extern "C" fn(handle: u64, args: *const HajimuValue, argc: usize) -> HajimuValue,
    /// Write a line to the program's output.
    pub print: unsafe extern "C" fn(text: HajimuStr),
}

/// Copy a C string, or `None` for null.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub unsafe fn c_text(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// Copy a [`HajimuStr`].
///
/// # Safety
/// `s.ptr` must be null or point to `s.len` readable bytes.
pub unsafe fn str_text(s: HajimuStr) -> String {
    if s.ptr.is_null() || s.len == 0 {
        return String::new();
    }
    let bytes = std::slice::from_raw_parts(s.ptr.cast::<u8>(), s.len);
    String::from_utf8_lossy(bytes).into_owned()
}

/// A [`HajimuStr`] with no bytes.
pub const fn empty_str() -> HajimuStr {
    HajimuStr {
        ptr: ptr::null(),
        len: 0,
    }
}
