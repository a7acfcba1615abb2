//! Native plugins
//!
//! A plugin is either a shared library exporting `hajimu_plugin_init`, or
//! an HJPB manifest naming such a library and the entries it provides.
//! Hosts embedding plugins can also register an init function in-process
//! with [`register_static`]; `取り込む` finds those by name before touching
//! the file system.
//!
//! Loaded plugins are cached per canonical path for the life of the
//! process and unloaded by [`shutdown`].

pub mod abi;
mod bridge;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use indexmap::IndexMap;
use libloading::Library;

use crate::bytecode::{self, Manifest};
use crate::error::PluginError;
use crate::value::{NativeFn, Value};

use abi::{c_text, InitFn, PluginInfo, INIT_SYMBOL, RUNTIME_SET_ENTRY};

pub(crate) use bridge::call_native;

/// A loaded plugin and its entries.
#[derive(Debug)]
pub struct Plugin {
    /// Name reported by the plugin
    pub name: String,
    /// Version string
    pub version: String,
    /// Author, if given
    pub author: Option<String>,
    /// Description, if given
    pub description: Option<String>,
    /// File it was loaded from; `None` for in-process plugins
    pub path: Option<PathBuf>,
    functions: IndexMap<String, Arc<NativeFn>>,
}

impl Plugin {
    /// Entries as values, in declaration order.
    pub fn exports(&self) -> IndexMap<String, Value> {
        self.functions
            .iter()
            .map(|(name, f)| (name.clone(), Value::Native(Arc::clone(f))))
            .collect()
    }

    /// Look up one entry.
    pub fn function(&self, name: &str) -> Option<&Arc<NativeFn>> {
        self.functions.get(name)
    }

    /// Entry names, in declaration order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

#[derive(Default)]
struct Registry {
    statics: DashMap<String, Arc<Plugin>>,
    loaded: DashMap<PathBuf, Arc<Plugin>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::default)
}

/// Register an in-process plugin under `name`, replacing any earlier one.
pub fn register_static(name: &str, init: InitFn) -> Result<Arc<Plugin>, PluginError> {
    let origin = format!("<組み込み {}>", name);
    let plugin = Arc::new(from_init(init, &origin, None, None)?);
    tracing::debug!(plugin = name, entries = plugin.functions.len(), "registered plugin");
    registry()
        .statics
        .insert(name.to_string(), Arc::clone(&plugin));
    Ok(plugin)
}

/// An in-process plugin registered under `name`.
pub fn find_static(name: &str) -> Option<Arc<Plugin>> {
    registry().statics.get(name).map(|p| Arc::clone(p.value()))
}

/// Load the plugin at `path`, or return the copy loaded earlier.
pub fn load(path: &Path) -> Result<Arc<Plugin>, PluginError> {
    let path = path
        .canonicalize()
        .map_err(|_| PluginError::NotFound(path.display().to_string()))?;
    if let Some(plugin) = registry().loaded.get(&path) {
        return Ok(Arc::clone(plugin.value()));
    }

    let bytes = std::fs::read(&path).map_err(|e| PluginError::LoadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let plugin = if bytecode::is_container(&bytes) {
        let manifest = bytecode::decode_manifest(&bytes)?;
        load_manifest(&path, &manifest)?
    } else {
        load_library(&path, None)?
    };
    tracing::debug!(
        plugin = %plugin.name,
        path = %path.display(),
        entries = plugin.functions.len(),
        "loaded plugin"
    );

    let plugin = Arc::new(plugin);
    Ok(Arc::clone(
        registry().loaded.entry(path).or_insert(plugin).value(),
    ))
}

/// Drop every cached plugin. Libraries unmap once no function value still
/// refers to them.
pub fn shutdown() {
    let count = registry().loaded.len();
    registry().loaded.clear();
    registry().statics.clear();
    tracing::debug!(count, "plugins released");
}

fn load_manifest(path: &Path, manifest: &Manifest) -> Result<Plugin, PluginError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let library = dir.join(&manifest.library);
    let mut plugin = load_library(&library, Some(manifest))?;
    plugin.path = Some(path.to_path_buf());
    Ok(plugin)
}

fn load_library(path: &Path, manifest: Option<&Manifest>) -> Result<Plugin, PluginError> {
    let shown = path.display().to_string();
    // SAFETY: loading a library runs its initialisers; plugins are trusted.
    let library = unsafe { Library::new(path) }.map_err(|e| PluginError::LoadFailed {
        path: shown.clone(),
        message: e.to_string(),
    })?;
    // SAFETY: the symbol has the `InitFn` signature by contract, and the
    // pointer stays valid while `library` is held.
    let init: InitFn = unsafe { library.get::<InitFn>(INIT_SYMBOL) }
        .map(|symbol| *symbol)
        .map_err(|_| PluginError::MissingInit(shown.clone()))?;
    let mut plugin = from_init(init, &shown, Some(Arc::new(library)), manifest)?;
    plugin.path = Some(path.to_path_buf());
    Ok(plugin)
}

/// Build a [`Plugin`] from its init function. With a manifest, only the
/// entries it lists are exported, with the arities it declares.
fn from_init(
    init: InitFn,
    origin: &str,
    library: Option<Arc<Library>>,
    manifest: Option<&Manifest>,
) -> Result<Plugin, PluginError> {
    let invalid = |message: &str| PluginError::InvalidInfo {
        path: origin.to_string(),
        message: message.to_string(),
    };

    // SAFETY: the init function follows the plugin ABI.
    let info: &PluginInfo = unsafe { init().as_ref() }.ok_or_else(|| invalid("null PluginInfo"))?;
    // SAFETY: strings and the entry table are valid for the plugin's life.
    let (name, entries) = unsafe { (c_text(info.name), info.entries()) };
    let name = name.ok_or_else(|| invalid("missing name"))?;

    let mut runtime_entry = None;
    let mut functions = IndexMap::new();
    for entry in entries {
        // SAFETY: as above.
        let (Some(fn_name), Some(func)) = (unsafe { c_text(entry.name) }, entry.entry) else {
            tracing::warn!(plugin = %name, "skipping entry without a name or function");
            continue;
        };
        if fn_name == RUNTIME_SET_ENTRY {
            runtime_entry = Some(func);
            continue;
        }
        functions.insert(
            fn_name.clone(),
            NativeFn {
                name: fn_name,
                plugin: name.clone(),
                min_args: entry.min_args as usize,
                max_args: usize::try_from(entry.max_args).ok(),
                entry: func,
                release: info.free_value,
                _library: library.clone(),
            },
        );
    }

    if let Some(manifest) = manifest {
        let mut listed = IndexMap::new();
        for declared in &manifest.entries {
            let mut native = functions.swap_remove(&declared.name).ok_or_else(|| {
                PluginError::MissingEntry {
                    plugin: manifest.name.clone(),
                    entry: declared.name.clone(),
                }
            })?;
            native.min_args = declared.min_args as usize;
            native.max_args = declared.max_args.map(|max| max as usize);
            listed.insert(declared.name.clone(), native);
        }
        functions = listed;
    }

    if let Some(entry) = runtime_entry {
        bridge::install_runtime(entry);
    }

    // SAFETY: as above.
    let (version, author, description) =
        unsafe { (c_text(info.version), c_text(info.author), c_text(info.description)) };
    Ok(Plugin {
        name,
        version: version.unwrap_or_default(),
        author: author.filter(|a| !a.is_empty()),
        description: description.filter(|d| !d.is_empty()),
        path: None,
        functions: functions
            .into_iter()
            .map(|(k, v)| (k, Arc::new(v)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::abi::{HajimuValue, PluginFunction, PluginInfo};
    use super::*;
    use std::ffi::c_char;

    unsafe extern "C" fn double(args: *const HajimuValue, argc: usize) -> HajimuValue {
        let args = std::slice::from_raw_parts(args, argc);
        match args[0].as_number() {
            Some(n) => HajimuValue::number(n * 2.0),
            None => HajimuValue::error(c"数値が必要です"),
        }
    }

    static FUNCTIONS: [PluginFunction; 1] = [PluginFunction {
        name: c"倍".as_ptr() as *const c_char,
        entry: Some(double),
        min_args: 1,
        max_args: 1,
    }];

    static INFO: PluginInfo = PluginInfo {
        name: c"テスト".as_ptr(),
        version: c"0.1.0".as_ptr(),
        author: std::ptr::null(),
        description: std::ptr::null(),
        functions: FUNCTIONS.as_ptr(),
        function_count: 1,
        free_value: None,
    };

    unsafe extern "C" fn init() -> *const PluginInfo {
        &INFO
    }

    #[test]
    fn test_register_static() {
        let plugin = register_static("テスト倍", init).unwrap();
        assert_eq!(plugin.name, "テスト");
        assert_eq!(plugin.version, "0.1.0");
        assert_eq!(plugin.author, None);
        assert_eq!(plugin.function_names().collect::<Vec<_>>(), vec!["倍"]);
        assert!(find_static("テスト倍").is_some());
        assert!(find_static("無い").is_none());
    }

    #[test]
    fn test_manifest_must_list_existing_entries() {
        let manifest = Manifest {
            name: "テスト".into(),
            entries: vec![bytecode::ManifestEntry {
                name: "無い".into(),
                min_args: 0,
                max_args: None,
            }],
            ..Manifest::default()
        };
        let err = from_init(init, "test", None, Some(&manifest)).unwrap_err();
        assert!(matches!(err, PluginError::MissingEntry { .. }));
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hajimu-plugin-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn entry(name: &str, min_args: u32, max_args: Option<u32>) -> bytecode::ManifestEntry {
        bytecode::ManifestEntry {
            name: name.into(),
            min_args,
            max_args,
        }
    }

    #[test]
    fn test_manifest_file_naming_a_missing_library() {
        let dir = scratch("missing-lib");
        let path = dir.join("数学.hjp");
        let manifest = Manifest {
            name: "数学".into(),
            library: "libmissing_math.so".into(),
            entries: vec![entry("倍", 1, Some(1))],
            ..Manifest::default()
        };
        std::fs::write(&path, bytecode::encode_manifest(&manifest)).unwrap();

        match load(&path).unwrap_err() {
            PluginError::LoadFailed { path, .. } => assert!(path.ends_with("libmissing_math.so")),
            other => panic!("expected LoadFailed, got {:?}", other),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_manifest_file_entries_are_checked_against_the_library() {
        let dir = scratch("entries");
        let path = dir.join("テスト.hjp");
        let manifest = Manifest {
            name: "テスト".into(),
            library: "libtest.so".into(),
            entries: vec![entry("倍", 1, Some(1)), entry("半分", 1, Some(1))],
            ..Manifest::default()
        };
        std::fs::write(&path, bytecode::encode_manifest(&manifest)).unwrap();
        let decoded = bytecode::decode_manifest(&std::fs::read(&path).unwrap()).unwrap();

        match from_init(init, "test", None, Some(&decoded)).unwrap_err() {
            PluginError::MissingEntry { entry, .. } => assert_eq!(entry, "半分"),
            other => panic!("expected MissingEntry, got {:?}", other),
        }

        let listed = Manifest {
            entries: vec![entry("倍", 0, None)],
            ..decoded
        };
        let plugin = from_init(init, "test", None, Some(&listed)).unwrap();
        let double = plugin.functions.get("倍").unwrap();
        assert_eq!((double.min_args, double.max_args), (0, None));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_library_without_init_symbol() {
        let candidates = [
            "/lib/x86_64-linux-gnu/libc.so.6",
            "/usr/lib/x86_64-linux-gnu/libc.so.6",
            "/lib/aarch64-linux-gnu/libc.so.6",
            "/usr/lib/aarch64-linux-gnu/libc.so.6",
            "/lib64/libc.so.6",
            "/usr/lib64/libc.so.6",
            "/usr/lib/libc.so.6",
        ];
        let Some(libc) = candidates.iter().map(Path::new).find(|p| p.exists()) else {
            return;
        };
        let err = load(libc).unwrap_err();
        assert!(matches!(err, PluginError::MissingInit(_)), "{:?}", err);

        let dir = scratch("no-init");
        let path = dir.join("c.hjp");
        let manifest = Manifest {
            name: "c".into(),
            library: libc.display().to_string(),
            ..Manifest::default()
        };
        std::fs::write(&path, bytecode::encode_manifest(&manifest)).unwrap();
        assert!(matches!(load(&path).unwrap_err(), PluginError::MissingInit(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_library() {
        let err = load(Path::new("/nonexistent/plugin.hjp")).unwrap_err();
        assert!(matches!(err, PluginError::NotFound(_)));
    }
}
