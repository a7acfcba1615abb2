//! `取り込む "name" として alias`
//!
//! A name resolves, in order, to a plugin registered in-process, then to
//! the first file found next to the importing file or under the search
//! roots (`HAJIMU_PATH`, the package directory, the plugin directory).
//! For each root the candidates are `name`, `name.jp`, `name.hjp` and
//! `name/main.jp`.
//!
//! A source or compiled module runs once per canonical path, in a fresh
//! scope under the prelude. Its exports are its `公開` bindings.

use std::io::Read;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use indexmap::IndexMap;

use crate::ast::Program;
use crate::bytecode;
use crate::diagnostic::SourceMap;
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::plugin;
use crate::span::Span;
use crate::value::{ErrorValue, Value};

use super::{decode_source, stmt, Interpreter, Signal};

type Exports = IndexMap<String, Value>;
type Loaded = Result<Exports, Arc<ErrorValue>>;

/// Modules that have run (or are running), keyed by canonical path.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: DashMap<PathBuf, Arc<OnceLock<Loaded>>>,
}

impl ModuleCache {
    fn slot(&self, path: &Path) -> Arc<OnceLock<Loaded>> {
        Arc::clone(self.modules.entry(path.to_path_buf()).or_default().value())
    }
}

/// How a resolved file is loaded.
#[derive(Debug, PartialEq, Eq)]
enum ModuleFile {
    Source,
    Compiled,
    Plugin,
}

pub(super) fn eval_import(
    interp: &mut Interpreter,
    env: &Environment,
    name: &str,
    alias: Option<&str>,
    span: Span,
) -> Result<Value, Signal> {
    let exports = load(interp, name, span)?;
    match alias {
        Some(alias) => env.define(alias, Value::map(exports)),
        None => {
            for (name, value) in exports {
                env.define(name, value);
            }
        }
    }
    Ok(Value::Null)
}

fn load(interp: &mut Interpreter, name: &str, span: Span) -> Result<Exports, Signal> {
    if let Some(plugin) = plugin::find_static(name) {
        tracing::debug!(plugin = name, "importing in-process plugin");
        return Ok(plugin.exports());
    }

    let Some(path) = resolve(interp, name) else {
        return Err(interp.raise(
            ErrorKind::ImportError,
            format!("モジュールが見つかりません: {}", name),
            span,
        ));
    };
    let path = path.canonicalize().unwrap_or(path);

    match classify(&path) {
        ModuleFile::Plugin => {
            tracing::debug!(path = %path.display(), "loading plugin");
            plugin::load(&path)
                .map(|plugin| plugin.exports())
                .map_err(|e| interp.raise(ErrorKind::PluginError, e.to_string(), span))
        }
        kind => run_module(interp, &path, kind, span),
    }
}

fn run_module(
    interp: &mut Interpreter,
    path: &Path,
    kind: ModuleFile,
    span: Span,
) -> Result<Exports, Signal> {
    if interp.loading.iter().any(|p| p == path) {
        return Err(interp.raise(
            ErrorKind::ImportError,
            format!("循環した取り込みです: {}", path.display()),
            span,
        ));
    }

    let slot = interp.shared.modules.slot(path);
    let loaded = slot.get_or_init(|| {
        tracing::debug!(path = %path.display(), "running module");
        interp.loading.push(path.to_path_buf());
        let loaded = execute(interp, path, kind);
        interp.loading.pop();
        loaded
    });

    loaded.clone().map_err(|cause| {
        let error = ErrorValue::new(
            ErrorKind::ImportError,
            format!("モジュール {} を読み込めません", path.display()),
        )
        .with_cause(Value::Error(cause));
        interp.locate(error.into(), span)
    })
}

fn execute(interp: &mut Interpreter, path: &Path, kind: ModuleFile) -> Loaded {
    let name = path.display().to_string();
    let bytes = std::fs::read(path)
        .map_err(|e| import_error(format!("{}: {}", name, e)))?;

    let (program, map) = match kind {
        ModuleFile::Compiled => {
            let program = bytecode::decode_program(&bytes)
                .map_err(|e| import_error(format!("{}: {}", name, e)))?;
            (program, SourceMap::new(&name, ""))
        }
        _ => {
            let src = decode_source(bytes).map_err(|e| import_error(format!("{}: {}", name, e)))?;
            let program = crate::parser::parse(&src)
                .map_err(|e| import_error(format!("{}: {}", name, e)))?;
            (program, SourceMap::new(&name, src.as_str()))
        }
    };
    run_program(interp, &program, Arc::new(map))
}

fn run_program(interp: &mut Interpreter, program: &Program, map: Arc<SourceMap>) -> Loaded {
    let scope = interp.shared.prelude.child();
    let previous = mem::replace(&mut interp.source, Some(map));
    let result = stmt::exec_program(interp, program, &scope);
    interp.source = previous;

    match result {
        Ok(_) | Err(Signal::Return(_) | Signal::Break | Signal::Continue) => {}
        Err(Signal::Error(e)) => return Err(e),
    }
    Ok(stmt::exported_names(program)
        .into_iter()
        .filter_map(|name| scope.get_local(name).map(|v| (name.to_string(), v)))
        .collect())
}

fn import_error(message: String) -> Arc<ErrorValue> {
    Arc::new(ErrorValue::new(ErrorKind::ImportError, message))
}

// ═══════════════════════════════════════════════════════════════════════
// Resolution
// ═══════════════════════════════════════════════════════════════════════

fn resolve(interp: &Interpreter, name: &str) -> Option<PathBuf> {
    let requested = Path::new(name);
    if requested.is_absolute() {
        return candidates(requested).into_iter().find(|p| p.is_file());
    }

    let importer_dir = interp
        .source
        .as_deref()
        .map(|s| Path::new(s.name()))
        .and_then(Path::parent)
        .filter(|dir| dir.is_dir())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let ctx = interp.context();
    std::iter::once(importer_dir)
        .chain(ctx.module_roots())
        .chain(std::iter::once(ctx.plugins_dir()))
        .flat_map(|root| candidates(&root.join(requested)))
        .find(|p| p.is_file())
}

fn candidates(base: &Path) -> Vec<PathBuf> {
    let mut found = vec![base.to_path_buf()];
    if base.extension().is_none() {
        found.push(base.with_extension("jp"));
        found.push(base.with_extension("hjp"));
        found.push(base.join("main.jp"));
    }
    found
}

/// `.jp` is always source. Anything else is sniffed: an HJPB program is
/// compiled code, an HJPB manifest or non-text file is a plugin.
fn classify(path: &Path) -> ModuleFile {
    if path.extension().is_some_and(|ext| ext == "jp") {
        return ModuleFile::Source;
    }
    let mut head = [0u8; bytecode::HEADER_LEN];
    let read = std::fs::File::open(path).and_then(|mut f| f.read(&mut head));
    let head = match read {
        Ok(n) => &head[..n],
        Err(_) => return ModuleFile::Source,
    };
    if bytecode::is_container(head) {
        return if bytecode::is_manifest(head) {
            ModuleFile::Plugin
        } else {
            ModuleFile::Compiled
        };
    }
    let binary = head.contains(&0)
        || matches!(std::str::from_utf8(head), Err(e) if e.error_len().is_some());
    if binary || path.extension().is_some_and(|ext| ext == "hjp") {
        ModuleFile::Plugin
    } else {
        ModuleFile::Source
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bytecode::Manifest;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hajimu-classify-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_classify_by_extension_and_header() {
        fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, bytes).unwrap();
            path
        }
        let dir = scratch("headers");

        let manifest = bytecode::encode_manifest(&Manifest {
            name: "数学".into(),
            library: "libmath.so".into(),
            ..Manifest::default()
        });
        let program = bytecode::compile("表示(1)").unwrap();

        assert_eq!(classify(&write(&dir, "a.hjp", &manifest)), ModuleFile::Plugin);
        assert_eq!(classify(&write(&dir, "b.hjp", &program)), ModuleFile::Compiled);
        assert_eq!(classify(&write(&dir, "c", &program)), ModuleFile::Compiled);
        assert_eq!(classify(&write(&dir, "d.so", b"\x7fELF\x02\x01\x01\0\0\0\0\0")), ModuleFile::Plugin);
        assert_eq!(classify(&write(&dir, "e", "表示(1)".as_bytes())), ModuleFile::Source);
        assert_eq!(classify(&write(&dir, "f.hjp", b"text")), ModuleFile::Plugin);
        // `.jp` is never sniffed
        assert_eq!(classify(&write(&dir, "g.jp", &manifest)), ModuleFile::Source);
        assert_eq!(classify(&dir.join("missing")), ModuleFile::Source);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
