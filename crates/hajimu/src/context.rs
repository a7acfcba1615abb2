//! Evaluation context configuration

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;

/// Default maximum call depth.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Configuration and state for evaluation.
///
/// Shared by every interpreter spawned from the same program, so the
/// interrupt flag reaches worker threads too.
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Maximum call depth (stack overflow protection)
    pub max_call_depth: usize,

    /// Worker threads in the async pool
    pub worker_threads: usize,

    /// Install root holding `packages/` and global plugins (`HAJIMU_HOME`)
    pub home: PathBuf,

    /// Extra module and plugin roots (`HAJIMU_PATH`)
    pub search_paths: Vec<PathBuf>,

    /// Interrupt flag - set to true to abort evaluation
    pub interrupt: Arc<AtomicBool>,

    /// Whether to trace evaluation (for debugging)
    pub trace: bool,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            worker_threads: default_worker_threads(),
            home: default_home(),
            search_paths: Vec::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
            trace: false,
        }
    }
}

/// Optional `config.json` under `HAJIMU_HOME`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    max_call_depth: Option<usize>,
    worker_threads: Option<usize>,
    search_paths: Vec<PathBuf>,
}

impl EvalContext {
    /// Create a new context with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with a custom call depth limit.
    pub fn with_max_call_depth(max_depth: usize) -> Self {
        Self {
            max_call_depth: max_depth,
            ..Default::default()
        }
    }

    /// Build a context from `HAJIMU_HOME`, `HAJIMU_PATH` and the optional
    /// `$HAJIMU_HOME/config.json`. Environment variables win over the file.
    pub fn from_env() -> Self {
        let mut ctx = Self::default();
        if let Some(home) = std::env::var_os("HAJIMU_HOME") {
            ctx.home = PathBuf::from(home);
        }

        let config_path = ctx.home.join("config.json");
        if let Ok(text) = std::fs::read_to_string(&config_path) {
            match serde_json::from_str::<ConfigFile>(&text) {
                Ok(file) => ctx.apply_file(file),
                Err(e) => tracing::warn!(path = %config_path.display(), error = %e, "ignoring malformed config"),
            }
        }

        if let Some(paths) = std::env::var_os("HAJIMU_PATH") {
            let extra: Vec<PathBuf> = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            ctx.search_paths.splice(0..0, extra);
        }
        ctx
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(depth) = file.max_call_depth {
            self.max_call_depth = depth;
        }
        if let Some(workers) = file.worker_threads {
            self.worker_threads = workers.max(1);
        }
        self.search_paths.extend(file.search_paths);
    }

    /// Directory holding installed packages.
    pub fn packages_dir(&self) -> PathBuf {
        self.home.join("packages")
    }

    /// Directory holding globally installed plugins.
    pub fn plugins_dir(&self) -> PathBuf {
        self.home.join("plugins")
    }

    /// Roots searched for modules after the importing file's directory:
    /// `HAJIMU_PATH` entries, then the package directory.
    pub fn module_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.search_paths.clone();
        roots.push(self.packages_dir());
        roots
    }

    /// Add a search root in front of the configured ones.
    pub fn prepend_search_path(&mut self, path: impl AsRef<Path>) {
        self.search_paths.insert(0, path.as_ref().to_path_buf());
    }

    /// Check if evaluation has been interrupted.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Request interruption of evaluation.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Reset the interrupt flag.
    pub fn reset_interrupt(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_home() -> PathBuf {
    let base = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(".hajimu")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = EvalContext::default();
        assert_eq!(ctx.max_call_depth, 1024);
        assert!(ctx.worker_threads >= 1);
        assert!(ctx.home.ends_with(".hajimu"));
    }

    #[test]
    fn test_interrupt_flag() {
        let ctx = EvalContext::new();
        assert!(!ctx.is_interrupted());
        ctx.interrupt();
        assert!(ctx.clone().is_interrupted());
        ctx.reset_interrupt();
        assert!(!ctx.is_interrupted());
    }

    #[test]
    fn test_config_file_applies() {
        let mut ctx = EvalContext::with_max_call_depth(10);
        let file: ConfigFile =
            serde_json::from_str(r#"{"max_call_depth": 50, "worker_threads": 0, "search_paths": ["/x"]}"#)
                .unwrap();
        ctx.apply_file(file);
        assert_eq!(ctx.max_call_depth, 50);
        assert_eq!(ctx.worker_threads, 1);
        assert_eq!(ctx.module_roots()[0], PathBuf::from("/x"));
    }
}
