//! Kernel configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashMap;

/// Scratch root override.
pub const ENV_SCRATCH_DIR: &str = "ORBIT_SCRATCH_DIR";
/// Keep the scratch workspace when the kernel exits.
pub const ENV_KEEP_SCRATCH: &str = "ORBIT_KEEP_SCRATCH";
/// Disable automatic dependency resolution.
pub const ENV_NO_AUTOFETCH: &str = "ORBIT_NO_AUTOFETCH";
/// Sideband socket path, set for every cell program.
pub const ENV_SIDEBAND: &str = "ORBIT_SIDEBAND";
/// Kernel working directory, set for every cell program.
pub const ENV_DIR: &str = "ORBIT_DIR";

/// Configuration of a [`Kernel`](crate::Kernel).
///
/// Fields changed by directives (`%cd`, `%env`, `%buildflags`,
/// `%autofetch`) live here too and persist across submissions.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Working directory of cell programs and shell escapes.
    pub work_dir: PathBuf,
    /// Directory the scratch workspace is created in.
    pub scratch_root: PathBuf,
    /// Run `cargo add` once for missing crates.
    pub auto_fetch: bool,
    /// Extra flags for every cargo build.
    pub build_flags: Vec<String>,
    /// Environment overrides for spawned children.
    pub env: FxHashMap<String, String>,
    /// Shell used for `!` escapes.
    pub shell: PathBuf,
    /// Delay before an input prompt is shown for a shell escape.
    pub input_startup_delay: Duration,
    /// Timeout of `%widgets_hb`.
    pub heartbeat_timeout: Duration,
    /// Keep the scratch workspace after the kernel is dropped.
    pub keep_scratch: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            scratch_root: std::env::temp_dir(),
            auto_fetch: true,
            build_flags: Vec::new(),
            env: FxHashMap::default(),
            shell: default_shell(),
            input_startup_delay: Duration::from_millis(200),
            heartbeat_timeout: Duration::from_secs(1),
            keep_scratch: false,
        }
    }
}

impl KernelConfig {
    /// Defaults overridden by `ORBIT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(ENV_SCRATCH_DIR).filter(|d| !d.is_empty()) {
            config.scratch_root = PathBuf::from(dir);
        }
        if env_flag(ENV_KEEP_SCRATCH) {
            config.keep_scratch = true;
        }
        if env_flag(ENV_NO_AUTOFETCH) {
            config.auto_fetch = false;
        }
        config
    }

    /// Set the working directory.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Set the scratch root.
    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = dir.into();
        self
    }

    /// Enable or disable automatic dependency resolution.
    pub fn with_auto_fetch(mut self, enabled: bool) -> Self {
        self.auto_fetch = enabled;
        self
    }

    /// Set the persistent build flags.
    pub fn with_build_flags(mut self, flags: Vec<String>) -> Self {
        self.build_flags = flags;
        self
    }

    /// Add an environment override.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Keep the scratch workspace on drop.
    pub fn with_keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    /// Set the shell-escape input delay.
    pub fn with_input_startup_delay(mut self, delay: Duration) -> Self {
        self.input_startup_delay = delay;
        self
    }

    /// Set the widget heartbeat timeout.
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Environment for a spawned child: overrides sorted by name, then `ORBIT_DIR`.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.sort();
        env.push((ENV_DIR.to_string(), self.work_dir.display().to_string()));
        env
    }
}

/// `bash` when available, `/bin/sh` otherwise.
fn default_shell() -> PathBuf {
    which::which("bash").unwrap_or_else(|_| Path::new("/bin/sh").to_path_buf())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert!(config.auto_fetch);
        assert!(config.build_flags.is_empty());
        assert_eq!(config.input_startup_delay, Duration::from_millis(200));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(1));
        assert!(!config.keep_scratch);
    }

    #[test]
    fn test_builders_and_child_env() {
        let config = KernelConfig::default()
            .with_work_dir("/w")
            .with_env("B", "2")
            .with_env("A", "1")
            .with_auto_fetch(false)
            .with_build_flags(vec!["--release".into()]);
        assert!(!config.auto_fetch);
        assert_eq!(
            config.child_env(),
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "2".to_string()),
                (ENV_DIR.to_string(), "/w".to_string()),
            ]
        );
    }
}
