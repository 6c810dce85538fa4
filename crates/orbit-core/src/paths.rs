//! Scratch workspace management.
//!
//! Every kernel owns one scratch crate, created under the scratch root:
//!
//! ```text
//! $TMPDIR/orbit_<id>/
//! ├── Cargo.toml     # Manifest of the synthesized crate
//! ├── src/
//! │   ├── main.rs    # Synthesized program
//! │   └── orbit.rs   # Cell runtime (display, input)
//! ├── target/        # Cargo build output
//! └── sideband.sock  # Display sideband, bound per run
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::compile::{PROGRAM_FILE, RUNTIME_FILE, RUNTIME_SOURCE};
use crate::error::{Error, Result};

/// Directory structure of the scratch crate.
#[derive(Debug)]
pub struct ScratchDir {
    /// Session id (hex, no dashes).
    id: String,
    /// The `orbit_<id>` directory itself.
    root: PathBuf,
    /// Leave the directory behind on drop.
    keep: bool,
}

impl ScratchDir {
    /// Create a fresh scratch directory under `scratch_root`.
    ///
    /// # Errors
    /// Returns [`Error::Workspace`] if the directories cannot be created.
    pub fn create(scratch_root: &Path, keep: bool) -> Result<Self> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let root = scratch_root.join(format!("orbit_{id}"));
        fs::create_dir_all(root.join("src")).map_err(|e| {
            Error::Workspace(format!("failed to create {}: {e}", root.display()))
        })?;

        let dirs = Self { id, root, keep };
        dirs.write(RUNTIME_FILE, RUNTIME_SOURCE)?;
        tracing::debug!(root = %dirs.root.display(), "created scratch workspace");
        Ok(dirs)
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Package name of the scratch crate.
    pub fn package_name(&self) -> String {
        format!("orbit_{}", self.id)
    }

    /// Root of the scratch crate.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `src/main.rs`.
    pub fn program_path(&self) -> PathBuf {
        self.root.join(PROGRAM_FILE)
    }

    /// Path the sideband socket is bound to.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join("sideband.sock")
    }

    /// Write the synthesized program.
    pub fn write_program(&self, source: &str) -> Result<()> {
        self.write(PROGRAM_FILE, source)
    }

    fn write(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.root.join(relative);
        fs::write(&path, content)
            .map_err(|e| Error::Workspace(format!("failed to write {}: {e}", path.display())))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep {
            tracing::info!(root = %self.root.display(), "keeping scratch workspace");
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.root) {
            tracing::warn!("failed to remove {}: {e}", self.root.display());
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Resolve `path` (with `~` expansion) against `base`.
pub fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = expand_home(path);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
