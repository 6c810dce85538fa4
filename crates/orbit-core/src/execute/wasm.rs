//! Staging of wasm artifacts for the front end.

use std::fs;
use std::path::{Path, PathBuf};

use crate::compile::{wasm_display, wasm_loader};
use crate::error::{Error, Result};
use crate::frontend::DisplayData;

/// Directory under the working directory that staged files go to.
pub const STAGING_DIR: &str = "orbit_files";
const MODULE_FILE: &str = "cell.wasm";
const LOADER_FILE: &str = "loader.js";

/// A wasm module copied where the front end can load it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedWasm {
    /// `<work_dir>/orbit_files/<id>`.
    pub dir: PathBuf,
    /// Path of the loader relative to the working directory.
    pub loader_url: String,
    /// DOM id the display renders into.
    pub element_id: String,
}

impl StagedWasm {
    /// The `text/html` display that runs the module.
    pub fn display(&self) -> DisplayData {
        DisplayData::html(wasm_display(&self.loader_url, &self.element_id))
    }
}

/// Copy `artifact` to `<work_dir>/orbit_files/<id>/cell.wasm` and write a
/// loader next to it.
pub fn stage_wasm(artifact: &Path, work_dir: &Path) -> Result<StagedWasm> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let dir = work_dir.join(STAGING_DIR).join(&id);
    let staging = |e: std::io::Error| {
        Error::Execution(format!("failed to stage wasm in {}: {e}", dir.display()))
    };
    fs::create_dir_all(&dir).map_err(staging)?;
    fs::copy(artifact, dir.join(MODULE_FILE)).map_err(staging)?;
    fs::write(dir.join(LOADER_FILE), wasm_loader(MODULE_FILE)).map_err(staging)?;
    tracing::debug!(dir = %dir.display(), "staged wasm module");

    Ok(StagedWasm {
        loader_url: format!("./{STAGING_DIR}/{id}/{LOADER_FILE}"),
        element_id: format!("orbit-{id}"),
        dir,
    })
}
