//! Cargo manifest of the scratch crate.
//!
//! The pristine manifest is generated from a [`ManifestConfig`]; afterwards
//! it is only edited by `cargo add`, shell escapes and `%localdep`.

use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::error::{Error, Result};

/// Dependency tables that may carry `path = "..."` entries.
const DEPENDENCY_TABLES: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

/// Options for the dev profile in Cargo.toml.
#[derive(Debug, Clone)]
pub struct DevProfile {
    /// Optimization level (0-3).
    pub opt_level: u8,
    /// Emit debug info.
    pub debug: bool,
}

impl Default for DevProfile {
    fn default() -> Self {
        Self {
            opt_level: 0,
            debug: false,
        }
    }
}

/// Configuration for generating a Cargo manifest.
#[derive(Debug, Clone)]
pub struct ManifestConfig<'a> {
    /// Package name.
    pub name: &'a str,
    /// Package version.
    pub version: &'a str,
    /// Rust edition.
    pub edition: &'a str,
    /// Dev profile settings.
    pub dev_profile: Option<DevProfile>,
    /// Whether to add an empty [workspace] table.
    pub standalone_workspace: bool,
}

impl<'a> Default for ManifestConfig<'a> {
    fn default() -> Self {
        Self {
            name: "orbit_cell",
            version: "0.1.0",
            edition: "2021",
            dev_profile: Some(DevProfile::default()),
            standalone_workspace: true,
        }
    }
}

/// Generate a Cargo.toml manifest without dependencies.
fn generate_cargo_toml(config: &ManifestConfig<'_>) -> String {
    let mut toml = String::new();

    toml.push_str("[package]\n");
    toml.push_str(&format!("name = \"{}\"\n", config.name));
    toml.push_str(&format!("version = \"{}\"\n", config.version));
    toml.push_str(&format!("edition = \"{}\"\n", config.edition));
    toml.push_str("publish = false\n");
    toml.push('\n');

    if let Some(profile) = &config.dev_profile {
        toml.push_str("[profile.dev]\n");
        toml.push_str(&format!("opt-level = {}\n", profile.opt_level));
        toml.push_str(&format!("debug = {}\n", profile.debug));
        toml.push('\n');
    }

    toml.push_str("[dependencies]\n");

    // Standalone workspace table (prevents being part of parent workspace)
    if config.standalone_workspace {
        toml.push('\n');
        toml.push_str("[workspace]\n");
    }

    toml
}

/// The scratch crate's `Cargo.toml`.
#[derive(Debug)]
pub struct Manifest {
    /// Location of the file.
    path: PathBuf,
    /// Content written on creation and on reset.
    pristine: String,
    /// Content observed by the last [`Manifest::poll_path_dependencies`].
    last_seen: Option<String>,
}

impl Manifest {
    /// Write the pristine manifest into `dir`.
    pub fn create(dir: &Path, config: &ManifestConfig<'_>) -> Result<Self> {
        let manifest = Self {
            path: dir.join("Cargo.toml"),
            pristine: generate_cargo_toml(config),
            last_seen: None,
        };
        manifest.write_pristine()?;
        Ok(manifest)
    }

    /// Path of the manifest file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restore the pristine manifest.
    pub fn reset(&mut self) -> Result<()> {
        self.write_pristine()?;
        self.last_seen = None;
        tracing::debug!(path = %self.path.display(), "manifest reset");
        Ok(())
    }

    fn write_pristine(&self) -> Result<()> {
        std::fs::write(&self.path, &self.pristine).map_err(|e| {
            Error::Workspace(format!("failed to write {}: {e}", self.path.display()))
        })
    }

    /// Current manifest content.
    pub fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Manifest(format!("failed to read {}: {e}", self.path.display()))
        })
    }

    /// Path dependencies, if the manifest changed since the last call.
    pub fn poll_path_dependencies(&mut self) -> Result<Option<Vec<PathBuf>>> {
        let content = self.read()?;
        if self.last_seen.as_deref() == Some(content.as_str()) {
            return Ok(None);
        }
        let base = self.path.parent().unwrap_or(Path::new("."));
        let deps = path_dependencies(&content, base)?;
        self.last_seen = Some(content);
        Ok(Some(deps))
    }

    /// Add a path dependency on the crate in `dir`, returning the crate name.
    ///
    /// An existing dependency of the same name is replaced.
    pub fn add_local_dependency(&mut self, dir: &Path) -> Result<String> {
        let name = local_crate_name(dir)?;
        let mut table = parse(&self.read()?)?;

        let deps = table
            .entry("dependencies")
            .or_insert_with(|| Value::Table(Table::new()));
        let Value::Table(deps) = deps else {
            return Err(Error::Manifest(
                "[dependencies] is not a table".to_string(),
            ));
        };
        let mut entry = Table::new();
        entry.insert(
            "path".to_string(),
            Value::String(dir.display().to_string()),
        );
        deps.insert(name.clone(), Value::Table(entry));

        let text = toml::to_string(&table)
            .map_err(|e| Error::Manifest(format!("failed to serialize manifest: {e}")))?;
        std::fs::write(&self.path, text)?;
        tracing::debug!(crate_name = %name, dir = %dir.display(), "added path dependency");
        Ok(name)
    }
}

fn parse(content: &str) -> Result<Table> {
    content
        .parse::<Table>()
        .map_err(|e| Error::Manifest(format!("invalid Cargo.toml: {e}")))
}

/// Package name declared by the `Cargo.toml` in `dir`.
fn local_crate_name(dir: &Path) -> Result<String> {
    let path = dir.join("Cargo.toml");
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Manifest(format!("failed to read {}: {e}", path.display())))?;
    parse(&content)?
        .get("package")
        .and_then(|package| package.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Manifest(format!("{} has no package name", path.display())))
}

/// Every `path = "..."` dependency declared in a manifest.
///
/// Covers the dependency tables, their target-specific variants and
/// `[patch.*]` sections. Relative paths are resolved against `base`.
fn path_dependencies(content: &str, base: &Path) -> Result<Vec<PathBuf>> {
    let table = parse(content)?;
    let mut paths = Vec::new();

    let mut scan = |deps: &Table| {
        for spec in deps.values() {
            if let Some(path) = spec.get("path").and_then(Value::as_str) {
                let path = PathBuf::from(path);
                let path = if path.is_relative() { base.join(path) } else { path };
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
    };

    for name in DEPENDENCY_TABLES {
        if let Some(deps) = table.get(name).and_then(Value::as_table) {
            scan(deps);
        }
    }
    if let Some(targets) = table.get("target").and_then(Value::as_table) {
        for target in targets.values().filter_map(Value::as_table) {
            for name in DEPENDENCY_TABLES {
                if let Some(deps) = target.get(name).and_then(Value::as_table) {
                    scan(deps);
                }
            }
        }
    }
    if let Some(patches) = table.get("patch").and_then(Value::as_table) {
        for registry in patches.values().filter_map(Value::as_table) {
            scan(registry);
        }
    }

    Ok(paths)
}
