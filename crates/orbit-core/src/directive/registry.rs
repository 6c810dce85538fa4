//! Directive name to handler dispatch.
//!
//! Handlers only validate arguments and describe what should happen; the
//! kernel applies the resulting [`DirectiveAction`].

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::store::ResetScope;

/// A change to engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    /// Arguments for this submission's program.
    RunArgs(Vec<String>),
    /// Test mode for this submission, with arguments for the test binary.
    TestMode(Vec<String>),
    /// Build for wasm32-unknown-unknown for this submission.
    WasmMode,
    /// Replace the persistent build flags; `None` only echoes them.
    BuildFlags(Option<Vec<String>>),
    /// Enable or disable automatic dependency resolution.
    AutoFetch(bool),
    /// The next shell escape may prompt for input; `true` for masked input.
    ShellInput { masked: bool },
}

/// An action performed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Print (`None`) or change the working directory.
    ChangeDir(Option<String>),
    /// Set an environment variable for spawned children.
    SetEnv { name: String, value: String },
    /// List stored declarations.
    List,
    /// Remove stored declarations.
    Remove(Vec<String>),
    /// Reset declarations, tracked paths and manifest, or the manifest alone.
    Reset(ResetScope),
    /// Add tracked paths; with no paths, list them.
    Track(Vec<String>),
    /// Remove tracked paths.
    Untrack(Vec<String>),
    /// Add a path dependency for the crate in a local directory.
    LocalDep(String),
    /// Install the widget communication link.
    InstallWidgets,
    /// Probe the widget link with a heartbeat.
    ProbeWidgets,
    /// Publish the help text.
    Help,
}

/// Result of resolving a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveAction {
    /// Mutate engine configuration.
    Configure(ConfigChange),
    /// Perform a side effect.
    Effect(SideEffect),
    /// No handler registered under this name.
    Unrecognized(String),
}

/// Directive handler: validates arguments and returns the action to apply.
pub type Handler = fn(&[String]) -> std::result::Result<DirectiveAction, String>;

/// Registry of directive handlers by name.
#[derive(Clone)]
pub struct DirectiveRegistry {
    handlers: FxHashMap<String, Handler>,
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl DirectiveRegistry {
    /// Registry with every built-in directive.
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: FxHashMap::default(),
        };
        for name in ["%", "main", "args"] {
            registry.register(name, run_args);
        }
        registry.register("test", test_mode);
        registry.register("wasm", wasm_mode);
        for name in ["buildflags", "flags"] {
            registry.register(name, build_flags);
        }
        registry.register("autofetch", |args| toggle(args, "autofetch", true));
        registry.register("noautofetch", |args| toggle(args, "noautofetch", false));
        registry.register("cd", change_dir);
        registry.register("env", set_env);
        for name in ["ls", "list"] {
            registry.register(name, |args| no_args(args, "ls", SideEffect::List));
        }
        for name in ["rm", "remove"] {
            registry.register(name, remove);
        }
        registry.register("reset", reset);
        registry.register("track", |args| {
            Ok(DirectiveAction::Effect(SideEffect::Track(args.to_vec())))
        });
        registry.register("untrack", untrack);
        registry.register("localdep", local_dep);
        registry.register("widgets", |args| {
            no_args(args, "widgets", SideEffect::InstallWidgets)
        });
        registry.register("widgets_hb", |args| {
            no_args(args, "widgets_hb", SideEffect::ProbeWidgets)
        });
        registry.register("with_inputs", |args| shell_input(args, false));
        registry.register("with_password", |args| shell_input(args, true));
        registry.register("help", |args| no_args(args, "help", SideEffect::Help));
        registry
    }

    /// Register (or replace) a handler.
    pub fn register(&mut self, name: &str, handler: Handler) {
        self.handlers.insert(name.to_string(), handler);
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a directive to its action.
    ///
    /// Unknown names resolve to [`DirectiveAction::Unrecognized`]; invalid
    /// arguments are an [`Error::Directive`].
    pub fn resolve(&self, name: &str, args: &[String]) -> Result<DirectiveAction> {
        let Some(handler) = self.handlers.get(name) else {
            tracing::debug!(name, "unrecognized directive");
            return Ok(DirectiveAction::Unrecognized(name.to_string()));
        };
        let action = handler(args).map_err(Error::Directive)?;
        tracing::debug!(name, ?action, "resolved directive");
        Ok(action)
    }
}

fn run_args(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    Ok(DirectiveAction::Configure(ConfigChange::RunArgs(args.to_vec())))
}

fn test_mode(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    Ok(DirectiveAction::Configure(ConfigChange::TestMode(args.to_vec())))
}

fn wasm_mode(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    if !args.is_empty() {
        return Err("%wasm takes no arguments".to_string());
    }
    Ok(DirectiveAction::Configure(ConfigChange::WasmMode))
}

fn build_flags(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    let flags = if args.is_empty() {
        None
    } else {
        Some(args.to_vec())
    };
    Ok(DirectiveAction::Configure(ConfigChange::BuildFlags(flags)))
}

fn toggle(args: &[String], name: &str, on: bool) -> std::result::Result<DirectiveAction, String> {
    if !args.is_empty() {
        return Err(format!("%{name} takes no arguments"));
    }
    Ok(DirectiveAction::Configure(ConfigChange::AutoFetch(on)))
}

fn no_args(
    args: &[String],
    name: &str,
    effect: SideEffect,
) -> std::result::Result<DirectiveAction, String> {
    if !args.is_empty() {
        return Err(format!("%{name} takes no arguments"));
    }
    Ok(DirectiveAction::Effect(effect))
}

fn shell_input(args: &[String], masked: bool) -> std::result::Result<DirectiveAction, String> {
    if !args.is_empty() {
        let name = if masked { "with_password" } else { "with_inputs" };
        return Err(format!("%{name} takes no arguments"));
    }
    Ok(DirectiveAction::Configure(ConfigChange::ShellInput { masked }))
}

fn change_dir(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    match args {
        [] => Ok(DirectiveAction::Effect(SideEffect::ChangeDir(None))),
        [dir] => Ok(DirectiveAction::Effect(SideEffect::ChangeDir(Some(
            dir.clone(),
        )))),
        _ => Err("%cd takes at most one directory".to_string()),
    }
}

fn set_env(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    let (name, value) = match args {
        [pair] => match pair.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => return Err("%env expects NAME=value or NAME value".to_string()),
        },
        [name, value] => (name.clone(), value.clone()),
        _ => return Err("%env expects NAME=value or NAME value".to_string()),
    };
    if name.is_empty() || name.contains('=') {
        return Err(format!("invalid environment variable name {name:?}"));
    }
    Ok(DirectiveAction::Effect(SideEffect::SetEnv { name, value }))
}

fn remove(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    if args.is_empty() {
        return Err("%rm needs the identifiers to remove".to_string());
    }
    Ok(DirectiveAction::Effect(SideEffect::Remove(args.to_vec())))
}

fn reset(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    let scope = match args {
        [] => ResetScope::Full,
        [what] if what == "manifest" || what == "Cargo.toml" => ResetScope::ManifestOnly,
        _ => return Err(format!("%reset: unknown scope {:?}", args.join(" "))),
    };
    Ok(DirectiveAction::Effect(SideEffect::Reset(scope)))
}

fn untrack(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    if args.is_empty() {
        return Err("%untrack needs the paths to remove".to_string());
    }
    Ok(DirectiveAction::Effect(SideEffect::Untrack(args.to_vec())))
}

fn local_dep(args: &[String]) -> std::result::Result<DirectiveAction, String> {
    match args {
        [dir] => Ok(DirectiveAction::Effect(SideEffect::LocalDep(dir.clone()))),
        _ => Err("%localdep takes exactly one directory".to_string()),
    }
}
