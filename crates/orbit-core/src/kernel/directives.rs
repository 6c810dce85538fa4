//! Applying directives, shell escapes and `%writefile` to a kernel.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use crate::cell::Submission;
use crate::compile::BuildMode;
use crate::directive::{ConfigChange, DirectiveAction, HELP, SideEffect};
use crate::error::{Error, Result};
use crate::execute::{ChildExit, StartupPrompt, run_shell};
use crate::frontend::{DisplayData, Frontend, StreamKind, report, say};
use crate::paths::resolve;
use crate::store::{DeclKind, ResetScope};

use super::{Kernel, SubmissionOptions};

impl Kernel {
    pub(super) async fn apply_directive(
        &mut self,
        name: &str,
        args: &[String],
        submission: &Submission,
        options: &mut SubmissionOptions,
        frontend: &Arc<dyn Frontend>,
    ) -> Result<()> {
        match self.registry.resolve(name, args)? {
            DirectiveAction::Configure(change) => {
                self.configure(change, submission, options, frontend.as_ref())
            }
            DirectiveAction::Effect(effect) => self.side_effect(effect, frontend).await,
            DirectiveAction::Unrecognized(name) => {
                report(
                    frontend.as_ref(),
                    &format!("\"%{name}\" unknown or not implemented yet."),
                );
                Ok(())
            }
        }
    }

    fn configure(
        &mut self,
        change: ConfigChange,
        submission: &Submission,
        options: &mut SubmissionOptions,
        frontend: &dyn Frontend,
    ) -> Result<()> {
        match change {
            ConfigChange::RunArgs(args) => options.run_args = args,
            ConfigChange::TestMode(args) => {
                options.mode = BuildMode::Test;
                options.test_args = args;
            }
            ConfigChange::WasmMode => options.mode = BuildMode::Wasm,
            ConfigChange::BuildFlags(flags) => {
                if let Some(flags) = flags {
                    self.config.build_flags = flags;
                }
                say(
                    frontend,
                    &format!("Build flags: {:?}", self.config.build_flags),
                );
            }
            ConfigChange::AutoFetch(enabled) => self.config.auto_fetch = enabled,
            ConfigChange::ShellInput { masked } => {
                if !submission.allow_input {
                    return Err(Error::Directive(
                        "shell input requested, but this submission does not allow input"
                            .to_string(),
                    ));
                }
                options.shell_input = Some(masked);
            }
        }
        Ok(())
    }

    async fn side_effect(&mut self, effect: SideEffect, frontend: &Arc<dyn Frontend>) -> Result<()> {
        let frontend = frontend.as_ref();
        match effect {
            SideEffect::ChangeDir(None) => {
                say(frontend, &self.config.work_dir.display().to_string());
            }
            SideEffect::ChangeDir(Some(dir)) => {
                let target = resolve(&self.config.work_dir, &dir);
                if !target.is_dir() {
                    return Err(Error::Directive(format!(
                        "{} is not a directory",
                        target.display()
                    )));
                }
                self.config.work_dir = target.canonicalize()?;
                say(frontend, &self.config.work_dir.display().to_string());
            }
            SideEffect::SetEnv { name, value } => {
                tracing::debug!(%name, "setting child environment variable");
                say(frontend, &format!("Set: {name}={value:?}"));
                self.config.env.insert(name, value);
            }
            SideEffect::List => self.list_declarations(frontend),
            SideEffect::Remove(ids) => {
                let removed = self.store.remove(&ids);
                for (kind, id) in &removed.removed {
                    say(frontend, &format!("Removed {kind} {id}"));
                }
                for id in &removed.unknown {
                    report(frontend, &format!("warning: no declaration named `{id}`"));
                }
            }
            SideEffect::Reset(scope) => {
                self.manifest.reset()?;
                if scope == ResetScope::Full {
                    self.store.reset(ResetScope::Full);
                    self.tracked.clear();
                    say(frontend, "Reset declarations, tracked paths and Cargo.toml");
                } else {
                    say(frontend, "Reset Cargo.toml");
                }
            }
            SideEffect::Track(paths) if paths.is_empty() => {
                if self.tracked.is_empty() {
                    say(frontend, "No tracked paths");
                }
                for path in self.tracked.list() {
                    say(frontend, &path.display().to_string());
                }
            }
            SideEffect::Track(paths) => {
                for path in &paths {
                    if let Err(e) = self.tracked.add(&self.config.work_dir, path) {
                        report(frontend, &e.to_string());
                    }
                }
            }
            SideEffect::Untrack(patterns) => {
                for pattern in &patterns {
                    if self.tracked.remove(&self.config.work_dir, pattern).is_empty() {
                        report(frontend, &format!("warning: {pattern} is not tracked"));
                    }
                }
            }
            SideEffect::LocalDep(dir) => {
                let target = resolve(&self.config.work_dir, &dir);
                let target = target.canonicalize().map_err(|e| {
                    Error::Directive(format!("cannot use {}: {e}", target.display()))
                })?;
                let name = self.manifest.add_local_dependency(&target)?;
                self.tracked.insert(target.clone());
                say(
                    frontend,
                    &format!(
                        "Added path dependency for crate \"{name}\" to local directory \"{}\"",
                        target.display()
                    ),
                );
            }
            SideEffect::InstallWidgets => {
                self.widgets.install(frontend)?;
            }
            SideEffect::ProbeWidgets => {
                let result = self
                    .widgets
                    .probe(frontend, self.config.heartbeat_timeout)
                    .await;
                say(frontend, result.message());
            }
            SideEffect::Help => frontend.publish_display(DisplayData::markdown(HELP)),
        }
        Ok(())
    }

    fn list_declarations(&self, frontend: &dyn Frontend) {
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            say(frontend, "No declarations");
            return;
        }
        let mut text = String::new();
        for kind in DeclKind::ALL {
            let decls = snapshot.of_kind(kind);
            if decls.is_empty() {
                continue;
            }
            text.push_str(&format!("{}:\n", kind_heading(kind)));
            for decl in decls {
                text.push_str(&format!("  {}\n", decl.display_name()));
            }
        }
        frontend.publish_stream(StreamKind::Stdout, &text);
    }

    pub(super) async fn shell_escape(
        &mut self,
        command: &str,
        in_scratch: bool,
        submission: &Submission,
        options: &mut SubmissionOptions,
        frontend: &Arc<dyn Frontend>,
    ) -> Result<()> {
        let prompt = options.shell_input.take().map(|masked| StartupPrompt {
            masked,
            delay: self.config.input_startup_delay,
        });
        let dir = if in_scratch {
            self.scratch.root().to_path_buf()
        } else {
            self.config.work_dir.clone()
        };
        let io = self.child_io(submission, frontend);
        let exit = run_shell(&self.config, &dir, command, &io, prompt).await?;
        self.auto_track();
        match exit {
            ChildExit::Cancelled => Err(Error::Aborted),
            ChildExit::Exited(_) => Ok(()),
        }
    }

    pub(super) fn write_file(
        &mut self,
        args: &[String],
        body: &str,
        frontend: &Arc<dyn Frontend>,
    ) -> Result<()> {
        let mut append = false;
        let mut name = None;
        for arg in args {
            match arg.as_str() {
                "-a" | "--append" => append = true,
                _ if name.is_none() => name = Some(arg.as_str()),
                _ => {
                    return Err(Error::Directive(
                        "%writefile takes a single file name".to_string(),
                    ));
                }
            }
        }
        let default_name = format!("{}.out", self.scratch.id());
        let path = resolve(&self.config.work_dir, name.unwrap_or(&default_name));

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .map_err(|e| Error::Directive(format!("cannot write {}: {e}", path.display())))?;
        file.write_all(body.as_bytes())?;

        let verb = if append { "Appended to" } else { "Wrote" };
        say(frontend.as_ref(), &format!("{verb} {}", path.display()));
        Ok(())
    }
}

fn kind_heading(kind: DeclKind) -> &'static str {
    match kind {
        DeclKind::Import => "Imports",
        DeclKind::Type => "Types",
        DeclKind::VarOrConst => "Vars and consts",
        DeclKind::Function => "Functions",
        DeclKind::InitBlock => "Init blocks",
    }
}
