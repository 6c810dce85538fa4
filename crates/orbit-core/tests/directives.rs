//! Integration tests for directives and shell escapes.
//!
//! None of these submissions reach cargo, so they run without a toolchain.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use common::{Recorder, TestKernel, write_crate};
use orbit_core::{Error, ExecutionOutcome, Frontend, Submission};

// =============================================================================
// Configuration directives
// =============================================================================

#[tokio::test]
async fn test_directive_only_submission_has_nothing_to_run() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    let report = tk.run("%ls", &frontend).await;
    assert!(matches!(report.outcome, ExecutionOutcome::NothingToRun));
    assert_eq!(frontend.stdout(), "No declarations\n");
}

#[tokio::test]
async fn test_unknown_directive_warns_and_continues() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%frobnicate --now\n%cd", &frontend).await;
    assert!(
        frontend
            .stderr()
            .contains("\"%frobnicate\" unknown or not implemented yet.")
    );
    assert_eq!(frontend.stdout(), format!("{}\n", tk.work_dir.display()));
}

#[tokio::test]
async fn test_bad_arguments_are_reported_inline() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%wasm now\n%reset everything\n!echo still here", &frontend)
        .await;
    let stderr = frontend.stderr();
    assert!(stderr.contains("%wasm takes no arguments"));
    assert!(stderr.contains("unknown scope"));
    assert_eq!(frontend.stdout(), "still here\n");
}

#[tokio::test]
async fn test_buildflags_persist_and_echo() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%buildflags --release --offline", &frontend).await;
    tk.run("%flags", &frontend).await;
    assert_eq!(
        tk.kernel.config().build_flags,
        vec!["--release".to_string(), "--offline".to_string()]
    );
    assert_eq!(
        frontend.stdout().lines().filter(|l| l.contains("--offline")).count(),
        2
    );
}

#[tokio::test]
async fn test_autofetch_toggle() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%noautofetch", &frontend).await;
    assert!(!tk.kernel.config().auto_fetch);
    tk.run("%autofetch", &frontend).await;
    assert!(tk.kernel.config().auto_fetch);
}

#[tokio::test]
async fn test_cd_changes_directory_for_shell() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();
    fs::create_dir(tk.path("sub")).unwrap();

    tk.run("%cd sub\n!pwd\n!echo $ORBIT_DIR", &frontend).await;
    let sub = tk.path("sub");
    assert_eq!(tk.kernel.config().work_dir, sub);
    let lines: Vec<String> = frontend.stdout().lines().map(str::to_string).collect();
    assert_eq!(lines, vec![sub.display().to_string(); 3]);

    frontend.clear();
    tk.run("%cd missing", &frontend).await;
    assert!(frontend.stderr().contains("is not a directory"));
    assert_eq!(tk.kernel.config().work_dir, sub);
}

#[tokio::test]
async fn test_env_is_passed_to_children() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%env GREETING \"hello world\"\n%env MODE=fast\n!echo \"$GREETING/$MODE\"", &frontend)
        .await;
    assert_eq!(
        frontend.stdout(),
        "Set: GREETING=\"hello world\"\nSet: MODE=\"fast\"\nhello world/fast\n"
    );
}

#[tokio::test]
async fn test_help_is_markdown_display() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%help", &frontend).await;
    let displays = frontend.displays();
    assert_eq!(displays.len(), 1);
    assert_eq!(displays[0].mime_type, "text/markdown");
    assert!(displays[0].payload.contains("%writefile"));
}

#[tokio::test]
async fn test_widgets_without_front_end_support() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%widgets\n%widgets_hb", &frontend).await;
    assert!(frontend.stderr().contains("failed to install widget link"));
    assert_eq!(frontend.stdout(), "no response\n");
    assert!(!tk.kernel.widget_link().is_installed());
}

// =============================================================================
// Files, tracked paths and the manifest
// =============================================================================

#[tokio::test]
async fn test_writefile_truncates_and_appends() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%writefile notes.txt\nfirst\nsecond\n!cat notes.txt", &frontend)
        .await;
    assert_eq!(
        fs::read_to_string(tk.path("notes.txt")).unwrap(),
        "first\nsecond\n"
    );
    assert!(frontend.stdout().ends_with("first\nsecond\n"));

    tk.run("%writefile -a notes.txt\nthird", &frontend).await;
    assert_eq!(
        fs::read_to_string(tk.path("notes.txt")).unwrap(),
        "first\nsecond\nthird\n"
    );

    tk.run("%writefile notes.txt\nreplaced", &frontend).await;
    assert_eq!(fs::read_to_string(tk.path("notes.txt")).unwrap(), "replaced\n");
}

#[tokio::test]
async fn test_writefile_default_name_uses_session_id() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("%writefile\ncontent", &frontend).await;
    let expected = tk.path(&format!("{}.out", tk.kernel.scratch().id()));
    assert_eq!(fs::read_to_string(expected).unwrap(), "content\n");
}

#[tokio::test]
async fn test_track_and_untrack() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();
    for name in ["data", "data_old", "other"] {
        fs::create_dir(tk.path(name)).unwrap();
    }

    tk.run("%track data data_old other missing", &frontend).await;
    assert_eq!(tk.kernel.tracked_paths().len(), 3);
    assert!(frontend.stderr().contains("cannot track"));

    tk.run("%untrack data...", &frontend).await;
    assert_eq!(tk.kernel.tracked_paths().list(), &[tk.path("other")]);

    frontend.clear();
    tk.run("%track", &frontend).await;
    assert_eq!(frontend.stdout(), format!("{}\n", tk.path("other").display()));

    tk.run("%untrack nothing", &frontend).await;
    assert!(frontend.stderr().contains("nothing is not tracked"));
}

#[tokio::test]
async fn test_localdep_adds_dependency_and_tracks() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();
    let lib = write_crate(&tk.work_dir, "mylib");

    tk.run("%localdep mylib", &frontend).await;
    assert_eq!(
        frontend.stdout(),
        format!(
            "Added path dependency for crate \"mylib\" to local directory \"{}\"\n",
            lib.display()
        )
    );
    assert!(tk.kernel.tracked_paths().contains(&lib));

    let manifest = tk.kernel.scratch().root().join("Cargo.toml");
    assert!(fs::read_to_string(&manifest).unwrap().contains("mylib"));

    tk.run("%reset manifest", &frontend).await;
    assert!(!fs::read_to_string(&manifest).unwrap().contains("mylib"));
    assert!(tk.kernel.tracked_paths().contains(&lib));

    tk.run("%reset", &frontend).await;
    assert!(tk.kernel.tracked_paths().is_empty());
}

#[tokio::test]
async fn test_manifest_edit_in_scratch_is_auto_tracked() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();
    let lib = write_crate(&tk.work_dir, "helper");

    let code = format!(
        "!*printf '\\n[dev-dependencies]\\nhelper = {{ path = \"%s\" }}\\n' '{}' >> Cargo.toml",
        lib.display()
    );
    tk.run(&code, &frontend).await;
    assert!(tk.kernel.tracked_paths().contains(&lib), "{}", frontend.stderr());
}

// =============================================================================
// Shell escapes and input
// =============================================================================

#[tokio::test]
async fn test_shell_escapes_run_in_order() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    tk.run("!echo one\n!*pwd\n!echo two \\\nthree", &frontend).await;
    let stdout = frontend.stdout();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "one");
    assert_eq!(
        fs::canonicalize(lines[1]).unwrap(),
        fs::canonicalize(tk.kernel.scratch().root()).unwrap()
    );
    assert_eq!(lines[2], "two three");
}

#[tokio::test]
async fn test_with_inputs_prompts_once() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::answering(&["hunter2"]);

    tk.run_with_input(
        "%with_password\n!read secret; echo \"got $secret\"\n!echo after",
        &frontend,
    )
    .await;
    assert_eq!(frontend.stdout(), "got hunter2\nafter\n");
    let prompts = frontend.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].1, "password prompt is masked");
}

#[tokio::test]
async fn test_with_inputs_requires_input_permission() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::answering(&["unused"]);

    tk.run("%with_inputs\n!echo ran", &frontend).await;
    assert!(frontend.stderr().contains("does not allow input"));
    assert_eq!(frontend.stdout(), "ran\n");
    assert!(frontend.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_interrupt_cancels_shell_escape() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();
    let handle = tk.kernel.interrupt_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.interrupt();
    });
    let started = std::time::Instant::now();
    let report = tk.run("!sleep 30\n!echo never", &frontend).await;
    assert!(matches!(report.outcome, ExecutionOutcome::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!frontend.stdout().contains("never"));
}

// =============================================================================
// Failures before the build
// =============================================================================

#[tokio::test]
async fn test_parse_error_maps_to_submission_line() {
    let mut tk = TestKernel::without_cargo();
    let frontend = Recorder::new();

    let report = tk.run("%ls\nlet x = ;", &frontend).await;
    let ExecutionOutcome::CompileFailed { errors } = report.outcome else {
        panic!("expected compile failure, got {:?}", report.outcome);
    };
    let location = errors[0].location.as_ref().unwrap();
    assert_eq!(location.cell, Some(report.execution_count));
    assert_eq!(location.line, 2);
    assert!(tk.kernel.store().is_empty());
}

#[tokio::test]
async fn test_missing_toolchain_is_fatal() {
    let mut tk = TestKernel::without_cargo();
    let frontend: Arc<dyn Frontend> = Recorder::new();

    let err = tk
        .kernel
        .execute(&Submission::new("let x = 1;", 1), frontend)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Toolchain(_)));
    assert!(err.is_fatal());
    assert!(tk.kernel.store().is_empty());
}
