//! End-to-end tests that build and run synthesized programs with cargo.
//!
//! Each test compiles at least one scratch crate, so they are ignored by
//! default: `cargo test -- --ignored`.

mod common;

use std::time::Duration;

use common::{Event, Recorder, TestKernel};
use orbit_core::{DeclKind, ExecutionOutcome};

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_function_then_bare_call() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();

    let report = tk
        .run("fn incr(x: i64) -> i64 {\n    x + 1\n}", &frontend)
        .await;
    assert!(report.outcome.is_success(), "{}", frontend.stderr());
    assert_eq!(tk.kernel.store().get("incr").unwrap().kind, DeclKind::Function);

    frontend.clear();
    let report = tk.run("incr(5)", &frontend).await;
    assert!(matches!(report.outcome, ExecutionOutcome::Completed));
    assert_eq!(frontend.stdout(), "6\n");
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_redefinition_replaces_function() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();

    tk.run("fn greet() -> &'static str { \"hello\" }", &frontend).await;
    tk.run("fn greet() -> &'static str { \"bonjour\" }", &frontend).await;
    assert_eq!(tk.kernel.store().len(), 1);

    frontend.clear();
    tk.run("println!(\"{}\", greet());", &frontend).await;
    assert_eq!(frontend.stdout(), "bonjour\n");
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_reset_forgets_declarations() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();

    tk.run("fn incr(x: i64) -> i64 { x + 1 }", &frontend).await;
    tk.run("%reset", &frontend).await;
    assert!(tk.kernel.store().is_empty());

    let report = tk.run("incr(5)", &frontend).await;
    let ExecutionOutcome::CompileFailed { errors } = report.outcome else {
        panic!("expected compile failure, got {:?}", report.outcome);
    };
    assert!(errors.iter().any(|e| e.code.as_deref() == Some("E0425")));
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_compile_error_maps_to_submission_line() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();

    tk.run("fn double(x: i32) -> i32 { x * 2 }", &frontend).await;
    let report = tk
        .run("let a = 1;\nlet b: String = double(a);\nprintln!(\"{b}\");", &frontend)
        .await;
    let ExecutionOutcome::CompileFailed { errors } = report.outcome else {
        panic!("expected compile failure, got {:?}", report.outcome);
    };
    let location = errors[0].location.as_ref().unwrap();
    assert_eq!(location.cell, Some(report.execution_count));
    assert_eq!(location.line, 2);
    assert_eq!(tk.kernel.store().len(), 1, "store untouched by failed build");
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_conflicting_kind_is_rejected() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();

    tk.run("struct Point { x: i32 }", &frontend).await;
    let report = tk.run("fn Point() {}", &frontend).await;
    assert!(matches!(report.outcome, ExecutionOutcome::Rejected { .. }));
    assert_eq!(tk.kernel.store().get("Point").unwrap().kind, DeclKind::Type);
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_runtime_failure_still_commits() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();

    let report = tk
        .run("const LIMIT: u32 = 3;\nstd::process::exit(4);", &frontend)
        .await;
    assert!(matches!(
        report.outcome,
        ExecutionOutcome::RuntimeFailed { code: Some(4) }
    ));
    assert!(tk.kernel.store().get("LIMIT").is_some());
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_display_frame_before_stdout() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();

    let report = tk
        .run(
            "orbit::display_html(\"<b>hi</b>\");\nprintln!(\"after\");",
            &frontend,
        )
        .await;
    assert!(report.outcome.is_success(), "{}", frontend.stderr());

    let displays = frontend.displays();
    assert_eq!(displays.len(), 1);
    assert_eq!(displays[0].mime_type, "text/html");
    assert_eq!(displays[0].payload, "<b>hi</b>");
    assert_eq!(frontend.stdout(), "after\n");
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_program_input_through_sideband() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::answering(&["Ada", "s3cret"]);

    let report = tk
        .run_with_input(
            "let name = orbit::input(\"name? \").unwrap();\n\
             let pw = orbit::input_password(\"password? \").unwrap();\n\
             println!(\"{name}:{}\", pw.len());",
            &frontend,
        )
        .await;
    assert!(report.outcome.is_success(), "{}", frontend.stderr());
    assert_eq!(frontend.stdout(), "Ada:6\n");
    let prompts = frontend.prompts.lock().unwrap();
    assert_eq!(
        *prompts,
        vec![("name? ".to_string(), false), ("password? ".to_string(), true)]
    );
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_input_refused_without_permission() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::answering(&["unused"]);

    tk.run(
        "match orbit::input(\"name? \") {\n    Ok(_) => println!(\"answered\"),\n    Err(_) => println!(\"refused\"),\n}",
        &frontend,
    )
    .await;
    assert_eq!(frontend.stdout(), "refused\n");
    assert!(frontend.stderr().contains("does not allow input"));
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_run_args_and_test_mode() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();

    tk.run(
        "%args one \"two words\"\nlet args: Vec<String> = std::env::args().skip(1).collect();\nprintln!(\"{args:?}\");",
        &frontend,
    )
    .await;
    assert_eq!(frontend.stdout(), "[\"one\", \"two words\"]\n");

    frontend.clear();
    let report = tk
        .run(
            "%test\n#[test]\nfn adds() {\n    assert_eq!(1 + 1, 2);\n}",
            &frontend,
        )
        .await;
    assert!(report.outcome.is_success(), "{}", frontend.stderr());
    assert!(frontend.stdout().contains("test adds ... ok"));
}

#[tokio::test]
#[ignore = "Requires cargo toolchain"]
async fn test_interrupt_running_program() {
    let mut tk = TestKernel::new();
    let frontend = Recorder::new();
    // Warm the build so the interrupt lands while the program runs.
    tk.run("fn spin() { loop { std::thread::sleep(std::time::Duration::from_millis(10)); } }", &frontend)
        .await;

    let handle = tk.kernel.interrupt_handle();
    let watcher = frontend.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let started = watcher
                .events
                .lock()
                .unwrap()
                .iter()
                .any(|e| matches!(e, Event::Stream(_, text) if text.contains("spinning")));
            if started {
                handle.interrupt();
                break;
            }
        }
    });

    let report = tk
        .run("fn extra() {}\nprintln!(\"spinning\");\nspin();", &frontend)
        .await;
    assert!(matches!(report.outcome, ExecutionOutcome::Cancelled));
    assert!(tk.kernel.store().get("extra").is_none());
}
