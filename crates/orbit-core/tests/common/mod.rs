//! Shared helpers for kernel integration tests.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use orbit_core::compile::Toolchain;
use orbit_core::{
    DisplayData, ExecutionReport, Frontend, HeartbeatAck, Kernel, KernelConfig, StreamKind,
    Submission,
};

/// One thing the kernel published, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Stream(StreamKind, String),
    Display(DisplayData),
}

/// Front end that records everything and answers input from a script.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Event>>,
    pub replies: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<(String, bool)>>,
    pub widgets: bool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Recorder answering input requests with `replies`, in order.
    pub fn answering(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            ..Default::default()
        })
    }

    pub fn stdout(&self) -> String {
        self.stream(StreamKind::Stdout)
    }

    pub fn stderr(&self) -> String {
        self.stream(StreamKind::Stderr)
    }

    fn stream(&self, kind: StreamKind) -> String {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Stream(k, text) if *k == kind => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn displays(&self) -> Vec<DisplayData> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Display(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Frontend for Recorder {
    fn publish_stream(&self, stream: StreamKind, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Stream(stream, text.to_string()));
    }

    fn publish_display(&self, data: DisplayData) {
        self.events.lock().unwrap().push(Event::Display(data));
    }

    fn request_input(&self, prompt: &str, masked: bool) -> io::Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), masked));
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| io::Error::other("no scripted reply"))
    }

    fn install_widget_link(&self) -> io::Result<()> {
        if self.widgets {
            Ok(())
        } else {
            Err(io::ErrorKind::Unsupported.into())
        }
    }

    fn send_heartbeat(&self, _heartbeat: HeartbeatAck) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }
}

/// A kernel with its own scratch root and working directory.
pub struct TestKernel {
    pub kernel: Kernel,
    pub work_dir: PathBuf,
    count: u32,
    _scratch: tempfile::TempDir,
    _work: tempfile::TempDir,
}

impl TestKernel {
    /// Kernel driving the cargo found on this machine.
    pub fn new() -> Self {
        Self::build(|config| Kernel::new(config).expect("kernel"))
    }

    /// Kernel whose cargo does not exist; fine for directive-only submissions.
    pub fn without_cargo() -> Self {
        Self::build(|config| {
            let toolchain = Toolchain::with_cargo(PathBuf::from("/nonexistent/orbit/cargo"));
            Kernel::with_toolchain(config, toolchain).expect("kernel")
        })
    }

    fn build(make: impl FnOnce(KernelConfig) -> Kernel) -> Self {
        let scratch = tempfile::tempdir().expect("scratch dir");
        let work = tempfile::tempdir().expect("work dir");
        let work_dir = work.path().canonicalize().expect("canonical work dir");
        let config = KernelConfig::default()
            .with_scratch_root(scratch.path())
            .with_work_dir(&work_dir);
        Self {
            kernel: make(config),
            work_dir,
            count: 0,
            _scratch: scratch,
            _work: work,
        }
    }

    /// Submit `code` with input disallowed.
    pub async fn run(&mut self, code: &str, frontend: &Arc<Recorder>) -> ExecutionReport {
        let count = self.next();
        self.submit(Submission::new(code, count), frontend).await
    }

    /// Submit `code` with input allowed.
    pub async fn run_with_input(&mut self, code: &str, frontend: &Arc<Recorder>) -> ExecutionReport {
        let count = self.next();
        self.submit(Submission::new(code, count).with_input(true), frontend)
            .await
    }

    async fn submit(&mut self, submission: Submission, frontend: &Arc<Recorder>) -> ExecutionReport {
        let frontend: Arc<dyn Frontend> = frontend.clone();
        self.kernel
            .execute(&submission, frontend)
            .await
            .expect("execute")
    }

    fn next(&mut self) -> u32 {
        self.count += 1;
        self.count
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

/// Write a minimal library crate named `name` under `dir`.
pub fn write_crate(dir: &Path, name: &str) -> PathBuf {
    let root = dir.join(name);
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(
        root.join("Cargo.toml"),
        format!("[package]\nname = \"{name}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n"),
    )
    .unwrap();
    std::fs::write(root.join("src/lib.rs"), "pub fn answer() -> u32 { 42 }\n").unwrap();
    root
}
