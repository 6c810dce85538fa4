//! Interruption of the active process group.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Handle for interrupting whatever the kernel is currently running.
///
/// `InterruptHandle` can be cloned and shared across threads; any clone can
/// trigger the interrupt. The toolchain and the cell program both run in
/// their own process group, and an interrupt sends `SIGKILL` to that group.
///
/// # Example
///
/// ```
/// use orbit_core::InterruptHandle;
///
/// let handle = InterruptHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(!handle.is_interrupted());
/// handle_clone.interrupt();
/// assert!(handle.is_interrupted());
/// ```
#[derive(Clone, Default)]
pub struct InterruptHandle {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Set by `interrupt`, cleared at the start of each submission.
    interrupted: AtomicBool,
    /// Process group of the running child, if any.
    group: Mutex<Option<i32>>,
}

impl std::fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

impl InterruptHandle {
    /// Create a new interrupt handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an interrupt has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Interrupt the current submission.
    ///
    /// Kills the active process group immediately. If nothing is running
    /// yet, the next process attached during this submission is killed as
    /// soon as it starts.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        if let Ok(group) = self.inner.group.lock()
            && let Some(pgid) = *group
        {
            tracing::debug!(pgid, "interrupting process group");
            kill_group(pgid);
        }
    }

    /// Clear the interrupt flag. Called before a submission starts.
    pub(crate) fn reset(&self) {
        self.inner.interrupted.store(false, Ordering::SeqCst);
    }

    /// Register `pid` (a process group leader) as the active group.
    ///
    /// The group is unregistered when the returned guard drops.
    pub(crate) fn attach(&self, pid: Option<u32>) -> GroupGuard {
        let pgid = pid.and_then(|pid| i32::try_from(pid).ok());
        if let Ok(mut group) = self.inner.group.lock() {
            *group = pgid;
        }
        if self.is_interrupted()
            && let Some(pgid) = pgid
        {
            kill_group(pgid);
        }
        GroupGuard {
            handle: self.clone(),
        }
    }
}

/// Keeps a process group registered with an [`InterruptHandle`].
pub(crate) struct GroupGuard {
    handle: InterruptHandle,
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Ok(mut group) = self.handle.inner.group.lock() {
            *group = None;
        }
    }
}

/// Send `SIGKILL` to a whole process group.
pub(crate) fn kill_group(pgid: i32) {
    if pgid <= 0 {
        return;
    }
    // SAFETY: killpg has no memory-safety preconditions.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::debug!(
            pgid,
            error = %std::io::Error::last_os_error(),
            "killpg failed"
        );
    }
}
