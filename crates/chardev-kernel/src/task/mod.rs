//! Call paths into the drivers.
//!
//! Every OS thread that enters a driver is represented by one [`Task`]. A
//! task can be parked inside a wait queue and carries the pending-signal flag
//! that interrupts such a wait.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::{self, Thread},
    time::Duration,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pid(usize);

impl Pid {
    pub fn new() -> Self {
        static ITER: AtomicUsize = AtomicUsize::new(1);
        Self(ITER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for Pid {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

pub struct Task {
    pid: Pid,
    name: String,
    thread: Thread,
    signal: AtomicBool,
}

thread_local! {
    static CURRENT: Arc<Task> = Arc::new(Task::for_current_thread());
}

/// The task of the calling thread.
pub fn current() -> Arc<Task> {
    CURRENT.with(Arc::clone)
}

impl Task {
    fn for_current_thread() -> Self {
        let thread = thread::current();
        let pid = Pid::new();
        let name = thread
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("task-{pid:?}"));
        Self {
            pid,
            name,
            thread,
            signal: AtomicBool::new(false),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivers a signal. An interruptible wait the task is in, or enters
    /// later, fails with `Interrupted` until the signal is cleared.
    pub fn signal(&self) {
        self.signal.store(true, Ordering::SeqCst);
        self.thread.unpark();
    }

    pub fn signal_pending(&self) -> bool {
        self.signal.load(Ordering::SeqCst)
    }

    /// Acknowledges a pending signal. Returns whether one was pending.
    pub fn clear_signal(&self) -> bool {
        self.signal.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn unpark(&self) {
        self.thread.unpark();
    }

    /// Sleeps until unparked. May return spuriously; callers re-check their
    /// condition.
    pub(crate) fn park(&self) {
        debug_assert_eq!(self.thread.id(), thread::current().id());
        thread::park();
    }

    pub(crate) fn park_timeout(&self, timeout: Duration) {
        debug_assert_eq!(self.thread.id(), thread::current().id());
        thread::park_timeout(timeout);
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("signal", &self.signal_pending())
            .finish()
    }
}
