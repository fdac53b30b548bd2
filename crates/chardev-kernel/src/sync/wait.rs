use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use chardev_interface::{Error, Result};

use super::{Mutex, MutexGuard};
use crate::task::{self, Task};

static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

struct Waiter {
    key: u64,
    task: Arc<Task>,
}

/// List of tasks waiting for one condition of an instance.
///
/// The condition itself lives in the data guarded by the instance lock; the
/// queue only records who has to be woken when that data changes.
pub struct WaitQueue {
    waiters: spin::Mutex<Vec<Waiter>>,
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            waiters: spin::Mutex::new(Vec::new()),
        }
    }

    /// Wakes every registered task. Each of them re-checks its condition, so
    /// only the ones that find it satisfied proceed.
    pub fn wake_up(&self) {
        for waiter in self.waiters.lock().iter() {
            waiter.task.unpark();
        }
    }

    /// Number of registered tasks.
    pub fn waiters(&self) -> usize {
        self.waiters.lock().len()
    }

    pub(crate) fn enqueue(&self, task: Arc<Task>) -> WaitEntry<'_> {
        let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        self.waiters.lock().push(Waiter { key, task });
        WaitEntry { queue: self, key }
    }

    /// Sleeps until `condition` holds, releasing `guard` while asleep.
    ///
    /// Fails with [`Error::Interrupted`] once a signal is pending for the
    /// calling task and the condition is still false. The guard is dropped in
    /// that case, and the protected data is left as the waiter found it.
    pub fn wait_interruptible<'a, T, F>(
        &self,
        guard: MutexGuard<'a, T>,
        condition: F,
    ) -> Result<MutexGuard<'a, T>>
    where
        F: FnMut(&mut T) -> bool,
    {
        self.wait_inner(guard, condition, true)
    }

    /// Like [`WaitQueue::wait_interruptible`], but ignores signals.
    pub fn wait<'a, T, F>(&self, guard: MutexGuard<'a, T>, condition: F) -> MutexGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
    {
        match self.wait_inner(guard, condition, false) {
            Ok(guard) => guard,
            Err(_) => unreachable!("uninterruptible wait returned an error"),
        }
    }

    fn wait_inner<'a, T, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut condition: F,
        interruptible: bool,
    ) -> Result<MutexGuard<'a, T>>
    where
        F: FnMut(&mut T) -> bool,
    {
        if condition(&mut *guard) {
            return Ok(guard);
        }

        let task = task::current();
        // Registered before the re-check below, so a wake_up issued after the
        // check cannot be lost.
        let _entry = self.enqueue(task.clone());

        loop {
            if condition(&mut *guard) {
                return Ok(guard);
            }
            if interruptible && task.signal_pending() {
                return Err(Error::Interrupted);
            }

            let mutex: &'a Mutex<T> = MutexGuard::mutex(&guard);
            drop(guard);
            task.park();
            guard = mutex.lock();
        }
    }
}

/// Registration of one task on one queue; removed on drop.
pub struct WaitEntry<'a> {
    queue: &'a WaitQueue,
    key: u64,
}

impl Drop for WaitEntry<'_> {
    fn drop(&mut self) {
        self.queue.waiters.lock().retain(|w| w.key != self.key);
    }
}

/// Registrations made by one readiness query.
///
/// A driver's poll callback enrols the polling task on each of its queues
/// with [`PollTable::poll_wait`] before it evaluates its state. All
/// enrolments end when the table is dropped.
pub struct PollTable<'a> {
    task: Arc<Task>,
    entries: Vec<WaitEntry<'a>>,
}

impl<'a> PollTable<'a> {
    pub fn new(task: Arc<Task>) -> Self {
        Self {
            task,
            entries: Vec::new(),
        }
    }

    pub fn poll_wait(&mut self, queue: &'a WaitQueue) {
        self.entries.push(queue.enqueue(self.task.clone()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
