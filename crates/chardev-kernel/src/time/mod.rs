//! Kernel-style timer list.
//!
//! One service thread fires the callbacks of every [`Timer`] created from a
//! [`TimerList`]. A callback runs without any timer lock held and returns the
//! delay after which the same timer fires again, or `None` to stay idle.

use std::{
    collections::BTreeMap,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use crate::{
    sync::{Mutex, WaitQueue},
    task::{self, Task},
};

mod queue;

pub type Callback = Box<dyn FnMut() -> Option<Duration> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(usize);

struct State {
    queue: queue::Queue,
    callbacks: BTreeMap<TimerId, Option<Callback>>,
    running: Option<TimerId>,
    running_deleted: bool,
    next_id: usize,
    worker: Option<Arc<Task>>,
    shutdown: bool,
}

struct Shared {
    name: String,
    state: Mutex<State>,
    done: WaitQueue,
}

impl Shared {
    fn kick(state: &State) {
        if let Some(worker) = &state.worker {
            worker.unpark();
        }
    }
}

pub struct TimerList {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl TimerList {
    pub fn new(name: &str) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            name: name.to_string(),
            state: Mutex::new(State {
                queue: queue::Queue::new(),
                callbacks: BTreeMap::new(),
                running: None,
                running_deleted: false,
                next_id: 0,
                worker: None,
                shutdown: false,
            }),
            done: WaitQueue::new(),
        });

        let worker = shared.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(worker))?;

        debug!("timer list [{}] started", name);
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Creates an idle timer, like `timer_setup`.
    pub fn timer(&self, callback: impl FnMut() -> Option<Duration> + Send + 'static) -> Timer {
        let mut state = self.shared.state.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;
        state.callbacks.insert(id, Some(Box::new(callback)));
        Timer {
            id,
            shared: self.shared.clone(),
        }
    }
}

impl Drop for TimerList {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            Shared::kick(&state);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("timer list [{}] worker panicked", self.shared.name);
            }
        }
        debug!("timer list [{}] stopped", self.shared.name);
    }
}

fn run(shared: Arc<Shared>) {
    let me = task::current();
    shared.state.lock().worker = Some(me.clone());

    loop {
        let mut state = shared.state.lock();
        if state.shutdown {
            break;
        }

        if let Some(id) = state.queue.pop(Instant::now()) {
            let Some(mut callback) = state.callbacks.get_mut(&id).and_then(Option::take) else {
                continue;
            };
            state.running = Some(id);
            state.running_deleted = false;
            drop(state);

            trace!("[{}] fire {:?}", shared.name, id);
            let rearm = callback();

            let mut state = shared.state.lock();
            state.running = None;
            let deleted = state.running_deleted;
            if let Some(slot) = state.callbacks.get_mut(&id) {
                *slot = Some(callback);
                // A mod_timer issued while the callback ran wins over the
                // callback's own re-arm.
                if let (Some(delay), false) = (rearm, deleted || state.queue.contains(id)) {
                    state.queue.add_and_next(id, Instant::now() + delay);
                }
            }
            drop(state);
            shared.done.wake_up();
            continue;
        }

        let next = state.queue.next_deadline();
        drop(state);
        match next {
            Some(at) => me.park_timeout(at.saturating_duration_since(Instant::now())),
            None => me.park(),
        }
    }
}

/// Handle of one timer. Dropping it deletes the timer synchronously.
pub struct Timer {
    id: TimerId,
    shared: Arc<Shared>,
}

impl Timer {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Arms the timer to fire `delay` from now, moving an earlier expiry.
    /// Like `mod_timer`, returns whether the timer was pending.
    pub fn modify(&self, delay: Duration) -> bool {
        let mut state = self.shared.state.lock();
        let pending = state.queue.contains(self.id);
        state.queue.add_and_next(self.id, Instant::now() + delay);
        Shared::kick(&state);
        pending
    }

    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().queue.contains(self.id)
    }

    /// Deactivates the timer, like `del_timer_sync`: on return the timer is
    /// not pending, its callback is not running, and a callback that was
    /// running could not re-arm it. Returns whether the timer was pending.
    ///
    /// Called from inside the timer's own callback it does not wait.
    pub fn delete_sync(&self) -> bool {
        let mut state = self.shared.state.lock();
        let pending = state.queue.remove(self.id);
        if state.running == Some(self.id) {
            state.running_deleted = true;
            let on_worker = state
                .worker
                .as_ref()
                .is_some_and(|w| w.pid() == task::current().pid());
            if !on_worker {
                let id = self.id;
                state = self.shared.done.wait(state, |s| s.running != Some(id));
            }
        }
        drop(state);
        pending
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.delete_sync();
        self.shared.state.lock().callbacks.remove(&self.id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_timer(list: &TimerList, period: Option<Duration>) -> (Timer, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let timer = list.timer(move || {
            h.fetch_add(1, Ordering::SeqCst);
            period
        });
        (timer, hits)
    }

    #[test]
    fn test_one_shot() {
        let list = TimerList::new("test-one-shot").unwrap();
        let (timer, hits) = counter_timer(&list, None);
        assert!(!timer.modify(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_periodic_until_deleted() {
        let list = TimerList::new("test-periodic").unwrap();
        let (timer, hits) = counter_timer(&list, Some(Duration::from_millis(10)));
        timer.modify(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(150));
        timer.delete_sync();
        let seen = hits.load(Ordering::SeqCst);
        assert!(seen >= 3, "only {seen} firings");

        thread::sleep(Duration::from_millis(50));
        assert_eq!(hits.load(Ordering::SeqCst), seen);
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_delete_waits_for_running_callback() {
        let list = TimerList::new("test-delete").unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        let timer = list.timer(move || {
            thread::sleep(Duration::from_millis(50));
            f.fetch_add(1, Ordering::SeqCst);
            Some(Duration::from_millis(1))
        });
        timer.modify(Duration::ZERO);
        thread::sleep(Duration::from_millis(10));

        timer.delete_sync();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
