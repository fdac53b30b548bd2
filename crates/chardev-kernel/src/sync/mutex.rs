use core::{
    hint::spin_loop,
    sync::atomic::{AtomicBool, Ordering},
};

use lock_api::GuardSend;

const SPIN_LIMIT: usize = 100;

pub type Mutex<T> = lock_api::Mutex<RawMutex, T>;

/// RAII structure used to release the exclusive access of a lock when
/// dropped.
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, RawMutex, T>;

/// Raw lock that spins for a short while and then yields the CPU.
///
/// Wait queues drop the guard before parking. The one holder that may block
/// is a timer control change waiting out a running callback.
pub struct RawMutex {
    locked: AtomicBool,
}

unsafe impl lock_api::RawMutex for RawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: RawMutex = RawMutex {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = GuardSend;

    #[inline]
    fn lock(&self) {
        let mut spins = 0;
        while !self.try_lock() {
            if spins < SPIN_LIMIT {
                spins += 1;
                spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_exclusive() {
        let counter = Arc::new(Mutex::new(0usize));
        let handles = (0..4)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *counter.lock() += 1;
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*counter.lock(), 4000);
        assert!(!counter.is_locked());
    }
}
