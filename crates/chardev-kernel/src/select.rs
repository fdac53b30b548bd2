//! Waiting on the readiness of several open files at once.

use std::time::{Duration, Instant};

use chardev_interface::{Error, PollFlags, Result};

use crate::{sync::PollTable, task};

/// Anything that answers a readiness query.
pub trait Pollable {
    fn poll<'a>(&'a self, table: Option<&mut PollTable<'a>>) -> PollFlags;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    /// Position in the slice passed to [`select`].
    pub index: usize,
    pub mask: PollFlags,
}

/// Blocks until at least one of `files` reports a bit of `interest`.
///
/// Returns the ready files, or an empty list when `timeout` elapses first.
/// Fails with [`Error::Interrupted`] when a signal is pending for the calling
/// task.
pub fn select(
    files: &[&dyn Pollable],
    interest: PollFlags,
    timeout: Option<Duration>,
) -> Result<Vec<Ready>> {
    let task = task::current();
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let mut table = PollTable::new(task.clone());
        let ready = files
            .iter()
            .enumerate()
            .filter_map(|(index, file)| {
                let mask = file.poll(Some(&mut table)) & interest;
                (!mask.is_empty()).then_some(Ready { index, mask })
            })
            .collect::<Vec<_>>();

        if !ready.is_empty() {
            return Ok(ready);
        }
        if task.signal_pending() {
            return Err(Error::Interrupted);
        }

        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(Vec::new());
                }
                task.park_timeout(deadline - now);
            }
            None => task.park(),
        }
    }
}
