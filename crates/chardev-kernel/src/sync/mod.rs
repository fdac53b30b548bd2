mod mutex;
mod wait;

pub use mutex::{Mutex, MutexGuard, RawMutex};
pub use wait::{PollTable, WaitEntry, WaitQueue};
