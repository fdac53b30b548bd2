pub mod mailbox;
pub mod poll;
pub mod timer;

pub use poll::{PollDriver, PollInstance};
pub use timer::{TimerDriver, TimerInstance};
