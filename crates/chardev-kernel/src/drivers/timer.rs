//! Periodic timer driver.
//!
//! Every instance owns a self re-arming timer. Each firing bumps the
//! instance's pending count and wakes readers; a read returns the count as
//! decimal text and resets it. Writes are the control channel: a decimal
//! period in milliseconds, `0` suspends.

use std::{sync::Arc, time::Duration};

use chardev_interface::{
    Error, IoBufferReader, IoBufferWriter, Minor, OpenFlags, PollFlags, Result,
};
use log::{debug, info, trace};

use crate::{
    chrdev::FileOperations,
    config::ModuleConfig,
    sync::{Mutex, PollTable, WaitQueue},
    time::{Timer, TimerList},
};

/// Longest control string accepted.
const CONTROL_MAX: usize = 32;

#[derive(Debug, Default)]
struct TimerState {
    /// `None` while suspended.
    period: Option<Duration>,
    pending: u64,
}

struct Shared {
    minor: Minor,
    state: Mutex<TimerState>,
    read_ready: WaitQueue,
}

impl Shared {
    fn fire(&self) -> Option<Duration> {
        let mut state = self.state.lock();
        let period = state.period?;
        state.pending += 1;
        let pending = state.pending;
        drop(state);

        trace!("[{}] fired, pending {}", self.minor, pending);
        self.read_ready.wake_up();
        Some(period)
    }
}

pub struct TimerInstance {
    shared: Arc<Shared>,
    trigger: Timer,
    /// Serializes control changes, so `period` and the trigger move together.
    control: Mutex<()>,
}

impl TimerInstance {
    pub fn new(minor: Minor, timers: &TimerList, period: Option<Duration>) -> Self {
        let shared = Arc::new(Shared {
            minor,
            state: Mutex::new(TimerState::default()),
            read_ready: WaitQueue::new(),
        });
        let fire = shared.clone();
        let trigger = timers.timer(move || fire.fire());
        let instance = Self {
            shared,
            trigger,
            control: Mutex::new(()),
        };
        if let Some(period) = period {
            instance.arm(period);
        }
        instance
    }

    pub fn minor(&self) -> Minor {
        self.shared.minor
    }

    /// Current period, `None` while suspended.
    pub fn period(&self) -> Option<Duration> {
        self.shared.state.lock().period
    }

    /// Firings since the last read.
    pub fn pending(&self) -> u64 {
        self.shared.state.lock().pending
    }

    pub fn is_armed(&self) -> bool {
        self.trigger.is_pending()
    }

    pub fn arm(&self, period: Duration) {
        let _control = self.control.lock();
        self.shared.state.lock().period = Some(period);
        self.trigger.modify(period);
        debug!("[{}] armed, period {:?}", self.minor(), period);
    }

    /// Stops the trigger. On return no firing is in flight and the pending
    /// count stays 0 until the next `arm`.
    pub fn suspend(&self) {
        let _control = self.control.lock();
        {
            let mut state = self.shared.state.lock();
            state.period = None;
            state.pending = 0;
        }
        // without the lock: a running firing needs it to finish
        self.trigger.delete_sync();
        debug!("[{}] suspended", self.minor());
    }

    /// Returns the pending count as `"N\n"` and resets it. A buffer too
    /// short for the whole text fails with `InvalidArgument` and the count
    /// is kept.
    pub fn read(&self, dst: &mut dyn IoBufferWriter, nonblocking: bool) -> Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.state.lock();
        if state.pending == 0 {
            if nonblocking {
                return Err(Error::WouldBlock);
            }
            state = self
                .shared
                .read_ready
                .wait_interruptible(state, |s| s.pending > 0)?;
        }

        let text = format!("{}\n", state.pending);
        if dst.len() < text.len() {
            return Err(Error::InvalidArgument);
        }
        dst.write_slice(text.as_bytes())?;
        state.pending = 0;
        Ok(text.len())
    }

    pub fn write(&self, src: &mut dyn IoBufferReader) -> Result<usize> {
        let len = src.len();
        if len > CONTROL_MAX {
            return Err(Error::InvalidArgument);
        }
        let mut raw = [0u8; CONTROL_MAX];
        src.read_slice(&mut raw[..len])?;

        match parse_period(&raw[..len])? {
            0 => self.suspend(),
            ms => self.arm(Duration::from_millis(ms)),
        }
        Ok(len)
    }

    pub fn poll<'a>(&'a self, table: Option<&mut PollTable<'a>>) -> PollFlags {
        if let Some(table) = table {
            table.poll_wait(&self.shared.read_ready);
        }

        let state = self.shared.state.lock();
        let mut mask = PollFlags::WRITABLE;
        if state.pending > 0 {
            mask |= PollFlags::READABLE;
        }
        mask
    }
}

/// Parses a control write: optional sign, decimal digits, optional trailing
/// newline. Negative values are rejected.
fn parse_period(raw: &[u8]) -> Result<u64> {
    let text = core::str::from_utf8(raw).map_err(|_| Error::InvalidArgument)?;
    let text = text.strip_suffix('\n').unwrap_or(text);
    let value: i64 = text.parse().map_err(|_| Error::InvalidArgument)?;
    u64::try_from(value).map_err(|_| Error::InvalidArgument)
}

/// Driver of the `timer<N>` nodes.
pub struct TimerDriver {
    timers: TimerList,
}

impl TimerDriver {
    pub fn timers(&self) -> &TimerList {
        &self.timers
    }
}

impl FileOperations for TimerDriver {
    type Instance = TimerInstance;

    fn init(config: &ModuleConfig) -> std::io::Result<Self> {
        let timers = TimerList::new(&format!("{}-timers", config.name))?;
        Ok(Self { timers })
    }

    fn create(&self, minor: Minor, config: &ModuleConfig) -> Self::Instance {
        let period = (config.period_ms > 0).then(|| Duration::from_millis(config.period_ms));
        if let Some(period) = period {
            info!("{}{}: period {:?}", config.name, minor, period);
        }
        TimerInstance::new(minor, &self.timers, period)
    }

    fn read(
        instance: &Self::Instance,
        dst: &mut dyn IoBufferWriter,
        _cursor: &mut u64,
        flags: OpenFlags,
    ) -> Result<usize> {
        instance.read(dst, flags.is_nonblocking())
    }

    fn write(
        instance: &Self::Instance,
        src: &mut dyn IoBufferReader,
        _flags: OpenFlags,
    ) -> Result<usize> {
        instance.write(src)
    }

    fn poll<'a>(instance: &'a Self::Instance, table: Option<&mut PollTable<'a>>) -> PollFlags {
        instance.poll(table)
    }

    fn show(instance: &Self::Instance, f: &mut dyn std::fmt::Write) -> std::fmt::Result {
        let state = instance.shared.state.lock();
        match state.period {
            Some(period) => write!(f, "period={}ms", period.as_millis())?,
            None => write!(f, "suspended")?,
        }
        write!(f, " pending={}", state.pending)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period(b"500"), Ok(500));
        assert_eq!(parse_period(b"500\n"), Ok(500));
        assert_eq!(parse_period(b"+20"), Ok(20));
        assert_eq!(parse_period(b"0"), Ok(0));
        assert_eq!(parse_period(b"-5"), Err(Error::InvalidArgument));
        assert_eq!(parse_period(b"abc"), Err(Error::InvalidArgument));
        assert_eq!(parse_period(b""), Err(Error::InvalidArgument));
        assert_eq!(parse_period(b"5 0"), Err(Error::InvalidArgument));
    }
}
