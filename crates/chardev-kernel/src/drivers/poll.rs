//! Mailbox driver with blocking read/write and poll support.
//!
//! Each instance holds one [`Mailbox`]. A writer deposits a message into an
//! empty mailbox; a reader drains it and then reads once more to get the
//! zero-length end of the message, which is what frees the slot for the
//! next writer.

use chardev_interface::{
    Error, IoBufferReader, IoBufferWriter, Minor, OpenFlags, PollFlags, Result,
};
use log::{debug, trace};

use super::mailbox::Mailbox;
use crate::{
    chrdev::FileOperations,
    config::ModuleConfig,
    sync::{Mutex, PollTable, WaitQueue},
};

pub struct PollInstance {
    minor: Minor,
    mailbox: Mutex<Mailbox>,
    /// Woken when the mailbox becomes full.
    read_ready: WaitQueue,
    /// Woken when the mailbox becomes empty.
    write_ready: WaitQueue,
}

impl PollInstance {
    pub fn new(minor: Minor, capacity: usize) -> Self {
        Self {
            minor,
            mailbox: Mutex::new(Mailbox::new(capacity)),
            read_ready: WaitQueue::new(),
            write_ready: WaitQueue::new(),
        }
    }

    pub fn minor(&self) -> Minor {
        self.minor
    }

    pub fn capacity(&self) -> usize {
        self.mailbox.lock().capacity()
    }

    /// Length of the unread message, 0 when empty.
    pub fn pending_len(&self) -> usize {
        self.mailbox.lock().len()
    }

    pub fn read(
        &self,
        dst: &mut dyn IoBufferWriter,
        cursor: &mut u64,
        nonblocking: bool,
    ) -> Result<usize> {
        let mut mailbox = self.mailbox.lock();

        if mailbox.eof_reached(*cursor) {
            mailbox.release();
            *cursor = 0;
            drop(mailbox);
            trace!("[{}] end of message, slot released", self.minor);
            self.write_ready.wake_up();
            return Ok(0);
        }

        if mailbox.is_empty() {
            if nonblocking {
                return Err(Error::WouldBlock);
            }
            mailbox = self
                .read_ready
                .wait_interruptible(mailbox, |m| m.is_full())?;
            // whatever the cursor pointed into is gone
            *cursor = 0;
        }

        mailbox.drain(cursor, dst)
    }

    pub fn write(&self, src: &mut dyn IoBufferReader, nonblocking: bool) -> Result<usize> {
        let mut mailbox = self.mailbox.lock();

        if mailbox.is_full() {
            if nonblocking {
                return Err(Error::WouldBlock);
            }
            mailbox = self
                .write_ready
                .wait_interruptible(mailbox, |m| m.is_empty())?;
        }

        let offered = src.len();
        let n = mailbox.deposit(src)?;
        drop(mailbox);
        if n < offered {
            debug!("[{}] write truncated {} -> {} bytes", self.minor, offered, n);
        }
        self.read_ready.wake_up();
        Ok(n)
    }

    pub fn poll<'a>(&'a self, table: Option<&mut PollTable<'a>>) -> PollFlags {
        if let Some(table) = table {
            table.poll_wait(&self.read_ready);
            table.poll_wait(&self.write_ready);
        }

        let mailbox = self.mailbox.lock();
        if mailbox.is_full() {
            PollFlags::READABLE
        } else {
            PollFlags::WRITABLE
        }
    }
}

/// Driver of the `poll<N>` nodes.
pub struct PollDriver;

impl FileOperations for PollDriver {
    type Instance = PollInstance;

    fn init(_config: &ModuleConfig) -> std::io::Result<Self> {
        Ok(PollDriver)
    }

    fn create(&self, minor: Minor, config: &ModuleConfig) -> Self::Instance {
        PollInstance::new(minor, config.capacity)
    }

    fn read(
        instance: &Self::Instance,
        dst: &mut dyn IoBufferWriter,
        cursor: &mut u64,
        flags: OpenFlags,
    ) -> Result<usize> {
        instance.read(dst, cursor, flags.is_nonblocking())
    }

    fn write(
        instance: &Self::Instance,
        src: &mut dyn IoBufferReader,
        flags: OpenFlags,
    ) -> Result<usize> {
        instance.write(src, flags.is_nonblocking())
    }

    fn poll<'a>(instance: &'a Self::Instance, table: Option<&mut PollTable<'a>>) -> PollFlags {
        instance.poll(table)
    }

    fn show(instance: &Self::Instance, f: &mut dyn std::fmt::Write) -> std::fmt::Result {
        let mailbox = instance.mailbox.lock();
        write!(
            f,
            "capacity={} pending={}",
            mailbox.capacity(),
            mailbox.len()
        )
    }
}
