use bitflags::bitflags;

bitflags! {
    /// Readiness bits returned by a poll query. Values match `<poll.h>`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PollFlags: u32 {
        const IN = 0x0001;
        const PRI = 0x0002;
        const OUT = 0x0004;
        const ERR = 0x0008;
        const HUP = 0x0010;
        const RDNORM = 0x0040;
        const WRNORM = 0x0100;
    }
}

impl PollFlags {
    pub const READABLE: PollFlags = PollFlags::IN.union(PollFlags::RDNORM);
    pub const WRITABLE: PollFlags = PollFlags::OUT.union(PollFlags::WRNORM);

    pub fn is_readable(&self) -> bool {
        self.intersects(Self::READABLE)
    }

    pub fn is_writable(&self) -> bool {
        self.intersects(Self::WRITABLE)
    }
}

bitflags! {
    /// Subset of `open(2)` flags the drivers look at.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: u32 {
        const WRONLY = 0o1;
        const RDWR = 0o2;
        const NONBLOCK = 0o4000;
    }
}

impl OpenFlags {
    pub fn is_nonblocking(&self) -> bool {
        self.contains(Self::NONBLOCK)
    }

    pub fn access_mode(&self) -> &'static str {
        if self.is_nonblocking() {
            "non blocking"
        } else {
            "blocking"
        }
    }
}
