#![cfg_attr(not(test), no_std)]

#[macro_use]
mod _macro;

mod err;
pub mod io;
mod poll;

pub use err::*;
pub use io::{IoBufferReader, IoBufferWriter, UserSliceReader, UserSliceWriter};
pub use poll::{OpenFlags, PollFlags};

custom_type!(Minor, u32, "{}");

impl Minor {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}
