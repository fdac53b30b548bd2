//! In-process host for the mailbox (`poll`) and periodic timer (`timer`)
//! character device drivers.
//!
//! A driver module is loaded with [`ChrDev::init`], opened per minor number
//! with [`ChrDev::open`], and driven through the returned [`File`] from any
//! number of threads.

pub mod chrdev;
pub mod config;
pub mod drivers;
pub mod logger;
pub mod registry;
pub mod select;
pub mod sync;
pub mod task;
pub mod time;

pub use chardev_interface::{Error, Minor, OpenFlags, PollFlags, Result};
pub use chrdev::{ChrDev, File, FileOperations, LoadError};
pub use config::{ConfigError, LogLevel, ModuleConfig};
pub use select::{Pollable, Ready, select};
