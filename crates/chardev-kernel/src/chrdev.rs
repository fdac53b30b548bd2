//! Device-node lifecycle.
//!
//! [`ChrDev`] is a loaded driver module: its instances, one per minor
//! number, plus the open counters. [`File`] is an open handle bound to one
//! instance; closing it is dropping it.

use std::{
    fmt::Write as _,
    ops::Index,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use chardev_interface::{
    Error, IoBufferReader, IoBufferWriter, Minor, OpenFlags, PollFlags, Result, UserSliceReader,
    UserSliceWriter,
};
use log::{debug, info, warn};

use crate::{
    config::{ConfigError, ModuleConfig},
    registry::Registry,
    select::Pollable,
    sync::PollTable,
};

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("driver init failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Callbacks a driver provides for its device nodes.
pub trait FileOperations: Sized + Send + Sync + 'static {
    type Instance: Send + Sync + 'static;

    /// Sets up driver-wide resources at module load.
    fn init(config: &ModuleConfig) -> std::io::Result<Self>;

    /// Creates the instance of `minor`. All instances are created together
    /// right after [`FileOperations::init`].
    fn create(&self, minor: Minor, config: &ModuleConfig) -> Self::Instance;

    fn open(_instance: &Self::Instance, _flags: OpenFlags) -> Result {
        Ok(())
    }

    fn release(_instance: &Self::Instance) {}

    fn read(
        instance: &Self::Instance,
        dst: &mut dyn IoBufferWriter,
        cursor: &mut u64,
        flags: OpenFlags,
    ) -> Result<usize>;

    fn write(
        instance: &Self::Instance,
        src: &mut dyn IoBufferReader,
        flags: OpenFlags,
    ) -> Result<usize>;

    /// Readiness query. Must enrol on `table` before looking at the state.
    fn poll<'a>(instance: &'a Self::Instance, table: Option<&mut PollTable<'a>>) -> PollFlags;

    /// One line of driver state for [`ChrDev::proc_show`].
    fn show(instance: &Self::Instance, f: &mut dyn std::fmt::Write) -> std::fmt::Result;
}

struct Node<I> {
    instance: I,
    open_count: AtomicUsize,
}

struct Module<D: FileOperations> {
    config: ModuleConfig,
    // Declared before `driver`: instances go away before driver resources.
    registry: Registry<Node<D::Instance>>,
    driver: D,
}

impl<D: FileOperations> Index<Minor> for Module<D> {
    type Output = Node<D::Instance>;

    fn index(&self, minor: Minor) -> &Self::Output {
        match self.registry.get(minor) {
            Some(node) => node,
            None => panic!("minor {minor} outside of registry"),
        }
    }
}

impl<D: FileOperations> Drop for Module<D> {
    fn drop(&mut self) {
        info!("{}: module exit", self.config.name);
    }
}

pub struct ChrDev<D: FileOperations> {
    module: Arc<Module<D>>,
}

impl<D: FileOperations> ChrDev<D> {
    /// Loads the module: validates `config`, initializes the driver and
    /// creates every instance.
    pub fn init(config: ModuleConfig) -> core::result::Result<Self, LoadError> {
        config.validate()?;
        let driver = D::init(&config)?;
        let registry = Registry::new(config.instances, |minor| {
            let instance = driver.create(minor, &config);
            debug!("{}: instance {}{} created", config.name, config.name, minor);
            Node {
                instance,
                open_count: AtomicUsize::new(0),
            }
        });
        info!(
            "{}: module loaded with {} instance(s)",
            config.name,
            registry.len()
        );

        Ok(Self {
            module: Arc::new(Module {
                config,
                registry,
                driver,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.module.config.name
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.module.config
    }

    pub fn driver(&self) -> &D {
        &self.module.driver
    }

    pub fn instances(&self) -> usize {
        self.module.registry.len()
    }

    pub fn instance(&self, minor: Minor) -> Option<&D::Instance> {
        self.module.registry.get(minor).map(|n| &n.instance)
    }

    pub fn node_name(&self, minor: Minor) -> String {
        format!("{}{}", self.name(), minor)
    }

    pub fn node_names(&self) -> Vec<String> {
        self.module
            .registry
            .iter()
            .map(|(minor, _)| self.node_name(minor))
            .collect()
    }

    pub fn open_count(&self, minor: Minor) -> Option<usize> {
        self.module
            .registry
            .get(minor)
            .map(|n| n.open_count.load(Ordering::SeqCst))
    }

    /// Binds a new handle to the instance of `minor`.
    pub fn open(&self, minor: Minor, flags: OpenFlags) -> Result<File<D>> {
        let Some(node) = self.module.registry.get(minor) else {
            warn!("{}: open of unknown minor {}", self.name(), minor);
            return Err(Error::NoDevice(minor));
        };
        D::open(&node.instance, flags)?;
        let count = node.open_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "{}{}: open, access: {}, open-counter: {}",
            self.name(),
            minor,
            flags.access_mode(),
            count
        );

        Ok(File {
            module: self.module.clone(),
            minor,
            flags,
            pos: 0,
        })
    }

    /// Text snapshot of every instance, one line each.
    pub fn proc_show(&self) -> String {
        let mut out = String::new();
        for (minor, node) in self.module.registry.iter() {
            let _ = write!(
                out,
                "{}{}: open={} ",
                self.name(),
                minor,
                node.open_count.load(Ordering::SeqCst)
            );
            let _ = D::show(&node.instance, &mut out);
            out.push('\n');
        }
        out
    }

    /// Unloads the module. Refused with [`Error::Busy`] while handles are
    /// open; the module is handed back in that case.
    pub fn exit(self) -> core::result::Result<(), (Error, Self)> {
        match Arc::try_unwrap(self.module) {
            Ok(module) => {
                drop(module);
                Ok(())
            }
            Err(module) => {
                warn!("{}: exit refused, handles still open", module.config.name);
                Err((Error::Busy, Self { module }))
            }
        }
    }
}

/// Open handle bound to one instance.
///
/// The handle is bound exactly once, when [`ChrDev::open`] creates it, and
/// carries its own read cursor and flags.
pub struct File<D: FileOperations> {
    module: Arc<Module<D>>,
    minor: Minor,
    flags: OpenFlags,
    pos: u64,
}

impl<D: FileOperations> File<D> {
    pub fn minor(&self) -> Minor {
        self.minor
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Read cursor within the current message.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.flags.set(OpenFlags::NONBLOCK, nonblocking);
    }

    pub fn node_name(&self) -> String {
        format!("{}{}", self.module.config.name, self.minor)
    }

    pub fn instance(&self) -> &D::Instance {
        &self.module[self.minor].instance
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_to(&mut UserSliceWriter::new(buf))
    }

    pub fn read_to(&mut self, dst: &mut dyn IoBufferWriter) -> Result<usize> {
        debug!(
            "{}{}: read {} bytes at {}, access: {}",
            self.module.config.name,
            self.minor,
            dst.len(),
            self.pos,
            self.flags.access_mode()
        );
        D::read(
            &self.module[self.minor].instance,
            dst,
            &mut self.pos,
            self.flags,
        )
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.write_from(&mut UserSliceReader::new(data))
    }

    pub fn write_from(&mut self, src: &mut dyn IoBufferReader) -> Result<usize> {
        debug!(
            "{}{}: write {} bytes, access: {}",
            self.module.config.name,
            self.minor,
            src.len(),
            self.flags.access_mode()
        );
        D::write(&self.module[self.minor].instance, src, self.flags)
    }

    pub fn poll<'a>(&'a self, table: Option<&mut PollTable<'a>>) -> PollFlags {
        D::poll(&self.module[self.minor].instance, table)
    }
}

impl<D: FileOperations> Pollable for File<D> {
    fn poll<'a>(&'a self, table: Option<&mut PollTable<'a>>) -> PollFlags {
        File::poll(self, table)
    }
}

impl<D: FileOperations> Drop for File<D> {
    fn drop(&mut self) {
        let node = &self.module[self.minor];
        D::release(&node.instance);
        let count = node.open_count.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(
            "{}{}: close, open-counter: {}",
            self.module.config.name, self.minor, count
        );
    }
}
