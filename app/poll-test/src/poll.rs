use std::{sync::mpsc, thread, time::Duration};

use ansi_rgb::{Foreground, green, magenta_pink};
use anyhow::{Context, Result, bail};
use chardev_kernel::{
    ChrDev, Error, File, Minor, ModuleConfig, OpenFlags, PollFlags, Pollable,
    drivers::PollDriver, select, task,
};
use clap::Args;
use log::warn;

const SELECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Args, Debug)]
pub struct PollArgs {
    /// Number of instances to load
    #[arg(short, long)]
    instances: Option<u32>,
    /// Messages each writer sends
    #[arg(short, long, default_value_t = 3)]
    messages: usize,
}

pub fn run(mut config: ModuleConfig, args: PollArgs) -> Result<()> {
    if let Some(instances) = args.instances {
        config.instances = instances;
    }
    let dev = ChrDev::<PollDriver>::init(config).context("load poll driver")?;
    println!("Poll-Test. Found driver instances: {}", dev.instances());

    let mut readers = (0..dev.instances() as u32)
        .map(|minor| dev.open(Minor::new(minor), OpenFlags::NONBLOCK))
        .collect::<Result<Vec<_>, _>>()?;
    let expected = dev.instances() * args.messages;

    let writers = (0..dev.instances() as u32)
        .map(|minor| dev.open(Minor::new(minor), OpenFlags::WRONLY))
        .collect::<Result<Vec<_>, _>>()?;

    let result = thread::scope(|s| {
        let (task_tx, task_rx) = mpsc::channel();
        for writer in writers {
            let task_tx = task_tx.clone();
            let messages = args.messages;
            s.spawn(move || {
                let _ = task_tx.send(task::current());
                feed(writer, messages);
            });
        }
        drop(task_tx);

        let result = receive(&mut readers, expected);

        // writers still blocked on a full mailbox must not keep the scope open
        for writer in task_rx.iter().take(dev.instances()) {
            writer.signal();
        }
        result
    });

    drop(readers);
    if dev.exit().is_err() {
        warn!("poll driver still in use at exit");
    }
    result
}

fn feed(mut writer: File<PollDriver>, messages: usize) {
    for i in 0..messages {
        let msg = format!("#{i} {}", writer.node_name());
        match writer.write(msg.as_bytes()) {
            Ok(_) => {}
            Err(Error::Interrupted) => {
                warn!("{}: writer interrupted", writer.node_name());
                return;
            }
            Err(e) => {
                warn!("{}: write failed: {e}", writer.node_name());
                return;
            }
        }
    }
}

fn receive(readers: &mut [File<PollDriver>], expected: usize) -> Result<()> {
    let mut received = 0;
    let mut buf = [0u8; 1024];

    while received < expected {
        let ready = {
            let files = readers
                .iter()
                .map(|f| f as &dyn Pollable)
                .collect::<Vec<_>>();
            select(&files, PollFlags::READABLE, Some(SELECT_TIMEOUT))?
        };
        if ready.is_empty() {
            bail!("no data within {SELECT_TIMEOUT:?}, got {received} of {expected}");
        }

        for one in ready {
            let reader = &mut readers[one.index];
            match reader.read(&mut buf) {
                // closing read of a message, releases the slot
                Ok(0) => {}
                Ok(n) => {
                    received += 1;
                    let text = String::from_utf8_lossy(&buf[..n]);
                    println!("{}: {}", reader.node_name().fg(magenta_pink()), text);
                }
                Err(Error::WouldBlock) => {}
                Err(e) => bail!("unable to read from {}: {e}", reader.node_name()),
            }
        }
    }

    println!("{}", format!("End... {received} messages").fg(green()));
    Ok(())
}
