use std::time::{Duration, Instant};

use ansi_rgb::{Foreground, green, yellow};
use anyhow::{Context, Result, bail};
use chardev_kernel::{
    ChrDev, Minor, ModuleConfig, OpenFlags, PollFlags, Pollable, drivers::TimerDriver, select,
};
use clap::Args;
use log::{info, warn};

#[derive(Args, Debug)]
pub struct TimerArgs {
    /// Number of instances to load
    #[arg(short, long)]
    instances: Option<u32>,
    /// Period written to every instance, in milliseconds
    #[arg(short, long, default_value_t = 500)]
    period: u64,
    /// Number of readiness rounds to wait for
    #[arg(short = 'n', long, default_value_t = 5)]
    count: usize,
}

pub fn run(mut config: ModuleConfig, args: TimerArgs) -> Result<()> {
    if args.period == 0 {
        bail!("period must be at least 1 ms");
    }
    if let Some(instances) = args.instances {
        config.instances = instances;
    }
    // armed through the control channel below
    config.period_ms = 0;

    let dev = ChrDev::<TimerDriver>::init(config).context("load timer driver")?;
    println!("Timer-Test. Found driver instances: {}", dev.instances());

    let mut files = Vec::with_capacity(dev.instances());
    for minor in 0..dev.instances() as u32 {
        let mut file = dev.open(Minor::new(minor), OpenFlags::RDWR | OpenFlags::NONBLOCK)?;
        file.write(args.period.to_string().as_bytes())
            .with_context(|| format!("set period of {}", file.node_name()))?;
        info!("{}: period {} ms", file.node_name(), args.period);
        files.push(file);
    }

    let timeout = Duration::from_millis(args.period * 4);
    let start = Instant::now();
    let mut buf = [0u8; 32];
    for _ in 0..args.count {
        let ready = {
            let pollables = files.iter().map(|f| f as &dyn Pollable).collect::<Vec<_>>();
            select(&pollables, PollFlags::READABLE, Some(timeout))?
        };
        if ready.is_empty() {
            bail!("no timer expired within {timeout:?}");
        }
        for one in ready {
            let file = &mut files[one.index];
            let n = file.read(&mut buf)?;
            let count = String::from_utf8_lossy(&buf[..n]);
            println!(
                "{} +{:>6}ms: {} expiries",
                file.node_name().fg(yellow()),
                start.elapsed().as_millis(),
                count.trim_end()
            );
        }
    }

    for file in files.iter_mut() {
        file.write(b"0\n")?;
    }
    print!("{}", dev.proc_show());
    drop(files);

    if dev.exit().is_err() {
        warn!("timer driver still in use at exit");
    }
    println!("{}", "End...".fg(green()));
    Ok(())
}
