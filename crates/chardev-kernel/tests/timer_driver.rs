use std::{
    sync::{Barrier, mpsc},
    thread,
    time::{Duration, Instant},
};

use chardev_interface::UserSliceWriter;
use chardev_kernel::{
    ChrDev, Error, File, Minor, ModuleConfig, OpenFlags, PollFlags, Pollable,
    drivers::{TimerDriver, TimerInstance},
    select, task,
};
use log::LevelFilter;

fn init() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

fn load(instances: u32, period_ms: u64) -> ChrDev<TimerDriver> {
    init();
    ChrDev::init(ModuleConfig {
        instances,
        period_ms,
        ..ModuleConfig::named("timer")
    })
    .unwrap()
}

fn open(dev: &ChrDev<TimerDriver>, minor: u32) -> File<TimerDriver> {
    dev.open(Minor::new(minor), OpenFlags::empty()).unwrap()
}

fn read_count(file: &mut File<TimerDriver>) -> chardev_kernel::Result<u64> {
    let mut buf = [0u8; 32];
    let n = file.read(&mut buf)?;
    let text = std::str::from_utf8(&buf[..n]).unwrap();
    Ok(text.trim_end().parse().unwrap())
}

fn wait_pending(inst: &TimerInstance) -> u64 {
    let start = Instant::now();
    while inst.pending() == 0 {
        assert!(start.elapsed() < Duration::from_secs(2), "timer never fired");
        thread::sleep(Duration::from_millis(1));
    }
    inst.pending()
}

#[test]
fn test_period_write_paces_reads() {
    let dev = load(1, 0);
    let mut file = open(&dev, 0);

    assert_eq!(file.write(b"500"), Ok(3));
    let start = Instant::now();
    let first = read_count(&mut file).unwrap();
    let t1 = start.elapsed();
    let second = read_count(&mut file).unwrap();
    let t2 = start.elapsed();

    assert!(first >= 1);
    assert!(second >= 1);
    assert!(t1 >= Duration::from_millis(450), "first after {t1:?}");
    assert!(t2 - t1 >= Duration::from_millis(400), "second after {:?}", t2 - t1);
}

#[test]
fn test_pending_accumulates_until_read() {
    let dev = load(1, 20);
    let mut file = open(&dev, 0);

    thread::sleep(Duration::from_millis(200));
    let count = read_count(&mut file).unwrap();
    assert!(count >= 2, "count {count}");
}

#[test]
fn test_zero_suspends() {
    let dev = load(1, 10);
    let mut file = open(&dev, 0);
    thread::sleep(Duration::from_millis(50));

    assert_eq!(file.write(b"0\n"), Ok(2));
    let inst = dev.instance(Minor::new(0)).unwrap();
    assert_eq!(inst.period(), None);
    assert_eq!(inst.pending(), 0);
    assert!(!inst.is_armed());

    thread::sleep(Duration::from_millis(60));
    assert_eq!(inst.pending(), 0);
    file.set_nonblocking(true);
    assert_eq!(read_count(&mut file), Err(Error::WouldBlock));

    // re-arming works after a suspend
    file.set_nonblocking(false);
    file.write(b"10").unwrap();
    assert!(read_count(&mut file).unwrap() >= 1);
}

#[test]
fn test_malformed_control_keeps_period() {
    let dev = load(1, 1000);
    let mut file = open(&dev, 0);
    let inst = dev.instance(Minor::new(0)).unwrap();

    for bad in [&b"fast"[..], b"-3", b"12ms", b""] {
        assert_eq!(file.write(bad), Err(Error::InvalidArgument));
    }
    assert_eq!(inst.period(), Some(Duration::from_millis(1000)));
    assert!(inst.is_armed());
}

#[test]
fn test_readiness() {
    let dev = load(2, 0);
    let t0 = open(&dev, 0);
    let mut t1 = open(&dev, 1);

    assert_eq!(t0.poll(None), PollFlags::WRITABLE);

    t1.write(b"20").unwrap();
    let files: [&dyn Pollable; 2] = [&t0, &t1];
    let ready = select(&files, PollFlags::READABLE, Some(Duration::from_secs(2))).unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].index, 1);
    assert!(t1.poll(None).contains(PollFlags::READABLE | PollFlags::WRITABLE));
}

#[test]
fn test_show_and_exit_stop_triggers() {
    let dev = load(2, 5);
    {
        let mut file = open(&dev, 1);
        file.write(b"0").unwrap();
    }
    let text = dev.proc_show();
    assert!(text.contains("timer0: open=0 period=5ms"), "{text}");
    assert!(text.contains("timer1: open=0 suspended pending=0"), "{text}");

    assert!(dev.exit().is_ok());
}

#[test]
fn test_short_read_keeps_count() {
    let dev = load(1, 10);
    let mut file = open(&dev, 0);
    let inst = dev.instance(Minor::new(0)).unwrap();
    let before = wait_pending(inst);

    assert_eq!(file.read(&mut []), Ok(0));
    assert!(inst.pending() >= before);

    let mut one = [0u8; 1];
    assert_eq!(file.read(&mut one), Err(Error::InvalidArgument));
    assert!(inst.pending() >= before);

    assert!(read_count(&mut file).unwrap() >= before);
}

#[test]
fn test_faulty_read_keeps_count() {
    let dev = load(1, 10);
    let mut file = open(&dev, 0);
    let inst = dev.instance(Minor::new(0)).unwrap();
    let before = wait_pending(inst);

    let mut small = [0u8; 1];
    assert_eq!(
        file.read_to(&mut UserSliceWriter::with_len(&mut small, 32)),
        Err(Error::FaultyBuffer)
    );
    assert!(inst.pending() >= before);
}

#[test]
fn test_interrupted_read() {
    let dev = load(1, 0);
    let mut file = open(&dev, 0);

    thread::scope(|s| {
        let (task_tx, task_rx) = mpsc::channel();
        let r = s.spawn(move || {
            let me = task::current();
            task_tx.send(me.clone()).unwrap();
            let res = read_count(&mut file);
            me.clear_signal();
            res
        });

        let reader = task_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        reader.signal();
        assert_eq!(r.join().unwrap(), Err(Error::Interrupted));
    });
    assert_eq!(dev.instance(Minor::new(0)).unwrap().pending(), 0);
}

#[test]
fn test_concurrent_control_writes_stay_consistent() {
    let dev = load(1, 0);
    let inst = dev.instance(Minor::new(0)).unwrap();

    for _ in 0..500 {
        let barrier = Barrier::new(2);
        thread::scope(|s| {
            for cmd in [&b"100000"[..], b"0"] {
                let mut file = open(&dev, 0);
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    file.write(cmd).unwrap();
                });
            }
        });
        assert_eq!(inst.period().is_some(), inst.is_armed());
    }
}
