use std::time::Instant;

use ansi_rgb::{Foreground, red, yellow};
use log::{Level, LevelFilter, Log};
use rgb::{RGB8, Rgb};

static START: spin::Once<Instant> = spin::Once::new();
static LOGGER: KLogger = KLogger;

/// Colour and marker of each level.
fn level_style(level: Level) -> (RGB8, &'static str) {
    match level {
        Level::Error => (red(), "E"),
        Level::Warn => (yellow(), "W"),
        Level::Info => (Rgb::new(0x3C, 0xB3, 0x71), "I"),
        Level::Debug => (Rgb::new(0x46, 0x82, 0xB4), "D"),
        Level::Trace => (Rgb::new(0x80, 0x80, 0x80), "T"),
    }
}

/// Time since the logger was installed.
pub fn since_start() -> std::time::Duration {
    START.call_once(Instant::now).elapsed()
}

pub struct KLogger;

impl Log for KLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let (colour, marker) = level_style(record.level());
            eprint!(
                "{}",
                format_args!(
                    "{marker} {:>10.3?} [{path}:{line}] {args}\n",
                    since_start(),
                    path = record.target(),
                    line = record.line().unwrap_or(0),
                    args = record.args()
                )
                .fg(colour)
            );
        }
    }

    fn flush(&self) {}
}

/// Installs [`KLogger`] as the global logger. Later calls only change the
/// level.
pub fn init(level: LevelFilter) {
    START.call_once(Instant::now);
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_levels_are_distinguishable() {
        let levels = [
            Level::Error,
            Level::Warn,
            Level::Info,
            Level::Debug,
            Level::Trace,
        ];
        for (i, a) in levels.iter().enumerate() {
            for b in &levels[i + 1..] {
                assert_ne!(level_style(*a), level_style(*b));
            }
        }
    }
}
