//! Colored stderr logger for the command line.
//!
//! The library only talks to the `log` facade; binaries call [`init`] once.

use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use std::io::Write;

static LOGGER: ConsoleLogger = ConsoleLogger;

struct ConsoleLogger;

/// Color used for a level's tag
pub fn level_color(level: Level) -> Color {
    match level {
        Level::Trace => Color::Cyan,
        Level::Debug => Color::Blue,
        Level::Info => Color::Green,
        Level::Warn => Color::Yellow,
        Level::Error => Color::Red,
    }
}

/// Map a `-v` count to a level filter: warnings by default, then info,
/// debug and trace.
pub fn filter_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the logger. Fails if another logger is already set.
pub fn init(level: LevelFilter) -> Result<(), String> {
    log::set_logger(&LOGGER).map_err(|e| format!("Failed to set logger: {:?}", e))?;
    log::set_max_level(level);
    Ok(())
}

fn format_record(record: &Record) -> String {
    let level = record.level();
    let tag = format!("[{}]", level.as_str()).color(level_color(level)).bold();
    let module = record.module_path().unwrap_or("genview");
    format!("{} {} {}", tag, module.bright_black(), record.args())
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(record));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(filter_for_verbosity(0), LevelFilter::Warn);
        assert_eq!(filter_for_verbosity(1), LevelFilter::Info);
        assert_eq!(filter_for_verbosity(2), LevelFilter::Debug);
        assert_eq!(filter_for_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn record_format_carries_level_and_message() {
        colored::control::set_override(false);
        let line = format_record(
            &Record::builder()
                .args(format_args!("saved {}", "a.png"))
                .level(Level::Info)
                .module_path(Some("genview::download"))
                .build(),
        );
        assert_eq!(line, "[INFO] genview::download saved a.png");
        colored::control::unset_override();
    }

    #[test]
    fn error_is_red() {
        assert_eq!(level_color(Level::Error), Color::Red);
    }
}
