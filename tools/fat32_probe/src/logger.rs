use std::fmt::Display;
use std::io::Write;

use log::{Level, LevelFilter, Log};
use owo_colors::OwoColorize;

struct Inner {
    color: bool,
}

impl Inner {
    fn write_with_color(&mut self, color: Color, string: impl Display) {
        let string: &dyn Display = match (self.color, color) {
            (false, _) | (true, Color::Default) => &string,
            (true, Color::Gray) => &string.dimmed(),
            (true, Color::BrightRed) => &string.bright_red(),
            (true, Color::BrightYellow) => &string.bright_yellow(),
            (true, Color::BrightBlue) => &string.bright_blue(),
            (true, Color::BrightCyan) => &string.bright_cyan(),
            (true, Color::BrightMagenta) => &string.bright_magenta(),
        };
        // Nowhere left to report a failed stderr write.
        let _ = write!(std::io::stderr().lock(), "{string}");
    }
}

struct ProbeLogger {
    inner: spin::Mutex<Inner>,
}

static LOGGER: ProbeLogger = ProbeLogger { inner: spin::Mutex::new(Inner { color: true }) };

impl Log for ProbeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut inner = self.inner.lock();
        let level = record.level();
        inner.write_with_color(
            match level {
                Level::Error => Color::BrightRed,
                Level::Warn => Color::BrightYellow,
                Level::Info => Color::BrightBlue,
                Level::Debug => Color::BrightCyan,
                Level::Trace => Color::BrightMagenta,
            },
            format_args!("{level:5} "),
        );
        inner.write_with_color(Color::Gray, format_args!("[{}] ", record.target()));
        inner.write_with_color(Color::Default, record.args());
        inner.write_with_color(Color::Default, "\n");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the logger. `NO_COLOR` in the environment turns off ANSI colours.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    LOGGER.inner.lock().color = std::env::var_os("NO_COLOR").is_none();
    log::set_max_level(level);
    log::set_logger(&LOGGER)
}

enum Color {
    Default,
    Gray,
    BrightRed,
    BrightYellow,
    BrightBlue,
    BrightCyan,
    BrightMagenta,
}
