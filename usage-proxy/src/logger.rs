use std::fmt::Write;

use jiff::{Timestamp, tz::TimeZone};
use log::{Level, Record};
use logforth::{
    append::Stdout,
    diagnostic::Diagnostic,
    layout::{JsonLayout, Layout},
};

use crate::args::{Args, LogStyle};

/// `<UTC timestamp> <level> <module>: <message>`, with an ANSI colored level unless plain.
#[derive(Debug, Clone, Copy)]
struct LineLayout {
    colored: bool,
}

impl Layout for LineLayout {
    fn format(&self, record: &Record<'_>, _: &[Box<dyn Diagnostic>]) -> anyhow::Result<Vec<u8>> {
        let mut line = Timestamp::now()
            .to_zoned(TimeZone::UTC)
            .strftime("%Y-%m-%dT%H:%M:%S%.6fZ ")
            .to_string();

        match level_color(record.level()) {
            Some(color) if self.colored => write!(line, "\x1b[{color}m{:>5}\x1b[0m  ", record.level())?,
            _ => write!(line, "{:>5}  ", record.level())?,
        }

        write!(line, "{}: {}", record.module_path().unwrap_or("usage_proxy"), record.args())?;

        Ok(line.into_bytes())
    }
}

fn level_color(level: Level) -> Option<u8> {
    match level {
        Level::Error => Some(31),
        Level::Warn => Some(33),
        Level::Info => Some(32),
        Level::Debug => Some(34),
        Level::Trace => None,
    }
}

pub(super) fn init(args: &Args) {
    logforth::builder()
        .dispatch(|d| {
            let stdout = match args.log_style {
                LogStyle::Color => Stdout::default().with_layout(LineLayout { colored: true }),
                LogStyle::Text => Stdout::default().with_layout(LineLayout { colored: false }),
                LogStyle::Json => Stdout::default().with_layout(JsonLayout::default()),
            };

            d.filter(args.log_level.env_filter()).append(stdout)
        })
        .apply();
}
