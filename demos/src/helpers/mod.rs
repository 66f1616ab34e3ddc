//! Shared pieces of the demos.

mod chat;

pub use chat::ChatApp;

use std::io::Write;

/// Installs `env_logger` with the demos' line format.
pub fn init_logger(level: log::LevelFilter) {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                chrono::Local::now().format("%H:%M:%S.%6f"),
                record.args()
            )
        })
        .filter(None, level)
        .init();
}
