use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Maps a verbosity name or number to a level; unknown values fall back to `Warn`.
pub fn parse_verbosity(s: &str) -> LevelFilter {
    match s {
        "0" | "none" | "off" => LevelFilter::Off,
        "1" | "err" | "error" | "min" => LevelFilter::Error,
        "2" | "warn" | "warning" | "default" => LevelFilter::Warn,
        "3" | "info" => LevelFilter::Info,
        "4" | "debug" => LevelFilter::Debug,
        "5" | "trace" | "max" | "all" => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    }
}

/// Installs the terminal logger. Everything goes to stderr; stdout carries the run plan.
pub fn init(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Debug)
        .set_target_level(LevelFilter::Trace)
        .set_location_level(LevelFilter::Off)
        .build();

    if let Err(e) = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("failed to initialize logger: {}", e);
    }
}
