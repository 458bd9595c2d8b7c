mod config;
mod engine;
mod error;
mod exp_configs;
mod experiment;
mod logging;
mod params;
mod runner;

use config::AppConfig;
use error::Error;

fn main() {
    let tokens = std::env::args_os().map(|a| a.to_string_lossy().into_owned());
    let (cli, ignored) = match config::parse_known_args(tokens) {
        Ok(parsed) => parsed,
        // clap prints usage and help/version to the right stream itself
        Err(Error::Usage(e)) => e.exit(),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let cfg = match AppConfig::resolve(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    logging::init(cfg.verbosity);
    if !ignored.is_empty() {
        log::warn!("ignoring unrecognized arguments: {}", ignored.join(" "));
    }

    if let Err(e) = engine::launch(&cfg, runner::from_config) {
        log::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
