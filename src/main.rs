mod app;
mod cli;
mod client;
mod config;
mod consts;
mod error;
mod image;
mod output;
mod store;
mod utils;

use clap::Parser;
use tracing::{debug, warn};

use app::CommandContext;
use cli::Cli;
use config::{Config, ConfigSource};
use utils::init_logging;

fn main() {
    let (config, source) = Config::load();
    let cli = Cli::parse().with_config(&config);

    init_logging(cli.debug);
    match &source {
        ConfigSource::File(path) => debug!("Loaded config from {}", path.display()),
        ConfigSource::Invalid { path, message } => {
            warn!("Failed to parse {}: {}", path.display(), message);
        }
        ConfigSource::Defaults => {}
    }

    let settings = cli.settings(&config);
    let ctx = CommandContext {
        cli: &cli,
        settings: &settings,
    };

    if let Err(e) = app::run(&ctx) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
