#![forbid(unsafe_code)]

use clap::Parser;
use ferroterm_server::client::{self, Cli};
use ferroterm_server::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.log_level, cli.log_colorize) {
        eprintln!("ferroterm-client: {err}");
    }
    std::process::exit(client::run(&cli));
}
