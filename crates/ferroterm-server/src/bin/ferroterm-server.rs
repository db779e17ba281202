#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ferroterm_core::TermConfig;
use ferroterm_server::logging::{LogColorize, LogLevel, init_logging};
use ferroterm_server::socket;
use ferroterm_server::{LogRenderer, Server, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "ferroterm-server")]
#[command(about = "Terminal server: spawns a terminal for each client request")]
#[command(version)]
struct Args {
    /// Socket path (default: $RUNTIME_DIR/ferroterm-$DISPLAY.sock)
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Default TERM for children
    #[arg(short, long, env = "TERM")]
    term: Option<String>,

    /// Scrollback lines per terminal
    #[arg(long, default_value_t = 1000)]
    scrollback: usize,

    /// Exported to children as TERMINFO
    #[arg(long, value_name = "DIR")]
    terminfo_dir: Option<String>,

    /// Keep every terminal open after its child exits
    #[arg(short = 'H', long)]
    hold: bool,

    /// Configuration override (key=value) applied to every terminal
    #[arg(short = 'o', long = "override", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    #[arg(short = 'd', long, value_enum)]
    log_level: Option<LogLevel>,

    #[arg(short = 'l', long, value_enum, default_value_t = LogColorize::Auto)]
    log_colorize: LogColorize,
}

impl Args {
    fn term_config(&self) -> TermConfig {
        let mut config = TermConfig::default().with_scrollback(self.scrollback);
        if let Some(term) = self.term.as_deref().filter(|t| !t.is_empty()) {
            config = config.with_term(term);
        }
        if let Some(dir) = &self.terminfo_dir {
            config = config.with_terminfo_dir(dir.clone());
        }
        if let Ok(host) = std::env::var("HOSTNAME")
            && !host.is_empty()
        {
            config = config.with_hostname(host);
        }
        config.apply_overrides(self.overrides.iter().map(String::as_str));
        config
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging(args.log_level, args.log_colorize) {
        eprintln!("ferroterm-server: {err}");
    }

    let config = ServerConfig::new(args.socket.clone().unwrap_or_else(socket::socket_path))
        .with_term_config(args.term_config())
        .with_hold(args.hold);
    let mut server = Server::new(config, LogRenderer::default());
    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "server failed");
            eprintln!("ferroterm-server: {err}");
            ExitCode::FAILURE
        }
    }
}
