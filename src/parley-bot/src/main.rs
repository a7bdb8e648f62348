//! Parley console bot binary.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use parley_bot::{ConsoleSink, build_tree};
use parley_commands::{DispatchConfig, Dispatcher, IncomingMessage, Outcome};

/// Parley chat bot on the console
#[derive(Parser)]
#[command(name = "parley-bot")]
#[command(about = "Reads chat lines from stdin and answers bot commands")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Command prefix, overriding the config
    #[arg(short, long)]
    prefix: Option<char>,

    /// Permission groups of the console user
    #[arg(short, long, env = "PARLEY_GROUPS", value_delimiter = ',')]
    groups: Vec<String>,

    /// Channel name replies are addressed to
    #[arg(long, default_value = "console")]
    channel: String,

    /// Author name attached to each message
    #[arg(long, env = "USER")]
    author: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(io::stderr))
            .init();
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let mut config = match &args.config {
        Some(path) => match DispatchConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config from {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => DispatchConfig::from_env(),
    };
    if let Some(prefix) = args.prefix {
        config.prefix = prefix;
    }

    let tree = match build_tree() {
        Ok(tree) => tree,
        Err(e) => {
            error!("Failed to register commands: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = Dispatcher::new(tree, config);
    let sink = ConsoleSink::stdout();

    info!(
        "Listening on stdin as {} in #{} (prefix '{}', groups {:?})",
        args.author.as_deref().unwrap_or("anonymous"),
        args.channel,
        dispatcher.prefix(),
        args.groups
    );

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let mut message =
            IncomingMessage::new(args.channel.as_str(), line).with_groups(args.groups.iter().cloned());
        if let Some(author) = &args.author {
            message = message.with_author(author.as_str());
        }

        match dispatcher.process(&message, &sink) {
            Ok(Outcome::NotCommand) => {}
            Ok(outcome) => debug!("Dispatched: {:?}", outcome),
            Err(e) => debug!("Command failed: {}", e),
        }
    }

    info!("Input closed, shutting down");
    ExitCode::SUCCESS
}
