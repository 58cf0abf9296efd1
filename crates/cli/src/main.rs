mod core_commands;
mod network_commands;
mod route_commands;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use hookbot_config::ConfigStore;

#[derive(Parser)]
#[command(name = "hookbot", version, about = "hookbot: relay repository webhooks to IRC")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default ~/.config/hookbot/hookbot.yml).
    #[arg(long, short = 'c', global = true, env = "HOOKBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Control pipe of the running bot (default ~/.config/hookbot/hookbot.ipc).
    #[arg(long, short = 'p', global = true, env = "HOOKBOT_PIPE")]
    pipe: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage IRC networks.
    Network {
        #[command(subcommand)]
        action: network_commands::NetworkAction,
    },
    /// Manage webhook routes and the channels they deliver to.
    Route {
        #[command(subcommand)]
        action: route_commands::RouteAction,
    },
    /// Run or control the bot.
    Core {
        #[command(subcommand)]
        action: core_commands::CoreAction,
    },
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(hookbot_common::paths::default_config_file)
    }

    fn pipe_path(&self) -> PathBuf {
        self.pipe
            .clone()
            .unwrap_or_else(hookbot_common::paths::default_pipe)
    }

    fn open_store(&self) -> anyhow::Result<Arc<ConfigStore>> {
        let path = self.config_path();
        debug!(path = %path.display(), "opening configuration");
        Ok(Arc::new(ConfigStore::open(path)?))
    }
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Network { action } => network_commands::handle_network(&cli, action),
        Commands::Route { action } => route_commands::handle_route(&cli, action),
        Commands::Core { action } => core_commands::handle_core(&cli, action).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}
