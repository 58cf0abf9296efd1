//! CLI commands that run the bot or talk to a running one.

use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, bail},
    clap::Subcommand,
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use {
    hookbot_irc::IrcConnector,
    hookbot_relay::{ControlClient, Core},
    hookbot_webhook::{DEFAULT_BIND, DEFAULT_PORT},
};

use crate::Cli;

#[derive(Subcommand)]
pub enum CoreAction {
    /// Run the bot in the foreground.
    Start {
        /// Address for the webhook listener.
        #[arg(long, env = "HOOKBOT_BIND", default_value = DEFAULT_BIND)]
        bind: String,
        /// Port for the webhook listener.
        #[arg(long, env = "HOOKBOT_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Ask the running bot to shut down.
    Stop,
    /// Ask the running bot to reload its configuration file.
    Rehash,
}

pub async fn handle_core(cli: &Cli, action: &CoreAction) -> anyhow::Result<()> {
    match action {
        CoreAction::Start { bind, port } => start(cli, bind, *port).await,
        CoreAction::Stop => {
            ControlClient::new(cli.pipe_path()).send_stop()?;
            println!("Stop requested.");
            Ok(())
        },
        CoreAction::Rehash => {
            ControlClient::new(cli.pipe_path()).send_rehash()?;
            println!("Rehash requested.");
            Ok(())
        },
    }
}

async fn start(cli: &Cli, bind: &str, port: u16) -> anyhow::Result<()> {
    let pipe = cli.pipe_path();
    ensure_not_running(&pipe)?;

    let store = cli.open_store()?;
    let listener = TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("binding webhook listener to {bind}:{port}"))?;

    let core = Core::new(store, Arc::new(IrcConnector), pipe);
    core.start()?;
    info!(version = env!("CARGO_PKG_VERSION"), bind, port, "hookbot running");

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(hookbot_webhook::serve(
        listener,
        Arc::clone(&core),
        shutdown.clone(),
    ));
    let mut joined = tokio::task::spawn_blocking({
        let core = Arc::clone(&core);
        move || core.join()
    });

    let mut core_done = false;
    let mut server_done = false;
    tokio::select! {
        _ = &mut joined => core_done = true,
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "cannot listen for interrupts");
            }
            info!("interrupted");
            tokio::task::block_in_place(|| core.stop());
        },
        result = &mut server => {
            server_done = true;
            match result {
                Ok(Ok(())) => warn!("webhook listener exited"),
                Ok(Err(e)) => warn!(error = %e, "webhook listener failed"),
                Err(e) => warn!(error = %e, "webhook listener panicked"),
            }
            tokio::task::block_in_place(|| core.stop());
        },
    }

    shutdown.cancel();
    if !core_done {
        joined.await.context("waiting for the core to stop")?;
    }
    if !server_done {
        server
            .await
            .context("waiting for the webhook listener")?
            .context("webhook listener failed")?;
    }
    Ok(())
}

/// An existing pipe means another instance owns it, or one crashed and left
/// it behind.
fn ensure_not_running(pipe: &Path) -> anyhow::Result<()> {
    if pipe.exists() {
        bail!(
            "control pipe {} already exists; is hookbot already running? Remove it if not.",
            pipe.display()
        );
    }
    Ok(())
}
