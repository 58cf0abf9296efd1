//! CLI commands for webhook route management.

use {
    anyhow::bail,
    clap::Subcommand,
    secrecy::ExposeSecret,
};

use hookbot_config::{ChannelParams, Route, RouteManager, RouteParams};

use crate::Cli;

#[derive(Subcommand)]
pub enum RouteAction {
    /// Add a route. Endpoint and secret are generated unless given.
    Create {
        /// Route name.
        name: String,
        #[arg(short, long)]
        endpoint: Option<String>,
        /// Shared webhook secret. An empty value disables verification.
        #[arg(short, long)]
        secret: Option<String>,
        /// Channel to deliver to, as `NETWORK/#CHANNEL[:KEY]`. Repeatable.
        #[arg(long = "channel", value_name = "CHANNEL")]
        channels: Vec<String>,
        /// Like `--channel`, but messages are sent without joining.
        #[arg(long = "external-channel", value_name = "CHANNEL")]
        external_channels: Vec<String>,
    },
    /// Change an existing route.
    Update {
        /// Current route name.
        name: String,
        /// Rename the route.
        #[arg(long = "name", value_name = "NEW_NAME")]
        rename: Option<String>,
        #[arg(short, long)]
        endpoint: Option<String>,
        #[arg(short, long)]
        secret: Option<String>,
        /// Remove every channel before applying other channel changes.
        #[arg(long)]
        clear_channels: bool,
        /// Channel to remove, as `NETWORK/#CHANNEL`. Repeatable.
        #[arg(long = "delete-channel", value_name = "CHANNEL")]
        delete_channels: Vec<String>,
        /// Channel to add, as `NETWORK/#CHANNEL[:KEY]`. Repeatable.
        #[arg(long = "add-channel", value_name = "CHANNEL")]
        add_channels: Vec<String>,
        /// Like `--add-channel`, but messages are sent without joining.
        #[arg(long = "add-external-channel", value_name = "CHANNEL")]
        add_external_channels: Vec<String>,
    },
    /// Remove a route.
    Destroy {
        name: String,
    },
    /// List routes.
    List {
        /// Only show routes whose name contains this text.
        search: Option<String>,
        /// Include secrets in the output.
        #[arg(long)]
        show_secrets: bool,
    },
}

pub fn handle_route(cli: &Cli, action: &RouteAction) -> anyhow::Result<()> {
    let routes = RouteManager::new(cli.open_store()?);

    match action {
        RouteAction::Create {
            name,
            endpoint,
            secret,
            channels,
            external_channels,
        } => {
            let route = routes.create(RouteParams {
                name: Some(name.clone()),
                endpoint: endpoint.clone(),
                secret: secret.clone(),
                channels: channel_params(channels, external_channels)?,
                ..Default::default()
            })?;
            println!("Route {} created.", route.name);
            print!("{}", describe(&route, true));
        },
        RouteAction::Update {
            name,
            rename,
            endpoint,
            secret,
            clear_channels,
            delete_channels,
            add_channels,
            add_external_channels,
        } => {
            let route = routes.update(name, RouteParams {
                name: rename.clone(),
                endpoint: endpoint.clone(),
                secret: secret.clone(),
                clear_channels: *clear_channels,
                delete_channels: delete_channels.clone(),
                add_channels: channel_params(add_channels, add_external_channels)?,
                ..Default::default()
            })?;
            println!("Route {} updated.", route.name);
        },
        RouteAction::Destroy { name } => {
            let route = routes.destroy(name)?;
            println!("Route {} destroyed.", route.name);
        },
        RouteAction::List {
            search,
            show_secrets,
        } => {
            let found = routes.list(search.as_deref());
            if found.is_empty() {
                println!("No routes found.");
            }
            for route in &found {
                print!("{}", describe(route, *show_secrets));
            }
        },
    }
    Ok(())
}

fn channel_params(joined: &[String], external: &[String]) -> anyhow::Result<Vec<ChannelParams>> {
    let joined = joined.iter().map(|spec| parse_channel(spec, false));
    let external = external.iter().map(|spec| parse_channel(spec, true));
    joined.chain(external).collect()
}

/// Parse `NETWORK/#CHANNEL[:KEY]`. Channel names cannot contain `:`, so the
/// first colon starts the key.
fn parse_channel(spec: &str, send_external: bool) -> anyhow::Result<ChannelParams> {
    let (identifier, key) = match spec.split_once(':') {
        Some((identifier, key)) => (identifier, Some(key.to_string())),
        None => (spec, None),
    };
    if !identifier.contains('/') {
        bail!("channel {spec:?} must be written as NETWORK/#CHANNEL");
    }
    Ok(ChannelParams {
        identifier: identifier.to_string(),
        key,
        send_external: send_external.then_some(true),
    })
}

fn describe(route: &Route, show_secrets: bool) -> String {
    let secret = route.secret.expose_secret();
    let secret = match (secret.is_empty(), show_secrets) {
        (true, _) => "(none, signatures are not checked)",
        (false, true) => secret.as_str(),
        (false, false) => "(hidden)",
    };

    let mut out = format!("Route: {}\n", route.name);
    out.push_str(&format!("  Endpoint: /{}\n", route.endpoint));
    out.push_str(&format!("  Secret:   {secret}\n"));
    if route.channels.is_empty() {
        out.push_str("  Channels: (none)\n");
    } else {
        out.push_str("  Channels:\n");
        for channel in &route.channels {
            let mut flags = Vec::new();
            if channel.key.is_some() {
                flags.push("keyed");
            }
            if channel.send_external {
                flags.push("external");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            out.push_str(&format!("    - {}{flags}\n", channel.identifier()));
        }
    }
    out
}
