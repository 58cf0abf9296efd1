//! CLI commands for IRC network management.

use {
    clap::Subcommand,
    secrecy::{ExposeSecret, Secret},
};

use hookbot_config::{DEFAULT_PORT, DEFAULT_SECURE_PORT, Network, NetworkManager, NetworkParams};

use crate::Cli;

#[derive(Subcommand)]
pub enum NetworkAction {
    /// Add a network.
    Create {
        /// Network name.
        name: String,
        #[command(flatten)]
        options: NetworkOptions,
    },
    /// Change an existing network.
    Update {
        /// Current network name.
        name: String,
        /// Rename the network. Channels referring to it follow.
        #[arg(long = "name", value_name = "NEW_NAME")]
        rename: Option<String>,
        #[command(flatten)]
        options: NetworkOptions,
        /// Stop authenticating with SASL.
        #[arg(long)]
        disable_sasl: bool,
        /// Stop identifying with NickServ.
        #[arg(long)]
        disable_nickserv: bool,
    },
    /// Remove a network and every channel bound to it.
    Destroy {
        name: String,
    },
    /// List networks.
    List {
        /// Only show networks whose name contains this text.
        search: Option<String>,
        /// Include passwords in the output.
        #[arg(long)]
        show_secrets: bool,
    },
}

#[derive(Clone, clap::Args)]
pub struct NetworkOptions {
    /// Server hostname or address.
    #[arg(short = 'H', long)]
    host: Option<String>,
    /// Server port (default 6697 with TLS, 6667 without).
    #[arg(short = 'P', long)]
    port: Option<u32>,
    /// Connect with TLS.
    #[arg(short, long)]
    secure: Option<bool>,
    /// Server password.
    #[arg(long)]
    server_password: Option<String>,
    /// Nickname.
    #[arg(short, long)]
    nick: Option<String>,
    #[arg(long)]
    sasl_username: Option<String>,
    #[arg(long)]
    sasl_password: Option<String>,
    #[arg(long)]
    nickserv_username: Option<String>,
    #[arg(long)]
    nickserv_password: Option<String>,
    /// Local address to connect from.
    #[arg(long)]
    bind: Option<String>,
    /// User modes to set after registering, e.g. `+iw`.
    #[arg(long)]
    modes: Option<String>,
}

impl NetworkOptions {
    fn into_params(self, name: Option<String>) -> NetworkParams {
        NetworkParams {
            name,
            host: self.host,
            port: self.port,
            secure: self.secure,
            server_password: self.server_password,
            nick: self.nick,
            sasl_username: self.sasl_username,
            sasl_password: self.sasl_password,
            nickserv_username: self.nickserv_username,
            nickserv_password: self.nickserv_password,
            bind: self.bind,
            modes: self.modes,
            ..Default::default()
        }
    }
}

pub fn handle_network(cli: &Cli, action: &NetworkAction) -> anyhow::Result<()> {
    let networks = NetworkManager::new(cli.open_store()?);

    match action {
        NetworkAction::Create { name, options } => {
            let network = networks.create(options.clone().into_params(Some(name.clone())))?;
            println!("Network {} created.", network.name);
        },
        NetworkAction::Update {
            name,
            rename,
            options,
            disable_sasl,
            disable_nickserv,
        } => {
            let params = NetworkParams {
                disable_sasl: *disable_sasl,
                disable_nickserv: *disable_nickserv,
                ..options.clone().into_params(rename.clone())
            };
            let network = networks.update(name, params)?;
            println!("Network {} updated.", network.name);
        },
        NetworkAction::Destroy { name } => {
            let network = networks.destroy(name)?;
            println!("Network {} destroyed.", network.name);
        },
        NetworkAction::List {
            search,
            show_secrets,
        } => {
            let found = networks.list(search.as_deref());
            if found.is_empty() {
                println!("No networks found.");
            }
            for network in &found {
                print!("{}", describe(network, *show_secrets));
            }
        },
    }
    Ok(())
}

fn describe(network: &Network, show_secrets: bool) -> String {
    let secret = |value: &Option<Secret<String>>| match value {
        Some(s) if show_secrets => s.expose_secret().clone(),
        Some(_) => "(hidden)".to_string(),
        None => "(none)".to_string(),
    };
    let default_port = if network.secure {
        DEFAULT_SECURE_PORT
    } else {
        DEFAULT_PORT
    };

    let mut out = format!("Network: {}\n", network.name);
    let port = match network.port {
        Some(port) => port.to_string(),
        None => format!("{default_port} (default)"),
    };
    out.push_str(&format!("  Address:  {}:{port}\n", network.host));
    out.push_str(&format!("  Secure:   {}\n", network.secure));
    out.push_str(&format!("  Nickname: {}\n", network.nick));
    out.push_str(&format!("  Password: {}\n", secret(&network.server_password)));
    if let Some(user) = &network.sasl_username {
        out.push_str(&format!(
            "  SASL:     {user} / {}\n",
            secret(&network.sasl_password)
        ));
    }
    if let Some(user) = &network.nickserv_username {
        out.push_str(&format!(
            "  NickServ: {user} / {}\n",
            secret(&network.nickserv_password)
        ));
    }
    if let Some(bind) = &network.bind {
        out.push_str(&format!("  Bind:     {bind}\n"));
    }
    if let Some(modes) = &network.modes {
        out.push_str(&format!("  Modes:    +{modes}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_hidden_by_default() {
        let network = Network::new(NetworkParams {
            name: Some("freenode".into()),
            host: Some("irc.example.org".into()),
            nick: Some("hookbot".into()),
            secure: Some(true),
            server_password: Some("hunter2".into()),
            ..Default::default()
        })
        .unwrap();

        let hidden = describe(&network, false);
        assert!(hidden.contains("irc.example.org:6697 (default)"));
        assert!(hidden.contains("(hidden)"));
        assert!(!hidden.contains("hunter2"));
        assert!(describe(&network, true).contains("hunter2"));
    }
}
