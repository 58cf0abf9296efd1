//! Protocol state for one IRC session, independent of the socket.
//!
//! Every method returns the raw lines to write in response, so the
//! registration and join logic can be exercised without a server.
use std::collections::HashSet;

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    secrecy::ExposeSecret,
    tracing::{debug, info, warn},
};

use hookbot_config::{Channel, Network};

use crate::proto::{self, Line};

/// Username sent in `USER`.
pub const USERNAME: &str = "hookbot";

/// Real name sent in `USER`.
pub const REALNAME: &str = "hookbot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sasl {
    Off,
    Requested,
    Authenticating,
    Done,
}

#[derive(Debug)]
pub struct State {
    network: Network,
    channels: Vec<Channel>,
    nick: String,
    joined: HashSet<String>,
    registered: bool,
    ready: bool,
    sasl: Sasl,
}

impl State {
    pub fn new(network: Network, channels: Vec<Channel>) -> Self {
        let nick = network.nick.clone();
        Self {
            network,
            channels,
            nick,
            joined: HashSet::new(),
            registered: false,
            ready: false,
            sasl: Sasl::Off,
        }
    }

    pub fn network(&self) -> &str {
        &self.network.name
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Registered with the server (`001` received).
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Able to deliver messages.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn has_joined(&self, channel: &str) -> bool {
        self.joined.contains(&proto::fold(channel))
    }

    /// Lines opening the session.
    pub fn greeting(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(pass) = &self.network.server_password {
            out.push(format!("PASS {}", pass.expose_secret()));
        }
        if self.network.sasl().is_some() {
            self.sasl = Sasl::Requested;
            out.push("CAP REQ :sasl".to_string());
        }
        out.push(format!("NICK {}", self.nick));
        out.push(format!("USER {USERNAME} 0 * :{REALNAME}"));
        out
    }

    /// React to one inbound line.
    pub fn handle(&mut self, line: &Line) -> Vec<String> {
        match line.command.as_str() {
            "PING" => vec![format!("PONG :{}", line.param(0).unwrap_or_default())],
            "CAP" => self.on_cap(line),
            "AUTHENTICATE" => self.on_authenticate(line),
            "903" => {
                info!(network = %self.network.name, "SASL authentication succeeded");
                self.finish_sasl()
            },
            "902" | "904" | "905" | "906" | "908" => {
                warn!(
                    network = %self.network.name,
                    code = %line.command,
                    "SASL authentication failed, continuing without it"
                );
                self.finish_sasl()
            },
            "001" => self.on_welcome(line),
            "433" if !self.registered => {
                self.nick.push('_');
                debug!(network = %self.network.name, nick = %self.nick, "nickname in use, retrying");
                vec![format!("NICK {}", self.nick)]
            },
            "NICK" if self.is_self(line) => {
                if let Some(nick) = line.param(0) {
                    self.nick = nick.to_string();
                }
                Vec::new()
            },
            "JOIN" if self.is_self(line) => {
                if let Some(channel) = line.param(0) {
                    debug!(network = %self.network.name, channel, "joined");
                    self.joined.insert(proto::fold(channel));
                    self.ready = true;
                }
                Vec::new()
            },
            "PART" if self.is_self(line) => {
                if let Some(channel) = line.param(0) {
                    self.joined.remove(&proto::fold(channel));
                }
                Vec::new()
            },
            "KICK" => {
                if let (Some(channel), Some(target)) = (line.param(0), line.param(1))
                    && proto::fold(target) == proto::fold(&self.nick)
                {
                    warn!(network = %self.network.name, channel, "kicked from channel");
                    self.joined.remove(&proto::fold(channel));
                }
                Vec::new()
            },
            "403" | "405" | "471" | "473" | "474" | "475" => {
                warn!(
                    network = %self.network.name,
                    code = %line.command,
                    channel = line.param(1).unwrap_or_default(),
                    reason = line.params.last().map(String::as_str).unwrap_or_default(),
                    "cannot join channel"
                );
                if let Some(channel) = line.param(1) {
                    self.joined.remove(&proto::fold(channel));
                }
                self.ready = self.registered;
                Vec::new()
            },
            _ => Vec::new(),
        }
    }

    /// Lines delivering `text` to `channel`, joining it first when needed.
    pub fn deliver(&mut self, channel: &Channel, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        if !channel.send_external && !self.has_joined(&channel.name) {
            out.push(proto::join(&channel.join_target()));
            self.joined.insert(proto::fold(&channel.name));
        }
        out.extend(proto::privmsg(&channel.name, text));
        out
    }

    fn is_self(&self, line: &Line) -> bool {
        line.nick()
            .is_some_and(|nick| proto::fold(nick) == proto::fold(&self.nick))
    }

    fn on_cap(&mut self, line: &Line) -> Vec<String> {
        let caps = line.params.last().map(String::as_str).unwrap_or_default();
        let has_sasl = caps.split_whitespace().any(|c| c.eq_ignore_ascii_case("sasl"));
        match (line.param(1), self.sasl) {
            (Some("ACK"), Sasl::Requested) if has_sasl => {
                self.sasl = Sasl::Authenticating;
                vec!["AUTHENTICATE PLAIN".to_string()]
            },
            (Some("NAK"), Sasl::Requested) => {
                warn!(network = %self.network.name, "server does not support SASL");
                self.finish_sasl()
            },
            _ => Vec::new(),
        }
    }

    fn on_authenticate(&mut self, line: &Line) -> Vec<String> {
        if self.sasl != Sasl::Authenticating || line.param(0) != Some("+") {
            return Vec::new();
        }
        match self.network.sasl() {
            Some((user, pass)) => {
                let token = STANDARD.encode(format!("{user}\0{user}\0{pass}"));
                vec![format!("AUTHENTICATE {token}")]
            },
            None => vec!["AUTHENTICATE *".to_string()],
        }
    }

    fn finish_sasl(&mut self) -> Vec<String> {
        if self.sasl == Sasl::Done || self.sasl == Sasl::Off {
            return Vec::new();
        }
        self.sasl = Sasl::Done;
        vec!["CAP END".to_string()]
    }

    fn on_welcome(&mut self, line: &Line) -> Vec<String> {
        self.registered = true;
        if let Some(nick) = line.param(0) {
            self.nick = nick.to_string();
        }
        info!(network = %self.network.name, nick = %self.nick, "registered");

        let mut out = Vec::new();
        if let Some((user, pass)) = self.network.nickserv() {
            out.extend(proto::privmsg("NickServ", &format!("IDENTIFY {user} {pass}")));
        }
        if let Some(modes) = self.network.modes.as_deref()
            && !modes.is_empty()
        {
            out.push(format!("MODE {} +{modes}", self.nick));
        }
        for channel in &self.channels {
            out.push(proto::join(&channel.join_target()));
        }
        if self.channels.is_empty() {
            self.ready = true;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        hookbot_config::{ChannelParams, NetworkParams},
    };

    fn network(params: NetworkParams) -> Network {
        Network::new(NetworkParams {
            name: Some("freenode".into()),
            host: Some("irc.example.org".into()),
            nick: Some("hookbot".into()),
            ..params
        })
        .unwrap()
    }

    fn channel(id: &str) -> Channel {
        Channel::new(ChannelParams::new(id)).unwrap()
    }

    fn feed(state: &mut State, raw: &str) -> Vec<String> {
        state.handle(&Line::parse(raw).unwrap())
    }

    #[test]
    fn plain_registration_joins_and_becomes_ready() {
        let mut state = State::new(
            network(NetworkParams {
                server_password: Some("pw".into()),
                modes: Some("+iw".into()),
                ..Default::default()
            }),
            vec![channel("freenode/#hookbot")],
        );
        assert_eq!(state.greeting(), [
            "PASS pw",
            "NICK hookbot",
            "USER hookbot 0 * :hookbot"
        ]);

        let out = feed(&mut state, ":srv 001 hookbot :Welcome");
        assert_eq!(out, ["MODE hookbot +iw", "JOIN #hookbot"]);
        assert!(state.is_registered());
        assert!(!state.is_ready());

        feed(&mut state, ":hookbot!u@h JOIN #hookbot");
        assert!(state.is_ready());
        assert!(state.has_joined("#HOOKBOT"));
    }

    #[test]
    fn ready_on_welcome_without_channels() {
        let mut state = State::new(network(NetworkParams::default()), Vec::new());
        state.greeting();
        feed(&mut state, ":srv 001 hookbot :Welcome");
        assert!(state.is_ready());
    }

    #[test]
    fn sasl_plain_exchange() {
        let mut state = State::new(
            network(NetworkParams {
                sasl_username: Some("bot".into()),
                sasl_password: Some("secret".into()),
                ..Default::default()
            }),
            Vec::new(),
        );
        assert_eq!(state.greeting()[0], "CAP REQ :sasl");
        assert_eq!(feed(&mut state, ":srv CAP * ACK :sasl"), ["AUTHENTICATE PLAIN"]);
        let out = feed(&mut state, "AUTHENTICATE +");
        assert_eq!(out, [format!(
            "AUTHENTICATE {}",
            STANDARD.encode("bot\0bot\0secret")
        )]);
        assert_eq!(feed(&mut state, ":srv 903 bot :SASL successful"), ["CAP END"]);
        assert!(feed(&mut state, ":srv 904 bot :late failure").is_empty());
    }

    #[test]
    fn nickserv_identify_after_welcome() {
        let mut state = State::new(
            network(NetworkParams {
                nickserv_username: Some("bot".into()),
                nickserv_password: Some("pw".into()),
                ..Default::default()
            }),
            Vec::new(),
        );
        let out = feed(&mut state, ":srv 001 hookbot :Welcome");
        assert_eq!(out, ["PRIVMSG NickServ :IDENTIFY bot pw"]);
    }

    #[test]
    fn nick_collision_appends_underscore() {
        let mut state = State::new(network(NetworkParams::default()), Vec::new());
        assert_eq!(feed(&mut state, ":srv 433 * hookbot :in use"), ["NICK hookbot_"]);
        feed(&mut state, ":srv 001 hookbot_ :Welcome");
        assert_eq!(state.nick(), "hookbot_");
    }

    #[test]
    fn ping_is_answered() {
        let mut state = State::new(network(NetworkParams::default()), Vec::new());
        assert_eq!(feed(&mut state, "PING :abc"), ["PONG :abc"]);
    }

    #[test]
    fn delivery_joins_lazily_unless_external() {
        let mut state = State::new(network(NetworkParams::default()), Vec::new());
        let keyed = Channel::new(ChannelParams {
            identifier: "freenode/#keyed".into(),
            key: Some("k".into()),
            send_external: None,
        })
        .unwrap();
        assert_eq!(state.deliver(&keyed, "hi"), ["JOIN #keyed k", "PRIVMSG #keyed :hi"]);
        assert_eq!(state.deliver(&keyed, "again"), ["PRIVMSG #keyed :again"]);

        let external = Channel::new(ChannelParams {
            identifier: "freenode/#ext".into(),
            key: None,
            send_external: Some(true),
        })
        .unwrap();
        assert_eq!(state.deliver(&external, "hi"), ["PRIVMSG #ext :hi"]);
    }

    #[test]
    fn kick_forgets_channel() {
        let mut state = State::new(network(NetworkParams::default()), Vec::new());
        feed(&mut state, ":hookbot!u@h JOIN #chan");
        feed(&mut state, ":op!u@h KICK #chan hookbot :bye");
        assert!(!state.has_joined("#chan"));
    }
}
