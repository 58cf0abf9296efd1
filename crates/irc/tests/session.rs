//! Drives a real session against a scripted server on localhost.

use std::{
    io::{BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    thread,
    time::Duration,
};

use {
    hookbot_config::{Channel, ChannelParams, Network, NetworkParams},
    hookbot_irc::IrcConnector,
    hookbot_relay::{LinkConnector, LinkSpec, link::ready_pair},
};

struct Server {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Server {
    fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn expect(&mut self, prefix: &str) -> String {
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).unwrap();
            assert!(n > 0, "client hung up while waiting for {prefix:?}");
            let line = line.trim_end().to_string();
            if line.starts_with(prefix) {
                return line;
            }
        }
    }

    fn say(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).unwrap();
        self.writer.write_all(b"\r\n").unwrap();
    }
}

fn local_network(port: u16) -> Network {
    Network::new(NetworkParams {
        name: Some("local".into()),
        host: Some("127.0.0.1".into()),
        port: Some(u32::from(port)),
        secure: Some(false),
        nick: Some("hookbot".into()),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn registers_joins_delivers_and_quits() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let mut srv = Server::accept(&listener);
        srv.expect("NICK hookbot");
        srv.expect("USER ");
        srv.say("PING :warmup");
        assert_eq!(srv.expect("PONG"), "PONG :warmup");
        srv.say(":irc.local 001 hookbot :Welcome");
        srv.expect("JOIN #hookbot");
        srv.say(":hookbot!bot@localhost JOIN #hookbot");

        let first = srv.expect("PRIVMSG");
        let second = srv.expect("PRIVMSG");
        let quit = srv.expect("QUIT");
        (first, second, quit)
    });

    let channel = Channel::new(ChannelParams::new("local/#hookbot")).unwrap();
    let (ready, ready_rx) = ready_pair();
    let mut link = IrcConnector
        .connect(
            LinkSpec {
                network: local_network(port),
                channels: vec![channel.clone()],
            },
            ready,
        )
        .unwrap();

    ready_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    link.send(&channel, "[hookbot] pushed 1 commit").unwrap();
    link.send(&channel, "second line").unwrap();
    link.disconnect();

    let (first, second, quit) = server.join().unwrap();
    assert_eq!(first, "PRIVMSG #hookbot :[hookbot] pushed 1 commit");
    assert_eq!(second, "PRIVMSG #hookbot :second line");
    assert!(quit.starts_with("QUIT :"));
}

#[test]
fn ready_is_dropped_when_server_hangs_up() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let mut srv = Server::accept(&listener);
        srv.expect("NICK");
        srv.say("ERROR :Closing link (banned)");
    });

    let (ready, ready_rx) = ready_pair();
    let mut link = IrcConnector
        .connect(
            LinkSpec {
                network: local_network(port),
                channels: Vec::new(),
            },
            ready,
        )
        .unwrap();

    assert!(ready_rx.recv_timeout(Duration::from_secs(5)).is_err());
    server.join().unwrap();
    link.disconnect();
}

#[test]
fn refused_connection_is_a_link_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let (ready, _rx) = ready_pair();
    let err = IrcConnector
        .connect(
            LinkSpec {
                network: local_network(port),
                channels: Vec::new(),
            },
            ready,
        )
        .err()
        .unwrap();
    assert!(matches!(err, hookbot_relay::Error::Link(_)));
}
