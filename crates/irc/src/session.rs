//! The per-network I/O thread: owns the socket, answers the server and
//! writes queued messages once registered.
use std::{
    collections::VecDeque,
    io::{self, Read, Write},
};

use {
    crossbeam::channel::{Receiver, TryRecvError},
    tracing::{debug, error, info, warn},
};

use {hookbot_config::Channel, hookbot_relay::ReadySignal};

use crate::{
    proto::{self, Line},
    state::State,
    transport::Stream,
};

/// Reason given when leaving the server.
pub const QUIT_MESSAGE: &str = "hookbot shutting down";

/// Work handed to the session thread.
#[derive(Debug)]
pub enum Outgoing {
    Privmsg { channel: Channel, text: String },
    Quit,
}

enum Received {
    Line(String),
    Idle,
    Closed,
}

/// Longest line accepted from a server, terminator included.
const MAX_LINE: usize = 8 * 1024;

/// Accumulates bytes until a full line is available.
#[derive(Default)]
struct LineReader {
    buf: Vec<u8>,
}

impl LineReader {
    fn next(&mut self, stream: &mut impl Read) -> io::Result<Received> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                return Ok(Received::Line(line.trim_end_matches(['\r', '\n']).to_string()));
            }

            let mut chunk = [0u8; 4096];
            match stream.read(&mut chunk) {
                Ok(0) => return Ok(Received::Closed),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    if self.buf.len() > MAX_LINE && !self.buf.contains(&b'\n') {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("server sent more than {MAX_LINE} bytes without a line break"),
                        ));
                    }
                },
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Ok(Received::Idle);
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e),
            }
        }
    }
}

fn write_lines(stream: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        debug!(line = %redact(line), "->");
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\r\n")?;
    }
    stream.flush()
}

/// Hide credentials from logs.
fn redact(line: &str) -> &str {
    let sensitive = ["PASS ", "AUTHENTICATE ", "PRIVMSG NickServ :IDENTIFY"];
    if sensitive.iter().any(|p| line.starts_with(p)) && line != "AUTHENTICATE PLAIN" {
        "[REDACTED]"
    } else {
        line
    }
}

/// Run the session until the server hangs up, an I/O error occurs or a
/// [`Outgoing::Quit`] arrives. Dropping `ready` on return tells a waiting
/// connection that the link is gone.
pub fn run(mut stream: Stream, mut state: State, outbound: &Receiver<Outgoing>, ready: ReadySignal) {
    let network = state.network().to_string();
    if let Err(e) = write_lines(&mut stream, &state.greeting()) {
        error!(network = %network, error = %e, "failed to send registration");
        stream.shutdown();
        return;
    }

    let mut reader = LineReader::default();
    let mut pending: VecDeque<(Channel, String)> = VecDeque::new();

    let outcome: io::Result<()> = 'session: loop {
        loop {
            match outbound.try_recv() {
                Ok(Outgoing::Privmsg { channel, text }) => pending.push_back((channel, text)),
                Ok(Outgoing::Quit) | Err(TryRecvError::Disconnected) => {
                    let _ = write_lines(&mut stream, &[proto::quit(QUIT_MESSAGE)]);
                    break 'session Ok(());
                },
                Err(TryRecvError::Empty) => break,
            }
        }

        if state.is_registered() {
            while let Some((channel, text)) = pending.pop_front() {
                let lines = state.deliver(&channel, &text);
                if let Err(e) = write_lines(&mut stream, &lines) {
                    break 'session Err(e);
                }
            }
        }

        match reader.next(&mut stream) {
            Ok(Received::Line(raw)) => {
                let Some(line) = Line::parse(&raw) else {
                    continue;
                };
                if line.command == "ERROR" {
                    warn!(
                        network = %network,
                        reason = line.params.last().map(String::as_str).unwrap_or_default(),
                        "server closed the session"
                    );
                    break 'session Ok(());
                }
                let reply = state.handle(&line);
                if let Err(e) = write_lines(&mut stream, &reply) {
                    break 'session Err(e);
                }
                if state.is_ready() {
                    ready.signal();
                }
            },
            Ok(Received::Idle) => {},
            Ok(Received::Closed) => {
                warn!(network = %network, "server hung up");
                break 'session Ok(());
            },
            Err(e) => break 'session Err(e),
        }
    };

    if let Err(e) = outcome {
        error!(network = %network, error = %e, "session failed");
    }
    if !pending.is_empty() {
        warn!(network = %network, dropped = pending.len(), "discarding undelivered messages");
    }
    stream.shutdown();
    info!(network = %network, "disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chunks(VecDeque<io::Result<Vec<u8>>>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                },
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn reader_joins_partial_lines() {
        let mut src = Chunks(VecDeque::from([
            Ok(b"PING :a".to_vec()),
            Err(io::Error::from(io::ErrorKind::WouldBlock)),
            Ok(b"bc\r\n:srv 001 bot :hi\r\n".to_vec()),
        ]));
        let mut reader = LineReader::default();
        assert!(matches!(reader.next(&mut src).unwrap(), Received::Idle));
        assert!(matches!(reader.next(&mut src).unwrap(), Received::Line(l) if l == "PING :abc"));
        assert!(matches!(reader.next(&mut src).unwrap(), Received::Line(l) if l == ":srv 001 bot :hi"));
        assert!(matches!(reader.next(&mut src).unwrap(), Received::Closed));
    }

    #[test]
    fn reader_rejects_unterminated_flood() {
        let mut src = Chunks((0..3).map(|_| Ok(vec![b'x'; 4096])).collect());
        let mut reader = LineReader::default();
        let err = reader.next(&mut src).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(reader.buf.len() <= MAX_LINE + 4096);
    }

    #[test]
    fn credentials_are_redacted() {
        assert_eq!(redact("PASS hunter2"), "[REDACTED]");
        assert_eq!(redact("AUTHENTICATE Ym90AGJvdA=="), "[REDACTED]");
        assert_eq!(redact("AUTHENTICATE PLAIN"), "AUTHENTICATE PLAIN");
        assert_eq!(redact("PRIVMSG #chan :hi"), "PRIVMSG #chan :hi");
    }
}
