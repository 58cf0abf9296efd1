//! Blocking TCP and TLS sockets to an IRC server.
use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use {
    anyhow::{Context, bail},
    rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned, pki_types::ServerName},
    tracing::{debug, warn},
};

use hookbot_config::Network;

/// Upper bound on establishing the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a read blocks before the session checks for outbound work.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Upper bound on a single write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub enum Stream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Stream {
    /// Connect to `network`, wrapping the socket in TLS when it is secure.
    pub fn open(network: &Network) -> anyhow::Result<Self> {
        let port = network.real_port();
        let tcp = connect_tcp(&network.host, port, network.bind.as_deref())
            .with_context(|| format!("connecting to {}:{port}", network.host))?;
        tcp.set_read_timeout(Some(POLL_INTERVAL))?;
        tcp.set_write_timeout(Some(WRITE_TIMEOUT))?;
        tcp.set_nodelay(true)?;

        if !network.secure {
            return Ok(Self::Plain(tcp));
        }

        let server_name = ServerName::try_from(network.host.clone())
            .with_context(|| format!("invalid TLS server name {:?}", network.host))?;
        let conn = ClientConnection::new(tls_config()?, server_name)
            .context("starting TLS session")?;
        Ok(Self::Tls(Box::new(StreamOwned::new(conn, tcp))))
    }

    /// Close the connection, sending a TLS close notification first when
    /// applicable.
    pub fn shutdown(&mut self) {
        let tcp = match self {
            Self::Plain(tcp) => &*tcp,
            Self::Tls(tls) => {
                tls.conn.send_close_notify();
                let _ = tls.flush();
                &tls.sock
            },
        };
        if let Err(e) = tcp.shutdown(Shutdown::Both)
            && e.kind() != io::ErrorKind::NotConnected
        {
            debug!(error = %e, "socket shutdown failed");
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
        }
    }
}

fn tls_config() -> anyhow::Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!(error = %e, "failed to load a system certificate");
    }
    for cert in native.certs {
        let _ = roots.add(cert);
    }
    if roots.is_empty() {
        bail!("no trusted root certificates found");
    }

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .context("configuring TLS")?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(Arc::new(config))
}

fn connect_tcp(host: &str, port: u16, bind: Option<&str>) -> anyhow::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}"))?
        .collect();
    if addrs.is_empty() {
        bail!("{host} did not resolve to any address");
    }

    let mut last_error = None;
    for addr in addrs {
        let attempt = match bind {
            Some(local) => connect_bound(local, addr),
            None => TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT),
        };
        match attempt {
            Ok(stream) => {
                debug!(%addr, "connected");
                return Ok(stream);
            },
            Err(e) => {
                debug!(%addr, error = %e, "connection attempt failed");
                last_error = Some(e);
            },
        }
    }
    match last_error {
        Some(e) => Err(e.into()),
        None => bail!("no usable address for {host}"),
    }
}

/// Connect from a specific local address.
#[cfg(unix)]
fn connect_bound(local: &str, remote: SocketAddr) -> io::Result<TcpStream> {
    use {
        nix::sys::socket::{
            AddressFamily, SockFlag, SockType, SockaddrStorage, bind, connect, socket,
        },
        std::os::fd::AsRawFd,
    };

    let local = (local, 0)
        .to_socket_addrs()?
        .find(|a| a.is_ipv4() == remote.is_ipv4())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("bind address {local} has no {} address", family_name(remote)),
            )
        })?;
    let family = if remote.is_ipv4() {
        AddressFamily::Inet
    } else {
        AddressFamily::Inet6
    };

    let fd = socket(family, SockType::Stream, SockFlag::empty(), None)?;
    bind(fd.as_raw_fd(), &SockaddrStorage::from(local))?;
    connect(fd.as_raw_fd(), &SockaddrStorage::from(remote))?;
    Ok(TcpStream::from(fd))
}

#[cfg(not(unix))]
fn connect_bound(local: &str, remote: SocketAddr) -> io::Result<TcpStream> {
    warn!(bind = local, "binding to a local address is not supported on this platform");
    TcpStream::connect_timeout(&remote, CONNECT_TIMEOUT)
}

#[cfg(unix)]
fn family_name(addr: SocketAddr) -> &'static str {
    if addr.is_ipv4() { "IPv4" } else { "IPv6" }
}
