//! Line-oriented control commands over a named pipe.
//!
//! The running bot owns the pipe and reads one command per line; other
//! processes (`hookbot core rehash`, `hookbot core stop`) write to it through
//! [`ControlClient`]. Writes are fire-and-forget.
use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Weak,
    thread,
    time::Duration,
};

use {
    crossbeam::channel,
    tracing::{debug, error, info, warn},
};

use crate::{
    error::{Context, Error, Result},
    thread::{StopSignal, ThreadController},
};

/// How long a client waits for the bot to accept a command.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Reload the configuration file.
    Rehash,
    /// Shut the bot down.
    Stop,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rehash => "REHASH",
            Self::Stop => "STOP",
        }
    }

    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "REHASH" => Some(Self::Rehash),
            "STOP" => Some(Self::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives commands read from the pipe.
pub trait ControlHandler: Send + Sync {
    /// Reload configuration. Errors are logged by the caller.
    fn rehash(&self) -> Result<()>;

    /// Begin shutting down. Must return without waiting for shutdown to
    /// finish, since shutdown stops the channel that is calling this.
    fn shutdown(&self);
}

/// Server side of the control pipe.
pub struct ControlChannel {
    pipe: PathBuf,
    handler: Weak<dyn ControlHandler>,
    thread: ThreadController,
}

impl ControlChannel {
    pub fn new(pipe: impl Into<PathBuf>, handler: Weak<dyn ControlHandler>) -> Self {
        Self {
            pipe: pipe.into(),
            handler,
            thread: ThreadController::new("control"),
        }
    }

    pub fn pipe(&self) -> &Path {
        &self.pipe
    }

    /// Create the pipe and start reading commands.
    ///
    /// The pipe is created (and opened) on the calling thread so setup
    /// failures are reported here.
    pub fn start(&self) -> Result<()> {
        if self.thread.is_running() {
            return Ok(());
        }

        prepare_pipe(&self.pipe)?;
        // Opening read-write keeps a writer attached, so the reader never
        // sees EOF between clients.
        let file = OpenOptions::new().read(true).write(true).open(&self.pipe)?;
        let guard = PipeGuard(self.pipe.clone());
        let handler = self.handler.clone();

        self.thread.start(move |stop| {
            let _guard = guard;
            read_commands(file, &handler, &stop);
        })?;
        info!(pipe = %self.pipe.display(), "control channel listening");
        Ok(())
    }

    /// Ask the reader to stop and wake it with an empty line.
    pub fn stop(&self) {
        self.thread.stop();
        if let Err(e) = wake(&self.pipe) {
            debug!(pipe = %self.pipe.display(), error = %e, "could not wake control reader");
        }
    }

    pub fn join(&self) {
        self.thread.join();
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_running()
    }

    /// See [`ThreadController::exited`].
    pub fn exited(&self) -> channel::Receiver<()> {
        self.thread.exited()
    }
}

impl fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlChannel")
            .field("pipe", &self.pipe)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Removes the pipe when the reader exits.
struct PipeGuard(PathBuf);

impl Drop for PipeGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.0) {
            Ok(()) => debug!(pipe = %self.0.display(), "removed control pipe"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => warn!(pipe = %self.0.display(), error = %e, "failed to remove control pipe"),
        }
    }
}

fn read_commands(file: File, handler: &Weak<dyn ControlHandler>, stop: &StopSignal) {
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {},
            Err(e) => {
                error!(error = %e, "failed to read control pipe");
                break;
            },
        }
        if stop.is_stopped() {
            break;
        }
        handle_line(line.trim(), handler);
    }
}

fn handle_line(line: &str, handler: &Weak<dyn ControlHandler>) {
    if line.is_empty() {
        return;
    }
    let Some(command) = ControlCommand::parse(line) else {
        warn!(command = %line, "ignoring unknown control command");
        return;
    };
    let Some(handler) = handler.upgrade() else {
        warn!(%command, "control handler is gone, ignoring command");
        return;
    };

    info!(%command, "received control command");
    match command {
        ControlCommand::Rehash => {
            if let Err(e) = handler.rehash() {
                error!(error = %e, "rehash failed, keeping current configuration");
            }
        },
        ControlCommand::Stop => handler.shutdown(),
    }
}

/// Make sure `path` is a FIFO, replacing any other kind of file.
fn prepare_pipe(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    match fs::symlink_metadata(path) {
        Ok(meta) if is_fifo(&meta) => return Ok(()),
        Ok(_) => {
            warn!(pipe = %path.display(), "replacing non-pipe file with control pipe");
            fs::remove_file(path)?;
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {},
        Err(e) => return Err(e),
    }
    mkfifo(path)
}

#[cfg(unix)]
fn is_fifo(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_fifo()
}

#[cfg(unix)]
fn mkfifo(path: &Path) -> io::Result<()> {
    use nix::{sys::stat::Mode, unistd};
    unistd::mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR)?;
    Ok(())
}

#[cfg(unix)]
fn wake(path: &Path) -> io::Result<()> {
    use {nix::fcntl::OFlag, std::os::unix::fs::OpenOptionsExt};
    let mut file = OpenOptions::new()
        .write(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)?;
    file.write_all(b"\n")
}

#[cfg(not(unix))]
fn is_fifo(_meta: &fs::Metadata) -> bool {
    false
}

#[cfg(not(unix))]
fn mkfifo(_path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "named pipes are only supported on unix",
    ))
}

#[cfg(not(unix))]
fn wake(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Client side of the control pipe.
#[derive(Debug, Clone)]
pub struct ControlClient {
    pipe: PathBuf,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(pipe: impl Into<PathBuf>) -> Self {
        Self {
            pipe: pipe.into(),
            timeout: CLIENT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pipe(&self) -> &Path {
        &self.pipe
    }

    /// Whether something exists at the pipe path.
    pub fn pipe_exists(&self) -> bool {
        fs::symlink_metadata(&self.pipe).is_ok()
    }

    pub fn send_rehash(&self) -> Result<()> {
        self.send(ControlCommand::Rehash)
    }

    pub fn send_stop(&self) -> Result<()> {
        self.send(ControlCommand::Stop)
    }

    /// Write `command` to the pipe, giving up after the client timeout.
    pub fn send(&self, command: ControlCommand) -> Result<()> {
        if !self.pipe_exists() {
            return Err(Error::communication(format!(
                "pipe {} does not exist",
                self.pipe.display()
            )));
        }

        // Opening a FIFO for writing blocks until a reader is attached, so
        // the write runs on its own thread under a deadline.
        let (tx, rx) = channel::bounded(1);
        let pipe = self.pipe.clone();
        let line = format!("{command}\n");
        thread::Builder::new()
            .name("control-client".into())
            .spawn(move || {
                let written = OpenOptions::new()
                    .write(true)
                    .open(&pipe)
                    .and_then(|mut file| file.write_all(line.as_bytes()));
                let _ = tx.send(written);
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(())) => {
                debug!(%command, pipe = %self.pipe.display(), "sent control command");
                Ok(())
            },
            Ok(written) => {
                written.with_context(|| format!("writing to {}", self.pipe.display()))
            },
            Err(_) => Err(Error::communication(format!(
                "timed out after {}s writing to {}",
                self.timeout.as_secs(),
                self.pipe.display()
            ))),
        }
    }
}
