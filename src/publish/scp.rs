//! Minimal SCP source: pushes single files to a remote `scp -t` sink.
//!
//! One authenticated SSH session is reused for the whole batch; each file gets
//! its own exec channel running `cd <dir>; scp -p -t <name>`. On that channel
//! the transfer walks a fixed state machine:
//!
//! ```text
//! AwaitReady ─ack─▶ SendTimestamp ─▶ AwaitTimestampAck ─ack─▶ SendHeader
//!     ─▶ AwaitHeaderAck ─ack─▶ SendBody ─▶ AwaitFinalAck ─ack─▶ Done
//! ```
//!
//! with `T <mtime> 0 <mtime> 0\n`, `C0644 <size> <name>\n`, then the file
//! bytes and one NUL. Any fatal acknowledgement or I/O error moves the
//! transfer to `Aborted`; the batch then continues with the next file.
//!
//! ## Acknowledgements
//!
//! | Byte | Meaning |
//! |---|---|
//! | `0` | ok |
//! | `1` | warning, a newline-terminated message follows; the transfer continues |
//! | `2` | fatal, a newline-terminated message follows; the transfer aborts |
//! | other / end of stream | fatal |

use super::{PublishError, Recorder};
use crate::config::{SshAuth, SshTarget};
use crate::manifest::Manifest;
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ScpError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Remote sink reported a fatal error: {0}")]
    Fatal(String),
    #[error("Unexpected acknowledgement byte {0:#04x}")]
    Protocol(u8),
    #[error("Remote sink closed the stream")]
    UnexpectedEof,
}

/// A non-fatal acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Ok,
    Warning(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    AwaitReady,
    SendTimestamp,
    AwaitTimestampAck,
    SendHeader,
    AwaitHeaderAck,
    SendBody,
    AwaitFinalAck,
    Done,
    Aborted,
}

/// Read one acknowledgement from the sink.
pub fn read_ack<R: Read>(reader: &mut R) -> Result<Ack, ScpError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ScpError::UnexpectedEof,
        _ => ScpError::Io(e),
    })?;
    match byte[0] {
        0 => Ok(Ack::Ok),
        1 => Ok(Ack::Warning(read_message(reader)?)),
        2 => Err(ScpError::Fatal(read_message(reader)?)),
        other => Err(ScpError::Protocol(other)),
    }
}

/// Diagnostic text up to the next newline or end of stream.
fn read_message<R: Read>(reader: &mut R) -> Result<String, ScpError> {
    let mut message = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte)? {
            0 => break,
            _ if byte[0] == b'\n' => break,
            _ => message.push(byte[0]),
        }
    }
    Ok(String::from_utf8_lossy(&message).into_owned())
}

/// One file's walk through the protocol.
pub struct Transfer<'a, S: Read + Write> {
    stream: &'a mut S,
    name: &'a str,
    mtime: u64,
    size: u64,
    state: TransferState,
}

impl<'a, S: Read + Write> Transfer<'a, S> {
    pub fn new(stream: &'a mut S, name: &'a str, mtime: u64, size: u64) -> Self {
        Self {
            stream,
            name,
            mtime,
            size,
            state: TransferState::AwaitReady,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    fn expect_ack(&mut self) -> Result<(), ScpError> {
        if let Ack::Warning(message) = read_ack(&mut *self.stream)? {
            warn!(file = self.name, state = ?self.state, message = %message, "scp sink warning");
        }
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> Result<(), ScpError> {
        debug!(file = self.name, command = line.trim_end(), "scp send");
        self.stream.write_all(line.as_bytes())?;
        self.stream.flush()?;
        Ok(())
    }

    /// Advance one state. `body` is consumed in `SendBody`.
    fn step<R: Read>(&mut self, body: &mut R) -> Result<TransferState, ScpError> {
        let next = match self.state {
            TransferState::AwaitReady => {
                self.expect_ack()?;
                TransferState::SendTimestamp
            }
            TransferState::SendTimestamp => {
                let line = format!("T {0} 0 {0} 0\n", self.mtime);
                self.send_line(&line)?;
                TransferState::AwaitTimestampAck
            }
            TransferState::AwaitTimestampAck => {
                self.expect_ack()?;
                TransferState::SendHeader
            }
            TransferState::SendHeader => {
                let line = format!("C0644 {} {}\n", self.size, self.name);
                self.send_line(&line)?;
                TransferState::AwaitHeaderAck
            }
            TransferState::AwaitHeaderAck => {
                self.expect_ack()?;
                TransferState::SendBody
            }
            TransferState::SendBody => {
                let sent = io::copy(&mut body.take(self.size), &mut *self.stream)?;
                if sent != self.size {
                    return Err(ScpError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} shrank to {sent} of {} bytes", self.name, self.size),
                    )));
                }
                self.stream.write_all(&[0])?;
                self.stream.flush()?;
                TransferState::AwaitFinalAck
            }
            TransferState::AwaitFinalAck => {
                self.expect_ack()?;
                TransferState::Done
            }
            TransferState::Done | TransferState::Aborted => self.state,
        };
        Ok(next)
    }

    /// Run the protocol to `Done`, or to `Aborted` on the first error.
    pub fn run<R: Read>(&mut self, body: &mut R) -> Result<(), ScpError> {
        while !matches!(self.state, TransferState::Done | TransferState::Aborted) {
            match self.step(body) {
                Ok(next) => self.state = next,
                Err(e) => {
                    warn!(file = self.name, state = ?self.state, error = %e, "scp transfer aborted");
                    self.state = TransferState::Aborted;
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Duplex byte stream to one remote `scp -t` process.
pub trait SinkChannel: Read + Write {
    /// Signal end of input and wait for the remote side to close.
    fn finish(&mut self) -> io::Result<()>;
}

/// Something that can start remote commands, i.e. an authenticated session.
pub trait RemoteShell {
    type Channel: SinkChannel;

    fn open_sink(&mut self, command: &str) -> Result<Self::Channel, ScpError>;
}

/// Quote for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub fn sink_command(target_dir: &str, file_name: &str) -> String {
    if target_dir.is_empty() {
        format!("scp -p -t {}", shell_quote(file_name))
    } else {
        format!(
            "cd {}; scp -p -t {}",
            shell_quote(target_dir),
            shell_quote(file_name)
        )
    }
}

/// libssh2-backed session.
pub struct SshSession {
    session: ssh2::Session,
}

pub struct SshChannel(ssh2::Channel);

impl Read for SshChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for SshChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl SinkChannel for SshChannel {
    fn finish(&mut self) -> io::Result<()> {
        self.0.send_eof()?;
        self.0.wait_eof()?;
        self.0.close()?;
        self.0.wait_close()?;
        Ok(())
    }
}

impl SshSession {
    /// Connect and authenticate with the configured password or key file.
    pub fn connect(target: &SshTarget) -> Result<Self, PublishError> {
        let connection_error = |message: String| PublishError::Connection {
            server: target.server.clone(),
            message,
        };
        let tcp = TcpStream::connect((target.server.as_str(), target.port))
            .map_err(|e| connection_error(e.to_string()))?;
        let mut session = ssh2::Session::new().map_err(|e| connection_error(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| connection_error(e.to_string()))?;

        let auth = match &target.auth {
            SshAuth::Password { password } => session.userauth_password(&target.user, password),
            SshAuth::KeyFile { path } => session.userauth_pubkey_file(&target.user, None, path, None),
        };
        let auth_error = |message: String| PublishError::RemoteAuth {
            server: target.server.clone(),
            user: target.user.clone(),
            message,
        };
        auth.map_err(|e| auth_error(e.to_string()))?;
        if !session.authenticated() {
            return Err(auth_error("server did not accept the credentials".into()));
        }
        info!(server = %target.server, user = %target.user, "ssh session established");
        Ok(Self { session })
    }

    pub fn disconnect(self) {
        if let Err(e) = self.session.disconnect(None, "done", None) {
            debug!(error = %e, "ssh disconnect");
        }
    }
}

impl RemoteShell for SshSession {
    type Channel = SshChannel;

    fn open_sink(&mut self, command: &str) -> Result<SshChannel, ScpError> {
        let mut channel = self.session.channel_session().map_err(io::Error::from)?;
        channel.exec(command).map_err(io::Error::from)?;
        Ok(SshChannel(channel))
    }
}

// ============================================================================
// Batch
// ============================================================================

fn modified_seconds(path: &Path) -> io::Result<(u64, u64)> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok((mtime, metadata.len()))
}

fn send_one<S: RemoteShell>(
    shell: &mut S,
    target_dir: &str,
    local_dir: &Path,
    name: &str,
) -> Result<(), ScpError> {
    let path = local_dir.join(name);
    let (mtime, size) = modified_seconds(&path)?;
    let mut body = File::open(&path)?;

    let mut channel = shell.open_sink(&sink_command(target_dir, name))?;
    let result = Transfer::new(&mut channel, name, mtime, size).run(&mut body);
    if let Err(e) = channel.finish() {
        debug!(file = name, error = %e, "scp channel close");
    }
    result
}

/// Push every manifest file over `shell`, one channel per file.
///
/// A failed file is recorded and the next one starts; nothing here stops the
/// batch early.
pub(crate) fn publish_with<S: RemoteShell>(
    shell: &mut S,
    target_dir: &str,
    local_dir: &Path,
    manifest: &Manifest,
    recorder: &mut Recorder,
) {
    for name in manifest.iter() {
        match send_one(shell, target_dir, local_dir, name) {
            Ok(()) => recorder.delivered(name),
            Err(e) => {
                let error = PublishError::RemoteIo {
                    file: name.to_string(),
                    message: e.to_string(),
                };
                recorder.failed(name, error.to_string());
            }
        }
    }
}
