//! FTP publishing over a single control connection.
//!
//! Login, then one switch to binary and passive mode, then one `STOR` per
//! manifest file to `<target_dir><name>`. The remote directory is used as a
//! literal prefix, so configure it with its trailing separator.
//!
//! A store the server rejects loses only that file. A broken connection ends
//! the batch and the rest of the manifest is reported as not sent.

use super::{PublishError, Recorder};
use crate::config::FtpTarget;
use crate::manifest::Manifest;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode};
use thiserror::Error;
use tracing::{debug, info, warn};

/// How an FTP command failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FtpFailure {
    /// The server answered with an error reply; the connection is still usable.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The control or data connection broke.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// The FTP operations publishing needs.
pub trait FtpClient {
    fn login(&mut self, user: &str, password: &str) -> Result<(), FtpFailure>;
    /// `TYPE I` followed by passive mode for all later transfers.
    fn binary_passive(&mut self) -> Result<(), FtpFailure>;
    fn store(&mut self, remote_path: &str, reader: &mut dyn Read) -> Result<(), FtpFailure>;
    fn quit(&mut self) -> Result<(), FtpFailure>;
}

/// [`FtpClient`] over a `suppaftp` control connection.
pub struct SuppaFtp(FtpStream);

fn classify(err: FtpError) -> FtpFailure {
    let message = err.to_string();
    match err {
        FtpError::UnexpectedResponse(_) => FtpFailure::Rejected(message),
        _ => FtpFailure::Connection(message),
    }
}

impl SuppaFtp {
    pub fn connect(server: &str, port: u16) -> Result<Self, FtpFailure> {
        let stream = FtpStream::connect((server, port)).map_err(classify)?;
        debug!(server, port, "ftp control connection open");
        Ok(Self(stream))
    }
}

impl FtpClient for SuppaFtp {
    fn login(&mut self, user: &str, password: &str) -> Result<(), FtpFailure> {
        self.0.login(user, password).map_err(classify)
    }

    fn binary_passive(&mut self) -> Result<(), FtpFailure> {
        self.0.transfer_type(FileType::Binary).map_err(classify)?;
        self.0.set_mode(Mode::Passive);
        Ok(())
    }

    fn store(&mut self, remote_path: &str, mut reader: &mut dyn Read) -> Result<(), FtpFailure> {
        self.0
            .put_file(remote_path, &mut reader)
            .map(|_| ())
            .map_err(classify)
    }

    fn quit(&mut self) -> Result<(), FtpFailure> {
        self.0.quit().map_err(classify)
    }
}

fn connection_error(target: &FtpTarget, failure: FtpFailure) -> PublishError {
    PublishError::Connection {
        server: target.server.clone(),
        message: failure.to_string(),
    }
}

/// Store every manifest file through `client`.
pub(crate) fn publish_with<C: FtpClient>(
    client: &mut C,
    target: &FtpTarget,
    local_dir: &Path,
    manifest: &Manifest,
    recorder: &mut Recorder,
) {
    if let Err(failure) = client.login(&target.user, &target.password) {
        let error = match failure {
            FtpFailure::Rejected(message) => PublishError::RemoteAuth {
                server: target.server.clone(),
                user: target.user.clone(),
                message,
            },
            failure => connection_error(target, failure),
        };
        recorder.abort(&error, manifest.iter());
        return;
    }
    if let Err(failure) = client.binary_passive() {
        recorder.abort(&connection_error(target, failure), manifest.iter());
        return;
    }
    info!(server = %target.server, dir = %target.target_dir, "ftp session ready");

    let files = manifest.files();
    for (i, name) in files.iter().enumerate() {
        let mut file = match File::open(local_dir.join(name)) {
            Ok(file) => file,
            Err(e) => {
                recorder.failed(name, e.to_string());
                continue;
            }
        };
        let remote_path = format!("{}{}", target.target_dir, name);
        match client.store(&remote_path, &mut file) {
            Ok(()) => recorder.delivered(name),
            Err(FtpFailure::Rejected(message)) => {
                let error = PublishError::RemoteIo {
                    file: name.clone(),
                    message,
                };
                recorder.failed(name, error.to_string());
            }
            Err(failure) => {
                recorder.failed(name, failure.to_string());
                let error = connection_error(target, failure);
                recorder.abort(&error, files[i + 1..].iter().map(String::as_str));
                return;
            }
        }
    }

    if let Err(failure) = client.quit() {
        warn!(server = %target.server, error = %failure, "ftp quit failed");
    }
}
