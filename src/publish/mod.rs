//! Publishing of exported files to the configured output target.
//!
//! | Target | Transport | Failure scope |
//! |---|---|---|
//! | `local` | none, files stay in `target_dir` | n/a |
//! | `ftp` | [`ftp`]: one control connection, binary + passive, `STOR` per file | a connection-level failure aborts the rest of the batch; a rejected store only loses that file |
//! | `ssh` | [`scp`]: one session, one `scp -p -t` channel per file | every file is independent; a failed transfer is logged and the next file starts |
//!
//! Files are sent in manifest order. The outcome of each file is collected in
//! a [`PublishReport`] and mirrored to the progress channel.

pub mod ftp;
pub mod scp;

use crate::config::OutputTarget;
use crate::export::ProgressEvent;
use crate::manifest::Manifest;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Authentication failed for {user}@{server}: {message}")]
    RemoteAuth {
        server: String,
        user: String,
        message: String,
    },
    #[error("Remote I/O error for {file}: {message}")]
    RemoteIo { file: String, message: String },
    #[error("Connection to {server} failed: {message}")]
    Connection { server: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTransfer {
    pub file: String,
    pub reason: String,
}

/// Per-file outcome of one publish run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: Vec<String>,
    pub failed: Vec<FailedTransfer>,
    /// Why the batch stopped before the last file, if it did.
    pub aborted: Option<String>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.aborted.is_none()
    }
}

/// Collects per-file outcomes and forwards them as progress events.
pub(crate) struct Recorder<'a> {
    report: PublishReport,
    progress: Option<&'a Sender<ProgressEvent>>,
}

impl<'a> Recorder<'a> {
    pub(crate) fn new(progress: Option<&'a Sender<ProgressEvent>>) -> Self {
        Self {
            report: PublishReport::default(),
            progress,
        }
    }

    pub(crate) fn delivered(&mut self, file: &str) {
        info!(file, "published");
        if let Some(tx) = self.progress {
            tx.send(ProgressEvent::FileUploaded {
                file: file.to_string(),
            })
            .ok();
        }
        self.report.delivered.push(file.to_string());
    }

    pub(crate) fn failed(&mut self, file: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(file, reason = %reason, "publish failed");
        if let Some(tx) = self.progress {
            tx.send(ProgressEvent::UploadFailed {
                file: file.to_string(),
                reason: reason.clone(),
            })
            .ok();
        }
        self.report.failed.push(FailedTransfer {
            file: file.to_string(),
            reason,
        });
    }

    /// Stop the batch: every file in `remaining` is marked failed.
    pub(crate) fn abort<'f>(&mut self, error: &PublishError, remaining: impl IntoIterator<Item = &'f str>) {
        let reason = error.to_string();
        for file in remaining {
            self.failed(file, format!("not sent: {reason}"));
        }
        self.report.aborted = Some(reason);
    }

    pub(crate) fn finish(self) -> PublishReport {
        self.report
    }
}

/// Send every manifest file from `local_dir` to `target`.
///
/// Returns `None` for the local target, which needs no transfer.
pub fn publish(
    target: &OutputTarget,
    local_dir: &Path,
    manifest: &Manifest,
    progress: Option<&Sender<ProgressEvent>>,
) -> Option<PublishReport> {
    let mut recorder = Recorder::new(progress);
    match target {
        OutputTarget::Local => return None,
        OutputTarget::Ftp(ftp_target) => {
            info!(server = %ftp_target.server, files = manifest.len(), "publishing over ftp");
            match ftp::SuppaFtp::connect(&ftp_target.server, ftp_target.port) {
                Ok(mut client) => {
                    ftp::publish_with(&mut client, ftp_target, local_dir, manifest, &mut recorder)
                }
                Err(failure) => {
                    let error = PublishError::Connection {
                        server: ftp_target.server.clone(),
                        message: failure.to_string(),
                    };
                    recorder.abort(&error, manifest.iter());
                }
            }
        }
        OutputTarget::Ssh(ssh_target) => {
            info!(server = %ssh_target.server, files = manifest.len(), "publishing over scp");
            match scp::SshSession::connect(ssh_target) {
                Ok(mut session) => {
                    scp::publish_with(
                        &mut session,
                        &ssh_target.target_dir,
                        local_dir,
                        manifest,
                        &mut recorder,
                    );
                    session.disconnect();
                }
                Err(error) => recorder.abort(&error, manifest.iter()),
            }
        }
    }
    Some(recorder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_target_publishes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut manifest = Manifest::new();
        manifest.push("index.htm");
        assert!(publish(&OutputTarget::Local, tmp.path(), &manifest, None).is_none());
    }

    #[test]
    fn recorder_forwards_progress() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut recorder = Recorder::new(Some(&tx));
        recorder.delivered("a.htm");
        recorder.failed("b.htm", "denied");
        let report = recorder.finish();
        drop(tx);

        assert_eq!(report.delivered, vec!["a.htm"]);
        assert_eq!(report.failed[0].reason, "denied");
        assert!(!report.is_complete());
        let events: Vec<ProgressEvent> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], ProgressEvent::UploadFailed { file, .. } if file == "b.htm"));
    }

    #[test]
    fn abort_marks_remaining_files() {
        let mut recorder = Recorder::new(None);
        recorder.delivered("a.htm");
        let error = PublishError::Connection {
            server: "ftp.example.org".into(),
            message: "reset".into(),
        };
        recorder.abort(&error, ["b.htm", "c.htm"]);
        let report = recorder.finish();
        assert_eq!(report.failed.len(), 2);
        assert!(report.aborted.as_deref().unwrap().contains("reset"));
    }
}
