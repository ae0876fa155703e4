//! One export run: write the site, package highres pictures, publish.
//!
//! [`run`] is the synchronous core; [`spawn`] runs it on a dedicated thread
//! and hands back an [`ExportHandle`] for progress, cancellation and the
//! final [`ExportReport`].
//!
//! Everything inside a run is sequential in traversal order. Sequential file
//! numbering and the zip stream both follow the walk position, so there is
//! no worker pool here.
//!
//! ## Failure policy
//!
//! | Failure | Effect |
//! |---|---|
//! | invalid options, target directory not creatable | run fails before writing anything |
//! | unreadable source image | placeholder renditions, run continues |
//! | page or asset write | that file is missing, run continues |
//! | zip cannot be created | run continues without zip, `highres.zip` cleared |
//! | publish transfer | recorded per file in the [`PublishReport`] |

use crate::archive::ZipPackager;
use crate::collection::Group;
use crate::config::{ConfigError, ExportOptions};
use crate::generate::{self, SiteWriter};
use crate::imaging::RenditionBackend;
use crate::manifest::Manifest;
use crate::naming::NamingStrategy;
use crate::publish::{self, PublishReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Cannot create target directory {path}: {source}")]
    TargetDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Export thread panicked")]
    Panicked,
}

/// Cooperative cancellation flag, polled between siblings of the walk.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started { total_pictures: usize },
    GroupStarted { name: String, node: String },
    PictureRendered { file: String, done: usize, total: usize },
    FileUploaded { file: String },
    UploadFailed { file: String, reason: String },
    Finished { interrupted: bool },
}

/// Terminal state of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub pictures_rendered: usize,
    pub pages_written: usize,
    pub pages_failed: usize,
    pub placeholders: usize,
    pub zip_generated: bool,
    pub interrupted: bool,
    /// Every file written locally, in write order.
    pub manifest: Manifest,
    /// `None` for the local target or an interrupted run.
    pub publish: Option<PublishReport>,
}

fn open_zip(options: &mut ExportOptions) -> Option<ZipPackager> {
    if !options.highres.zip {
        return None;
    }
    let path = options.target_dir.join(&options.highres.zip_name);
    match ZipPackager::create(&path) {
        Ok(zip) => Some(zip),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "zip unavailable, continuing without it");
            options.highres.zip = false;
            None
        }
    }
}

/// Run a complete export on the calling thread.
///
/// `options.highres.zip` is cleared when the archive cannot be produced.
pub fn run<B: RenditionBackend>(
    options: &mut ExportOptions,
    root: &Group,
    backend: &B,
    interrupt: &InterruptFlag,
    progress: Option<Sender<ProgressEvent>>,
) -> Result<ExportReport, ExportError> {
    options.validate()?;
    let total_pictures = root.count_pictures();
    options.naming.check_capacity(total_pictures)?;
    std::fs::create_dir_all(&options.target_dir).map_err(|source| {
        ExportError::TargetDirectory {
            path: options.target_dir.clone(),
            source,
        }
    })?;

    if let Some(tx) = &progress {
        tx.send(ProgressEvent::Started { total_pictures }).ok();
    }
    info!(target_dir = %options.target_dir.display(), pictures = total_pictures, mode = ?options.naming.mode, "export started");

    let mut manifest = Manifest::new();
    let asset_failures = generate::write_static_assets(options, &mut manifest);
    for failure in &asset_failures {
        error!(error = %failure, "asset write failed");
    }
    let zip = open_zip(options);

    let naming = NamingStrategy::new(root, &options.naming, options.highres.rotate);
    let mut writer = SiteWriter::new(options, backend, &naming, &mut manifest, interrupt)
        .with_zip(zip)
        .with_progress(progress.clone());
    writer.write_site(root);
    let (stats, zip) = writer.finish();

    let mut pages_failed = stats.pages_failed + asset_failures.len();
    if stats.subgroups_rendered > 0
        && let Err(e) = generate::write_folder_icon(&options.target_dir, &mut manifest)
    {
        error!(error = %e, "folder icon write failed");
        pages_failed += 1;
    }

    let zip_generated = match zip {
        Some(zip) => match zip.finish() {
            Ok(path) => {
                info!(path = %path.display(), "zip written");
                manifest.push(options.highres.zip_name.clone());
                true
            }
            Err(e) => {
                error!(error = %e, "zip could not be finalized");
                options.highres.zip = false;
                false
            }
        },
        None => false,
    };

    let interrupted = interrupt.is_tripped();
    let publish = if interrupted {
        info!("interrupted, skipping publish");
        None
    } else {
        publish::publish(
            &options.output,
            &options.target_dir,
            &manifest,
            progress.as_ref(),
        )
    };

    let report = ExportReport {
        pictures_rendered: stats.pictures_rendered,
        pages_written: stats.pages_written,
        pages_failed,
        placeholders: stats.placeholders,
        zip_generated,
        interrupted,
        manifest,
        publish,
    };
    info!(
        pictures = report.pictures_rendered,
        pages = report.pages_written,
        failed = report.pages_failed,
        interrupted,
        "export finished"
    );
    if let Some(tx) = &progress {
        tx.send(ProgressEvent::Finished { interrupted }).ok();
    }
    Ok(report)
}

/// A run in progress on its own thread.
pub struct ExportHandle {
    interrupt: InterruptFlag,
    progress: Receiver<ProgressEvent>,
    thread: JoinHandle<Result<ExportReport, ExportError>>,
}

impl ExportHandle {
    /// Flag to request cancellation; cloneable across threads.
    pub fn interrupt(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Split into the progress receiver and a handle that only joins.
    pub fn into_parts(self) -> (Receiver<ProgressEvent>, ExportJoin) {
        (
            self.progress,
            ExportJoin {
                thread: self.thread,
            },
        )
    }

    /// Wait for the run to reach its terminal state.
    pub fn join(self) -> Result<ExportReport, ExportError> {
        self.into_parts().1.join()
    }
}

pub struct ExportJoin {
    thread: JoinHandle<Result<ExportReport, ExportError>>,
}

impl ExportJoin {
    pub fn join(self) -> Result<ExportReport, ExportError> {
        self.thread.join().unwrap_or(Err(ExportError::Panicked))
    }
}

/// Start an export on a dedicated thread.
pub fn spawn<B>(mut options: ExportOptions, root: Group, backend: B) -> ExportHandle
where
    B: RenditionBackend + 'static,
{
    let interrupt = InterruptFlag::new();
    let (tx, rx) = mpsc::channel();
    let flag = interrupt.clone();
    let thread = std::thread::spawn(move || run(&mut options, &root, &backend, &flag, Some(tx)));
    ExportHandle {
        interrupt,
        progress: rx,
        thread,
    }
}
