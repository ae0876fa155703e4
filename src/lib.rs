//! # Photo Publish
//!
//! Turns a picture collection into a static website and delivers it to a
//! local directory, an FTP server or an SSH host.
//!
//! # Pipeline
//!
//! ```text
//! collection/  →  Group tree      (directory scan or collection.json)
//!              →  target_dir/     (renditions, pages, assets, zip)
//!              →  remote          (manifest files over FTP or SCP)
//! ```
//!
//! One export run is a single depth-first walk of the tree. For every
//! picture it renders a lowres thumbnail and a midres image, optionally
//! exports the highres original and adds it to a zip archive, and writes a
//! midres page. Each group gets a thumbnail table page written after its
//! children. Every written file lands in a [`manifest::Manifest`] which the
//! publish step then uploads in order.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`collection`] | The tree being exported: groups, pictures, node ids, loading |
//! | [`config`] | `export.toml` options, validation, stock config, color CSS |
//! | [`naming`] | Every output filename, for all three naming modes |
//! | [`imaging`] | Rendition backend trait and its `image` crate implementation |
//! | [`generate`] | Tree walker plus Maud renderers for group and picture pages |
//! | [`archive`] | Streaming zip of highres pictures |
//! | [`manifest`] | Ordered list of written files |
//! | [`publish`] | FTP and SCP delivery of the manifest |
//! | [`export`] | One run end to end: `run`, `spawn`, interruption, report |
//! | [`output`] | CLI formatting of progress, reports and the collection tree |
//!
//! # Design Decisions
//!
//! ## Names Are Decided Up Front
//!
//! [`naming::NamingStrategy`] is built from the whole tree before anything is
//! written, so a page can link to siblings that have not been rendered yet.
//! Sequential numbering is the one piece of run state, and it lives in an
//! explicit [`naming::NamingContext`] owned by the walk.
//!
//! ## Partial Success Over Abort
//!
//! A broken source image becomes a placeholder, a failed page write loses one
//! page, a failed upload loses one file. Only bad configuration or an
//! unusable target directory stop a run. What went wrong is counted in the
//! [`export::ExportReport`].
//!
//! ## HTML via Maud
//!
//! Pages are built with compile-time checked templates and escaped
//! interpolation. The stylesheet and mouseover script are static files
//! bundled into the binary.

pub mod archive;
pub mod collection;
pub mod config;
pub mod export;
pub mod generate;
pub mod imaging;
pub mod manifest;
pub mod naming;
pub mod output;
pub mod publish;

#[cfg(test)]
pub(crate) mod test_helpers;
