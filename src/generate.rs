//! HTML site generation.
//!
//! Walks the collection depth-first and writes, in traversal order, every
//! rendition, highres copy, zip entry and page the export produces.
//!
//! ## Generated Pages
//!
//! - **Group pages** (`index.htm` for the root, `node_<id>.htm` otherwise): an
//!   "Up to" link (the root carries the zip download link instead), then a
//!   thumbnail table of `per_row` columns. Each row of thumbnails is followed by
//!   a row of descriptions; a short last row leaves its unused cells out.
//! - **Midres pages** (`<stem>.htm`, when enabled): the midres image, optional
//!   highres link, Previous/Up/Next links, an index matrix of the siblings, an
//!   optional mouseover info panel and an optional map.
//!
//! ## Ordering
//!
//! A group's page filename is recorded in the manifest before its children are
//! processed, so children can link up to it. The page itself is rendered after
//! the children, from the cells they produced, and written through a temporary
//! file so an interrupted run never leaves half a page behind.
//!
//! ## Static assets
//!
//! Embedded at compile time:
//! - `static/site.css`: base styles (colors injected from config)
//! - `static/mouseover.js`: info panel for the index matrix
//! - `static/folder.svg`: subgroup thumbnail
//! - `static/robots.txt`
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Templates are type-safe Rust code with automatic XSS escaping.

use crate::archive::ZipPackager;
use crate::collection::{Group, NodeId, Picture, SiteNode};
use crate::config::{self, ExportOptions};
use crate::export::{InterruptFlag, ProgressEvent};
use crate::imaging::{Dimensions, Quality, RenditionBackend, RenditionParams};
use crate::manifest::Manifest;
use crate::naming::{NamingContext, NamingStrategy, PictureFiles};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const STYLESHEET: &str = "site.css";
pub const MOUSEOVER_SCRIPT: &str = "mouseover.js";
pub const FOLDER_ICON: &str = "folder.svg";
pub const ROBOTS_TXT: &str = "robots.txt";

const CSS_STATIC: &str = include_str!("../static/site.css");
const JS_MOUSEOVER: &str = include_str!("../static/mouseover.js");
const SVG_FOLDER: &str = include_str!("../static/folder.svg");
const ROBOTS_STATIC: &str = include_str!("../static/robots.txt");

/// Index matrix geometry.
pub const MATRIX_PER_ROW: usize = 5;
pub const MATRIX_BEFORE_CURRENT: usize = 15;
pub const MATRIX_CELLS: usize = 35;

const ZIP_LINK_TEXT: &str = "Download High Resolution Pictures as a Zipfile";
const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// A page or asset that could not be written. Only that file is lost.
#[derive(Error, Debug)]
#[error("Failed to write {path} for node {node}: {source}")]
pub struct PageWriteError {
    pub path: PathBuf,
    pub node: String,
    #[source]
    pub source: std::io::Error,
}

/// Write `contents` to `path` via a sibling temp file and a rename.
fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    if let Err(e) = fs::write(&partial, contents).and_then(|_| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    Ok(())
}

// ============================================================================
// Static assets
// ============================================================================

/// `file://` URL of a local source, each path segment percent-encoded.
fn file_url(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut url = String::from("file://");
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => {
                url.push('/');
                url.push_str(&prefix.as_os_str().to_string_lossy());
            }
            Component::Normal(segment) => {
                url.push('/');
                url.push_str(&urlencoding::encode(&segment.to_string_lossy()));
            }
            Component::ParentDir => url.push_str("/.."),
            Component::RootDir | Component::CurDir => {}
        }
    }
    url
}

fn write_asset(
    target: &Path,
    name: &str,
    contents: &str,
    manifest: &mut Manifest,
) -> Result<(), PageWriteError> {
    write_atomically(&target.join(name), contents.as_bytes()).map_err(|source| {
        PageWriteError {
            path: target.join(name),
            node: "site".into(),
            source,
        }
    })?;
    manifest.push(name);
    debug!(file = name, "asset written");
    Ok(())
}

/// Stylesheet, plus robots.txt and the mouseover script when enabled.
pub fn write_static_assets(
    options: &ExportOptions,
    manifest: &mut Manifest,
) -> Vec<PageWriteError> {
    let target = &options.target_dir;
    let css = format!(
        "{}\n\n{}",
        config::generate_color_css(&options.colors),
        CSS_STATIC
    );
    let mut assets: Vec<(&str, &str)> = Vec::new();
    if options.site.robots_txt {
        assets.push((ROBOTS_TXT, ROBOTS_STATIC));
    }
    if options.midres.mouseover {
        assets.push((MOUSEOVER_SCRIPT, JS_MOUSEOVER));
    }

    let mut failures = Vec::new();
    if let Err(e) = write_asset(target, STYLESHEET, &css, manifest) {
        failures.push(e);
    }
    for (name, contents) in assets {
        if let Err(e) = write_asset(target, name, contents, manifest) {
            failures.push(e);
        }
    }
    failures
}

/// Folder icon used by subgroup cells.
pub fn write_folder_icon(target: &Path, manifest: &mut Manifest) -> Result<(), PageWriteError> {
    write_asset(target, FOLDER_ICON, SVG_FOLDER, manifest)
}

// ============================================================================
// Tree walk
// ============================================================================

/// Counters gathered during one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub pictures_rendered: usize,
    pub pages_written: usize,
    pub pages_failed: usize,
    /// Pictures that needed at least one placeholder rendition.
    pub placeholders: usize,
    pub subgroups_rendered: usize,
}

/// Depth-first site writer for one export run.
///
/// Owns the naming counter and the zip stream for the duration of the walk.
pub struct SiteWriter<'a, B: RenditionBackend> {
    options: &'a ExportOptions,
    backend: &'a B,
    naming: &'a NamingStrategy,
    ctx: NamingContext,
    manifest: &'a mut Manifest,
    zip: Option<ZipPackager>,
    interrupt: &'a InterruptFlag,
    progress: Option<Sender<ProgressEvent>>,
    total_pictures: usize,
    stats: WalkStats,
}

impl<'a, B: RenditionBackend> SiteWriter<'a, B> {
    pub fn new(
        options: &'a ExportOptions,
        backend: &'a B,
        naming: &'a NamingStrategy,
        manifest: &'a mut Manifest,
        interrupt: &'a InterruptFlag,
    ) -> Self {
        Self {
            options,
            backend,
            naming,
            ctx: naming.context(),
            manifest,
            zip: None,
            interrupt,
            progress: None,
            total_pictures: 0,
            stats: WalkStats::default(),
        }
    }

    pub fn with_zip(mut self, zip: Option<ZipPackager>) -> Self {
        self.zip = zip;
        self
    }

    pub fn with_progress(mut self, progress: Option<Sender<ProgressEvent>>) -> Self {
        self.progress = progress;
        self
    }

    /// Write the whole tree starting at `root`.
    pub fn write_site(&mut self, root: &Group) {
        self.total_pictures = root.count_pictures();
        self.write_group(root, &NodeId::root(), None);
    }

    /// Hand back the walk results and the still-open zip stream.
    pub fn finish(self) -> (WalkStats, Option<ZipPackager>) {
        (self.stats, self.zip)
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.progress {
            tx.send(event).ok();
        }
    }

    fn target(&self) -> &Path {
        &self.options.target_dir
    }

    fn write_group(&mut self, group: &Group, id: &NodeId, parent: Option<(&Group, &NodeId)>) {
        let page = self.naming.group_page(id);
        self.manifest.push(page.clone());
        self.emit(ProgressEvent::GroupStarted {
            name: group.name.clone(),
            node: id.to_string(),
        });
        info!(node = %id, page = %page, group = %group.name, "writing group");

        let mut cells = Vec::with_capacity(group.children.len());
        for (i, child) in group.children.iter().enumerate() {
            if self.interrupt.is_tripped() {
                info!(node = %id, remaining = group.children.len() - i, "interrupted, skipping remaining children");
                break;
            }
            let child_id = id.child(i);
            match child {
                SiteNode::Picture(picture) => {
                    if let Some(cell) = self.write_picture(group, id, i, picture) {
                        cells.push(cell);
                    }
                }
                SiteNode::Group(sub) => {
                    self.write_group(sub, &child_id, Some((group, id)));
                    self.stats.subgroups_rendered += 1;
                    cells.push(ThumbnailCell::Group {
                        href: self.naming.group_page(&child_id),
                        name: sub.name.clone(),
                        pictures: sub.count_pictures(),
                    });
                }
            }
        }

        let up = parent.map(|(parent_group, parent_id)| UpLink {
            href: self.naming.group_page(parent_id),
            label: parent_group.name.clone(),
        });
        let zip_download = if id.is_root() && self.zip.is_some() {
            Some(self.options.highres.zip_name.as_str())
        } else {
            None
        };
        let markup = render_group_page(&GroupPage {
            title: &group.name,
            up,
            zip_download,
            cells: &cells,
            per_row: self.options.thumbnails.per_row,
            table_width: self.options.thumbnails.table_width(),
            cell_spacing: self.options.thumbnails.cell_spacing,
            thumb_box: self.options.thumbnail_box(),
            mouseover: self.options.midres.mouseover,
        });
        self.write_page(&page, id, markup);
    }

    fn write_page(&mut self, name: &str, id: &NodeId, markup: Markup) {
        let path = self.target().join(name);
        match write_atomically(&path, markup.into_string().as_bytes()) {
            Ok(()) => {
                self.stats.pages_written += 1;
                debug!(node = %id, page = name, "page written");
            }
            Err(source) => {
                self.stats.pages_failed += 1;
                let err = PageWriteError {
                    path,
                    node: id.to_string(),
                    source,
                };
                error!(node = %id, page = name, error = %err, "page write failed");
            }
        }
    }

    fn write_picture(
        &mut self,
        parent: &Group,
        parent_id: &NodeId,
        index: usize,
        picture: &Picture,
    ) -> Option<ThumbnailCell> {
        let id = parent_id.child(index);
        self.ctx.claim(&id);
        let Some(files) = self.naming.picture_files(&id, &self.ctx) else {
            error!(node = %id, source = %picture.source.display(), "no planned filenames for picture");
            return None;
        };

        let mut used_placeholder = false;
        let lowres = self.render_rendition(
            &id,
            picture,
            &files.lowres,
            self.options.thumbnail_box(),
            self.options.thumbnails.quality,
            &mut used_placeholder,
        );
        let midres = self.render_rendition(
            &id,
            picture,
            &files.midres,
            self.options.midres_box(),
            self.options.midres.quality,
            &mut used_placeholder,
        );
        if used_placeholder {
            self.stats.placeholders += 1;
        }

        let highres_exported = self.options.highres.export && self.export_highres(&id, picture, &files);
        if self.zip.is_some() {
            self.add_to_zip(&id, picture, &files, highres_exported);
        }

        if self.options.midres.pages {
            let highres_href = if self.options.highres.link_to_original {
                Some(file_url(&picture.source))
            } else if highres_exported {
                Some(files.highres.clone())
            } else {
                None
            };
            self.manifest.push(files.page.clone());
            let markup = self.picture_page(parent, parent_id, index, picture, &files, midres, highres_href);
            self.write_page(&files.page, &id, markup);
        }

        self.stats.pictures_rendered += 1;
        self.emit(ProgressEvent::PictureRendered {
            file: files.lowres.clone(),
            done: self.stats.pictures_rendered,
            total: self.total_pictures,
        });

        let href = if self.options.midres.pages {
            files.page.clone()
        } else {
            files.midres.clone()
        };
        Some(ThumbnailCell::Picture {
            href,
            lowres: files.lowres,
            size: lowres,
            description: picture.description.clone(),
        })
    }

    /// Render one scaled rendition, falling back to a placeholder when the
    /// source cannot be read.
    fn render_rendition(
        &mut self,
        id: &NodeId,
        picture: &Picture,
        name: &str,
        bounds: (u32, u32),
        quality: u8,
        used_placeholder: &mut bool,
    ) -> Option<Dimensions> {
        let params = RenditionParams {
            source: picture.source.clone(),
            output: self.target().join(name),
            bounds: Some(bounds),
            quality: Quality::new(quality),
            rotation: picture.rotation,
            steps: self.options.scaling.steps,
        };
        let dims = match self.backend.render(&params) {
            Ok(dims) => dims,
            Err(e) => {
                warn!(node = %id, source = %picture.source.display(), error = %e, "unreadable source, using placeholder");
                match self.backend.render_placeholder(&params) {
                    Ok(dims) => {
                        *used_placeholder = true;
                        dims
                    }
                    Err(e) => {
                        error!(node = %id, file = name, error = %e, "placeholder rendition failed");
                        return None;
                    }
                }
            }
        };
        self.manifest.push(name);
        Some(dims)
    }

    fn export_highres(&mut self, id: &NodeId, picture: &Picture, files: &PictureFiles) -> bool {
        let output = self.target().join(&files.highres);
        let result = if self.options.highres.rotate && picture.rotation % 360 != 0 {
            let params = RenditionParams {
                source: picture.source.clone(),
                output,
                bounds: None,
                quality: Quality::new(self.options.midres.quality),
                rotation: picture.rotation,
                steps: 1,
            };
            self.backend.render(&params).map(|_| ()).map_err(|e| e.to_string())
        } else {
            fs::copy(&picture.source, &output)
                .map(|_| ())
                .map_err(|e| e.to_string())
        };
        match result {
            Ok(()) => {
                self.manifest.push(files.highres.clone());
                true
            }
            Err(e) => {
                warn!(node = %id, source = %picture.source.display(), error = %e, "highres export failed");
                false
            }
        }
    }

    fn add_to_zip(&mut self, id: &NodeId, picture: &Picture, files: &PictureFiles, exported: bool) {
        let source = if exported {
            self.options.target_dir.join(&files.highres)
        } else {
            picture.source.clone()
        };
        if let Some(zip) = self.zip.as_mut()
            && let Err(e) = zip.add_path(&files.highres, &source)
        {
            warn!(node = %id, source = %source.display(), error = %e, "zip entry skipped");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn picture_page(
        &self,
        parent: &Group,
        parent_id: &NodeId,
        index: usize,
        picture: &Picture,
        files: &PictureFiles,
        midres: Option<Dimensions>,
        highres_href: Option<String>,
    ) -> Markup {
        let count = parent.children.len();
        let sibling_page = |j: usize| {
            self.naming
                .node_page(&parent_id.child(j), &parent.children[j], &self.ctx)
        };
        let matrix = matrix_window(index, count)
            .map(|j| {
                if j < count {
                    MatrixCell::Link {
                        index: j,
                        href: sibling_page(j).unwrap_or_default(),
                        current: j == index,
                    }
                } else {
                    MatrixCell::Blank
                }
            })
            .collect::<Vec<_>>();
        let info = if self.options.midres.mouseover {
            parent.children.iter().map(node_info_html).collect()
        } else {
            Vec::new()
        };
        let map = match (&picture.location, self.options.midres.map) {
            (Some(location), true) => Some(MapView {
                lat: location.lat,
                lng: location.lng,
                api_key: &self.options.midres.maps_api_key,
            }),
            _ => None,
        };

        render_picture_page(&PicturePage {
            title: &parent.name,
            description: &picture.description,
            index,
            count,
            midres: &files.midres,
            midres_size: midres,
            highres_href: highres_href.as_deref(),
            up: format!("{}#{}", self.naming.group_page(parent_id), files.lowres),
            previous: index.checked_sub(1).and_then(sibling_page),
            next: (index + 1 < count).then(|| sibling_page(index + 1)).flatten(),
            zip_download: self
                .zip
                .as_ref()
                .map(|_| self.options.highres.zip_name.as_str()),
            matrix: &matrix,
            info: &info,
            map,
        })
    }
}

// ============================================================================
// Index matrix
// ============================================================================

/// Sibling indices shown in the index matrix around `current`.
///
/// The window starts on a row boundary [`MATRIX_BEFORE_CURRENT`] positions
/// before `current` and spans [`MATRIX_CELLS`] positions. When that runs past
/// the last sibling it is cut at the first full row past `count`, so indices
/// `>= count` are blank cells.
pub fn matrix_window(current: usize, count: usize) -> Range<usize> {
    let start = current.saturating_sub(MATRIX_BEFORE_CURRENT) / MATRIX_PER_ROW * MATRIX_PER_ROW;
    let mut end = start + MATRIX_CELLS;
    if end > count {
        end = (count + MATRIX_PER_ROW) / MATRIX_PER_ROW * MATRIX_PER_ROW;
    }
    start..end
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatrixCell {
    Link {
        index: usize,
        href: String,
        current: bool,
    },
    Blank,
}

// ============================================================================
// HTML Components
// ============================================================================

/// One thumbnail on a group page.
#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailCell {
    Picture {
        href: String,
        lowres: String,
        size: Option<Dimensions>,
        description: String,
    },
    Group {
        href: String,
        name: String,
        pictures: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpLink {
    pub href: String,
    pub label: String,
}

pub struct GroupPage<'a> {
    pub title: &'a str,
    pub up: Option<UpLink>,
    pub zip_download: Option<&'a str>,
    pub cells: &'a [ThumbnailCell],
    pub per_row: usize,
    pub table_width: u32,
    pub cell_spacing: u32,
    pub thumb_box: (u32, u32),
    pub mouseover: bool,
}

pub struct MapView<'a> {
    pub lat: f64,
    pub lng: f64,
    pub api_key: &'a str,
}

pub struct PicturePage<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub index: usize,
    pub count: usize,
    pub midres: &'a str,
    pub midres_size: Option<Dimensions>,
    pub highres_href: Option<&'a str>,
    pub up: String,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub zip_download: Option<&'a str>,
    pub matrix: &'a [MatrixCell],
    /// Mouseover HTML per sibling; empty when the feature is off.
    pub info: &'a [String],
    pub map: Option<MapView<'a>>,
}

/// Renders the base HTML document structure
fn base_document(title: &str, mouseover: bool, onload: Option<String>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="generator" content=(GENERATOR);
                title { (title) }
                link rel="stylesheet" type="text/css" href=(STYLESHEET);
                @if mouseover {
                    script src=(MOUSEOVER_SCRIPT) {}
                }
            }
            body onload=[onload] {
                (content)
            }
        }
    }
}

fn thumbnail_cell(cell: &ThumbnailCell, thumb_box: (u32, u32)) -> Markup {
    match cell {
        ThumbnailCell::Picture {
            href,
            lowres,
            size,
            description,
        } => html! {
            td.pictureThumbnailCell id=(lowres) width=(thumb_box.0) {
                a href=(href) {
                    img src=(lowres)
                        width=[size.map(|s| s.width)]
                        height=[size.map(|s| s.height)]
                        alt=(description);
                }
            }
        },
        ThumbnailCell::Group { href, name, .. } => html! {
            td.groupThumbnailCell width=(thumb_box.0) height=(thumb_box.1) {
                a href=(href) {
                    img src=(FOLDER_ICON) alt=(name);
                }
            }
        },
    }
}

fn description_cell(cell: &ThumbnailCell) -> Markup {
    match cell {
        ThumbnailCell::Picture { description, .. } => html! {
            td.descriptionCell { (description) }
        },
        ThumbnailCell::Group { href, name, pictures } => html! {
            td.descriptionCell {
                a href=(href) { (name) }
                br;
                (pictures) @if *pictures == 1 { " picture" } @else { " pictures" }
            }
        },
    }
}

/// Renders a group page: navigation, thumbnail table and footer.
pub fn render_group_page(page: &GroupPage) -> Markup {
    let per_row = page.per_row.max(1);
    let content = html! {
        h2 { (page.title) }
        div.navigation {
            @if let Some(up) = &page.up {
                "Up to: "
                a href=(up.href) { (up.label) }
            }
            @if let Some(zip) = page.zip_download {
                a href=(zip) { (ZIP_LINK_TEXT) }
            }
        }
        table.groupTable width=(page.table_width) cellspacing=(page.cell_spacing) {
            @for row in page.cells.chunks(per_row) {
                tr {
                    @for cell in row {
                        (thumbnail_cell(cell, page.thumb_box))
                    }
                }
                tr {
                    @for cell in row {
                        (description_cell(cell))
                    }
                }
            }
            tr {
                td.groupFooter colspan=(per_row) {
                    "Generated by " (GENERATOR)
                }
            }
        }
    };
    base_document(page.title, page.mouseover, None, content)
}

fn matrix_table(cells: &[MatrixCell], mouseover: bool) -> Markup {
    html! {
        table.numberPickTable {
            @for row in cells.chunks(MATRIX_PER_ROW) {
                tr {
                    @for cell in row {
                        @match cell {
                            MatrixCell::Link { index, href, current } => {
                                td.numberPickCell.selfHighlight[*current] {
                                    a href=(href)
                                        onmouseover=[mouseover.then(|| format!("showContent({index})"))] {
                                        (index + 1)
                                    }
                                }
                            }
                            MatrixCell::Blank => {
                                td.numberPickCell { (PreEscaped("&nbsp;")) }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// A string as a JavaScript literal that is safe inside a `<script>` block.
fn js_string(value: &str) -> String {
    let quoted = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
    quoted.replace("</", "<\\/")
}

fn info_script(info: &[String]) -> String {
    let mut script = String::from("var content = new Array();\n");
    for (i, entry) in info.iter().enumerate() {
        script.push_str(&format!("content[{i}] = {};\n", js_string(entry)));
    }
    script
}

fn map_script(map: &MapView) -> String {
    format!(
        "function initMap() {{\n  var position = {{lat: {}, lng: {}}};\n  var map = new google.maps.Map(document.getElementById(\"map\"), {{zoom: 12, center: position}});\n  new google.maps.Marker({{position: position, map: map}});\n}}\n",
        map.lat, map.lng
    )
}

/// Mouseover panel text for one sibling.
fn node_info_html(node: &SiteNode) -> String {
    match node {
        SiteNode::Group(group) => html! {
            b { (group.name) }
            br;
            (group.count_pictures()) " pictures"
        }
        .into_string(),
        SiteNode::Picture(picture) => html! {
            b { (picture.description) }
            @for (label, value) in [
                ("Date", &picture.creation_time),
                ("Photographer", &picture.photographer),
                ("Comment", &picture.comment),
                ("Film reference", &picture.film_reference),
                ("Copyright", &picture.copyright_holder),
            ] {
                @if !value.is_empty() {
                    br;
                    (label) ": " (value)
                }
            }
        }
        .into_string(),
    }
}

/// Renders a midres browsing page.
pub fn render_picture_page(page: &PicturePage) -> Markup {
    let mouseover = !page.info.is_empty();
    let image = html! {
        img src=(page.midres)
            width=[page.midres_size.map(|s| s.width)]
            height=[page.midres_size.map(|s| s.height)]
            alt=(page.description);
    };
    let content = html! {
        h2 { (page.title) }
        table.midresTable cellpadding="0" cellspacing="10" {
            tr {
                td.midresPicture {
                    @if let Some(highres) = page.highres_href {
                        a href=(highres) { (image) }
                    } @else {
                        (image)
                    }
                    p.pictureCaption { "Picture " (page.index + 1) " of " (page.count) }
                    p { (page.description) }
                }
                td {
                    div.navigation {
                        a href=(page.up) { "Up" }
                        @if let Some(previous) = &page.previous {
                            (PreEscaped("&nbsp;"))
                            a href=(previous) { "Previous" }
                        }
                        @if let Some(highres) = page.highres_href {
                            (PreEscaped("&nbsp;"))
                            a href=(highres) { "Highres" }
                        }
                        @if let Some(next) = &page.next {
                            (PreEscaped("&nbsp;"))
                            a href=(next) { "Next" }
                        }
                        @if let Some(zip) = page.zip_download {
                            (PreEscaped("&nbsp;"))
                            a href=(zip) { "Download Zip" }
                        }
                    }
                    (matrix_table(page.matrix, mouseover))
                    @if mouseover {
                        div id="mouseoverText" {}
                        script { (PreEscaped(info_script(page.info))) }
                    }
                    @if let Some(map) = &page.map {
                        div id="map" {}
                        script { (PreEscaped(map_script(map))) }
                        script async src=(format!(
                            "https://maps.googleapis.com/maps/api/js?key={}&callback=initMap",
                            map.api_key
                        )) {}
                    }
                }
            }
        }
    };
    let onload = mouseover.then(|| format!("showContent({})", page.index));
    base_document(page.title, mouseover, onload, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::LatLng;
    use crate::config::NamingMode;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::{count_occurrences, group, into_group, picture, read_output};
    use tempfile::TempDir;

    fn options_in(dir: &Path) -> ExportOptions {
        let mut options = ExportOptions::default();
        options.target_dir = dir.to_path_buf();
        options.naming.mode = NamingMode::Sequential;
        options.naming.start = 1;
        options.thumbnails.per_row = 2;
        options.highres.export = false;
        options.highres.zip = false;
        options
    }

    fn walk(options: &ExportOptions, root: &Group, backend: &MockBackend) -> (WalkStats, Manifest) {
        let naming = NamingStrategy::new(root, &options.naming, options.highres.rotate);
        let mut manifest = Manifest::new();
        let interrupt = InterruptFlag::new();
        let mut writer = SiteWriter::new(options, backend, &naming, &mut manifest, &interrupt);
        writer.write_site(root);
        let (stats, _) = writer.finish();
        (stats, manifest)
    }

    // =========================================================================
    // Index matrix
    // =========================================================================

    #[test]
    fn matrix_window_starts_at_zero_near_beginning() {
        assert_eq!(matrix_window(0, 100), 0..35);
        assert_eq!(matrix_window(14, 100), 0..35);
    }

    #[test]
    fn matrix_window_starts_on_row_boundary() {
        assert_eq!(matrix_window(23, 100), 5..40);
        assert_eq!(matrix_window(40, 100), 25..60);
    }

    #[test]
    fn matrix_window_truncates_at_row_after_end() {
        assert_eq!(matrix_window(2, 7), 0..10);
        assert_eq!(matrix_window(38, 40), 20..45);
    }

    #[test]
    fn matrix_window_always_contains_current() {
        for count in 1..80 {
            for current in 0..count {
                let w = matrix_window(current, count);
                assert!(w.contains(&current), "current {current} count {count} window {w:?}");
                assert_eq!(w.start % MATRIX_PER_ROW, 0);
                assert_eq!(w.end % MATRIX_PER_ROW, 0);
            }
        }
    }

    #[test]
    fn matrix_table_highlights_current_and_blanks_tail() {
        let cells = vec![
            MatrixCell::Link { index: 0, href: "a.htm".into(), current: false },
            MatrixCell::Link { index: 1, href: "b.htm".into(), current: true },
            MatrixCell::Blank,
        ];
        let html = matrix_table(&cells, false).into_string();
        assert_eq!(count_occurrences(&html, "selfHighlight"), 1);
        assert!(html.contains(r#"<a href="b.htm">2</a>"#));
        assert!(html.contains("&nbsp;"));
        assert!(!html.contains("onmouseover"));
    }

    // =========================================================================
    // Group page
    // =========================================================================

    fn picture_cell(name: &str) -> ThumbnailCell {
        ThumbnailCell::Picture {
            href: format!("{name}.htm"),
            lowres: format!("{name}_l.jpg"),
            size: Some(Dimensions { width: 100, height: 75 }),
            description: format!("about {name}"),
        }
    }

    fn group_page<'a>(cells: &'a [ThumbnailCell], per_row: usize) -> GroupPage<'a> {
        GroupPage {
            title: "Holiday",
            up: None,
            zip_download: None,
            cells,
            per_row,
            table_width: 400,
            cell_spacing: 10,
            thumb_box: (150, 150),
            mouseover: false,
        }
    }

    #[test]
    fn group_page_rows_pair_thumbnails_with_descriptions() {
        let cells = vec![picture_cell("a"), picture_cell("b"), picture_cell("c")];
        let html = render_group_page(&group_page(&cells, 2)).into_string();
        // two thumbnail rows + two description rows + footer
        assert_eq!(count_occurrences(&html, "<tr>"), 5);
        assert_eq!(count_occurrences(&html, "pictureThumbnailCell"), 3);
        assert_eq!(count_occurrences(&html, "descriptionCell"), 3);
    }

    #[test]
    fn group_page_short_last_row_is_not_padded() {
        let cells = vec![picture_cell("a")];
        let html = render_group_page(&group_page(&cells, 3)).into_string();
        assert_eq!(count_occurrences(&html, "<td"), 3);
        assert!(html.contains(r#"colspan="3""#));
    }

    #[test]
    fn group_page_escapes_titles() {
        let cells = vec![];
        let mut page = group_page(&cells, 2);
        page.title = "<Summer & Sun>";
        let html = render_group_page(&page).into_string();
        assert!(html.contains("&lt;Summer &amp; Sun&gt;"));
    }

    #[test]
    fn group_page_up_link_and_zip_link() {
        let cells = vec![];
        let mut page = group_page(&cells, 2);
        page.up = Some(UpLink { href: "index.htm".into(), label: "Top".into() });
        let html = render_group_page(&page).into_string();
        assert!(html.contains("Up to: "));
        assert!(html.contains(r#"<a href="index.htm">Top</a>"#));
        assert!(!html.contains(ZIP_LINK_TEXT));

        page.up = None;
        page.zip_download = Some("pictures.zip");
        let html = render_group_page(&page).into_string();
        assert!(html.contains(r#"<a href="pictures.zip">"#));
        assert!(!html.contains("Up to: "));
    }

    #[test]
    fn group_cell_uses_folder_icon() {
        let cells = vec![ThumbnailCell::Group {
            href: "node_abc.htm".into(),
            name: "Day two".into(),
            pictures: 1,
        }];
        let html = render_group_page(&group_page(&cells, 2)).into_string();
        assert!(html.contains(r#"src="folder.svg""#));
        assert!(html.contains("1 picture"));
        assert!(!html.contains("1 pictures"));
    }

    // =========================================================================
    // Picture page
    // =========================================================================

    fn picture_page<'a>(matrix: &'a [MatrixCell], info: &'a [String]) -> PicturePage<'a> {
        PicturePage {
            title: "Holiday",
            description: "Beach",
            index: 1,
            count: 3,
            midres: "00002_m.jpg",
            midres_size: Some(Dimensions { width: 640, height: 480 }),
            highres_href: None,
            up: "index.htm#00002_l.jpg".into(),
            previous: Some("00001.htm".into()),
            next: Some("00003.htm".into()),
            zip_download: None,
            matrix,
            info,
            map: None,
        }
    }

    #[test]
    fn picture_page_links() {
        let html = render_picture_page(&picture_page(&[], &[])).into_string();
        assert!(html.contains(r#"<a href="index.htm#00002_l.jpg">Up</a>"#));
        assert!(html.contains(r#"<a href="00001.htm">Previous</a>"#));
        assert!(html.contains(r#"<a href="00003.htm">Next</a>"#));
        assert!(html.contains("Picture 2 of 3"));
        assert!(!html.contains("Highres"));
        assert!(!html.contains("Download Zip"));
        assert!(!html.contains(MOUSEOVER_SCRIPT));
    }

    #[test]
    fn picture_page_highres_link_wraps_image() {
        let mut page = picture_page(&[], &[]);
        page.highres_href = Some("00002_h.jpg");
        let html = render_picture_page(&page).into_string();
        assert!(html.contains(r#"<a href="00002_h.jpg"><img src="00002_m.jpg""#));
        assert!(html.contains(r#"<a href="00002_h.jpg">Highres</a>"#));
    }

    #[test]
    fn picture_page_mouseover_script() {
        let info = vec!["<b>one</b>".to_string(), "two </script>".to_string()];
        let html = render_picture_page(&picture_page(&[], &info)).into_string();
        assert!(html.contains(r#"<script src="mouseover.js"></script>"#));
        assert!(html.contains(r#"content[0] = "<b>one<\/b>";"#));
        assert!(html.contains(r#"content[1] = "two <\/script>";"#));
        assert!(html.contains(r#"onload="showContent(1)""#));
    }

    #[test]
    fn picture_page_map() {
        let mut page = picture_page(&[], &[]);
        page.map = Some(MapView { lat: 47.5, lng: 8.25, api_key: "KEY" });
        let html = render_picture_page(&page).into_string();
        assert!(html.contains(r#"<div id="map"></div>"#));
        assert!(html.contains("lat: 47.5, lng: 8.25"));
        assert!(html.contains("key=KEY&amp;callback=initMap"));
    }

    #[test]
    fn node_info_skips_empty_fields() {
        let node = SiteNode::Picture(Picture {
            description: "Dune".into(),
            photographer: "Ana".into(),
            ..Picture::default()
        });
        let info = node_info_html(&node);
        assert!(info.contains("Photographer: Ana"));
        assert!(!info.contains("Date"));
    }

    // =========================================================================
    // Walk
    // =========================================================================

    #[test]
    fn walk_writes_pages_and_renditions_in_order() {
        let tmp = TempDir::new().unwrap();
        let options = options_in(tmp.path());
        let root = into_group(group(
            "Holiday",
            vec![
                picture("a.jpg"),
                picture("b.jpg"),
                group("Day two", vec![picture("c.jpg")]),
            ],
        ));
        let backend = MockBackend::new();
        let (stats, manifest) = walk(&options, &root, &backend);

        assert_eq!(stats.pictures_rendered, 3);
        assert_eq!(stats.subgroups_rendered, 1);
        assert_eq!(stats.pages_failed, 0);
        // 2 group pages + 3 picture pages
        assert_eq!(stats.pages_written, 5);

        let files = manifest.files();
        assert_eq!(files[0], "index.htm");
        assert_eq!(&files[1..4], ["00001_l.jpg", "00001_m.jpg", "00001.htm"]);
        assert!(manifest.contains("00003_m.jpg"));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 6);
        assert!(matches!(&ops[0], RecordedOp::Render { bounds: Some(b), .. } if *b == options.thumbnail_box()));
    }

    #[test]
    fn unreadable_source_gets_placeholder() {
        let tmp = TempDir::new().unwrap();
        let options = options_in(tmp.path());
        let root = into_group(group("R", vec![picture("broken.jpg"), picture("ok.jpg")]));
        let backend = MockBackend::new();
        let (stats, manifest) = walk(&options, &root, &backend);

        assert_eq!(stats.placeholders, 1);
        assert_eq!(stats.pictures_rendered, 2);
        assert!(manifest.contains("00001_l.jpg"));
        let placeholders = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Placeholder { .. }))
            .count();
        assert_eq!(placeholders, 2);
    }

    #[test]
    fn midres_disabled_links_thumbnail_to_midres_image() {
        let tmp = TempDir::new().unwrap();
        let mut options = options_in(tmp.path());
        options.midres.pages = false;
        let root = into_group(group("R", vec![picture("a.jpg")]));
        let (stats, manifest) = walk(&options, &root, &MockBackend::new());

        assert_eq!(stats.pages_written, 1);
        assert!(!manifest.contains("00001.htm"));
        let index = read_output(tmp.path(), "index.htm");
        assert!(index.contains(r#"<a href="00001_m.jpg">"#));
    }

    #[test]
    fn link_to_original_beats_exported_highres() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.jpg"), b"original bytes").unwrap();
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let mut options = options_in(&out);
        options.highres.export = true;
        options.highres.link_to_original = true;
        let root = into_group(group(
            "R",
            vec![picture(source.join("a.jpg").to_str().unwrap())],
        ));
        let (_, manifest) = walk(&options, &root, &MockBackend::new());

        assert!(manifest.contains("00001_h.jpg"));
        let page = read_output(&out, "00001.htm");
        let original = file_url(&source.join("a.jpg"));
        assert!(original.starts_with("file:///"));
        assert!(original.ends_with("/src/a.jpg"));
        assert!(page.contains(&format!(r#"<a href="{original}">Highres</a>"#)));
    }

    #[test]
    fn file_url_encodes_each_segment() {
        assert_eq!(
            file_url(Path::new("/photos/Day Trips/50% off#1.jpg")),
            "file:///photos/Day%20Trips/50%25%20off%231.jpg"
        );
        assert!(file_url(Path::new("relative/a.jpg")).ends_with("/relative/a.jpg"));
    }

    #[test]
    fn rotated_highres_is_rendered_not_copied() {
        let tmp = TempDir::new().unwrap();
        let mut options = options_in(tmp.path());
        options.highres.export = true;
        options.highres.rotate = true;
        let mut root = into_group(group("R", vec![picture("turned.jpg")]));
        if let SiteNode::Picture(p) = &mut root.children[0] {
            p.rotation = 90;
        }
        let backend = MockBackend::new();
        let (_, manifest) = walk(&options, &root, &backend);

        assert!(manifest.contains("00001_h.jpg"));
        let ops = backend.get_operations();
        assert!(ops.iter().any(|op| matches!(
            op,
            RecordedOp::Render { bounds: None, rotation: 90, .. }
        )));
    }

    #[test]
    fn interrupt_stops_before_next_sibling() {
        let tmp = TempDir::new().unwrap();
        let options = options_in(tmp.path());
        let root = into_group(group(
            "R",
            vec![picture("a.jpg"), picture("b.jpg"), picture("c.jpg")],
        ));
        let naming = NamingStrategy::new(&root, &options.naming, false);
        let mut manifest = Manifest::new();
        let interrupt = InterruptFlag::new();
        // lowres + midres of the first picture
        let backend = MockBackend::tripping_after(2, interrupt.clone());
        let mut writer = SiteWriter::new(&options, &backend, &naming, &mut manifest, &interrupt);
        writer.write_site(&root);
        let (stats, _) = writer.finish();

        assert_eq!(stats.pictures_rendered, 1);
        let index = read_output(tmp.path(), "index.htm");
        assert!(index.ends_with("</html>"));
        assert_eq!(count_occurrences(&index, "pictureThumbnailCell"), 1);
        assert!(!manifest.contains("00002_l.jpg"));
    }

    #[test]
    fn map_only_when_location_known() {
        let tmp = TempDir::new().unwrap();
        let mut options = options_in(tmp.path());
        options.midres.map = true;
        options.midres.maps_api_key = "K".into();
        let mut root = into_group(group("R", vec![picture("a.jpg"), picture("b.jpg")]));
        if let SiteNode::Picture(p) = &mut root.children[0] {
            p.location = Some(LatLng { lat: 1.0, lng: 2.0 });
        }
        walk(&options, &root, &MockBackend::new());

        assert!(read_output(tmp.path(), "00001.htm").contains(r#"id="map""#));
        assert!(!read_output(tmp.path(), "00002.htm").contains(r#"id="map""#));
    }

    #[test]
    fn page_write_failure_is_counted_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let options = options_in(tmp.path());
        // a directory where the picture page should go
        std::fs::create_dir_all(tmp.path().join("00001.htm")).unwrap();
        let root = into_group(group("R", vec![picture("a.jpg"), picture("b.jpg")]));
        let (stats, _) = walk(&options, &root, &MockBackend::new());

        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.pictures_rendered, 2);
        assert!(tmp.path().join("00002.htm").is_file());
        assert!(!tmp.path().join("00001.htm.partial").exists());
    }

    #[test]
    fn static_assets_follow_flags() {
        let tmp = TempDir::new().unwrap();
        let mut options = options_in(tmp.path());
        options.site.robots_txt = false;
        options.midres.mouseover = true;
        let mut manifest = Manifest::new();
        let failures = write_static_assets(&options, &mut manifest);

        assert!(failures.is_empty());
        assert_eq!(manifest.files(), [STYLESHEET, MOUSEOVER_SCRIPT]);
        let css = read_output(tmp.path(), STYLESHEET);
        assert!(css.starts_with(":root {"));
        assert!(!tmp.path().join(ROBOTS_TXT).exists());
    }

    #[test]
    fn walk_output_is_deterministic() {
        let root = into_group(group(
            "R",
            vec![picture("a.jpg"), group("S", vec![picture("b.jpg")])],
        ));
        let mut pages = Vec::new();
        for _ in 0..2 {
            let tmp = TempDir::new().unwrap();
            let mut options = options_in(tmp.path());
            options.naming.mode = NamingMode::Hash;
            let (_, manifest) = walk(&options, &root, &MockBackend::new());
            let html: Vec<String> = manifest
                .iter()
                .filter(|f| f.ends_with(".htm"))
                .map(|f| read_output(tmp.path(), f))
                .collect();
            pages.push((manifest.files().to_vec(), html));
        }
        assert_eq!(pages[0], pages[1]);
    }
}
