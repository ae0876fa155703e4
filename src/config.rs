//! Export configuration.
//!
//! Every knob of an export run lives in one [`ExportOptions`] value, loaded
//! from an `export.toml` file. All sections are optional: stock defaults fill
//! whatever the file leaves out, and unknown keys are rejected to catch typos.
//!
//! ## Configuration Options
//!
//! ```toml
//! target_dir = "site"           # Where the pages and renditions are written
//!
//! [thumbnails]
//! per_row = 3                   # Thumbnail columns on group pages
//! width = 350                   # Lowres bounding box
//! height = 300
//! quality = 80                  # Lowres JPEG quality (0-100)
//! cell_spacing = 10             # Table border spacing in pixels
//!
//! [midres]
//! pages = true                  # One browsing page per picture
//! width = 700                   # Midres bounding box
//! height = 700
//! quality = 80                  # Midres JPEG quality (0-100)
//! mouseover = true              # Description pop-ups on the index matrix
//! map = false                   # Map placeholder + coordinates script
//! maps_api_key = ""
//!
//! [highres]
//! export = false                # Copy originals into the site
//! rotate = false                # Re-encode rotated originals instead of copying
//! link_to_original = false      # Link midres images to the original location
//! zip = false                   # Bundle highres pictures into a download zip
//! zip_name = "pictures.zip"
//!
//! [naming]
//! mode = "hash"                 # "hash" | "original_name" | "sequential"
//! start = 1                     # First number in sequential mode
//!
//! [scaling]
//! steps = 1                     # Progressive downscale steps (1 = direct)
//!
//! [site]
//! robots_txt = false            # Write a robots.txt that disallows indexing
//!
//! [colors]
//! background = "#222222"
//! text = "#eeeeee"
//!
//! [output]
//! target = "local"              # "local" | "ftp" | "ssh"
//! ```
//!
//! FTP and SSH targets carry their credentials in the same table:
//!
//! ```toml
//! [output]
//! target = "ssh"
//! server = "example.org"
//! port = 22
//! user = "me"
//! target_dir = "public_html"
//!
//! [output.auth]
//! method = "key_file"           # or: method = "password", password = "..."
//! path = "/home/me/.ssh/id_ed25519"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Options for one export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportOptions {
    /// Directory receiving every generated file.
    pub target_dir: PathBuf,
    pub thumbnails: ThumbnailOptions,
    pub midres: MidresOptions,
    pub highres: HighresOptions,
    pub naming: NamingOptions,
    pub scaling: ScalingOptions,
    pub site: SiteOptions,
    pub colors: ColorOptions,
    pub output: OutputTarget,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("site"),
            thumbnails: ThumbnailOptions::default(),
            midres: MidresOptions::default(),
            highres: HighresOptions::default(),
            naming: NamingOptions::default(),
            scaling: ScalingOptions::default(),
            site: SiteOptions::default(),
            colors: ColorOptions::default(),
            output: OutputTarget::Local,
        }
    }
}

impl ExportOptions {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnails.per_row == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.per_row must be at least 1".into(),
            ));
        }
        if self.thumbnails.quality > 100 {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 0-100".into(),
            ));
        }
        if self.midres.quality > 100 {
            return Err(ConfigError::Validation("midres.quality must be 0-100".into()));
        }
        if [
            self.thumbnails.width,
            self.thumbnails.height,
            self.midres.width,
            self.midres.height,
        ]
        .contains(&0)
        {
            return Err(ConfigError::Validation(
                "rendition dimensions must be non-zero".into(),
            ));
        }
        if self.scaling.steps == 0 {
            return Err(ConfigError::Validation(
                "scaling.steps must be at least 1".into(),
            ));
        }
        if self.naming.start > MAX_SEQUENCE_NUMBER {
            return Err(ConfigError::Validation(format!(
                "naming.start must be at most {MAX_SEQUENCE_NUMBER}"
            )));
        }
        if self.highres.zip && self.highres.zip_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "highres.zip_name must not be empty when highres.zip is on".into(),
            ));
        }
        self.output.validate()
    }

    /// Lowres bounding box as `(width, height)`.
    pub fn thumbnail_box(&self) -> (u32, u32) {
        (self.thumbnails.width, self.thumbnails.height)
    }

    /// Midres bounding box as `(width, height)`.
    pub fn midres_box(&self) -> (u32, u32) {
        (self.midres.width, self.midres.height)
    }
}

/// Group page thumbnail table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailOptions {
    pub per_row: usize,
    pub width: u32,
    pub height: u32,
    /// Lowres JPEG quality (0 = worst, 100 = best).
    pub quality: u8,
    pub cell_spacing: u32,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            per_row: 3,
            width: 350,
            height: 300,
            quality: 80,
            cell_spacing: 10,
        }
    }
}

impl ThumbnailOptions {
    /// Pixel width of the group table: all columns plus the gaps between them.
    pub fn table_width(&self) -> u32 {
        let cols = self.per_row as u32;
        cols * self.width + cols.saturating_sub(1) * self.cell_spacing
    }
}

/// Midres rendition and per-picture page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MidresOptions {
    pub pages: bool,
    pub width: u32,
    pub height: u32,
    /// Midres JPEG quality (0 = worst, 100 = best).
    pub quality: u8,
    pub mouseover: bool,
    pub map: bool,
    pub maps_api_key: String,
}

impl Default for MidresOptions {
    fn default() -> Self {
        Self {
            pages: true,
            width: 700,
            height: 700,
            quality: 80,
            mouseover: true,
            map: false,
            maps_api_key: String::new(),
        }
    }
}

/// Highres export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighresOptions {
    pub export: bool,
    pub rotate: bool,
    pub link_to_original: bool,
    /// Cleared by the export run when the archive cannot be created.
    pub zip: bool,
    pub zip_name: String,
}

impl Default for HighresOptions {
    fn default() -> Self {
        Self {
            export: false,
            rotate: false,
            link_to_original: false,
            zip: false,
            zip_name: "pictures.zip".to_string(),
        }
    }
}

/// How pictures are mapped to output filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    #[default]
    Hash,
    OriginalName,
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingOptions {
    pub mode: NamingMode,
    /// First number handed out in sequential mode.
    pub start: u32,
}

/// Largest number a sequential filename may carry (five digits).
pub const MAX_SEQUENCE_NUMBER: u32 = 99_999;

impl NamingOptions {
    /// Check that sequential numbering of `pictures` pictures stays within
    /// five digits. Other modes accept any count.
    pub fn check_capacity(&self, pictures: usize) -> Result<(), ConfigError> {
        if self.mode != NamingMode::Sequential || pictures == 0 {
            return Ok(());
        }
        let last = u64::from(self.start) + pictures as u64 - 1;
        if last > u64::from(MAX_SEQUENCE_NUMBER) {
            return Err(ConfigError::Validation(format!(
                "sequential numbering from {} runs past {MAX_SEQUENCE_NUMBER} for {pictures} pictures",
                self.start
            )));
        }
        Ok(())
    }
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            mode: NamingMode::Hash,
            start: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalingOptions {
    /// Number of progressive downscale passes per rendition.
    pub steps: u32,
}

impl Default for ScalingOptions {
    fn default() -> Self {
        Self { steps: 1 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteOptions {
    pub robots_txt: bool,
}

/// Page colors, injected as CSS custom properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorOptions {
    pub background: String,
    pub text: String,
}

impl Default for ColorOptions {
    fn default() -> Self {
        Self {
            background: "#222222".to_string(),
            text: "#eeeeee".to_string(),
        }
    }
}

/// Where the finished site goes once every file is written locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum OutputTarget {
    /// Files stay in `target_dir`.
    #[default]
    Local,
    Ftp(FtpTarget),
    Ssh(SshTarget),
}

impl OutputTarget {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            OutputTarget::Local => Ok(()),
            OutputTarget::Ftp(ftp) if ftp.server.is_empty() => Err(ConfigError::Validation(
                "output.server must be set for the ftp target".into(),
            )),
            OutputTarget::Ssh(ssh) if ssh.server.is_empty() => Err(ConfigError::Validation(
                "output.server must be set for the ssh target".into(),
            )),
            OutputTarget::Ssh(SshTarget {
                auth: SshAuth::KeyFile { path },
                ..
            }) if path.as_os_str().is_empty() => Err(ConfigError::Validation(
                "output.auth.path must be set for key file authentication".into(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FtpTarget {
    pub server: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Literal prefix of every remote path; include the trailing separator.
    #[serde(default)]
    pub target_dir: String,
}

fn default_ftp_port() -> u16 {
    21
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshTarget {
    pub server: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    pub auth: SshAuth,
    /// Remote directory the scp sink is started in.
    #[serde(default)]
    pub target_dir: String,
}

fn default_ssh_port() -> u16 {
    22
}

/// SSH credentials. Password and key file are mutually exclusive.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SshAuth {
    Password { password: String },
    KeyFile { path: PathBuf },
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshAuth::Password { .. } => f.write_str("Password(***)"),
            SshAuth::KeyFile { path } => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Parse options from TOML text and validate them.
pub fn parse_options(content: &str) -> Result<ExportOptions, ConfigError> {
    let options: ExportOptions = toml::from_str(content)?;
    options.validate()?;
    Ok(options)
}

/// Load options from a file; a missing file yields the validated defaults.
pub fn load_options(path: &Path) -> Result<ExportOptions, ConfigError> {
    if !path.exists() {
        let options = ExportOptions::default();
        options.validate()?;
        return Ok(options);
    }
    let content = fs::read_to_string(path)?;
    parse_options(&content)
}

/// A documented `export.toml` with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r##"# photo-publish export configuration
# All options are optional - defaults shown below.

# Directory receiving the generated pages and pictures.
target_dir = "site"

[thumbnails]
# Thumbnail columns per row on group pages.
per_row = 3
# Bounding box of the lowres rendition, in pixels.
width = 350
height = 300
# Lowres JPEG quality (0-100).
quality = 80
# Spacing between table cells, in pixels.
cell_spacing = 10

[midres]
# Generate one browsing page per picture.
pages = true
# Bounding box of the midres rendition, in pixels.
width = 700
height = 700
# Midres JPEG quality (0-100).
quality = 80
# Show picture details when hovering over the index matrix.
mouseover = true
# Add a map placeholder and the picture coordinates to each page.
map = false
maps_api_key = ""

[highres]
# Copy the original pictures into the site.
export = false
# Re-encode rotated originals instead of copying them verbatim.
rotate = false
# Link the midres picture to the original's location instead.
link_to_original = false
# Bundle the highres pictures into one downloadable zip.
zip = false
zip_name = "pictures.zip"

[naming]
# "hash", "original_name" or "sequential".
mode = "hash"
# First number used by sequential naming. Numbers stay within five digits.
start = 1

[scaling]
# Progressive downscale passes; more passes give smoother small renditions.
steps = 1

[site]
# Write a robots.txt asking crawlers to stay away.
robots_txt = false

[colors]
background = "#222222"
text = "#eeeeee"

[output]
# "local" keeps the files in target_dir. "ftp" and "ssh" upload them:
#
#   target = "ftp"
#   server = "ftp.example.org"
#   port = 21
#   user = "me"
#   password = "secret"
#   target_dir = "/htdocs/pictures/"
#
#   target = "ssh"
#   server = "example.org"
#   port = 22
#   user = "me"
#   target_dir = "public_html/pictures"
#   [output.auth]
#   method = "key_file"    # or "password" with password = "..."
#   path = "/home/me/.ssh/id_ed25519"
target = "local"
"##
}

/// CSS custom properties for the configured colors.
pub fn generate_color_css(colors: &ColorOptions) -> String {
    format!(
        ":root {{\n    --color-bg: {};\n    --color-text: {};\n}}",
        colors.background, colors.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        let options = ExportOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.thumbnails.per_row, 3);
        assert_eq!(options.naming.mode, NamingMode::Hash);
        assert_eq!(options.naming.start, 1);
        assert_eq!(options.output, OutputTarget::Local);
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let options = parse_options(stock_config_toml()).unwrap();
        let defaults = ExportOptions::default();
        assert_eq!(options.target_dir, defaults.target_dir);
        assert_eq!(options.thumbnails.width, defaults.thumbnails.width);
        assert_eq!(options.midres.quality, defaults.midres.quality);
        assert_eq!(options.highres.zip_name, defaults.highres.zip_name);
        assert_eq!(options.output, OutputTarget::Local);
    }

    #[test]
    fn parse_partial_config() {
        let options = parse_options(
            r#"
            [naming]
            mode = "sequential"
            start = 42
            "#,
        )
        .unwrap();
        assert_eq!(options.naming.mode, NamingMode::Sequential);
        assert_eq!(options.naming.start, 42);
        assert_eq!(options.thumbnails.per_row, 3);
    }

    #[test]
    fn parse_ftp_target() {
        let options = parse_options(
            r#"
            [output]
            target = "ftp"
            server = "ftp.example.org"
            user = "me"
            password = "pw"
            target_dir = "/htdocs/"
            "#,
        )
        .unwrap();
        match options.output {
            OutputTarget::Ftp(ftp) => {
                assert_eq!(ftp.server, "ftp.example.org");
                assert_eq!(ftp.port, 21);
                assert_eq!(ftp.target_dir, "/htdocs/");
            }
            other => panic!("expected ftp target, got {other:?}"),
        }
    }

    #[test]
    fn parse_ssh_target_with_key_file() {
        let options = parse_options(
            r#"
            [output]
            target = "ssh"
            server = "example.org"
            user = "me"
            target_dir = "www"

            [output.auth]
            method = "key_file"
            path = "/home/me/.ssh/id_ed25519"
            "#,
        )
        .unwrap();
        match options.output {
            OutputTarget::Ssh(ssh) => {
                assert_eq!(ssh.port, 22);
                assert_eq!(
                    ssh.auth,
                    SshAuth::KeyFile {
                        path: PathBuf::from("/home/me/.ssh/id_ed25519")
                    }
                );
            }
            other => panic!("expected ssh target, got {other:?}"),
        }
    }

    #[test]
    fn ssh_auth_debug_hides_password() {
        let auth = SshAuth::Password {
            password: "hunter2".into(),
        };
        assert!(!format!("{auth:?}").contains("hunter2"));
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_options(
            r#"
            [thumbnails]
            per_rows = 4
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validate_quality_upper_bound() {
        let mut options = ExportOptions::default();
        options.midres.quality = 101;
        assert!(matches!(
            options.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_sequence_start_limit() {
        let mut options = ExportOptions::default();
        options.naming.start = MAX_SEQUENCE_NUMBER;
        assert!(options.validate().is_ok());
        options.naming.start = u32::MAX;
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("naming.start"));
    }

    #[test]
    fn sequential_capacity_counts_every_picture() {
        let naming = NamingOptions {
            mode: NamingMode::Sequential,
            start: 99_998,
        };
        assert!(naming.check_capacity(2).is_ok());
        assert!(matches!(
            naming.check_capacity(3),
            Err(ConfigError::Validation(_))
        ));
        assert!(naming.check_capacity(0).is_ok());

        let hashed = NamingOptions {
            mode: NamingMode::Hash,
            start: 99_998,
        };
        assert!(hashed.check_capacity(1_000_000).is_ok());
    }

    #[test]
    fn validate_zero_columns_rejected() {
        let mut options = ExportOptions::default();
        options.thumbnails.per_row = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn validate_ssh_without_server_rejected() {
        let mut options = ExportOptions::default();
        options.output = OutputTarget::Ssh(SshTarget {
            server: String::new(),
            port: 22,
            user: "me".into(),
            auth: SshAuth::Password {
                password: "pw".into(),
            },
            target_dir: String::new(),
        });
        assert!(options.validate().is_err());
    }

    #[test]
    fn table_width_counts_gaps_between_columns() {
        let thumbs = ThumbnailOptions {
            per_row: 3,
            width: 100,
            cell_spacing: 10,
            ..ThumbnailOptions::default()
        };
        assert_eq!(thumbs.table_width(), 320);
    }

    #[test]
    fn load_options_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let options = load_options(&tmp.path().join("export.toml")).unwrap();
        assert_eq!(options.target_dir, PathBuf::from("site"));
    }

    #[test]
    fn load_options_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("export.toml");
        std::fs::write(&path, "target_dir = \"out\"\n[thumbnails]\nper_row = 5\n").unwrap();
        let options = load_options(&path).unwrap();
        assert_eq!(options.target_dir, PathBuf::from("out"));
        assert_eq!(options.thumbnails.per_row, 5);
    }

    #[test]
    fn color_css_uses_config_colors() {
        let css = generate_color_css(&ColorOptions {
            background: "#000".into(),
            text: "#fff".into(),
        });
        assert!(css.contains("--color-bg: #000"));
        assert!(css.contains("--color-text: #fff"));
    }
}
