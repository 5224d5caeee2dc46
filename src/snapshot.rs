//! Static snapshot generation.
//!
//! Walks the route catalog and turns every `GET` route into static files:
//!
//! ```text
//! public/
//! ├── gems/
//! │   ├── index.html          # Page, image references rewritten
//! │   └── assets/
//! │       ├── gems.css        # Stylesheet bundle, source comments stripped
//! │       ├── gems.js         # Script bundle, unmodified
//! │       └── ruby.png        # Relocated image
//! └── rack/
//!     └── ...
//! ```
//!
//! ## Failure Handling
//!
//! A broken route never aborts the run. Non-200 responses and missing image
//! sources become [`RouteFailure`] entries in the [`SnapshotResult`] and the
//! crawl moves on. Only environment problems (the output root cannot be
//! created, a write fails) surface as [`SnapshotError`].
//!
//! Relocation is all-or-nothing per page: if any referenced image is missing,
//! each missing file is reported, nothing is copied, and the page is written
//! exactly as rendered.
//!
//! ## Idempotence
//!
//! Every write truncates, and each run starts from scratch, so running twice
//! against an unchanged site produces byte-identical trees. Within a run the
//! writer remembers what it wrote where: an identical rewrite of the same file
//! (two pages sharing an image) is skipped, a differing one replaces the
//! earlier content and is logged as a collision.

use crate::responder::{Responder, Variant};
use crate::rewrite::Rewriter;
use crate::routes::{self, Route, RouteCatalog};
use crate::types::{EntryContent, OutputEntry};
use regex::bytes::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("cannot create output root {}: {source}", path.display())]
    OutputRoot {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where and how a snapshot is written.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub output_root: PathBuf,
    /// Per-route directory name for bundles and relocated images.
    pub assets_prefix: String,
    /// Directory holding `assets/images/`, the source of relocated images.
    pub source_base: PathBuf,
    pub strip_stylesheet_comments: bool,
}

impl SnapshotOptions {
    pub fn new(output_root: impl Into<PathBuf>, source_base: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            assets_prefix: "assets".to_string(),
            source_base: source_base.into(),
            strip_stylesheet_comments: true,
        }
    }
}

/// Why a route (or part of it) did not make it into the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The page or one of its bundles answered with a non-200 status.
    Fetch { variant: Variant, status: u16 },
    /// A rewritten reference points at an image that could not be read.
    MissingSourceAsset { source: PathBuf },
    /// The route path cannot be mapped into the output tree.
    InvalidPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteFailure {
    pub path: String,
    #[serde(flatten)]
    pub kind: FailureKind,
}

impl RouteFailure {
    /// Status code of a fetch failure.
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            FailureKind::Fetch { status, .. } => Some(status),
            _ => None,
        }
    }
}

impl fmt::Display for RouteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Fetch { variant, status } => {
                write!(f, "GET {} ({variant}) returned {status}", self.path)
            }
            FailureKind::MissingSourceAsset { source } => {
                write!(f, "{}: missing image {}", self.path, source.display())
            }
            FailureKind::InvalidPath => write!(f, "{}: not a mappable route path", self.path),
        }
    }
}

/// Outcome of a snapshot run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotResult {
    /// Routes visited.
    pub routes: usize,
    /// Distinct files written.
    pub written: usize,
    /// Output-relative path → SHA-256 of the written content.
    pub files: BTreeMap<String, String>,
    pub failures: Vec<RouteFailure>,
}

impl SnapshotResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// `/* ... */` blocks that end a line, as left behind by stylesheet
/// preprocessors (`/* line 12, /home/me/app/assets/stylesheets/gems.scss */`).
///
/// Byte-oriented so stylesheets in any encoding pass through intact; a match
/// never extends past the first `*/` of the comment it starts in.
static SOURCE_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)/\*[^*]*\*+(?:[^/*][^*]*\*+)*/\n").expect("source comment pattern")
});

/// Remove comment blocks followed by a newline from a stylesheet.
pub fn strip_source_comments(css: &[u8]) -> Vec<u8> {
    SOURCE_COMMENT.replace_all(css, &b""[..]).into_owned()
}

/// Writes files under the output root, remembering content per destination.
struct TreeWriter<'a> {
    root: &'a Path,
    files: BTreeMap<String, String>,
}

impl<'a> TreeWriter<'a> {
    fn new(root: &'a Path) -> Self {
        Self {
            root,
            files: BTreeMap::new(),
        }
    }

    fn ensure_dir(&self, rel: &Path) -> Result<(), SnapshotError> {
        let path = self.root.join(rel);
        fs::create_dir_all(&path).map_err(|source| SnapshotError::CreateDir { path, source })
    }

    /// Create-or-truncate the entry's file, creating parent directories.
    fn write(&mut self, entry: OutputEntry) -> Result<(), SnapshotError> {
        let bytes = match entry.content {
            EntryContent::Inline(bytes) => bytes,
            EntryContent::CopyFrom(source) => {
                debug!("Copy: {} -> {}", source.display(), entry.path.display());
                fs::read(&source).map_err(|err| SnapshotError::Read {
                    path: source,
                    source: err,
                })?
            }
        };
        self.write_bytes(&entry.path, &bytes)
    }

    fn write_bytes(&mut self, rel: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
        let key = rel.to_string_lossy().replace('\\', "/");
        let digest = format!("{:x}", Sha256::digest(bytes));

        match self.files.get(&key) {
            Some(previous) if *previous == digest => {
                debug!("Unchanged: {key}");
                return Ok(());
            }
            Some(_) => warn!("{key} written twice with different content, keeping the last"),
            None => {}
        }

        if let Some(parent) = rel.parent() {
            self.ensure_dir(parent)?;
        }
        let path = self.root.join(rel);
        fs::write(&path, bytes).map_err(|source| SnapshotError::Write { path, source })?;
        self.files.insert(key, digest);
        Ok(())
    }
}

/// Snapshot every route in `catalog` into `options.output_root`.
///
/// Per-route problems are collected in [`SnapshotResult::failures`]; only
/// environment failures return `Err`.
pub fn run(
    catalog: &RouteCatalog<'_>,
    responder: &Responder<'_>,
    rewriter: &Rewriter,
    options: &SnapshotOptions,
) -> Result<SnapshotResult, SnapshotError> {
    fs::create_dir_all(&options.output_root).map_err(|source| SnapshotError::OutputRoot {
        path: options.output_root.clone(),
        source,
    })?;

    let mut writer = TreeWriter::new(&options.output_root);
    let mut result = SnapshotResult::default();

    for route in catalog.list_get_routes() {
        result.routes += 1;
        snapshot_route(&route, responder, rewriter, options, &mut writer, &mut result)?;
    }

    result.written = writer.files.len();
    result.files = writer.files;
    Ok(result)
}

fn record(result: &mut SnapshotResult, path: &str, kind: FailureKind) {
    let failure = RouteFailure {
        path: path.to_string(),
        kind,
    };
    warn!("failed: {failure}");
    result.failures.push(failure);
}

fn snapshot_route(
    route: &Route,
    responder: &Responder<'_>,
    rewriter: &Rewriter,
    options: &SnapshotOptions,
    writer: &mut TreeWriter<'_>,
    result: &mut SnapshotResult,
) -> Result<(), SnapshotError> {
    let (Some(dir), Some(stem)) = (
        routes::route_dir(&route.path),
        routes::bundle_stem(&route.path),
    ) else {
        record(result, &route.path, FailureKind::InvalidPath);
        return Ok(());
    };
    let assets_dir = dir.join(&options.assets_prefix);
    info!("GET {} → {}", route.path, dir.join("index.html").display());

    let page = responder.respond(&route.path, Variant::Page);
    if !page.is_success() {
        record(
            result,
            &route.path,
            FailureKind::Fetch {
                variant: Variant::Page,
                status: page.status,
            },
        );
        return Ok(());
    }

    let body = relocate_resources(
        &route.path,
        page.body,
        &assets_dir,
        rewriter,
        options,
        writer,
        result,
    )?;
    writer.write(OutputEntry::inline(dir.join("index.html"), body))?;

    writer.ensure_dir(&assets_dir)?;
    let css = responder.respond(&route.path, Variant::Stylesheet);
    if css.is_success() {
        let css_body = if options.strip_stylesheet_comments {
            strip_source_comments(&css.body)
        } else {
            css.body
        };
        writer.write(OutputEntry::inline(
            assets_dir.join(format!("{stem}.css")),
            css_body,
        ))?;
    } else {
        record(
            result,
            &route.path,
            FailureKind::Fetch {
                variant: Variant::Stylesheet,
                status: css.status,
            },
        );
    }

    let js = responder.respond(&route.path, Variant::Script);
    if js.is_success() {
        writer.write(OutputEntry::inline(
            assets_dir.join(format!("{stem}.js")),
            js.body,
        ))?;
    } else {
        record(
            result,
            &route.path,
            FailureKind::Fetch {
                variant: Variant::Script,
                status: js.status,
            },
        );
    }

    Ok(())
}

/// Run the page through the rewriter and perform its copies.
///
/// Returns the body to write: rewritten when every referenced image could be
/// read, otherwise the page as rendered.
fn relocate_resources(
    route_path: &str,
    body: Vec<u8>,
    assets_dir: &Path,
    rewriter: &Rewriter,
    options: &SnapshotOptions,
    writer: &mut TreeWriter<'_>,
    result: &mut SnapshotResult,
) -> Result<Vec<u8>, SnapshotError> {
    let Ok(html) = std::str::from_utf8(&body) else {
        debug!("{route_path}: page is not UTF-8, skipping resource rewrite");
        return Ok(body);
    };
    if !rewriter.may_match(html) {
        return Ok(body);
    }

    let dest_rel_dir = assets_dir.to_string_lossy().replace('\\', "/");
    let rewritten = rewriter.process(html, &options.source_base, &dest_rel_dir);
    if rewritten.copies.is_empty() {
        return Ok(body);
    }

    let mut missing = false;
    for entry in &rewritten.copies {
        if let EntryContent::CopyFrom(source) = &entry.content {
            if !source.is_file() {
                record(
                    result,
                    route_path,
                    FailureKind::MissingSourceAsset {
                        source: source.clone(),
                    },
                );
                missing = true;
            }
        }
    }
    if missing {
        return Ok(body);
    }

    writer.ensure_dir(assets_dir)?;
    for entry in rewritten.copies {
        writer.write(entry)?;
    }
    Ok(rewritten.html.into_bytes())
}
