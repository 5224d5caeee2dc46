//! In-process responder: fetch a route's page or bundles without a network hop.
//!
//! The page renderer and asset bundler are external collaborators described by
//! the [`PageRenderer`] and [`AssetBundler`] traits. [`Responder`] routes each
//! request to the right one and applies the asset naming convention: the
//! stylesheet for `/gems` is requested as `/gems.css`, its script as
//! `/gems.js`.
//!
//! Failures travel in the status code, never in a `Result`, so the snapshot
//! writer handles pages and bundles uniformly.

use crate::routes;
use serde::Serialize;
use std::fmt;

/// The three response kinds fetched per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Page,
    Stylesheet,
    Script,
}

impl Variant {
    /// Extension appended to the route path when asking the bundler.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Variant::Page => None,
            Variant::Stylesheet => Some("css"),
            Variant::Script => Some("js"),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Page => "page",
            Variant::Stylesheet => "stylesheet",
            Variant::Script => "script",
        };
        f.write_str(name)
    }
}

/// Status code and body of one rendered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RenderedResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: Vec::new(),
        }
    }

    pub fn server_error() -> Self {
        Self {
            status: 500,
            body: Vec::new(),
        }
    }

    /// Only `200` counts as success.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Renders the HTML page for a route path.
pub trait PageRenderer {
    fn render(&self, path: &str) -> RenderedResponse;
}

/// Builds the stylesheet or script bundle for `path_with_extension`
/// (`/gems.css`, `/gems.js`).
pub trait AssetBundler {
    fn render_asset(&self, path_with_extension: &str) -> RenderedResponse;
}

/// Dispatches route requests to the renderer or the bundler.
#[derive(Clone, Copy)]
pub struct Responder<'a> {
    renderer: &'a dyn PageRenderer,
    bundler: &'a dyn AssetBundler,
}

impl<'a> Responder<'a> {
    pub fn new(renderer: &'a dyn PageRenderer, bundler: &'a dyn AssetBundler) -> Self {
        Self { renderer, bundler }
    }

    pub fn respond(&self, path: &str, variant: Variant) -> RenderedResponse {
        let Some(extension) = variant.extension() else {
            return self.renderer.render(path);
        };
        match routes::bundle_stem(path) {
            Some(stem) => self
                .bundler
                .render_asset(&format!("/{stem}.{extension}")),
            None => RenderedResponse::not_found(),
        }
    }
}
