//! Shared test utilities for the route-snapshot test suite.
//!
//! Provides an in-memory [`StubServer`] that plays route source, page renderer
//! and asset bundler at once, plus fixture setup for tests that need a real
//! site directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let server = StubServer::new()
//!     .page("/gems", "<img src=\"ruby.png\">")
//!     .failing_page("/broken", 500)
//!     .asset("/gems.css", "body {}");
//!
//! let catalog = RouteCatalog::new(&server);
//! let responder = Responder::new(&server, &server);
//! ```

use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

use crate::responder::{AssetBundler, PageRenderer, RenderedResponse};
use crate::routes::{Route, RouteSource};

// =========================================================================
// Stub server
// =========================================================================

/// Route table, pages and bundles held in memory.
///
/// Routes are listed in registration order. Unregistered pages and assets
/// answer 404.
#[derive(Default)]
pub struct StubServer {
    routes: Vec<Route>,
    pages: HashMap<String, RenderedResponse>,
    assets: HashMap<String, RenderedResponse>,
}

impl StubServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `GET` route whose page renders `body` with status 200.
    pub fn page(self, path: &str, body: &str) -> Self {
        self.respond_page(path, RenderedResponse::ok(body))
    }

    /// Register a `GET` route whose page fails with `status`.
    pub fn failing_page(self, path: &str, status: u16) -> Self {
        self.respond_page(
            path,
            RenderedResponse {
                status,
                body: Vec::new(),
            },
        )
    }

    /// Register a route that is not `GET`; it must never be fetched.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Serve `body` for a bundle request such as `/gems.css`.
    pub fn asset(mut self, path_with_extension: &str, body: &str) -> Self {
        self.assets
            .insert(path_with_extension.to_string(), RenderedResponse::ok(body));
        self
    }

    fn respond_page(mut self, path: &str, response: RenderedResponse) -> Self {
        self.routes.push(Route::get(path));
        self.pages.insert(path.to_string(), response);
        self
    }
}

impl RouteSource for StubServer {
    fn routes(&self) -> Vec<Route> {
        self.routes.clone()
    }
}

impl PageRenderer for StubServer {
    fn render(&self, path: &str) -> RenderedResponse {
        self.pages
            .get(path)
            .cloned()
            .unwrap_or_else(RenderedResponse::not_found)
    }
}

impl AssetBundler for StubServer {
    fn render_asset(&self, path_with_extension: &str) -> RenderedResponse {
        self.assets
            .get(path_with_extension)
            .cloned()
            .unwrap_or_else(RenderedResponse::not_found)
    }
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}
