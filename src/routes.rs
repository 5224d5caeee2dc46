//! Route catalog: the ordered set of routes a snapshot walks.
//!
//! Routes come from a [`RouteSource`] (the live route table of whatever serves
//! the content) and are handed to the snapshot writer through a
//! [`RouteCatalog`] value. There is no global route registry: the catalog is
//! built by the caller and passed in explicitly.
//!
//! ## Path Mapping
//!
//! Route paths map onto the output tree deterministically:
//!
//! ```text
//! /            →  index.html            assets/index.css
//! /gems        →  gems/index.html       gems/assets/gems.css
//! /ruby/rack/  →  ruby/rack/index.html  ruby/rack/assets/ruby/rack.css
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// HTTP method a route answers to. Only `GET` routes are snapshotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A servable (path, method) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub path: String,
    pub method: Method,
}

impl Route {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
        }
    }
}

/// Anything that can list its registered routes.
///
/// Implementations must be side-effect free: the catalog may query the source
/// any number of times.
pub trait RouteSource {
    fn routes(&self) -> Vec<Route>;
}

/// Routes to snapshot, optionally narrowed to a single path.
pub struct RouteCatalog<'a> {
    source: &'a dyn RouteSource,
    only: Option<String>,
}

impl<'a> RouteCatalog<'a> {
    pub fn new(source: &'a dyn RouteSource) -> Self {
        Self { source, only: None }
    }

    /// Restrict the catalog to one route path (single-page regeneration).
    pub fn only(mut self, path: impl Into<String>) -> Self {
        self.only = Some(path.into());
        self
    }

    /// All `GET` routes in declaration order, re-queried from the source on
    /// every call.
    ///
    /// With a path filter set, yields at most that one route; a filter that
    /// matches nothing yields an empty list.
    pub fn list_get_routes(&self) -> Vec<Route> {
        match &self.only {
            Some(path) => self.select_route(path).into_iter().collect(),
            None => self
                .source
                .routes()
                .into_iter()
                .filter(|r| r.method == Method::Get)
                .collect(),
        }
    }

    /// Look up the `GET` route registered for `path`.
    pub fn select_route(&self, path: &str) -> Option<Route> {
        self.source
            .routes()
            .into_iter()
            .find(|r| r.method == Method::Get && r.path == path)
    }
}

/// Split a route path into its segments, rejecting anything that could escape
/// the output root.
fn segments(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    let parts: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if parts
        .iter()
        .any(|s| *s == "." || *s == ".." || s.contains('\\'))
    {
        return None;
    }
    Some(parts)
}

/// Output-relative directory a route's page lives in.
///
/// - `"/gems"` → `gems`
/// - `"/ruby/rack/"` → `ruby/rack`
/// - `"/"` → empty path (the output root itself)
///
/// Returns `None` for relative paths and paths with `.`/`..` segments.
pub fn route_dir(path: &str) -> Option<PathBuf> {
    Some(segments(path)?.iter().collect())
}

/// File stem of a route's stylesheet and script bundles.
///
/// The root route has no name of its own and uses `index`.
pub fn bundle_stem(path: &str) -> Option<String> {
    let parts = segments(path)?;
    if parts.is_empty() {
        Some("index".to_string())
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct Table(Vec<Route>);

    impl RouteSource for Table {
        fn routes(&self) -> Vec<Route> {
            self.0.clone()
        }
    }

    fn table() -> Table {
        Table(vec![
            Route::get("/gems"),
            Route {
                path: "/login".to_string(),
                method: Method::Post,
            },
            Route::get("/rack"),
            Route::get("/oop"),
        ])
    }

    #[test]
    fn lists_get_routes_in_declaration_order() {
        let source = table();
        let catalog = RouteCatalog::new(&source);
        let paths: Vec<String> = catalog
            .list_get_routes()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths, vec!["/gems", "/rack", "/oop"]);
    }

    #[test]
    fn empty_source_is_empty_catalog() {
        let source = Table(Vec::new());
        assert!(RouteCatalog::new(&source).list_get_routes().is_empty());
    }

    #[test]
    fn select_route_finds_get_route() {
        let source = table();
        let catalog = RouteCatalog::new(&source);
        assert_eq!(catalog.select_route("/rack"), Some(Route::get("/rack")));
    }

    #[test]
    fn select_route_ignores_non_get() {
        let source = table();
        assert_eq!(RouteCatalog::new(&source).select_route("/login"), None);
    }

    #[test]
    fn select_route_unknown_is_none() {
        let source = table();
        assert_eq!(RouteCatalog::new(&source).select_route("/nope"), None);
    }

    #[test]
    fn filtered_catalog_yields_single_route() {
        let source = table();
        let catalog = RouteCatalog::new(&source).only("/oop");
        assert_eq!(catalog.list_get_routes(), vec![Route::get("/oop")]);
    }

    #[test]
    fn filtered_catalog_without_match_is_empty() {
        let source = table();
        let catalog = RouteCatalog::new(&source).only("/missing");
        assert!(catalog.list_get_routes().is_empty());
    }

    #[test]
    fn route_dir_mapping() {
        assert_eq!(route_dir("/gems").unwrap(), Path::new("gems"));
        assert_eq!(route_dir("/ruby/rack/").unwrap(), Path::new("ruby/rack"));
        assert_eq!(route_dir("/").unwrap(), Path::new(""));
    }

    #[test]
    fn route_dir_rejects_escaping_paths() {
        assert_eq!(route_dir("gems"), None);
        assert_eq!(route_dir("/../etc"), None);
        assert_eq!(route_dir("/a/./b"), None);
    }

    #[test]
    fn bundle_stem_mapping() {
        assert_eq!(bundle_stem("/gems").as_deref(), Some("gems"));
        assert_eq!(bundle_stem("/ruby/rack").as_deref(), Some("ruby/rack"));
        assert_eq!(bundle_stem("/").as_deref(), Some("index"));
        assert_eq!(bundle_stem("/.."), None);
    }

    #[test]
    fn method_serializes_uppercase() {
        let json = serde_json::to_string(&Method::Get).unwrap();
        assert_eq!(json, "\"GET\"");
        let m: Method = serde_json::from_str("\"DELETE\"").unwrap();
        assert_eq!(m, Method::Delete);
    }
}
