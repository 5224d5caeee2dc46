//! File-backed content server.
//!
//! A [`Site`] is a directory with a `site.toml`, views and assets. It answers
//! every collaborator interface the snapshot needs, in-process:
//!
//! - [`RouteSource`]: the `[[routes]]` table, in file order
//! - [`PageRenderer`]: the route's view inside the page layout
//! - [`AssetBundler`]: per-route stylesheet and script bundles
//!
//! ## Views
//!
//! A route's view is `views/<view>.md` (Markdown, converted with
//! pulldown-cmark) or `views/<view>.html` (an HTML fragment used verbatim),
//! wrapped in a Maud layout that links the route's bundles at their place in
//! the output tree, root-relative like relocated images:
//!
//! ```text
//! /gems  →  <link rel="stylesheet" href="/gems/assets/gems.css">
//!           <script src="/gems/assets/gems.js"></script>
//! ```
//!
//! ## Bundles
//!
//! `/gems.css` resolves to `stylesheets/gems.css` and `/gems.js` to
//! `javascripts/gems.js` under the first load path that has it. Comment
//! lines at the top of a file may declare dependencies:
//!
//! ```text
//! //= require jquery
//! //= require deck/deck.core.js
//! //= require_self
//! //= require deck/extensions/deck.hash
//! ```
//!
//! Stylesheets use the same directives inside a block comment (` *= require
//! base`). Dependencies are inlined in order, each file at most once per
//! bundle; the file's own body goes where `require_self` says, or last.

use crate::config::{self, RouteConfig, SiteConfig};
use crate::responder::{AssetBundler, PageRenderer, RenderedResponse};
use crate::routes::{self, Method, Route, RouteSource};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Site root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

#[derive(Error, Debug)]
enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("required asset {0:?} not found")]
    MissingDependency(String),
}

/// A content site rooted at a directory.
#[derive(Debug, Clone)]
pub struct Site {
    root: PathBuf,
    config: SiteConfig,
}

impl Site {
    /// Load and validate `site.toml` from `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SiteError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SiteError::NotADirectory(root));
        }
        let config = config::load_config(&root)?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn get_route(&self, path: &str) -> Option<&RouteConfig> {
        self.config
            .routes
            .iter()
            .find(|r| r.method == Method::Get && r.path == path)
    }

    fn locate_view(&self, view: &str) -> Option<View> {
        let views = self.root.join("views");
        let markdown = views.join(format!("{view}.md"));
        if markdown.is_file() {
            return Some(View::Markdown(markdown));
        }
        let fragment = views.join(format!("{view}.html"));
        fragment.is_file().then_some(View::Html(fragment))
    }

    /// `GET` routes whose view file does not exist.
    pub fn missing_views(&self) -> Vec<&RouteConfig> {
        self.config
            .routes
            .iter()
            .filter(|r| r.method == Method::Get)
            .filter(|r| self.locate_view(&r.view_name()).is_none())
            .collect()
    }

    fn resolve_asset(&self, kind: AssetKind, logical: &str) -> Option<PathBuf> {
        let logical = logical.trim_start_matches('/');
        if logical
            .split('/')
            .any(|s| s.is_empty() || s == "." || s == "..")
        {
            return None;
        }
        let file_name = if logical.ends_with(&format!(".{}", kind.extension())) {
            logical.to_string()
        } else {
            format!("{logical}.{}", kind.extension())
        };
        self.config
            .assets
            .load_paths
            .iter()
            .map(|lp| self.root.join(lp).join(kind.dir()).join(&file_name))
            .find(|candidate| candidate.is_file())
    }

    fn bundle(
        &self,
        kind: AssetKind,
        file: &Path,
        seen: &mut HashSet<PathBuf>,
        out: &mut String,
    ) -> Result<(), BundleError> {
        if !seen.insert(file.to_path_buf()) {
            return Ok(());
        }
        let source = fs::read_to_string(file)?;
        let (directives, body) = split_directives(&source);

        let mut self_included = false;
        for directive in directives {
            match directive {
                Directive::RequireSelf => {
                    append_part(out, &body);
                    self_included = true;
                }
                Directive::Require(name) => {
                    let dependency = self
                        .resolve_asset(kind, &name)
                        .ok_or(BundleError::MissingDependency(name))?;
                    self.bundle(kind, &dependency, seen, out)?;
                }
            }
        }
        if !self_included {
            append_part(out, &body);
        }
        Ok(())
    }
}

enum View {
    Markdown(PathBuf),
    Html(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetKind {
    Stylesheet,
    Script,
}

impl AssetKind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "css" => Some(AssetKind::Stylesheet),
            "js" => Some(AssetKind::Script),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            AssetKind::Stylesheet => "css",
            AssetKind::Script => "js",
        }
    }

    fn dir(self) -> &'static str {
        match self {
            AssetKind::Stylesheet => "stylesheets",
            AssetKind::Script => "javascripts",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Directive {
    Require(String),
    RequireSelf,
}

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?://|/?\*)=\s*(require_self|require)(?:\s+(\S+))?\s*$")
        .expect("directive pattern")
});

/// Split a source file into its header directives and the remaining body.
///
/// Only the leading run of blank and comment lines is scanned; directive
/// lines are removed, everything else is kept verbatim.
fn split_directives(source: &str) -> (Vec<Directive>, String) {
    let mut directives = Vec::new();
    let mut body = String::with_capacity(source.len());
    let mut in_header = true;

    for line in source.split_inclusive('\n') {
        if in_header {
            let trimmed = line.trim();
            let is_comment = trimmed.is_empty()
                || trimmed.starts_with("//")
                || trimmed.starts_with("/*")
                || trimmed.starts_with('*');
            if !is_comment {
                in_header = false;
            } else if let Some(caps) = DIRECTIVE.captures(line.trim_end_matches(['\r', '\n'])) {
                match (&caps[1], caps.get(2)) {
                    ("require_self", _) => directives.push(Directive::RequireSelf),
                    (_, Some(name)) => directives.push(Directive::Require(
                        name.as_str().trim_matches(['"', '\'']).to_string(),
                    )),
                    (_, None) => debug!("ignoring require without a name: {}", line.trim()),
                }
                continue;
            }
        }
        body.push_str(line);
    }
    (directives, body)
}

fn append_part(out: &mut String, part: &str) {
    if part.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(part);
}

fn layout(title: &str, stylesheet: &str, script: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                link rel="stylesheet" href=(stylesheet);
            }
            body {
                (content)
                script src=(script) {}
            }
        }
    }
}

fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

impl RouteSource for Site {
    fn routes(&self) -> Vec<Route> {
        self.config.routes.iter().map(RouteConfig::route).collect()
    }
}

impl PageRenderer for Site {
    fn render(&self, path: &str) -> RenderedResponse {
        let Some(route) = self.get_route(path) else {
            return RenderedResponse::not_found();
        };
        let (Some(stem), Some(dir)) = (routes::bundle_stem(path), routes::route_dir(path)) else {
            return RenderedResponse::not_found();
        };
        let view_name = route.view_name();
        let Some(view) = self.locate_view(&view_name) else {
            debug!("{path}: no view named {view_name:?}");
            return RenderedResponse::not_found();
        };

        let content = match &view {
            View::Markdown(file) => fs::read_to_string(file).map(|md| markdown_to_html(&md)),
            View::Html(file) => fs::read_to_string(file),
        };
        let content = match content {
            Ok(content) => content,
            Err(err) => {
                warn!("{path}: cannot read view {view_name:?}: {err}");
                return RenderedResponse::server_error();
            }
        };

        let mut assets_url = String::new();
        for segment in dir.iter() {
            assets_url.push('/');
            assets_url.push_str(&segment.to_string_lossy());
        }
        assets_url.push('/');
        assets_url.push_str(&self.config.assets_prefix);
        let page = layout(
            &route.display_title(),
            &format!("{assets_url}/{stem}.css"),
            &format!("{assets_url}/{stem}.js"),
            PreEscaped(content),
        );
        RenderedResponse::ok(page.into_string())
    }
}

impl AssetBundler for Site {
    fn render_asset(&self, path_with_extension: &str) -> RenderedResponse {
        let Some((_, ext)) = path_with_extension.rsplit_once('.') else {
            return RenderedResponse::not_found();
        };
        let Some(kind) = AssetKind::from_extension(ext) else {
            return RenderedResponse::not_found();
        };
        let Some(file) = self.resolve_asset(kind, path_with_extension) else {
            return RenderedResponse::not_found();
        };

        let mut out = String::new();
        match self.bundle(kind, &file, &mut HashSet::new(), &mut out) {
            Ok(()) => RenderedResponse::ok(out),
            Err(err) => {
                warn!("{path_with_extension}: {err}");
                RenderedResponse::server_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{setup_fixtures, write_file};
    use tempfile::TempDir;

    fn site_with(config: &str) -> (TempDir, Site) {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "site.toml", config);
        let site = Site::open(tmp.path()).unwrap();
        (tmp, site)
    }

    const GEMS: &str = r#"
[[routes]]
path = "/gems"
title = "Ruby Gems"
"#;

    fn body(resp: &RenderedResponse) -> String {
        String::from_utf8(resp.body.clone()).unwrap()
    }

    // =========================================================================
    // Opening
    // =========================================================================

    #[test]
    fn open_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = Site::open(tmp.path().join("nope"));
        assert!(matches!(result, Err(SiteError::NotADirectory(_))));
    }

    #[test]
    fn open_invalid_config_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "site.toml", "[[routes]]\npath = \"relative\"\n");
        assert!(matches!(Site::open(tmp.path()), Err(SiteError::Config(_))));
    }

    #[test]
    fn routes_follow_config_order() {
        let (_tmp, site) = site_with(
            r#"
[[routes]]
path = "/b"
[[routes]]
path = "/a"
method = "POST"
"#,
        );
        assert_eq!(
            site.routes(),
            vec![
                Route::get("/b"),
                Route {
                    path: "/a".to_string(),
                    method: Method::Post
                }
            ]
        );
    }

    // =========================================================================
    // Page rendering
    // =========================================================================

    #[test]
    fn renders_markdown_view_in_layout() {
        let (tmp, site) = site_with(GEMS);
        write_file(
            tmp.path(),
            "views/gems.md",
            "# Gems\n\n![ruby](assets/images/ruby.png)\n",
        );

        let resp = site.render("/gems");

        assert!(resp.is_success());
        let html = body(&resp);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Ruby Gems</title>"));
        assert!(html.contains("<h1>Gems</h1>"));
        assert!(html.contains(r#"src="assets/images/ruby.png""#));
        assert!(html.contains(r#"href="/gems/assets/gems.css""#));
        assert!(html.contains(r#"src="/gems/assets/gems.js""#));
    }

    #[test]
    fn renders_html_view_verbatim() {
        let (tmp, site) = site_with(GEMS);
        write_file(tmp.path(), "views/gems.html", "<section class=\"slide\">Hi</section>");

        let html = body(&site.render("/gems"));
        assert!(html.contains("<section class=\"slide\">Hi</section>"));
    }

    #[test]
    fn markdown_view_wins_over_html() {
        let (tmp, site) = site_with(GEMS);
        write_file(tmp.path(), "views/gems.md", "from markdown");
        write_file(tmp.path(), "views/gems.html", "from html");

        let html = body(&site.render("/gems"));
        assert!(html.contains("from markdown"));
        assert!(!html.contains("from html"));
    }

    #[test]
    fn layout_uses_configured_prefix() {
        let (tmp, site) = site_with(&format!("assets_prefix = \"static\"\n{GEMS}"));
        write_file(tmp.path(), "views/gems.md", "x");
        let html = body(&site.render("/gems"));
        assert!(html.contains(r#"href="/gems/static/gems.css""#));
    }

    #[test]
    fn bundle_links_follow_output_layout() {
        let (tmp, site) = site_with(
            r#"
[[routes]]
path = "/"
[[routes]]
path = "/ruby/rack/"
view = "rack"
"#,
        );
        write_file(tmp.path(), "views/index.md", "home");
        write_file(tmp.path(), "views/rack.md", "rack");

        let home = body(&site.render("/"));
        assert!(home.contains(r#"href="/assets/index.css""#));
        assert!(home.contains(r#"src="/assets/index.js""#));

        let rack = body(&site.render("/ruby/rack/"));
        assert!(rack.contains(r#"href="/ruby/rack/assets/ruby/rack.css""#));
    }

    #[test]
    fn unknown_route_is_not_found() {
        let (_tmp, site) = site_with(GEMS);
        assert_eq!(site.render("/rack").status, 404);
    }

    #[test]
    fn non_get_route_is_not_rendered() {
        let (tmp, site) = site_with(
            r#"
[[routes]]
path = "/login"
method = "POST"
"#,
        );
        write_file(tmp.path(), "views/login.md", "x");
        assert_eq!(site.render("/login").status, 404);
    }

    #[test]
    fn missing_view_is_not_found() {
        let (_tmp, site) = site_with(GEMS);
        assert_eq!(site.render("/gems").status, 404);
        assert_eq!(site.missing_views().len(), 1);
    }

    // =========================================================================
    // Bundling
    // =========================================================================

    #[test]
    fn single_file_bundle_is_unchanged() {
        let (tmp, site) = site_with(GEMS);
        write_file(tmp.path(), "assets/stylesheets/gems.css", "body { margin: 0 }");

        let resp = site.render_asset("/gems.css");
        assert!(resp.is_success());
        assert_eq!(body(&resp), "body { margin: 0 }");
    }

    #[test]
    fn requires_are_inlined_before_self() {
        let (tmp, site) = site_with(GEMS);
        write_file(
            tmp.path(),
            "assets/javascripts/gems.js",
            "//= require jquery\n//= require deck/core.js\n\nstart();\n",
        );
        write_file(tmp.path(), "assets/javascripts/jquery.js", "var $ = {};\n");
        write_file(tmp.path(), "assets/javascripts/deck/core.js", "deck();");

        let js = body(&site.render_asset("/gems.js"));
        assert_eq!(js, "var $ = {};\ndeck();\n\nstart();\n");
    }

    #[test]
    fn require_self_places_body() {
        let (tmp, site) = site_with(GEMS);
        write_file(
            tmp.path(),
            "assets/javascripts/gems.js",
            "//= require a\n//= require_self\n//= require b\nmine();\n",
        );
        write_file(tmp.path(), "assets/javascripts/a.js", "a();\n");
        write_file(tmp.path(), "assets/javascripts/b.js", "b();\n");

        let js = body(&site.render_asset("/gems.js"));
        assert_eq!(js, "a();\nmine();\nb();\n");
    }

    #[test]
    fn stylesheet_block_comment_directives() {
        let (tmp, site) = site_with(GEMS);
        write_file(
            tmp.path(),
            "assets/stylesheets/gems.css",
            "/*\n *= require base\n */\nh1 { color: red }\n",
        );
        write_file(tmp.path(), "assets/stylesheets/base.css", "html { margin: 0 }\n");

        let css = body(&site.render_asset("/gems.css"));
        assert_eq!(css, "html { margin: 0 }\n/*\n */\nh1 { color: red }\n");
    }

    #[test]
    fn shared_dependency_included_once() {
        let (tmp, site) = site_with(GEMS);
        write_file(
            tmp.path(),
            "assets/javascripts/gems.js",
            "//= require a\n//= require b\n",
        );
        write_file(tmp.path(), "assets/javascripts/a.js", "//= require util\na();\n");
        write_file(tmp.path(), "assets/javascripts/b.js", "//= require util\nb();\n");
        write_file(tmp.path(), "assets/javascripts/util.js", "util();\n");

        let js = body(&site.render_asset("/gems.js"));
        assert_eq!(js.matches("util();").count(), 1);
    }

    #[test]
    fn require_cycle_terminates() {
        let (tmp, site) = site_with(GEMS);
        write_file(tmp.path(), "assets/javascripts/gems.js", "//= require a\ngems();\n");
        write_file(tmp.path(), "assets/javascripts/a.js", "//= require gems\na();\n");

        let resp = site.render_asset("/gems.js");
        assert!(resp.is_success());
        assert_eq!(body(&resp), "a();\ngems();\n");
    }

    #[test]
    fn vendor_load_path_is_searched() {
        let (tmp, site) = site_with(GEMS);
        write_file(tmp.path(), "assets/javascripts/gems.js", "//= require jquery\n");
        write_file(tmp.path(), "vendor/assets/javascripts/jquery.js", "jq();\n");

        assert_eq!(body(&site.render_asset("/gems.js")), "jq();\n");
    }

    #[test]
    fn missing_dependency_is_server_error() {
        let (tmp, site) = site_with(GEMS);
        write_file(tmp.path(), "assets/javascripts/gems.js", "//= require nowhere\n");
        assert_eq!(site.render_asset("/gems.js").status, 500);
    }

    #[test]
    fn missing_bundle_is_not_found() {
        let (_tmp, site) = site_with(GEMS);
        assert_eq!(site.render_asset("/gems.css").status, 404);
    }

    #[test]
    fn unknown_extension_is_not_found() {
        let (tmp, site) = site_with(GEMS);
        write_file(tmp.path(), "assets/stylesheets/gems.txt", "x");
        assert_eq!(site.render_asset("/gems.txt").status, 404);
        assert_eq!(site.render_asset("/gems").status, 404);
    }

    #[test]
    fn escaping_asset_path_is_not_found() {
        let (tmp, site) = site_with(GEMS);
        write_file(tmp.path(), "secret.css", "x");
        assert_eq!(site.render_asset("/../../secret.css").status, 404);
    }

    #[test]
    fn directives_after_code_are_kept() {
        let (directives, body) = split_directives("a();\n//= require b\n");
        assert!(directives.is_empty());
        assert_eq!(body, "a();\n//= require b\n");
    }

    #[test]
    fn split_directives_parses_header() {
        let (directives, body) =
            split_directives("// deck bundle\n//= require \"jquery\"\n//= require_self\nx();\n");
        assert_eq!(
            directives,
            vec![
                Directive::Require("jquery".to_string()),
                Directive::RequireSelf
            ]
        );
        assert_eq!(body, "// deck bundle\nx();\n");
    }

    // =========================================================================
    // Fixture site
    // =========================================================================

    #[test]
    fn fixture_site_is_complete() {
        let tmp = setup_fixtures();
        let site = Site::open(tmp.path()).unwrap();
        assert!(site.missing_views().is_empty());
        for route in site.routes() {
            let rendered = site.render(&route.path).is_success();
            assert_eq!(rendered, route.method == Method::Get, "{}", route.path);
        }
    }
}
