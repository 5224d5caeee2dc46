//! Site configuration module.
//!
//! Handles loading, validating, and merging `site.toml`. The file lives in the
//! site root and is sparse: stock defaults are overridden key by key by
//! whatever the file sets.
//!
//! ## Site Layout
//!
//! ```text
//! site/
//! ├── site.toml                 # This config
//! ├── views/
//! │   ├── gems.md               # Markdown view (wrapped in the page layout)
//! │   └── rack.html             # HTML fragment view (used verbatim)
//! ├── assets/
//! │   ├── stylesheets/gems.css  # Per-route stylesheet bundle
//! │   ├── javascripts/gems.js   # Per-route script bundle
//! │   └── images/ruby.png       # Images referenced from views
//! └── vendor/assets/            # Extra load path for bundle dependencies
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_root = "public"     # Where `generate` writes unless --output is given
//! assets_prefix = "assets"   # Per-route directory holding bundles and images
//!
//! [rewrite]
//! img = "src"                # tag = attribute holding a relocatable resource
//!
//! [stylesheets]
//! strip_source_comments = true
//!
//! [assets]
//! load_paths = ["assets", "vendor/assets"]
//!
//! [[routes]]
//! path = "/gems"             # Required
//! view = "gems"              # Defaults to the last path segment
//! title = "Gems"             # Defaults to the view name, dashes as spaces
//! method = "GET"             # Only GET routes are snapshotted
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::routes::{Method, Route};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file inside the site root.
pub const CONFIG_FILE: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
///
/// All fields have defaults; a site without any config has no routes and
/// snapshots to an empty tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Default output directory for `generate`.
    pub output_root: String,
    /// Directory name, inside each route's output directory, that holds the
    /// route's bundles and relocated images.
    pub assets_prefix: String,
    /// Tag → attribute table for resource relocation.
    pub rewrite: BTreeMap<String, String>,
    /// Stylesheet post-processing.
    pub stylesheets: StylesheetsConfig,
    /// Bundle resolution settings.
    pub assets: AssetsConfig,
    /// Routes served by the site, in snapshot order.
    pub routes: Vec<RouteConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            output_root: "public".to_string(),
            assets_prefix: "assets".to_string(),
            rewrite: BTreeMap::from([("img".to_string(), "src".to_string())]),
            stylesheets: StylesheetsConfig::default(),
            assets: AssetsConfig::default(),
            routes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesheetsConfig {
    /// Remove `/* ... */` blocks followed by a newline from written
    /// stylesheets. Preprocessors leave build paths and line numbers there.
    pub strip_source_comments: bool,
}

impl Default for StylesheetsConfig {
    fn default() -> Self {
        Self {
            strip_source_comments: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Directories (relative to the site root) searched for
    /// `stylesheets/` and `javascripts/`, first hit wins.
    pub load_paths: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            load_paths: vec!["assets".to_string(), "vendor/assets".to_string()],
        }
    }
}

/// One `[[routes]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub path: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl RouteConfig {
    /// View name: explicit, or the last path segment (`index` for `/`).
    pub fn view_name(&self) -> String {
        if let Some(view) = &self.view {
            return view.clone();
        }
        self.path
            .split('/')
            .rfind(|s| !s.is_empty())
            .unwrap_or("index")
            .to_string()
    }

    /// Page title: explicit, or the view name with dashes as spaces.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => self.view_name().replace('-', " "),
        }
    }

    pub fn route(&self) -> Route {
        Route {
            path: self.path.clone(),
            method: self.method,
        }
    }
}

fn is_plain_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|s| !s.is_empty() && s != "." && s != "..")
}

impl SiteConfig {
    /// Validate config values and route table invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_plain_relative(&self.assets_prefix) {
            return Err(ConfigError::Validation(format!(
                "assets_prefix must be a relative path without '.' or '..' segments, got {:?}",
                self.assets_prefix
            )));
        }
        if self.output_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output_root must not be empty".into(),
            ));
        }

        let mut tags = HashSet::new();
        for (tag, attribute) in &self.rewrite {
            if tag.trim().is_empty() || attribute.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "rewrite rule {tag:?} = {attribute:?} must name both a tag and an attribute"
                )));
            }
            if !tags.insert(tag.to_ascii_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "rewrite tag {tag:?} is listed more than once"
                )));
            }
        }

        if self.assets.load_paths.is_empty() {
            return Err(ConfigError::Validation(
                "assets.load_paths must not be empty".into(),
            ));
        }
        if let Some(bad) = self
            .assets
            .load_paths
            .iter()
            .find(|p| !is_plain_relative(p))
        {
            return Err(ConfigError::Validation(format!(
                "assets.load_paths entry {bad:?} must be a relative path inside the site"
            )));
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if crate::routes::route_dir(&route.path).is_none() {
                return Err(ConfigError::Validation(format!(
                    "route path {:?} must start with '/' and contain no '.' or '..' segments",
                    route.path
                )));
            }
            if !seen.insert((route.path.as_str(), route.method)) {
                return Err(ConfigError::Validation(format!(
                    "route {} {} is declared more than once",
                    route.method, route.path
                )));
            }
            if let Some(view) = route.view.as_deref().filter(|v| !is_plain_relative(v)) {
                return Err(ConfigError::Validation(format!(
                    "view {view:?} for route {} must be a relative name inside views/",
                    route.path
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `site.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `site.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `site.toml` in the given site root.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `site.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# route-snapshot site configuration
# =================================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Output directory used by `generate` when --output is not given.
output_root = "public"

# Directory inside each route's output directory that receives the route's
# stylesheet/script bundles and relocated images:
#   public/gems/index.html
#   public/gems/assets/gems.css
#   public/gems/assets/ruby.png
assets_prefix = "assets"

# ---------------------------------------------------------------------------
# Resource relocation
# ---------------------------------------------------------------------------
# tag = attribute. Every matching element whose attribute is non-empty gets
# its file copied from assets/images/ into the route's assets directory and
# the attribute rewritten to the new root-relative location.
[rewrite]
img = "src"

# ---------------------------------------------------------------------------
# Stylesheets
# ---------------------------------------------------------------------------
[stylesheets]
# Remove /* ... */ blocks followed by a newline (build paths, line numbers).
strip_source_comments = true

# ---------------------------------------------------------------------------
# Bundles
# ---------------------------------------------------------------------------
[assets]
# Searched in order for stylesheets/<name>.css and javascripts/<name>.js.
load_paths = ["assets", "vendor/assets"]

# ---------------------------------------------------------------------------
# Routes
# ---------------------------------------------------------------------------
# [[routes]]
# path = "/gems"
# view = "gems"        # views/gems.md or views/gems.html
# title = "Gems"
# method = "GET"
"##
}
