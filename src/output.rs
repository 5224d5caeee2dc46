//! CLI output formatting.
//!
//! Output is **route-centric**: each route leads with its method and path,
//! with the output file it maps to shown after `→`. Failures are listed by
//! route so the summary reads as an inventory of what did not make it into
//! the tree.
//!
//! # Output Format
//!
//! ## Routes
//!
//! ```text
//! Routes
//! 001 GET /gems → gems/index.html
//! 002 POST /login (skipped)
//! 003 GET / → index.html
//! ```
//!
//! ## Generate
//!
//! ```text
//! Snapshot → public
//!     Routes: 2
//!     Files: 5
//!         gems/assets/gems.css
//!         ...
//! Failures
//!     GET /rack (stylesheet) returned 404
//! ```
//!
//! ## Check
//!
//! ```text
//! Views
//!     /gems → views/gems
//!     /rack → views/rack (missing)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::config::RouteConfig;
use crate::routes::{self, Method, Route};
use crate::snapshot::SnapshotResult;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Output-relative page file for a route path, `/`-separated.
fn page_file(path: &str) -> Option<String> {
    let dir = routes::route_dir(path)?;
    let parts: Vec<String> = dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        Some("index.html".to_string())
    } else {
        Some(format!("{}/index.html", parts.join("/")))
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Format the route table with the page each `GET` route produces.
pub fn format_routes(routes: &[Route]) -> Vec<String> {
    let mut lines = vec!["Routes".to_string()];
    for (i, route) in routes.iter().enumerate() {
        let header = format!("{} {} {}", format_index(i + 1), route.method, route.path);
        if route.method != Method::Get {
            lines.push(format!("{header} (skipped)"));
            continue;
        }
        match page_file(&route.path) {
            Some(file) => lines.push(format!("{header} \u{2192} {file}")),
            None => lines.push(format!("{header} (invalid path)")),
        }
    }
    if routes.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    lines
}

/// Print the route table to stdout.
pub fn print_routes(routes: &[Route]) {
    for line in format_routes(routes) {
        println!("{}", line);
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Format the summary of a snapshot run.
pub fn format_snapshot_output(result: &SnapshotResult, output_root: &Path) -> Vec<String> {
    let mut lines = vec![format!("Snapshot \u{2192} {}", output_root.display())];
    lines.push(format!("{}Routes: {}", indent(1), result.routes));
    lines.push(format!("{}Files: {}", indent(1), result.written));
    for file in result.files.keys() {
        lines.push(format!("{}{}", indent(2), file));
    }

    if !result.failures.is_empty() {
        lines.push("Failures".to_string());
        for failure in &result.failures {
            lines.push(format!("{}{}", indent(1), failure));
        }
    }
    lines
}

/// Print the snapshot summary to stdout.
pub fn print_snapshot_output(result: &SnapshotResult, output_root: &Path) {
    for line in format_snapshot_output(result, output_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the view inventory: every `GET` route and whether its view exists.
pub fn format_check_output(routes: &[RouteConfig], missing: &[&RouteConfig]) -> Vec<String> {
    let mut lines = vec!["Views".to_string()];
    for route in routes.iter().filter(|r| r.method == Method::Get) {
        let is_missing = missing
            .iter()
            .any(|m| m.path == route.path && m.method == route.method);
        let mut line = format!("{}{} \u{2192} views/{}", indent(1), route.path, route.view_name());
        if is_missing {
            line.push_str(" (missing)");
        }
        lines.push(line);
    }
    lines
}

/// Print the view inventory to stdout.
pub fn print_check_output(routes: &[RouteConfig], missing: &[&RouteConfig]) {
    for line in format_check_output(routes, missing) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
