//! # Route Snapshot
//!
//! Turns a route-driven content site into a self-contained static file tree.
//! Every `GET` route is rendered in-process, its stylesheet and script bundles
//! are saved next to it, and the images its page references are copied into
//! the tree with their references rewritten to match.
//!
//! # Architecture
//!
//! ```text
//! RouteSource ──▶ RouteCatalog ──▶ snapshot::run ──▶ public/
//!                                     │    ▲
//!                     Responder ◀─────┘    │ rewritten page + copies
//!                (PageRenderer, AssetBundler)
//!                                     Rewriter
//! ```
//!
//! The snapshot core only talks to the three collaborator traits. [`site::Site`]
//! is the file-backed implementation the CLI uses; tests plug in an in-memory
//! stub instead.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`routes`] | Route catalog, `GET` filtering and route path → output path mapping |
//! | [`responder`] | Renders a route's page, stylesheet or script without a network |
//! | [`rewrite`] | Finds configured tag attributes in HTML, normalizes and rewrites them |
//! | [`snapshot`] | Drives the run, writes the tree, collects per-route failures |
//! | [`site`] | Markdown/HTML views, Maud layout, `require`-directive bundling |
//! | [`config`] | `site.toml` loading, stock defaults merging and validation |
//! | [`types`] | Output entries shared between the rewriter and the writer |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Splice, Don't Re-serialize
//!
//! The rewriter parses pages with `tl` only to locate attribute values; new
//! values are spliced into the original text at their byte ranges. Everything
//! outside a rewritten value survives byte for byte, including markup a
//! serializer would normalize (attribute case, quoting, whitespace).
//!
//! ## Failures Are Data
//!
//! A snapshot that hits a broken route still produces everything else. Route
//! failures are values in [`snapshot::SnapshotResult`]; only problems with the
//! output tree itself abort the run.

pub mod config;
pub mod logging;
pub mod output;
pub mod responder;
pub mod rewrite;
pub mod routes;
pub mod site;
pub mod snapshot;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
