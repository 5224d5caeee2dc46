//! Resource rewriting for snapshotted pages.
//!
//! A rendered page refers to its images however the renderer happened to
//! express them: `assets/images/ruby.png`, `./ruby.png`, `/assets/images/ruby.png`.
//! None of those survive being moved into a framework-free file tree, so every
//! reference matched by the rewrite table is relocated next to the page and its
//! attribute is pointed at the new location:
//!
//! ```text
//! <img src="./assets/images/ruby.png">     (page for /gems)
//!   copy   <site>/assets/images/ruby.png → gems/assets/ruby.png
//!   becomes <img src="/gems/assets/ruby.png">
//! ```
//!
//! ## Rewrite Table
//!
//! Which attributes hold resource URLs is data, not code: a table mapping a tag
//! name to the one attribute on that tag to relocate (`img → src` by default).
//! All rules share the same behaviour (find, relocate, rewrite), so one
//! traversal handles the whole table.
//!
//! ## Byte-Preserving Output
//!
//! The page is parsed with [`tl`], which recovers from malformed markup and
//! hands out attribute values as slices of the original input. New values are
//! spliced in at exactly those byte ranges; everything else in the document is
//! left as the renderer wrote it. The result is deterministic for a given
//! input, which keeps repeated snapshots byte-identical.
//!
//! The rewriter never touches the filesystem. It returns the copy operations as
//! [`OutputEntry`] values and the snapshot writer performs them.

use crate::types::OutputEntry;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A (tag, attribute) pair naming an attribute that holds a resource URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub tag: String,
    pub attribute: String,
}

impl RewriteRule {
    pub fn new(tag: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attribute: attribute.into(),
        }
    }
}

/// One relocated reference, as found and rewritten in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    /// Attribute value as the renderer wrote it.
    pub original_value: String,
    /// File the resource is copied from.
    pub resolved_source_path: PathBuf,
    /// Name of the relocated file inside the destination directory.
    pub relocated_file_name: String,
    /// Root-relative URL written back into the attribute.
    pub new_attribute_value: String,
}

/// Output of [`Rewriter::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub html: String,
    /// Copy operations in document order, one per rewritten element.
    pub copies: Vec<OutputEntry>,
    pub references: Vec<ResourceReference>,
}

/// Rewrites resource references according to a tag → attribute table.
#[derive(Debug, Clone)]
pub struct Rewriter {
    rules: BTreeMap<String, String>,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new([RewriteRule::new("img", "src")])
    }
}

impl Rewriter {
    /// Build a rewriter from rules. Tag names are matched case-insensitively;
    /// a later rule for the same tag replaces an earlier one.
    pub fn new(rules: impl IntoIterator<Item = RewriteRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| (r.tag.to_ascii_lowercase(), r.attribute))
            .collect();
        Self { rules }
    }

    pub fn from_table(table: &BTreeMap<String, String>) -> Self {
        Self::new(
            table
                .iter()
                .map(|(tag, attribute)| RewriteRule::new(tag.as_str(), attribute.as_str())),
        )
    }

    pub fn rules(&self) -> impl Iterator<Item = RewriteRule> + '_ {
        self.rules
            .iter()
            .map(|(tag, attribute)| RewriteRule::new(tag.as_str(), attribute.as_str()))
    }

    /// Cheap pre-check: could `html` contain an element covered by the table?
    ///
    /// False positives are fine (the full pass finds nothing); false negatives
    /// are not.
    pub fn may_match(&self, html: &str) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        let lowered = html.to_ascii_lowercase();
        self.rules
            .keys()
            .any(|tag| lowered.contains(&format!("<{tag}")))
    }

    /// Relocate every resource referenced by a matching element.
    ///
    /// - `source_base`: directory holding `assets/images/`
    /// - `dest_rel_dir`: output-relative directory the resources move to
    ///   (e.g. `gems/assets`); rewritten attributes become
    ///   `/<dest_rel_dir>/<file name>`
    pub fn process(&self, html: &str, source_base: &Path, dest_rel_dir: &str) -> Rewritten {
        let unchanged = || Rewritten {
            html: html.to_string(),
            copies: Vec::new(),
            references: Vec::new(),
        };

        if !self.may_match(html) {
            return unchanged();
        }

        let dom = match tl::parse(html, tl::ParserOptions::default()) {
            Ok(dom) => dom,
            Err(err) => {
                debug!("HTML parse failed, leaving page as is: {err}");
                return unchanged();
            }
        };

        let mut found: Vec<(Range<usize>, &str)> = Vec::new();
        for node in dom.nodes() {
            let Some(tag) = node.as_tag() else { continue };
            let name = tag.name().as_utf8_str();
            let Some(attribute) = self.rules.get(name.to_ascii_lowercase().as_str()) else {
                continue;
            };
            for (key, value) in tag.attributes().iter() {
                if !key.eq_ignore_ascii_case(attribute) {
                    continue;
                }
                // Values are only usable when they borrow from the input;
                // that is what gives us their byte range.
                if let Some(Cow::Borrowed(raw)) = value {
                    if let Some(range) = byte_range(html, raw) {
                        let raw = &html[range.clone()];
                        found.push((range, raw));
                    }
                }
                break;
            }
        }

        // Node storage order is not guaranteed to be source order.
        found.sort_by_key(|(range, _)| range.start);

        // Tag-shaped text inside <script> and friends is not markup.
        if !found.is_empty() {
            let raw = raw_text_ranges(html);
            found.retain(|(range, _)| !raw.iter().any(|r| r.contains(&range.start)));
        }

        let dest_rel_dir = dest_rel_dir.trim_matches('/');
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        let mut copies = Vec::new();
        let mut references = Vec::new();

        for (range, raw) in found {
            let Some(normalized) = normalize_reference(raw) else {
                continue;
            };
            let Some(file_name) = normalized.rsplit('/').next().map(str::to_string) else {
                continue;
            };

            let source = source_base.join("assets").join("images").join(&normalized);
            let dest = Path::new(dest_rel_dir).join(&file_name);
            let new_value = format!("/{dest_rel_dir}/{file_name}");

            copies.push(OutputEntry::copy(source.clone(), dest));
            references.push(ResourceReference {
                original_value: raw.to_string(),
                resolved_source_path: source,
                relocated_file_name: file_name,
                new_attribute_value: new_value.clone(),
            });
            edits.push((range, new_value));
        }

        if edits.is_empty() {
            return unchanged();
        }

        Rewritten {
            html: splice(html, &edits),
            copies,
            references,
        }
    }
}

/// Elements whose content is text, never markup.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

/// Byte ranges holding the content of raw-text elements, in document order.
///
/// Content runs from the end of the opening tag to the first matching
/// closing tag (or the end of input), as an HTML tokenizer reads it.
fn raw_text_ranges(html: &str) -> Vec<Range<usize>> {
    let lowered = html.to_ascii_lowercase();
    let mut ranges = Vec::new();
    let mut cursor = 0;

    while let Some(found) = lowered[cursor..].find('<') {
        let name_start = cursor + found + 1;
        let rest = &lowered[name_start..];
        let Some(name) = RAW_TEXT_ELEMENTS.iter().find(|name| {
            rest.starts_with(*name)
                && rest[name.len()..]
                    .starts_with(|c: char| c == '>' || c == '/' || c.is_ascii_whitespace())
        }) else {
            cursor = name_start;
            continue;
        };

        let after_name = name_start + name.len();
        let Some(gt) = lowered[after_name..].find('>') else {
            break;
        };
        let content_start = after_name + gt + 1;
        let content_end = lowered[content_start..]
            .find(&format!("</{name}"))
            .map_or(lowered.len(), |i| content_start + i);
        ranges.push(content_start..content_end);
        cursor = content_end;
    }
    ranges
}

/// Byte range of `part` within `whole`, if `part` is a slice of it.
fn byte_range(whole: &str, part: &str) -> Option<Range<usize>> {
    let start = (part.as_ptr() as usize).checked_sub(whole.as_ptr() as usize)?;
    let end = start.checked_add(part.len())?;
    (end <= whole.len() && whole.get(start..end) == Some(part)).then_some(start..end)
}

/// Replace non-overlapping, sorted byte ranges of `html`.
fn splice(html: &str, edits: &[(Range<usize>, String)]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&html[cursor..range.start]);
        out.push_str(replacement);
        cursor = range.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// `scheme:` or protocol-relative references point outside the site.
fn is_external(value: &str) -> bool {
    if value.starts_with("//") {
        return true;
    }
    value.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Recover an image's path below `assets/images/` from an attribute value.
///
/// Everything up to and including the last `assets` segment goes, as does an
/// `images` segment right after it, every `.` segment and any query or
/// fragment:
///
/// - `"assets/images/x.png"` → `x.png`
/// - `"./assets/images/icons/x.png"` → `icons/x.png`
/// - `"/build/app/assets/images/x.png"` → `x.png`
/// - `"./x.png"`, `"x.png"` → `x.png`
///
/// Returns `None` for blank values, external URLs, and paths with `..`.
pub fn normalize_reference(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || is_external(value) {
        return None;
    }
    let value = value.split(['?', '#']).next().unwrap_or_default();

    let segments: Vec<&str> = value
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    // A bare `images/x.png` is kept as written; the `images` prefix is only
    // dropped right after an `assets` segment.
    let rest = match segments.iter().rposition(|s| *s == "assets") {
        Some(pos) => {
            let after = &segments[pos + 1..];
            after.strip_prefix(&["images"]).unwrap_or(after)
        }
        None => &segments[..],
    };
    if rest.is_empty() || rest.contains(&"..") {
        return None;
    }
    Some(rest.join("/"))
}
