//! Include/ignore pattern resolution.
//!
//! Patterns are globs matched against forward-slash paths relative to the
//! packed root. `*` stays within one segment, `**` spans any number of
//! segments, `{a,b}` alternates. A segment of the form `!(a|b)` matches any
//! single segment that matches none of the alternatives; globset has no such
//! operator, so patterns containing one are matched segment by segment.

use crate::error::{AppError, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use log;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

static DEFAULT_IGNORE_PATTERNS: Lazy<BTreeMap<String, Vec<String>>> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../data/default_ignores.yaml"
    ));
    serde_yml::from_str(yaml_content).expect("Failed to parse embedded data/default_ignores.yaml")
});

/// Built-in ignore patterns, grouped by concern in the embedded data file.
pub fn get_default_ignore_patterns() -> &'static BTreeMap<String, Vec<String>> {
    &DEFAULT_IGNORE_PATTERNS
}

fn default_ignore_iter() -> impl Iterator<Item = &'static String> {
    DEFAULT_IGNORE_PATTERNS.values().flatten()
}

#[derive(Debug, Clone)]
enum Segment {
    AnyDepth,
    Glob(GlobMatcher),
    /// `prefix!(a|b)suffix`: some split of the segment has the prefix and
    /// suffix matching their globs and a middle matching none of the
    /// alternatives. An absent prefix or suffix matches only the empty string.
    Negated {
        prefix: Option<GlobMatcher>,
        alternatives: GlobSet,
        suffix: Option<GlobMatcher>,
    },
}

fn matches_part(matcher: Option<&GlobMatcher>, part: &str) -> bool {
    match matcher {
        Some(m) => m.is_match(part),
        None => part.is_empty(),
    }
}

impl Segment {
    fn matches(&self, part: &str) -> bool {
        match self {
            Segment::AnyDepth => true,
            Segment::Glob(matcher) => matcher.is_match(part),
            Segment::Negated {
                prefix,
                alternatives,
                suffix,
            } => {
                let bounds: Vec<usize> = part
                    .char_indices()
                    .map(|(i, _)| i)
                    .chain(std::iter::once(part.len()))
                    .collect();
                bounds.iter().enumerate().any(|(n, &start)| {
                    matches_part(prefix.as_ref(), &part[..start])
                        && bounds[n..].iter().any(|&end| {
                            matches_part(suffix.as_ref(), &part[end..])
                                && !alternatives.is_match(&part[start..end])
                        })
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
struct SegmentPattern {
    source: String,
    segments: Vec<Segment>,
}

fn optional_glob(raw: &str, part: &str) -> Result<Option<GlobMatcher>> {
    if part.is_empty() {
        return Ok(None);
    }
    Ok(Some(compile_glob(raw, part)?.compile_matcher()))
}

fn parse_negated(raw: &str, part: &str, start: usize) -> Result<Segment> {
    let rest = &part[start + 2..];
    let close = rest
        .find(')')
        .ok_or_else(|| AppError::invalid_pattern(raw, "negated group is not closed"))?;
    let inner = &rest[..close];
    let suffix = &rest[close + 1..];
    if inner.is_empty() || inner.contains('(') {
        return Err(AppError::invalid_pattern(
            raw,
            "a negated group needs at least one plain alternative",
        ));
    }
    if suffix.contains("!(") {
        return Err(AppError::invalid_pattern(
            raw,
            "at most one negated group per path segment",
        ));
    }

    let mut builder = GlobSetBuilder::new();
    for alternative in inner.split('|') {
        if alternative.is_empty() {
            return Err(AppError::invalid_pattern(raw, "empty negated alternative"));
        }
        builder.add(compile_glob(raw, alternative)?);
    }
    let alternatives = builder
        .build()
        .map_err(|e| AppError::invalid_pattern(raw, e))?;
    Ok(Segment::Negated {
        prefix: optional_glob(raw, &part[..start])?,
        alternatives,
        suffix: optional_glob(raw, suffix)?,
    })
}

impl SegmentPattern {
    fn parse(raw: &str, pattern: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for part in pattern.split('/') {
            if part.is_empty() {
                return Err(AppError::invalid_pattern(raw, "empty path segment"));
            }
            if part == "**" {
                // Consecutive `**` segments are equivalent to one.
                if !matches!(segments.last(), Some(Segment::AnyDepth)) {
                    segments.push(Segment::AnyDepth);
                }
                continue;
            }
            match part.find("!(") {
                Some(start) => segments.push(parse_negated(raw, part, start)?),
                None => segments.push(Segment::Glob(compile_glob(raw, part)?.compile_matcher())),
            }
        }
        Ok(Self {
            source: raw.to_string(),
            segments,
        })
    }

    fn is_match(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').collect();
        match_segments(&self.segments, &parts)
    }
}

/// Table of "segments[s..] matches parts[p..]", filled from the end so each
/// segment is tested against each part at most once.
fn match_segments(segments: &[Segment], parts: &[&str]) -> bool {
    let width = parts.len() + 1;
    let mut table = vec![false; (segments.len() + 1) * width];
    table[segments.len() * width + parts.len()] = true;
    for s in (0..segments.len()).rev() {
        for p in (0..=parts.len()).rev() {
            let next = (s + 1) * width;
            table[s * width + p] = match &segments[s] {
                Segment::AnyDepth => {
                    table[next + p] || (p < parts.len() && table[s * width + p + 1])
                }
                segment => {
                    p < parts.len() && table[next + p + 1] && segment.matches(parts[p])
                }
            };
        }
    }
    table[0]
}

fn compile_glob(raw: &str, pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| {
            log::error!("Invalid glob pattern \"{}\": {}", raw, e);
            AppError::invalid_pattern(raw, e)
        })
}

/// Trims a user pattern and expands the directory shorthand `dir/` to `dir/**`.
pub fn normalize_pattern(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_pattern(raw, "pattern is empty"));
    }
    let mut processed = trimmed.strip_prefix("./").unwrap_or(trimmed).to_string();
    if processed.ends_with('/') && processed.len() > 1 {
        processed.push_str("**");
    }
    if processed.is_empty() || processed.starts_with('/') {
        return Err(AppError::invalid_pattern(
            raw,
            "patterns are relative to the root and cannot start with '/'",
        ));
    }
    Ok(processed)
}

/// A compiled collection of patterns; a path matches if any pattern matches.
#[derive(Debug, Clone)]
pub struct PatternSet {
    globs: GlobSet,
    extended: Vec<SegmentPattern>,
    len: usize,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut extended = Vec::new();
        for raw in patterns {
            let raw = raw.as_ref();
            let processed = normalize_pattern(raw)?;
            if processed.contains("!(") {
                log::trace!("Adding segment pattern: {}", processed);
                extended.push(SegmentPattern::parse(raw, &processed)?);
            } else {
                log::trace!("Adding glob pattern: {} (processed as {})", raw, processed);
                builder.add(compile_glob(raw, &processed)?);
            }
        }
        let globs = builder.build().map_err(|e| {
            log::error!("Error building glob set: {}", e);
            AppError::Config(format!("Failed to build glob set: {}", e))
        })?;
        Ok(Self {
            globs,
            extended,
            len: patterns.len(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.globs.is_match(path) || self.extended.iter().any(|p| p.is_match(path))
    }

    /// Sources of the patterns that needed the segment matcher.
    pub fn extended_sources(&self) -> impl Iterator<Item = &str> {
        self.extended.iter().map(|p| p.source.as_str())
    }
}

/// The effective selection predicate for one pipeline run.
#[derive(Debug, Clone)]
pub struct PatternResolver {
    include: PatternSet,
    ignore: PatternSet,
    subtree_ignores: GlobSet,
}

impl PatternResolver {
    /// Merges the built-in ignores (when enabled) with the user's patterns.
    pub fn resolve<S: AsRef<str>>(
        include: &[S],
        ignore: &[S],
        use_default_ignores: bool,
    ) -> Result<Self> {
        let mut ignore_patterns: Vec<String> = Vec::new();
        if use_default_ignores {
            ignore_patterns.extend(default_ignore_iter().cloned());
        }
        ignore_patterns.extend(ignore.iter().map(|p| p.as_ref().to_string()));

        log::debug!(
            "Resolving patterns ({} include, {} ignore, builtin: {})",
            include.len(),
            ignore_patterns.len(),
            use_default_ignores
        );
        let include_set = PatternSet::new(include)?;
        let ignore_set = PatternSet::new(&ignore_patterns)?;

        // Only `<prefix>/**` provably covers a whole subtree.
        let mut subtree = GlobSetBuilder::new();
        for raw in &ignore_patterns {
            let processed = normalize_pattern(raw)?;
            if let Some(prefix) = processed.strip_suffix("/**") {
                if !prefix.is_empty() && !prefix.contains("!(") {
                    subtree.add(compile_glob(raw, prefix)?);
                }
            }
        }
        let subtree_ignores = subtree
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build glob set: {}", e)))?;

        Ok(Self {
            include: include_set,
            ignore: ignore_set,
            subtree_ignores,
        })
    }

    /// True iff `path` is included (or there are no includes) and not ignored.
    pub fn is_selected(&self, path: &str) -> bool {
        if self.ignore.is_match(path) {
            log::trace!("Path excluded by ignore set: {}", path);
            return false;
        }
        let included = self.include.is_empty() || self.include.is_match(path);
        if !included {
            log::trace!("Path not included by include set: {}", path);
        }
        included
    }

    /// True when every file below `dir` is guaranteed to be ignored.
    pub fn prunes_directory(&self, dir: &str) -> bool {
        self.subtree_ignores.is_match(dir)
    }

    pub fn predicate(&self) -> impl Fn(&str) -> bool + '_ {
        move |path| self.is_selected(path)
    }
}
