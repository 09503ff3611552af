//! Recursive, cycle-safe parser for the host loader configuration.
//!
//! Walks a root file (canonically `/etc/ld.so.conf`) and everything reachable
//! through `include` directives, producing search directories in source
//! order with included entries spliced in depth-first at the inclusion point.
//! Each file is parsed at most once per invocation, keyed by canonical path,
//! so include cycles terminate and duplicate includes contribute nothing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::multispace1,
    combinator::rest,
    sequence::preceded,
};

use burrow_common::constants::MAX_LINE_BYTES;
use burrow_common::error::{BurrowError, Result};

use crate::paths::SearchPathList;

/// Classification of one comment-stripped, trimmed, non-blank line.
#[derive(Debug, PartialEq, Eq)]
enum ConfigLine<'a> {
    /// An `include <target>` directive.
    Include(&'a str),
    /// A bare directory entry.
    Entry(&'a str),
}

/// Recognizes `include` followed by at least one whitespace character,
/// yielding the remainder of the line as the target.
fn include_directive(input: &str) -> IResult<&str, &str> {
    preceded((tag("include"), multispace1), rest).parse(input)
}

/// Strips the comment portion and surrounding whitespace, then classifies
/// what is left. `None` for blank lines.
///
/// The directive check runs before trailing whitespace is removed, so
/// `include ` is a directive with an empty (no-op) target while a bare
/// `include` is a directory entry of that name.
fn classify(raw: &str) -> Option<ConfigLine<'_>> {
    let line = raw.split('#').next().unwrap_or_default().trim_start();
    if line.trim_end().is_empty() {
        return None;
    }
    match include_directive(line) {
        Ok((_, target)) => Some(ConfigLine::Include(target.trim())),
        Err(_) => Some(ConfigLine::Entry(line.trim_end())),
    }
}

/// How a file came to be parsed, which decides whether a read failure is
/// fatal or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provenance {
    /// The root file or an include naming the file directly.
    Explicit,
    /// A file matched by an include glob; siblings must still parse.
    GlobMatch,
}

/// Parses the loader configuration rooted at `root` into an ordered,
/// duplicate-free list of search directories.
///
/// # Errors
///
/// Returns an error if the root or an explicitly included file is unreadable,
/// if any line exceeds the 1 MiB cap, or if a glob's parent directory cannot
/// be enumerated. On error the caller must discard any partial result.
pub fn parse_search_paths(root: &Path) -> Result<SearchPathList> {
    let mut parser = ConfigParser::default();
    parser.parse_file(root, Provenance::Explicit)?;
    Ok(parser.entries)
}

#[derive(Default)]
struct ConfigParser {
    /// Canonical paths of every file already parsed this invocation.
    seen: HashSet<PathBuf>,
    entries: SearchPathList,
}

impl ConfigParser {
    fn parse_file(&mut self, path: &Path, provenance: Provenance) -> Result<()> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.seen.insert(key) {
            tracing::debug!(path = %path.display(), "config file already parsed, skipping");
            return Ok(());
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(source) if provenance == Provenance::GlobMatch => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "skipping unreadable glob-matched config file"
                );
                return Ok(());
            }
            Err(source) => {
                return Err(BurrowError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        tracing::debug!(path = %path.display(), "parsing config file");
        for line in bytes.split(|&b| b == b'\n') {
            if line.len() > MAX_LINE_BYTES {
                return Err(BurrowError::Config {
                    path: path.to_path_buf(),
                    message: format!("line exceeds {MAX_LINE_BYTES} bytes"),
                });
            }
            let line = String::from_utf8_lossy(line);
            match classify(&line) {
                None => {}
                Some(ConfigLine::Entry(dir)) => {
                    if self.entries.push(dir) {
                        tracing::debug!(dir, "search directory added");
                    } else {
                        tracing::debug!(dir, "search directory already present");
                    }
                }
                Some(ConfigLine::Include(target)) => {
                    if target.is_empty() {
                        continue;
                    }
                    self.include(path, target)?;
                }
            }
        }
        Ok(())
    }

    fn include(&mut self, including: &Path, target: &str) -> Result<()> {
        let resolved = resolve_target(including, target);
        if resolved.as_os_str().as_encoded_bytes().contains(&b'*') {
            self.include_glob(&resolved)
        } else {
            self.parse_file(&resolved, Provenance::Explicit)
        }
    }

    fn include_glob(&mut self, pattern: &Path) -> Result<()> {
        tracing::debug!(pattern = %pattern.display(), "expanding include glob");
        for matched in expand_glob(pattern)? {
            self.parse_file(&matched, Provenance::GlobMatch)?;
        }
        Ok(())
    }
}

/// Resolves an include target against the directory of the including file.
fn resolve_target(including: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        including
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(target)
    }
}

/// Lists the regular files matching a single-`*` pattern, sorted by byte
/// value. A pattern with no matches yields an empty list.
///
/// # Errors
///
/// Returns an error if the pattern's parent directory cannot be enumerated.
fn expand_glob(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern_bytes = pattern.as_os_str().as_encoded_bytes();
    let star = pattern_bytes
        .iter()
        .position(|&b| b == b'*')
        .unwrap_or(pattern_bytes.len());
    let (prefix, rest) = pattern_bytes.split_at(star);
    let suffix = rest.get(1..).unwrap_or_default();

    let parent = pattern.parent().unwrap_or_else(|| Path::new("/"));
    let dir = std::fs::read_dir(parent).map_err(|source| BurrowError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut matches = Vec::new();
    for entry in dir {
        let entry = entry.map_err(|source| BurrowError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
        let candidate = entry.path();
        let candidate_bytes = candidate.as_os_str().as_encoded_bytes();
        if !glob_match(candidate_bytes, prefix, suffix) {
            continue;
        }
        match std::fs::metadata(&candidate) {
            Ok(meta) if meta.is_file() => matches.push(candidate),
            Ok(_) | Err(_) => {}
        }
    }
    matches.sort_by(|a, b| {
        a.as_os_str()
            .as_encoded_bytes()
            .cmp(b.as_os_str().as_encoded_bytes())
    });
    Ok(matches)
}

fn glob_match(candidate: &[u8], prefix: &[u8], suffix: &[u8]) -> bool {
    candidate.len() >= prefix.len() + suffix.len()
        && candidate.starts_with(prefix)
        && candidate.ends_with(suffix)
}
