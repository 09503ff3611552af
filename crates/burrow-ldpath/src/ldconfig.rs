//! Host library cache query.
//!
//! Runs the system's `ldconfig -p` listing synchronously and turns it into
//! the set of directories holding shared objects loadable by this process.
//! Every candidate path is introspected and discarded unless its word width
//! and machine match the running process, so a 64-bit program never inherits
//! a 32-bit library directory just because both live on the host.

use std::path::{Path, PathBuf};
use std::process::Command;

use burrow_common::constants::MAX_LINE_BYTES;
use burrow_common::error::{BurrowError, Result};

use crate::elf::{self, ElfIdentity};
use crate::paths::SearchPathList;

/// Candidate invocations, tried in order; the first that starts wins.
const CACHE_COMMANDS: [&str; 3] = ["ldconfig", "/sbin/ldconfig", "/usr/sbin/ldconfig"];

/// Returns the deduplicated directories of every cached shared object whose
/// identity matches `self_id`, in listing order.
///
/// # Errors
///
/// Returns an error if no candidate invocation can be started or the listing
/// contains an oversized line. Callers treat this as the loss of one
/// enrichment step, not a launch failure.
pub fn host_library_dirs(self_id: &ElfIdentity) -> Result<SearchPathList> {
    let listing = run_cache_listing()?;
    collect_compatible_dirs(&listing, self_id)
}

fn run_cache_listing() -> Result<String> {
    let mut last_error = None;
    for cmd in CACHE_COMMANDS {
        match Command::new(cmd).arg("-p").env("LC_ALL", "C").output() {
            Ok(output) => {
                tracing::debug!(cmd, "library cache listing succeeded");
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
            Err(source) => {
                tracing::debug!(cmd, error = %source, "library cache candidate failed to start");
                last_error = Some(source);
            }
        }
    }
    Err(BurrowError::Io {
        path: PathBuf::from(CACHE_COMMANDS[0]),
        source: last_error
            .unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound)),
    })
}

/// Extracts the resolved shared-object path from one listing line of the form
/// `\tlibfoo.so.1 (libc6,x86-64) => /usr/lib/libfoo.so.1`.
fn shared_object_path(line: &str) -> Option<&str> {
    let (_, path) = line.split_once("=>")?;
    let path = path.trim();
    if path.is_empty() { None } else { Some(path) }
}

fn collect_compatible_dirs(listing: &str, self_id: &ElfIdentity) -> Result<SearchPathList> {
    let mut dirs = SearchPathList::new();
    for line in listing.lines() {
        if line.len() > MAX_LINE_BYTES {
            return Err(BurrowError::Config {
                path: PathBuf::from(CACHE_COMMANDS[0]),
                message: format!("cache listing line exceeds {MAX_LINE_BYTES} bytes"),
            });
        }
        let Some(path) = shared_object_path(line) else {
            continue;
        };
        let Some(identity) = elf::identify(Path::new(path)) else {
            tracing::debug!(path, "skipping non-ELF cache entry");
            continue;
        };
        if !identity.compatible_with(self_id) {
            tracing::debug!(path, "skipping incompatible cache entry");
            continue;
        }
        if let Some(dir) = Path::new(path).parent() {
            let dir = dir.to_string_lossy().into_owned();
            if dirs.push(dir.clone()) {
                tracing::debug!(dir = %dir, "host library directory added");
            }
        }
    }
    Ok(dirs)
}
