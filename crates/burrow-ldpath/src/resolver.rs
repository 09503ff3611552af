//! Search path resolution strategies and environment publication.
//!
//! A strategy produces an [`Augmentation`]; merging with the inherited
//! `LD_LIBRARY_PATH` and publishing the result is shared. Exactly one
//! strategy is compiled into a given bundle, so the choice is a build-time
//! decision on the binary crate, not a runtime branch.

use std::path::PathBuf;

use burrow_common::constants::{LD_CONF_PATH, LIBRARY_PATH_VAR, STORE_ROOT};
use burrow_common::context::LaunchContext;
use burrow_common::error::Result;

use crate::paths::SearchPathList;
use crate::{config, elf, ldconfig};

/// Directories a strategy wants added to the loader search path.
#[derive(Debug, Clone, Default)]
pub struct Augmentation {
    /// Directories placed before the inherited environment value. Used for
    /// the target's own loader directory, which must win over everything.
    pub loader_dirs: Vec<String>,
    /// Directories placed after the inherited environment value, as a
    /// last-resort fallback to host libraries.
    pub fallback_dirs: Vec<String>,
}

impl Augmentation {
    /// Whether the strategy found nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loader_dirs.is_empty() && self.fallback_dirs.is_empty()
    }
}

/// A deployment-selected way of computing extra library search directories.
pub trait LibraryPathResolver {
    /// Computes the augmentation for this launch.
    ///
    /// # Errors
    ///
    /// Returns an error when the whole augmentation step must be abandoned;
    /// the caller logs it and launches without augmentation.
    fn resolve(&self, ctx: &LaunchContext) -> Result<Augmentation>;
}

/// Strategy that parses the host's loader configuration file.
#[derive(Debug, Clone)]
pub struct ConfigFileResolver {
    config_path: PathBuf,
}

impl ConfigFileResolver {
    /// Uses an explicit configuration root instead of the host default.
    #[must_use]
    pub const fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

impl Default for ConfigFileResolver {
    fn default() -> Self {
        Self::new(PathBuf::from(LD_CONF_PATH))
    }
}

impl LibraryPathResolver for ConfigFileResolver {
    fn resolve(&self, _ctx: &LaunchContext) -> Result<Augmentation> {
        let dirs = config::parse_search_paths(&self.config_path)?;
        tracing::debug!(count = dirs.len(), "loader configuration parsed");
        Ok(Augmentation {
            loader_dirs: Vec::new(),
            fallback_dirs: dirs.into_vec(),
        })
    }
}

/// Strategy that introspects the target binary and the host library cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntrospectionResolver;

impl LibraryPathResolver for IntrospectionResolver {
    fn resolve(&self, ctx: &LaunchContext) -> Result<Augmentation> {
        let loader_dirs = entrypoint_interpreter_dir(ctx).into_iter().collect();
        Ok(Augmentation {
            loader_dirs,
            fallback_dirs: host_fallback_dirs(),
        })
    }
}

/// Finds the loader directory of the real target program: one readlink level
/// through the `entrypoint` link, then ELF introspection of the target,
/// falling back to the bundle's captured copy for store paths not yet
/// visible on the host.
fn entrypoint_interpreter_dir(ctx: &LaunchContext) -> Option<String> {
    let link = ctx.entrypoint_link();
    let target = match std::fs::read_link(&link) {
        Ok(target) => target,
        Err(error) => {
            tracing::debug!(link = %link.display(), %error, "entrypoint readlink failed");
            return None;
        }
    };
    tracing::debug!(target = %target.display(), "entrypoint target");

    let dir = elf::interpreter_dir(&target).or_else(|| {
        if target.starts_with(STORE_ROOT) {
            elf::interpreter_dir(&ctx.bundled_copy_of(&target))
        } else {
            None
        }
    });
    match dir {
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "entrypoint loader directory");
            Some(dir.to_string_lossy().into_owned())
        }
        None => {
            tracing::debug!("entrypoint loader directory not found");
            None
        }
    }
}

/// Queries the host library cache, tolerating total failure of the step.
fn host_fallback_dirs() -> Vec<String> {
    let Some(self_id) = elf::self_identity() else {
        tracing::warn!("cannot read own ELF identity, skipping library cache query");
        return Vec::new();
    };
    match ldconfig::host_library_dirs(&self_id) {
        Ok(dirs) => dirs.into_vec(),
        Err(error) => {
            tracing::warn!(%error, "host library cache query failed");
            Vec::new()
        }
    }
}

/// Merges an augmentation with the inherited search path value: loader
/// directories first, then the inherited segments (split on `:`, empties
/// dropped), then the fallback directories, first occurrence winning
/// throughout. `None` when nothing remains.
#[must_use]
pub fn merged_value(inherited: Option<&str>, augmentation: &Augmentation) -> Option<String> {
    let mut merged = SearchPathList::new();
    merged.extend(augmentation.loader_dirs.iter().cloned());
    if let Some(inherited) = inherited {
        merged.extend(inherited.split(':').filter(|segment| !segment.is_empty()));
    }
    merged.extend(augmentation.fallback_dirs.iter().cloned());
    if merged.is_empty() {
        None
    } else {
        Some(merged.join())
    }
}

/// Runs the strategy and publishes the merged search path into the process
/// environment, where the final exec hands it to the bundled program.
///
/// Never fatal: a failed strategy or an empty merge leaves the environment
/// exactly as inherited.
pub fn apply(ctx: &LaunchContext, resolver: &dyn LibraryPathResolver) {
    let augmentation = match resolver.resolve(ctx) {
        Ok(augmentation) => augmentation,
        Err(error) => {
            tracing::warn!(%error, "library path augmentation failed, launching without it");
            return;
        }
    };

    let inherited = std::env::var_os(LIBRARY_PATH_VAR).map(|v| v.to_string_lossy().into_owned());
    match merged_value(inherited.as_deref(), &augmentation) {
        Some(value) => {
            tracing::debug!(%value, "publishing library search path");
            set_library_path(&value);
        }
        None => tracing::debug!("empty search path merge, environment untouched"),
    }
}

// The launcher is single-threaded until the final exec, so environment
// mutation cannot race.
#[allow(unsafe_code)]
fn set_library_path(value: &str) {
    unsafe { std::env::set_var(LIBRARY_PATH_VAR, value) }
}
