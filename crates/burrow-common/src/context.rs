//! The per-launch context value.
//!
//! Everything the launch steps need to know about where the launcher lives
//! and who is running it, captured exactly once at startup and passed
//! explicitly to every component. The uid/gid are read before any namespace
//! change because the identity maps must name the ids from the parent
//! namespace.

use std::path::{Path, PathBuf};

use crate::constants::{ENTRYPOINT_LINK_NAME, MOUNT_ROOT_DIR_NAME, STORE_DIR_NAME};
use crate::error::{BurrowError, Result};

/// Immutable facts about this launch, derived from the launcher binary's
/// location and the invoking user.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    app_dir: PathBuf,
    uid: u32,
    gid: u32,
}

impl LaunchContext {
    /// Builds a context from explicit parts.
    #[must_use]
    pub const fn new(app_dir: PathBuf, uid: u32, gid: u32) -> Self {
        Self { app_dir, uid, gid }
    }

    /// Builds the context for the running process: the launcher's directory
    /// resolved through `/proc/self/exe`, and the real uid/gid.
    ///
    /// # Errors
    ///
    /// Returns an error if the launcher's own path cannot be resolved.
    pub fn discover() -> Result<Self> {
        let exe = std::fs::canonicalize("/proc/self/exe").map_err(|source| BurrowError::Io {
            path: PathBuf::from("/proc/self/exe"),
            source,
        })?;
        let app_dir = exe
            .parent()
            .ok_or_else(|| BurrowError::Io {
                path: exe.clone(),
                source: std::io::Error::other("launcher binary has no parent directory"),
            })?
            .to_path_buf();

        Ok(Self {
            app_dir,
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        })
    }

    /// Directory containing the launcher binary and the bundle layout.
    #[must_use]
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    /// Real uid captured at startup.
    #[must_use]
    pub const fn uid(&self) -> u32 {
        self.uid
    }

    /// Real gid captured at startup.
    #[must_use]
    pub const fn gid(&self) -> u32 {
        self.gid
    }

    /// Whether the invoking user is root, in which case no user namespace is
    /// needed for mount operations.
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        self.uid == 0
    }

    /// Mountpoint of the synthetic root view.
    #[must_use]
    pub fn mount_root(&self) -> PathBuf {
        self.app_dir.join(MOUNT_ROOT_DIR_NAME)
    }

    /// The bundled dependency store beside the launcher.
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        self.app_dir.join(STORE_DIR_NAME)
    }

    /// The `entrypoint` symlink naming the real in-bundle program.
    #[must_use]
    pub fn entrypoint_link(&self) -> PathBuf {
        self.app_dir.join(ENTRYPOINT_LINK_NAME)
    }

    /// Re-roots an absolute bundle path under the captured store copy, for
    /// use before the store is mounted at its original location.
    #[must_use]
    pub fn bundled_copy_of(&self, absolute: &Path) -> PathBuf {
        match absolute.strip_prefix("/") {
            Ok(relative) => self.app_dir.join(relative),
            Err(_) => self.app_dir.join(absolute),
        }
    }
}
