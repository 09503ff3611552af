//! Synthetic root construction.
//!
//! Assembles, at the pre-created mountpoint beside the launcher, the root the
//! bundled program will be confined to: a tmpfs carrying one placeholder per
//! host root entry with the real entry recursively bind-mounted over it, plus
//! the bundled dependency store bound at its original absolute path. The
//! tmpfs and every bind vanish with the mount namespace, so nothing is ever
//! torn down explicitly.

use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;

use nix::mount::{MsFlags, mount};

use burrow_common::constants::STORE_DIR_NAME;
use burrow_common::context::LaunchContext;
use burrow_common::error::{BurrowError, Result};

/// Mounts the anonymous in-memory filesystem backing the root view and makes
/// it unbindable.
///
/// The unbindable remount stops mount-event propagation and keeps repeated
/// launches sharing a namespace from recursively binding earlier views into
/// later ones.
///
/// # Errors
///
/// Returns an error if either mount fails; the launch cannot proceed.
pub fn mount_scratch_root(ctx: &LaunchContext) -> Result<()> {
    let root = ctx.mount_root();

    mount(
        Some("tmpfs"),
        &root,
        Some("tmpfs"),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|errno| BurrowError::Mount {
        source_path: "tmpfs".into(),
        target: root.clone(),
        source: errno.into(),
    })?;

    mount(
        Some(&root),
        &root,
        None::<&str>,
        MsFlags::MS_UNBINDABLE,
        None::<&str>,
    )
    .map_err(|errno| BurrowError::Mount {
        source_path: root.clone(),
        target: root.clone(),
        source: errno.into(),
    })
}

/// Grafts every host root entry except the dependency store into the view.
///
/// Each entry gets a same-named placeholder and a recursive bind mount.
/// A single entry failing to stat, create, or bind is logged and left
/// absent; the view stays usable without it.
///
/// # Errors
///
/// Returns an error only if the host root itself cannot be enumerated.
pub fn populate_from_host(ctx: &LaunchContext) -> Result<()> {
    let root = ctx.mount_root();
    let host_root = std::fs::read_dir("/").map_err(|source| BurrowError::Io {
        path: "/".into(),
        source,
    })?;

    for entry in host_root {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(%error, "unreadable host root entry, skipping");
                continue;
            }
        };
        let name = entry.file_name();
        if name == STORE_DIR_NAME {
            // Bound separately from the bundle's own copy.
            continue;
        }
        let from = entry.path();
        let to = root.join(&name);
        if let Err(error) = graft_host_entry(&from, &to) {
            tracing::warn!(from = %from.display(), %error, "leaving root entry absent");
        }
    }
    Ok(())
}

/// Binds the bundled dependency store at its original absolute path.
///
/// # Errors
///
/// Returns an error if the placeholder or the bind fails; without the store
/// the bundled program cannot run at all.
pub fn bind_store(ctx: &LaunchContext) -> Result<()> {
    let from = ctx.store_dir();
    let to = ctx.mount_root().join(STORE_DIR_NAME);

    std::fs::DirBuilder::new()
        .mode(0o777)
        .create(&to)
        .map_err(|source| BurrowError::Io {
            path: to.clone(),
            source,
        })?;
    bind_recursive(&from, &to)
}

fn graft_host_entry(from: &Path, to: &Path) -> Result<()> {
    // Follows symlinks, so a root-level symlink is grafted as whatever it
    // points at rather than recreated as a symlink.
    let meta = std::fs::metadata(from).map_err(|source| BurrowError::Io {
        path: from.to_path_buf(),
        source,
    })?;
    create_placeholder(&meta, to)?;
    bind_recursive(from, to)
}

/// Creates the mount target: a directory for directories, an empty file for
/// everything else, carrying the host entry's permission bits with the
/// file-type bits stripped.
fn create_placeholder(meta: &std::fs::Metadata, to: &Path) -> Result<()> {
    let mode = meta.permissions().mode() & 0o7777;
    let created = if meta.is_dir() {
        std::fs::DirBuilder::new().mode(mode).create(to)
    } else {
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(to)
            .map(drop)
    };
    created.map_err(|source| BurrowError::Io {
        path: to.to_path_buf(),
        source,
    })
}

fn bind_recursive(from: &Path, to: &Path) -> Result<()> {
    tracing::debug!(from = %from.display(), to = %to.display(), "bind mounting");
    mount(
        Some(from),
        to,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|errno| BurrowError::Mount {
        source_path: from.to_path_buf(),
        target: to.to_path_buf(),
        source: errno.into(),
    })
}
