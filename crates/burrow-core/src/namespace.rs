//! Mount and user namespace bootstrap.
//!
//! A fresh mount namespace makes the synthetic root invisible to the rest of
//! the host. Unprivileged callers additionally get a user namespace with
//! their own uid/gid mapped to itself, which is what grants them mount
//! permission in the first place. Root needs no user namespace and gets
//! none.

use std::path::Path;

use nix::sched::{CloneFlags, unshare};

use burrow_common::context::LaunchContext;
use burrow_common::error::{BurrowError, Result};

use crate::launch::LaunchPhase;

/// Moves the process into a new mount namespace (and, for unprivileged
/// callers, a new user namespace with identity mapping).
///
/// Must run while the process is still single-threaded; the kernel rejects
/// user-namespace creation otherwise.
///
/// # Errors
///
/// Returns an error if the `unshare(2)` call or any identity-map write
/// fails. All of these are fatal to the launch.
pub fn isolate(ctx: &LaunchContext) -> Result<LaunchPhase> {
    let mut flags = CloneFlags::CLONE_NEWNS;
    if !ctx.is_privileged() {
        flags |= CloneFlags::CLONE_NEWUSER;
    }

    unshare(flags).map_err(|errno| BurrowError::Namespace {
        step: "unshare",
        source: errno.into(),
    })?;
    tracing::debug!(?flags, "namespaces created");

    if ctx.is_privileged() {
        return Ok(LaunchPhase::NamespaceCreated);
    }
    map_identity(ctx)?;
    Ok(LaunchPhase::IdentityMapped)
}

/// Writes the self-to-self uid and gid maps for the new user namespace.
///
/// The order is mandated by `user_namespaces(7)`: the gid map is only
/// writable after `setgroups` has been denied.
fn map_identity(ctx: &LaunchContext) -> Result<()> {
    write_proc_self("uid_map", &identity_map_line(ctx.uid()))?;
    write_proc_self("setgroups", "deny")?;
    write_proc_self("gid_map", &identity_map_line(ctx.gid()))?;
    tracing::debug!(uid = ctx.uid(), gid = ctx.gid(), "identity mapped");
    Ok(())
}

/// One map line sending an id to itself, length 1.
fn identity_map_line(id: u32) -> String {
    format!("{id} {id} 1\n")
}

fn write_proc_self(name: &'static str, contents: &str) -> Result<()> {
    let path = Path::new("/proc/self").join(name);
    std::fs::write(path, contents).map_err(|source| BurrowError::Namespace { step: name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_line_sends_an_id_to_itself() {
        assert_eq!(identity_map_line(1000), "1000 1000 1\n");
        assert_eq!(identity_map_line(0), "0 0 1\n");
    }
}
