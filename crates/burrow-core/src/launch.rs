//! The launch lifecycle.
//!
//! Drives a single process from plain host execution to running the bundled
//! program inside its synthetic root. Every step is a blocking call executed
//! in [`LaunchPhase`] order; the run either reaches `Execed` (at which point
//! this code no longer exists in the process) or aborts fatally.

use std::convert::Infallible;
use std::ffi::{CString, OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;

use nix::unistd::{chdir, chroot, execv, getcwd};

use burrow_common::context::LaunchContext;
use burrow_common::error::{BurrowError, Result};
use burrow_ldpath::resolver::{self, LibraryPathResolver};

use crate::{namespace, rootview};

/// The strictly sequential, irreversible phases of a launch.
///
/// `IdentityMapped` only occurs for unprivileged callers; every other phase
/// occurs exactly once on a successful launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LaunchPhase {
    /// Context discovered, nothing irreversible done yet.
    Init,
    /// New mount (and possibly user) namespace entered.
    NamespaceCreated,
    /// Self-to-self uid/gid maps written (unprivileged callers only).
    IdentityMapped,
    /// Scratch tmpfs mounted and made unbindable.
    RootMounted,
    /// Host root entries grafted into the view.
    RootPopulated,
    /// Bundled dependency store bound at its original path.
    StoreBound,
    /// Process confined to the synthetic root, working directory restored.
    Chrooted,
    /// Process image replaced by the bundled program.
    Execed,
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::NamespaceCreated => "namespace-created",
            Self::IdentityMapped => "identity-mapped",
            Self::RootMounted => "root-mounted",
            Self::RootPopulated => "root-populated",
            Self::StoreBound => "store-bound",
            Self::Chrooted => "chrooted",
            Self::Execed => "execed",
        };
        f.write_str(name)
    }
}

/// Runs the full launch: publish the library search path, isolate, build the
/// root view, enter it, and hand the process over to the bundled program.
///
/// On success this never returns: the process image is replaced.
///
/// # Errors
///
/// Returns an error for any fatal step; the caller reports it and exits with
/// the dedicated launch-failure status.
pub fn run(
    ctx: &LaunchContext,
    strategy: &dyn LibraryPathResolver,
    argv: &[OsString],
) -> Result<Infallible> {
    tracing::debug!(
        phase = %LaunchPhase::Init,
        app_dir = %ctx.app_dir().display(),
        "starting launch"
    );

    // Search path resolution must happen first: it reads host files at their
    // true paths, which stop being visible once the namespace changes.
    resolver::apply(ctx, strategy);

    let phase = namespace::isolate(ctx)?;
    tracing::debug!(%phase, "isolated");

    rootview::mount_scratch_root(ctx)?;
    tracing::debug!(phase = %LaunchPhase::RootMounted, "scratch root mounted");

    rootview::populate_from_host(ctx)?;
    tracing::debug!(phase = %LaunchPhase::RootPopulated, "host view populated");

    rootview::bind_store(ctx)?;
    tracing::debug!(phase = %LaunchPhase::StoreBound, "dependency store bound");

    enter_root(ctx)?;
    tracing::debug!(phase = %LaunchPhase::Chrooted, "root entered");

    exec_entrypoint(ctx, argv)
}

/// Confines the process to the synthetic root.
///
/// The working directory is recorded first and restored after the chroot:
/// `chroot(2)` does not change it, but its meaning must survive for the
/// bundled program's relative-path arguments to keep working.
fn enter_root(ctx: &LaunchContext) -> Result<()> {
    let cwd = getcwd().map_err(|errno| BurrowError::Launch {
        op: "getcwd",
        source: errno.into(),
    })?;
    chroot(&ctx.mount_root()).map_err(|errno| BurrowError::Launch {
        op: "chroot",
        source: errno.into(),
    })?;
    chdir(&cwd).map_err(|errno| BurrowError::Launch {
        op: "chdir",
        source: errno.into(),
    })
}

/// Resolves the `entrypoint` link to the real in-bundle executable and
/// replaces the process image, forwarding the argument vector untouched.
fn exec_entrypoint(ctx: &LaunchContext, argv: &[OsString]) -> Result<Infallible> {
    let link = ctx.entrypoint_link();
    let target = std::fs::read_link(&link).map_err(|source| BurrowError::Io {
        path: link,
        source,
    })?;
    tracing::debug!(
        phase = %LaunchPhase::Execed,
        target = %target.display(),
        "handing the process over"
    );

    let exe = cstring(target.as_os_str())?;
    let argv = argv
        .iter()
        .map(|arg| cstring(arg))
        .collect::<Result<Vec<CString>>>()?;
    execv(&exe, &argv).map_err(|errno| BurrowError::Launch {
        op: "exec",
        source: errno.into(),
    })
}

fn cstring(value: &OsStr) -> Result<CString> {
    CString::new(value.as_bytes()).map_err(|_| BurrowError::Launch {
        op: "exec",
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "argument contains an interior NUL byte",
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_follow_the_lifecycle_order() {
        let phases = [
            LaunchPhase::Init,
            LaunchPhase::NamespaceCreated,
            LaunchPhase::IdentityMapped,
            LaunchPhase::RootMounted,
            LaunchPhase::RootPopulated,
            LaunchPhase::StoreBound,
            LaunchPhase::Chrooted,
            LaunchPhase::Execed,
        ];
        for pair in phases.windows(2) {
            assert!(pair[0] < pair[1], "{} must precede {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn phase_names_are_stable() {
        assert_eq!(LaunchPhase::Init.to_string(), "init");
        assert_eq!(LaunchPhase::IdentityMapped.to_string(), "identity-mapped");
        assert_eq!(LaunchPhase::Execed.to_string(), "execed");
    }

    #[test]
    fn arguments_convert_to_c_strings() {
        let arg = OsString::from("--flag=value");
        assert_eq!(
            cstring(&arg).expect("should convert").as_bytes(),
            b"--flag=value"
        );
    }

    #[test]
    fn interior_nul_in_argument_is_rejected() {
        let arg = OsString::from("bad\0arg");
        assert!(cstring(&arg).is_err());
    }
}
