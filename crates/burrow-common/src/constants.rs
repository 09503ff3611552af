//! Fixed paths, names, and limits shared across the workspace.

/// Exit status for any failure before the bundled program takes over.
///
/// 127 aliases the shell's launcher-error status (see `system(3p)`), keeping
/// clear of codes the bundled application may assign meaning to.
pub const EXIT_LAUNCH_FAILURE: i32 = 127;

/// Upper bound on a single loader-configuration or cache-listing line.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Name of the dependency-store directory, both beside the launcher binary
/// and at the root of the synthetic filesystem view.
pub const STORE_DIR_NAME: &str = "nix";

/// Absolute path prefix under which every bundled file originally lives.
pub const STORE_ROOT: &str = "/nix";

/// Directory beside the launcher binary used as the synthetic root mountpoint.
///
/// Pre-created by the packaging step, so no cleanup is ever needed.
pub const MOUNT_ROOT_DIR_NAME: &str = "mountroot";

/// Symlink beside the launcher binary pointing at the real in-bundle program.
pub const ENTRYPOINT_LINK_NAME: &str = "entrypoint";

/// Environment variable the dynamic loader consults first when resolving
/// shared libraries.
pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Environment variable that, when set non-empty, traces every library-path
/// decision to stderr.
pub const DEBUG_LD_VAR: &str = "BURROW_DEBUG_LD";

/// Canonical host loader configuration file.
pub const LD_CONF_PATH: &str = "/etc/ld.so.conf";

/// Application name used in diagnostics.
pub const APP_NAME: &str = "burrow";

/// Binary name for the launcher.
pub const BIN_NAME: &str = "burrow-run";
