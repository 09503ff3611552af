//! Isolation and launch for bundled programs.
//!
//! Once the library search path is published, the process moves through an
//! irreversible sequence: new namespaces, a synthetic root assembled from
//! host bind mounts plus the bundled dependency store, then chroot and the
//! final exec. Everything mounted here lives only as long as the mount
//! namespace, so there is nothing to clean up on any exit path.

pub mod launch;
pub mod namespace;
pub mod rootview;
