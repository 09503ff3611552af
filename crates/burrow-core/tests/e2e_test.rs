//! End-to-end launch tests.
//!
//! The unprivileged-namespace path cannot run under the normal multithreaded
//! test harness (the kernel rejects `unshare(CLONE_NEWUSER)` from a threaded
//! process), so the mount-level tests are opt-in via `--ignored
//! --test-threads=1` on a user-namespace-capable kernel.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use burrow_common::context::LaunchContext;

fn fake_bundle(dir: &Path) -> LaunchContext {
    std::fs::create_dir(dir.join("mountroot")).expect("create mountroot");
    std::fs::create_dir(dir.join("nix")).expect("create store");
    std::fs::write(dir.join("nix").join("witness"), "bundled").expect("seed store");
    std::os::unix::fs::symlink("/nix/store/fake/bin/app", dir.join("entrypoint"))
        .expect("create entrypoint link");
    LaunchContext::new(
        dir.to_path_buf(),
        nix::unistd::getuid().as_raw(),
        nix::unistd::getgid().as_raw(),
    )
}

#[test]
fn bundle_layout_matches_the_packaging_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = fake_bundle(dir.path());

    assert!(ctx.mount_root().is_dir());
    assert!(ctx.store_dir().is_dir());
    assert_eq!(
        std::fs::read_link(ctx.entrypoint_link()).expect("entrypoint resolves"),
        Path::new("/nix/store/fake/bin/app")
    );
}

/// Two launches sharing one namespace must both succeed: the unbindable
/// remount keeps the first view from being recursively bound into the
/// second, so the mount table stays flat instead of exploding.
#[test]
#[ignore = "requires --test-threads=1 and a kernel allowing unprivileged user namespaces"]
fn double_launch_reuses_the_scratch_mountpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = fake_bundle(dir.path());

    let phase = burrow_core::namespace::isolate(&ctx).expect("namespace bootstrap");
    assert!(
        phase >= burrow_core::launch::LaunchPhase::NamespaceCreated,
        "bootstrap must report a post-namespace phase"
    );

    for round in 0..2 {
        burrow_core::rootview::mount_scratch_root(&ctx)
            .unwrap_or_else(|e| panic!("scratch root mount, round {round}: {e}"));
        burrow_core::rootview::bind_store(&ctx)
            .unwrap_or_else(|e| panic!("store bind, round {round}: {e}"));
        assert!(
            ctx.mount_root().join("nix").join("witness").is_file(),
            "store contents visible in round {round}"
        );
    }
}
