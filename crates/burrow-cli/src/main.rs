//! # burrow-run — bundle launcher
//!
//! Runs a packaged application inside a synthetic root that exposes its
//! bundled dependency closure at the original absolute paths while keeping
//! the host visible, without elevated privilege or installation.
//!
//! The binary takes no options of its own: the whole argument vector belongs
//! to the bundled program and is forwarded to it verbatim. Diagnostics go to
//! stderr and are controlled by `RUST_LOG`, or switched to full decision
//! tracing by setting `BURROW_DEBUG_LD` non-empty.

use std::ffi::OsString;

use burrow_common::constants::{DEBUG_LD_VAR, EXIT_LAUNCH_FAILURE};
use burrow_common::context::LaunchContext;
use burrow_common::error::BurrowError;

fn main() {
    init_tracing();

    let ctx = match LaunchContext::discover() {
        Ok(ctx) => ctx,
        Err(error) => fail(&error),
    };
    let argv: Vec<OsString> = std::env::args_os().collect();

    match burrow_core::launch::run(&ctx, &strategy(), &argv) {
        Ok(never) => match never {},
        Err(error) => fail(&error),
    }
}

/// Reports a fatal step and exits with the dedicated launch-failure status,
/// leaving application-meaningful exit codes to the bundled program.
fn fail(error: &BurrowError) -> ! {
    tracing::error!(%error, "launch failed");
    std::process::exit(EXIT_LAUNCH_FAILURE)
}

fn init_tracing() {
    let filter = if debug_ld_enabled() {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn debug_ld_enabled() -> bool {
    std::env::var_os(DEBUG_LD_VAR).is_some_and(|value| !value.is_empty())
}

#[cfg(feature = "resolver-ld-config")]
fn strategy() -> burrow_ldpath::resolver::ConfigFileResolver {
    burrow_ldpath::resolver::ConfigFileResolver::default()
}

#[cfg(not(feature = "resolver-ld-config"))]
fn strategy() -> burrow_ldpath::resolver::IntrospectionResolver {
    burrow_ldpath::resolver::IntrospectionResolver
}
