//! Command: print version information.

/// Version string: `DULL_VERSION` from the build environment, else the
/// package version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DULL_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the dull version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("dull {}", version());
}
