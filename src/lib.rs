//! Dotfile build-and-deploy engine.
//!
//! Modules (source directories paired with target directories) are scanned
//! into a virtual tree of link entries, stored as an immutable build, and
//! deployed onto the filesystem as symlinks or copies inside a transaction
//! that rolls back on failure.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: parse and validate the TOML module list
//! - **[`directives`]**: decide how each module directory is linked
//! - **[`build`]**: resolve modules into a conflict-free build
//! - **[`store`]**: persist builds and deployment records
//! - **[`deploy`]**: apply, roll back and reverse deployments
//! - **[`resources`]**: idempotent symlink and copy primitives
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod build;
pub mod cli;
pub mod commands;
pub mod config;
pub mod deploy;
pub mod directives;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod resources;
pub mod store;
