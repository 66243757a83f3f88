//! release-rail: cut a release from a package checkout
//!
//! Reads the version from the manifest, picks the matching changelog section,
//! builds distributable artifacts and publishes them as a tagged release.
//! Each stage is usable on its own; [`release::pipeline`] runs them in order.

pub mod commands;
pub mod core;
pub mod release;
pub mod ui;
