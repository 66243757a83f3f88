//! Release stages and their orchestration
//!
//! # Stages
//!
//! 1. **version**: read the package version from the manifest
//! 2. **changelog**: extract the release notes for that version
//! 3. **build**: run the packaging toolchain and collect fresh artifacts
//! 4. **publish**: create the tagged release, then attach the artifacts
//!
//! Stages never recover from each other's failures. A failed upload leaves the
//! release in place; `run-release upload` attaches whatever is missing.
//!
//! # Backends
//!
//! Publishing goes through [`publish::ReleaseBackend`]:
//! - [`github::GhBackend`] drives `gh release`
//! - [`memory::MemoryBackend`] keeps releases in process, with fault injection

pub mod build;
pub mod changelog;
pub mod github;
pub mod memory;
pub mod pipeline;
pub mod publish;
pub mod version;

pub use build::{ArtifactBuilder, BuildArtifact, BuildRecord};
pub use changelog::ChangelogSection;
pub use pipeline::{PipelineInputs, PipelineOrchestrator, PipelineReport, PublishMode, Stage, Step};
pub use publish::{ReleaseBackend, ReleaseDraft, ReleaseHandle, ReleasePublisher};
pub use version::Version;
