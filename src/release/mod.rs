//! Everything that happens after the archive exists: release notes, pipeline
//! outputs and publishing.

pub mod notes;
pub mod outputs;
pub mod publish;

pub use outputs::Outputs;
pub use publish::{GitHubPublisher, PublishOutcome, ReleaseDraft, ReleasePublisher};
