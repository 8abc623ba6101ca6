pub mod analysis_store;
pub mod artifacts;
pub mod refresh_task;

pub use analysis_store::{AnalysisStore, StoreSettings};
pub use artifacts::{ArtifactKind, Artifacts, RenderReport};
