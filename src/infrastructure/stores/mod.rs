//! Store adapters
//!
//! Implementations of the artifact and resource store ports:
//! - Filesystem artifact store scanning `@SPEC/@TEST/@CODE/@DOC` tags
//! - Filesystem resource store reading `<root>/<id>.md`
//! - In-memory stores for embedding and tests

pub mod fs_artifact_store;
pub mod fs_resource_store;
pub mod memory;

pub use fs_artifact_store::FsArtifactStore;
pub use fs_resource_store::FsResourceStore;
pub use memory::{InMemoryArtifactStore, InMemoryResourceStore};
