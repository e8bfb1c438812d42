pub mod annotate;
pub mod document;
pub mod error;
pub mod session;
pub mod sync;
pub mod transport;
pub mod visibility;

// Re-export key types for easier usage
pub use annotate::annotate;
pub use document::*;
pub use error::SyncError;
pub use session::*;
pub use sync::{
    FocusBand, Origin, RenderToSource, SourceToRender, SyncPolicy, SyncState,
};
pub use transport::*;
pub use visibility::*;
