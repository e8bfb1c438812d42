use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Transport peer disconnected")]
    Disconnected,
}
