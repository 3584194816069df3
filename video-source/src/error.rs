/// Errors that can be returned by a video source.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Internal error occured. This error is not recoverable.")]
    InternalError,
    #[error("The interface became invalidated and needs to be recreated.")]
    AccessLost,
    #[error("The capture source has not been initialized.")]
    NotInitialized,
    #[error("No display exists at index {0}.")]
    NoDisplay(u32),
    #[error("The capture source does not support this system.")]
    Unsupported,
}
