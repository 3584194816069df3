mod display_duplicator;
mod surface;

pub use display_duplicator::DisplayDuplicator;

use crate::Error;
use windows::Win32::Graphics::Dxgi::DXGI_ERROR_ACCESS_LOST;

impl From<windows::core::Error> for Error {
    fn from(value: windows::core::Error) -> Self {
        tracing::error!("{}", value);

        match value.code() {
            DXGI_ERROR_ACCESS_LOST => Error::AccessLost,
            _ => Error::InternalError,
        }
    }
}
