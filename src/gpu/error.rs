use ash::vk;
use thiserror::Error;

use super::structs::BackendKind;

/// Coarse classification of a [`GPUError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The API was used outside of its contract.
    Misuse,
    /// A native allocation failed. The caller may free resources and retry.
    ResourceExhausted,
    /// The device or driver failed.
    Device,
    /// The platform could not provide what was asked for.
    Platform,
}

#[derive(Debug, Error)]
pub enum GPUError {
    #[error("command buffer is not in a state that allows this call")]
    InvalidState,
    #[error("out of host or device memory")]
    OutOfMemory,
    #[error("device lost")]
    DeviceLost,
    #[error("Vulkan error: {0}")]
    Vulkan(vk::Result),
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),
    #[error("no suitable device: {0}")]
    NoDevice(&'static str),
    #[error("invalid pipeline layout: {0}")]
    InvalidLayout(String),
    #[error("backend {0:?} is not available in this build")]
    BackendUnavailable(BackendKind),
}

impl GPUError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GPUError::InvalidState | GPUError::InvalidLayout(_) => ErrorKind::Misuse,
            GPUError::OutOfMemory => ErrorKind::ResourceExhausted,
            GPUError::DeviceLost | GPUError::Vulkan(_) => ErrorKind::Device,
            GPUError::Loading(_) | GPUError::NoDevice(_) | GPUError::BackendUnavailable(_) => {
                ErrorKind::Platform
            }
        }
    }

    /// Only resource exhaustion is worth retrying.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::ResourceExhausted
    }
}

/// Convenient crate-wide result type.
pub type Result<T, E = GPUError> = std::result::Result<T, E>;

impl From<vk::Result> for GPUError {
    fn from(res: vk::Result) -> Self {
        match res {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY
            | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            | vk::Result::ERROR_OUT_OF_POOL_MEMORY
            | vk::Result::ERROR_FRAGMENTED_POOL => GPUError::OutOfMemory,
            vk::Result::ERROR_DEVICE_LOST => GPUError::DeviceLost,
            other => GPUError::Vulkan(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_is_recoverable() {
        let err: GPUError = vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.into();
        assert!(matches!(err, GPUError::OutOfMemory));
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert!(err.is_recoverable());
    }

    #[test]
    fn device_loss_is_fatal() {
        let err: GPUError = vk::Result::ERROR_DEVICE_LOST.into();
        assert_eq!(err.kind(), ErrorKind::Device);
        assert!(!err.is_recoverable());

        let err: GPUError = vk::Result::ERROR_INITIALIZATION_FAILED.into();
        assert!(matches!(err, GPUError::Vulkan(_)));
    }

    #[test]
    fn invalid_state_is_misuse() {
        assert_eq!(GPUError::InvalidState.kind(), ErrorKind::Misuse);
        assert_eq!(
            GPUError::BackendUnavailable(BackendKind::Metal).kind(),
            ErrorKind::Platform
        );
    }
}
