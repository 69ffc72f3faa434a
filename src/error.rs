//! Error types for the particle lab.
//!
//! Fatal failures (allocation, pipeline construction) surface as
//! [`EngineError`]. A missing compute device is not an error at the engine
//! level: the factory reports it once and hands back a disabled engine.

use std::fmt;

/// Errors that can occur while acquiring or talking to the GPU.
#[derive(Debug)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Failed to map buffer for reading.
    BufferMapping(String),
    /// The particle buffer exceeds what the adapter can bind.
    BufferTooLarge {
        /// Requested size in bytes.
        requested: u64,
        /// Largest storage binding the adapter supports.
        limit: u64,
    },
}

impl GpuError {
    /// Whether this error means "no usable compute device" rather than a bug.
    ///
    /// These are the conditions that put the engine into its disabled state.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, GpuError::NoAdapter | GpuError::DeviceCreation(_))
    }
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
            GpuError::BufferTooLarge { requested, limit } => write!(
                f,
                "Particle buffer of {} bytes exceeds the adapter storage binding limit of {} bytes",
                requested, limit
            ),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Fatal errors that abort engine construction or host-side transfers.
#[derive(Debug)]
pub enum EngineError {
    /// The aligned particle block could not be reserved.
    Allocation {
        /// Number of quads that were requested.
        quads: usize,
    },
    /// GPU acquisition or transfer failed.
    Gpu(GpuError),
    /// The compute or render pipeline failed validation.
    Pipeline(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Allocation { quads } => {
                write!(f, "Failed to allocate particle store for {} quads", quads)
            }
            EngineError::Gpu(e) => write!(f, "GPU error: {}", e),
            EngineError::Pipeline(msg) => write!(f, "Failed to build pipeline: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for EngineError {
    fn from(e: GpuError) -> Self {
        EngineError::Gpu(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_unavailable_classification() {
        assert!(GpuError::NoAdapter.is_device_unavailable());
        assert!(!GpuError::BufferMapping("x".into()).is_device_unavailable());
        assert!(!GpuError::BufferTooLarge { requested: 2, limit: 1 }.is_device_unavailable());
    }

    #[test]
    fn test_engine_error_wraps_gpu_source() {
        let err: EngineError = GpuError::NoAdapter.into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("GPU error"));
    }

    #[test]
    fn test_allocation_message_names_quads() {
        let err = EngineError::Allocation { quads: 512 };
        assert!(err.to_string().contains("512"));
    }
}
