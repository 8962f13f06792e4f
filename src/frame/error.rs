use thiserror::Error;

/// Fatal per-frame failures. Out-of-date and suboptimal surfaces are not
/// errors; they come back as [`super::Acquire`] / [`super::PresentStatus`].
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("waiting for the previous frame failed: {0}")]
    FenceWait(String),

    #[error("failed to acquire a presentation image: {0}")]
    Acquire(String),

    #[error("failed to present: {0}")]
    Present(String),

    #[error("failed to read back GPU results: {0}")]
    Readback(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("{required} instances exceed the device limit of {limit}")]
    CapacityExceeded { required: u64, limit: u64 },

    #[error("instance buffers grew {retries} times in one frame without fitting {instances} instances")]
    GrowthDidNotConverge { retries: u32, instances: u32 },
}
