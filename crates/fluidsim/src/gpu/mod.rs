pub(crate) mod context;
pub(crate) mod programs;
pub(crate) mod targets;

pub use context::{request_headless_device, FieldCapabilities};
pub use targets::RenderTarget;
