pub mod error;
pub mod host;
pub mod image;
pub mod runtime;
pub mod term;

pub use host::HostIo;
pub use image::Image;
pub use runtime::RunState;
