//! Image processing: the pixel-level collaborators of the version engine.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::guess_format` + `image::load_from_memory_with_format` |
//! | **Encode** | PNG / JPEG encoders from `image::codecs` |
//! | **Resample** | `crop_imm` + `resize_exact` (Lanczos3 by default) |
//!
//! The module is split into:
//! - **Parameters**: formats, filters, and quality settings
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Decoded, ImageBackend};
pub use params::{OutputFormat, Quality, ResampleFilter};
pub use rust_backend::RustBackend;
