//! Frame processing
//!
//! Provides the per-frame building blocks of the baker:
//! - Geometry detection and quick-path dispatch
//! - Separable 2x upsampling of chroma and quarter-resolution EL planes
//! - Full-resolution BL/EL combination
//! - RGB conversion and luminance-range trim
//! - HDR tags attached to output frames

mod apply;
mod convert;
mod geometry;
pub mod hdr;
mod quick;
pub mod scale;

pub use apply::apply_mapping;
pub use convert::{apply_trim, convert_to_rgb, frame_from_le_bytes, raw_frame_size, write_le_bytes};
pub use geometry::{FrameGeometry, QuickPath};
pub use hdr::{
    linear_to_pq, nits_to_pq16, ColorMatrix, ColorPrimaries, ColorRange, FrameProps,
    LightLevels, TransferFunction,
};
pub use quick::bake_quick;
pub use scale::{
    upsample_chroma, upsample_horizontal, upsample_plane, upsample_vertical, upscale_el,
    KernelSpec, Upsampler, CHROMA_KERNEL, LUMA_KERNEL,
};
