//! DoViBake — dual-layer Dolby Vision reconstruction
//!
//! Rebuilds a single-layer RGB or YUV signal from a base layer, an optional
//! enhancement layer and per-frame reshaping metadata.
//!
//! # Features
//!
//! - **Engine pool**: bounded set of mapping engines sharing one metadata structure
//! - **Geometry dispatch**: eight specialized paths for BL/EL chroma and resolution
//! - **Upsampling**: separable 2x filters for chroma and quarter-resolution EL
//! - **Assembly**: quick single-pass or full-quality reconstruction, optional trim
//!
//! # Example
//!
//! ```rust,no_run
//! use dovibake::{Baker, BakerConfig, Frame, FrameFormat, LayerInfo, ReferenceFactory};
//!
//! fn main() -> dovibake::Result<()> {
//!     let config = BakerConfig::default().with_metadata_file("clip.toml");
//!     let bl = LayerInfo::new(1920, 1080, FrameFormat::Yuv420p16).with_bit_depth(10);
//!     let el = LayerInfo::new(960, 540, FrameFormat::Yuv420p16).with_bit_depth(10);
//!
//!     let baker = Baker::new(config, &ReferenceFactory, bl, Some(el))?;
//!     let bl_frame = Frame::new(1920, 1080, FrameFormat::Yuv420p16);
//!     let el_frame = Frame::new(960, 540, FrameFormat::Yuv420p16);
//!     let rgb = baker.get_frame(0, &bl_frame, Some(&el_frame))?;
//!     println!("{} {}", rgb.resolution(), rgb.format());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod processing;
pub mod types;

// Re-exports for convenience
pub use config::{BakerConfig, MetadataSource, OutputFamily, Preset, TrimConfig};
pub use engine::{
    EngineFactory, EngineSettings, MappingEngine, ReferenceEngine, ReferenceFactory,
    ReferenceMetadata,
};
pub use error::{Error, Result};
pub use pipeline::Baker;
pub use pool::{pool_size, EngineLease, EnginePool};
pub use processing::{FrameGeometry, FrameProps};
pub use types::{Frame, FrameFormat, LayerInfo, Plane, Resolution};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
