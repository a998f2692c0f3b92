//! Mapping engine interface
//!
//! The mapping engine turns a BL/EL sample pair plus reshaping metadata into
//! an output sample. The baker treats it as a collaborator:
//! - `MappingEngine` is the per-sample contract consumed by the pipeline
//! - `EngineFactory` builds pool members against one shared metadata structure
//! - `ReferenceEngine` is a small integer implementation for tools and tests

pub mod reference;

pub use reference::{ReferenceEngine, ReferenceFactory, ReferenceMetadata};

use crate::config::{MetadataSource, TrimConfig};
use crate::error::Result;
use std::sync::Arc;

/// Kernel computing one upsampled sample from a neighborhood and its center index
pub type Upscaler<const N: usize> = fn(&[u16; N], usize) -> u16;

/// Per-sample reconstruction contract
///
/// One engine is only ever touched by the context holding its lease, so
/// per-frame state lives behind `&mut self` in `initialize_frame` while the
/// per-sample calls take `&self`.
pub trait MappingEngine: Send + Sized {
    /// Parsed reshaping metadata shared read-only by all pool members
    type Metadata: Send + Sync;

    /// Handle to the shared metadata this engine was built against
    fn metadata(&self) -> &SharedMetadata<Self::Metadata>;

    /// Metadata arrives with each frame instead of from a file
    fn is_integrated_metadata(&self) -> bool;

    /// Number of frames described by file metadata
    fn clip_length(&self) -> Option<u32>;

    /// Load the metadata for frame `frame_index`
    fn initialize_frame(&mut self, frame_index: u32, embedded: Option<&[u8]>) -> Result<()>;

    fn process_sample_y(&self, bl_y: u16, el_y: u16) -> u16;

    fn process_sample_u(&self, bl: u16, el: u16, luma: u16, bl_u: u16, bl_v: u16) -> u16;

    fn process_sample_v(&self, bl: u16, el: u16, luma: u16, bl_u: u16, bl_v: u16) -> u16;

    /// Convert a reconstructed YUV triple to RGB
    fn sample_to_rgb(&self, y: u16, u: u16, v: u16) -> [u16; 3];

    /// Luminance-range trim of an RGB triple
    fn process_trim(&self, rgb: [u16; 3]) -> [u16; 3];

    fn upsample_luma_even(taps: &[u16; 5], center: usize) -> u16;

    fn upsample_luma_odd(taps: &[u16; 5], center: usize) -> u16;

    fn upsample_chroma_even(taps: &[u16; 4], center: usize) -> u16;

    fn upsample_chroma_odd(taps: &[u16; 4], center: usize) -> u16;

    fn is_scene_change(&self) -> bool;

    fn dynamic_min_pq(&self) -> u16;

    fn dynamic_max_pq(&self) -> u16;

    fn dynamic_max_content_light_level(&self) -> u16;

    fn static_min_pq(&self) -> u16 {
        0
    }

    fn static_max_pq(&self) -> u16;

    fn static_max_content_light_level(&self) -> u16;

    fn static_max_avg_content_light_level(&self) -> u16;

    fn static_master_display_max_luminance(&self) -> u16;

    fn static_master_display_min_luminance(&self) -> u16;

    fn is_limited_range_output(&self) -> bool;

    /// The EL contributes to the reconstruction for the current frame
    fn el_processing_enabled(&self) -> bool;

    fn trim_processing_enabled(&self) -> bool;
}

/// Settings copied identically into every pool member
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    /// Significant bits of BL samples
    pub bl_bit_depth: u8,
    /// Significant bits of EL samples (0 without EL)
    pub el_bit_depth: u8,
    /// 0 (auto), 7 or 8
    pub source_profile: u8,
    pub rgb_proof: bool,
    pub nlq_proof: bool,
    pub trim: TrimConfig,
}

/// How a new engine obtains its metadata
pub enum MetadataBinding<M> {
    /// Parse it; the engine becomes the owner
    Parse(MetadataSource),
    /// Borrow an already parsed structure
    Share(SharedMetadata<M>),
}

/// Ownership role of a metadata handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataRole {
    Owner,
    Borrower,
}

/// Shared, immutable reshaping metadata
///
/// Exactly one handle is the owner; `share` hands out borrowers. The pool
/// drops every borrower before the owner, so the structure is released when
/// the owning engine goes away.
#[derive(Debug)]
pub struct SharedMetadata<M> {
    inner: Arc<M>,
    role: MetadataRole,
}

impl<M> SharedMetadata<M> {
    /// Take ownership of freshly parsed metadata
    pub fn owned(metadata: M) -> Self {
        Self {
            inner: Arc::new(metadata),
            role: MetadataRole::Owner,
        }
    }

    /// Borrowing handle to the same structure
    pub fn share(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            role: MetadataRole::Borrower,
        }
    }

    pub fn role(&self) -> MetadataRole {
        self.role
    }

    pub fn is_owner(&self) -> bool {
        self.role == MetadataRole::Owner
    }

    /// Number of live handles (owner included)
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<M> std::ops::Deref for SharedMetadata<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.inner
    }
}

impl<M> Drop for SharedMetadata<M> {
    fn drop(&mut self) {
        if self.is_owner() && Arc::strong_count(&self.inner) > 1 {
            tracing::warn!(
                "Metadata owner released while {} borrowers remain",
                Arc::strong_count(&self.inner) - 1
            );
        }
    }
}

/// Builds mapping engines for the pool
pub trait EngineFactory {
    type Engine: MappingEngine;

    /// Create one engine. Fails with `Error::EngineInit` or `Error::Metadata`.
    fn create(
        &self,
        binding: MetadataBinding<<Self::Engine as MappingEngine>::Metadata>,
        settings: &EngineSettings,
    ) -> Result<Self::Engine>;
}
