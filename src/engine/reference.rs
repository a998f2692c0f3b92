//! Reference mapping engine
//!
//! A compact integer engine with TOML metadata:
//! - EL residuals are added to the BL with a fixed weight
//! - YUV to RGB uses the BT.2020 NCL matrix in Q14 fixed point
//! - Trim remaps PQ codes inside the mastering range onto the target range
//!
//! It is deterministic and cheap, which makes it suitable for the CLI,
//! tests and benchmarks.

use super::{EngineFactory, EngineSettings, MappingEngine, MetadataBinding, SharedMetadata};
use crate::config::MetadataSource;
use crate::error::{Error, Result};
use crate::processing::nits_to_pq16;
use serde::{Deserialize, Serialize};
use std::path::Path;

const LUMA_EVEN: [i32; 5] = [-1, 4, 26, 4, -1];
const LUMA_ODD: [i32; 5] = [0, -2, 18, 18, -2];
const LUMA_SHIFT: u32 = 5;

const CHROMA_EVEN: [i32; 4] = [28, 110, -10, 0];
const CHROMA_ODD: [i32; 4] = [-9, 111, 29, -3];
const CHROMA_SHIFT: u32 = 7;

// BT.2020 NCL YCbCr -> RGB, Q14
const CR_TO_R: i64 = 24160;
const CB_TO_G: i64 = 2696;
const CR_TO_G: i64 = 9361;
const CB_TO_B: i64 = 30825;

const NEUTRAL: i64 = 1 << 15;

/// Largest accepted weight magnitude (256x in 1/256 units)
pub const MAX_WEIGHT: i32 = 1 << 16;

fn default_el_weight() -> i32 {
    256
}

fn default_true() -> bool {
    true
}

/// Clip-wide light levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticLevels {
    pub min_pq: u16,
    pub max_pq: u16,
    pub max_content_light_level: u16,
    pub max_frame_average_light_level: u16,
    pub master_display_max_luminance: u16,
    pub master_display_min_luminance: u16,
}

impl Default for StaticLevels {
    fn default() -> Self {
        Self {
            min_pq: 0,
            max_pq: 3079,
            max_content_light_level: 1000,
            max_frame_average_light_level: 400,
            master_display_max_luminance: 1000,
            master_display_min_luminance: 0,
        }
    }
}

/// Per-frame record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameRecord {
    pub scene_change: bool,
    pub min_pq: u16,
    pub max_pq: u16,
    pub max_content_light_level: u16,
    /// EL residual is applied for this frame
    #[serde(default = "default_true")]
    pub el_enabled: bool,
}

impl Default for FrameRecord {
    fn default() -> Self {
        Self {
            scene_change: false,
            min_pq: 0,
            max_pq: 0,
            max_content_light_level: 0,
            el_enabled: true,
        }
    }
}

/// Reshaping metadata understood by the reference engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceMetadata {
    /// EL residual weight in 1/256 units
    #[serde(default = "default_el_weight")]
    pub el_weight: i32,
    /// Luma proxy contribution to chroma in 1/256 units
    pub chroma_luma_weight: i32,
    /// RGB output is limited range
    pub limited_range: bool,
    #[serde(rename = "static")]
    pub static_levels: StaticLevels,
    pub frames: Vec<FrameRecord>,
    /// Frames carry their own records
    #[serde(skip)]
    pub integrated: bool,
}

impl Default for ReferenceMetadata {
    fn default() -> Self {
        Self {
            el_weight: default_el_weight(),
            chroma_luma_weight: 0,
            limited_range: false,
            static_levels: StaticLevels::default(),
            frames: Vec::new(),
            integrated: false,
        }
    }
}

impl ReferenceMetadata {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let metadata: Self =
            toml::from_str(text).map_err(|e| Error::Metadata(format!("invalid metadata: {}", e)))?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Check weights against `MAX_WEIGHT`
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("el_weight", self.el_weight),
            ("chroma_luma_weight", self.chroma_luma_weight),
        ] {
            if weight.unsigned_abs() > MAX_WEIGHT.unsigned_abs() {
                return Err(Error::Metadata(format!(
                    "{} {} is outside [-{}, {}]",
                    name, weight, MAX_WEIGHT, MAX_WEIGHT
                )));
            }
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Metadata(format!("cannot read metadata {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Payload to embed in a frame for integrated metadata
    pub fn embed(record: &FrameRecord) -> Vec<u8> {
        toml::to_string(record)
            .map(String::into_bytes)
            .unwrap_or_default()
    }
}

/// Linear remap of PQ codes from the mastering range onto the target range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrimMap {
    src_lo: i64,
    src_hi: i64,
    dst_lo: i64,
    dst_hi: i64,
}

impl TrimMap {
    fn new(settings: &EngineSettings, levels: &StaticLevels) -> Option<Self> {
        if !settings.trim.is_enabled() {
            return None;
        }
        Some(Self {
            src_lo: nits_to_pq16(f32::from(levels.master_display_min_luminance)) as i64,
            src_hi: nits_to_pq16(f32::from(levels.master_display_max_luminance)) as i64,
            dst_lo: nits_to_pq16(settings.trim.target_min_nits) as i64,
            dst_hi: nits_to_pq16(settings.trim.target_max_nits) as i64,
        })
    }

    fn apply(&self, value: u16) -> u16 {
        let v = value as i64;
        if self.src_hi <= self.src_lo || v < self.src_lo || v > self.src_hi {
            return value;
        }
        let mapped =
            self.dst_lo + (v - self.src_lo) * (self.dst_hi - self.dst_lo) / (self.src_hi - self.src_lo);
        mapped.clamp(0, u16::MAX as i64) as u16
    }
}

fn filter<const N: usize>(taps: &[u16; N], weights: &[i32; N], shift: u32) -> u16 {
    let sum: i32 = taps
        .iter()
        .zip(weights)
        .map(|(&t, &w)| t as i32 * w)
        .sum();
    ((sum + (1 << (shift - 1))) >> shift).clamp(0, u16::MAX as i32) as u16
}

fn clamp16(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}

fn container_shift(bits: u8) -> u32 {
    16 - u32::from(bits.clamp(8, 16))
}

/// Reference mapping engine
#[derive(Debug)]
pub struct ReferenceEngine {
    metadata: SharedMetadata<ReferenceMetadata>,
    settings: EngineSettings,
    bl_shift: u32,
    el_shift: u32,
    trim: Option<TrimMap>,
    frame: FrameRecord,
}

impl ReferenceEngine {
    fn new(metadata: SharedMetadata<ReferenceMetadata>, settings: &EngineSettings) -> Result<Self> {
        let depth_ok = |bits: u8| (8..=16).contains(&bits);
        if !depth_ok(settings.bl_bit_depth) {
            return Err(Error::EngineInit(format!(
                "unsupported BL bit depth {}",
                settings.bl_bit_depth
            )));
        }
        if settings.el_bit_depth != 0 && !depth_ok(settings.el_bit_depth) {
            return Err(Error::EngineInit(format!(
                "unsupported EL bit depth {}",
                settings.el_bit_depth
            )));
        }
        let bl_shift = container_shift(settings.bl_bit_depth);
        // Without an EL the BL is fed to both inputs
        let el_shift = if settings.el_bit_depth == 0 {
            bl_shift
        } else {
            container_shift(settings.el_bit_depth)
        };
        Ok(Self {
            trim: TrimMap::new(settings, &metadata.static_levels),
            metadata,
            settings: settings.clone(),
            bl_shift,
            el_shift,
            frame: FrameRecord::default(),
        })
    }

    fn combine(&self, bl: u16, el: u16) -> i64 {
        let bl = i64::from(bl) << self.bl_shift;
        let el = i64::from(el) << self.el_shift;
        if self.settings.nlq_proof {
            return el;
        }
        if !self.el_processing_enabled() {
            return bl;
        }
        bl + (((el - NEUTRAL) * i64::from(self.metadata.el_weight)) >> 8)
    }

    fn combine_chroma(&self, bl: u16, el: u16, luma: u16) -> u16 {
        let base = self.combine(bl, el);
        if self.settings.nlq_proof {
            return clamp16(base);
        }
        let luma = i64::from(luma) << self.bl_shift;
        let luma_term = ((luma - NEUTRAL) * i64::from(self.metadata.chroma_luma_weight)) >> 8;
        clamp16(base + luma_term)
    }
}

impl MappingEngine for ReferenceEngine {
    type Metadata = ReferenceMetadata;

    fn metadata(&self) -> &SharedMetadata<ReferenceMetadata> {
        &self.metadata
    }

    fn is_integrated_metadata(&self) -> bool {
        self.metadata.integrated
    }

    fn clip_length(&self) -> Option<u32> {
        (!self.metadata.integrated).then(|| self.metadata.frames.len() as u32)
    }

    fn initialize_frame(&mut self, frame_index: u32, embedded: Option<&[u8]>) -> Result<()> {
        self.frame = if self.metadata.integrated {
            let payload = embedded.ok_or_else(|| {
                Error::Metadata(format!("frame {} carries no metadata", frame_index))
            })?;
            let text = std::str::from_utf8(payload).map_err(|e| {
                Error::Metadata(format!("frame {} metadata is not UTF-8: {}", frame_index, e))
            })?;
            toml::from_str(text).map_err(|e| {
                Error::Metadata(format!("frame {} metadata is malformed: {}", frame_index, e))
            })?
        } else {
            *self
                .metadata
                .frames
                .get(frame_index as usize)
                .ok_or_else(|| Error::Metadata(format!("no metadata for frame {}", frame_index)))?
        };
        Ok(())
    }

    fn process_sample_y(&self, bl_y: u16, el_y: u16) -> u16 {
        clamp16(self.combine(bl_y, el_y))
    }

    fn process_sample_u(&self, bl: u16, el: u16, luma: u16, _bl_u: u16, _bl_v: u16) -> u16 {
        self.combine_chroma(bl, el, luma)
    }

    fn process_sample_v(&self, bl: u16, el: u16, luma: u16, _bl_u: u16, _bl_v: u16) -> u16 {
        self.combine_chroma(bl, el, luma)
    }

    fn sample_to_rgb(&self, y: u16, u: u16, v: u16) -> [u16; 3] {
        if self.settings.rgb_proof {
            return [y, u, v];
        }
        let y = i64::from(y) << 14;
        let cb = i64::from(u) - NEUTRAL;
        let cr = i64::from(v) - NEUTRAL;
        let round = 1 << 13;
        [
            clamp16((y + CR_TO_R * cr + round) >> 14),
            clamp16((y - CB_TO_G * cb - CR_TO_G * cr + round) >> 14),
            clamp16((y + CB_TO_B * cb + round) >> 14),
        ]
    }

    fn process_trim(&self, rgb: [u16; 3]) -> [u16; 3] {
        match &self.trim {
            Some(map) => rgb.map(|c| map.apply(c)),
            None => rgb,
        }
    }

    fn upsample_luma_even(taps: &[u16; 5], center: usize) -> u16 {
        debug_assert_eq!(center, 2);
        filter(taps, &LUMA_EVEN, LUMA_SHIFT)
    }

    fn upsample_luma_odd(taps: &[u16; 5], center: usize) -> u16 {
        debug_assert_eq!(center, 2);
        filter(taps, &LUMA_ODD, LUMA_SHIFT)
    }

    fn upsample_chroma_even(taps: &[u16; 4], center: usize) -> u16 {
        debug_assert_eq!(center, 1);
        filter(taps, &CHROMA_EVEN, CHROMA_SHIFT)
    }

    fn upsample_chroma_odd(taps: &[u16; 4], center: usize) -> u16 {
        debug_assert_eq!(center, 1);
        filter(taps, &CHROMA_ODD, CHROMA_SHIFT)
    }

    fn is_scene_change(&self) -> bool {
        self.frame.scene_change
    }

    fn dynamic_min_pq(&self) -> u16 {
        self.frame.min_pq
    }

    fn dynamic_max_pq(&self) -> u16 {
        self.frame.max_pq
    }

    fn dynamic_max_content_light_level(&self) -> u16 {
        self.frame.max_content_light_level
    }

    fn static_min_pq(&self) -> u16 {
        self.metadata.static_levels.min_pq
    }

    fn static_max_pq(&self) -> u16 {
        self.metadata.static_levels.max_pq
    }

    fn static_max_content_light_level(&self) -> u16 {
        self.metadata.static_levels.max_content_light_level
    }

    fn static_max_avg_content_light_level(&self) -> u16 {
        self.metadata.static_levels.max_frame_average_light_level
    }

    fn static_master_display_max_luminance(&self) -> u16 {
        self.metadata.static_levels.master_display_max_luminance
    }

    fn static_master_display_min_luminance(&self) -> u16 {
        self.metadata.static_levels.master_display_min_luminance
    }

    fn is_limited_range_output(&self) -> bool {
        self.metadata.limited_range
    }

    fn el_processing_enabled(&self) -> bool {
        self.settings.el_bit_depth != 0 && self.frame.el_enabled
    }

    fn trim_processing_enabled(&self) -> bool {
        self.trim.is_some()
    }
}

/// Builds `ReferenceEngine`s
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceFactory;

impl EngineFactory for ReferenceFactory {
    type Engine = ReferenceEngine;

    fn create(
        &self,
        binding: MetadataBinding<ReferenceMetadata>,
        settings: &EngineSettings,
    ) -> Result<ReferenceEngine> {
        let metadata = match binding {
            MetadataBinding::Parse(MetadataSource::File(path)) => {
                SharedMetadata::owned(ReferenceMetadata::from_file(path)?)
            }
            MetadataBinding::Parse(MetadataSource::Embedded) => {
                SharedMetadata::owned(ReferenceMetadata {
                    integrated: true,
                    ..Default::default()
                })
            }
            MetadataBinding::Share(shared) => shared,
        };
        ReferenceEngine::new(metadata, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrimConfig;

    fn settings() -> EngineSettings {
        EngineSettings {
            bl_bit_depth: 16,
            el_bit_depth: 16,
            ..Default::default()
        }
    }

    fn engine(metadata: ReferenceMetadata, settings: &EngineSettings) -> ReferenceEngine {
        ReferenceEngine::new(SharedMetadata::owned(metadata), settings).unwrap()
    }

    #[test]
    fn test_neutral_el_keeps_bl() {
        let e = engine(ReferenceMetadata::default(), &settings());
        assert_eq!(e.process_sample_y(1234, 32768), 1234);
        assert_eq!(e.process_sample_y(1234, 32768 + 512), 1234 + 512);
        assert_eq!(e.process_sample_y(10, 0), 0);
    }

    #[test]
    fn test_container_depth_scaling() {
        let s = EngineSettings {
            bl_bit_depth: 10,
            el_bit_depth: 0,
            ..Default::default()
        };
        let e = engine(ReferenceMetadata::default(), &s);
        // No EL: the EL input is ignored and BL is scaled to 16 bits
        assert!(!e.el_processing_enabled());
        assert_eq!(e.process_sample_y(512, 512), 512 << 6);
    }

    #[test]
    fn test_neutral_chroma_is_gray() {
        let e = engine(ReferenceMetadata::default(), &settings());
        assert_eq!(e.sample_to_rgb(20000, 32768, 32768), [20000, 20000, 20000]);
        let [r, g, b] = e.sample_to_rgb(20000, 32768, 40000);
        assert!(r > 20000 && g < 20000 && b == 20000);
    }

    #[test]
    fn test_upsample_kernels_preserve_flat() {
        assert_eq!(ReferenceEngine::upsample_luma_even(&[700; 5], 2), 700);
        assert_eq!(ReferenceEngine::upsample_luma_odd(&[700; 5], 2), 700);
        assert_eq!(ReferenceEngine::upsample_chroma_even(&[700; 4], 1), 700);
        assert_eq!(ReferenceEngine::upsample_chroma_odd(&[700; 4], 1), 700);
        assert_eq!(ReferenceEngine::upsample_luma_odd(&[0, 0, 0, 65535, 65535], 2), 32768);
        assert_eq!(ReferenceEngine::upsample_chroma_odd(&[65535; 4], 1), 65535);
    }

    #[test]
    fn test_trim_identity_and_range() {
        let levels = StaticLevels::default();
        let identity = EngineSettings {
            trim: TrimConfig {
                trim_pq: 3079,
                target_min_nits: 0.0,
                target_max_nits: f32::from(levels.master_display_max_luminance),
            },
            ..settings()
        };
        let e = engine(ReferenceMetadata::default(), &identity);
        assert!(e.trim_processing_enabled());
        for v in [0u16, 100, 30000, 49000, 50000, 65535] {
            assert_eq!(e.process_trim([v, v, v]), [v, v, v]);
        }

        let sdr = EngineSettings {
            trim: TrimConfig {
                trim_pq: 2081,
                target_min_nits: 0.0,
                target_max_nits: 100.0,
            },
            ..settings()
        };
        let e = engine(ReferenceMetadata::default(), &sdr);
        let peak = nits_to_pq16(1000.0);
        let above = peak + 100;
        assert_eq!(e.process_trim([peak, 0, above]), [nits_to_pq16(100.0), 0, above]);
    }

    #[test]
    fn test_file_metadata_frames() {
        let metadata = ReferenceMetadata::from_toml_str(
            r#"
el_weight = 128

[static]
max_pq = 3000

[[frames]]
scene_change = true
max_pq = 2500

[[frames]]
el_enabled = false
"#,
        )
        .unwrap();
        assert_eq!(metadata.static_levels.max_content_light_level, 1000);

        let mut e = engine(metadata, &settings());
        assert_eq!(e.clip_length(), Some(2));
        e.initialize_frame(0, None).unwrap();
        assert!(e.is_scene_change());
        assert_eq!(e.dynamic_max_pq(), 2500);
        assert_eq!(e.static_max_pq(), 3000);
        assert_eq!(e.process_sample_y(1000, 32768 + 256), 1128);

        e.initialize_frame(1, None).unwrap();
        assert!(!e.el_processing_enabled());
        assert!(matches!(e.initialize_frame(2, None), Err(Error::Metadata(_))));
    }

    #[test]
    fn test_embedded_metadata() {
        let factory = ReferenceFactory;
        let mut e = factory
            .create(MetadataBinding::Parse(MetadataSource::Embedded), &settings())
            .unwrap();
        assert!(e.is_integrated_metadata());
        assert_eq!(e.clip_length(), None);

        let payload = ReferenceMetadata::embed(&FrameRecord {
            max_content_light_level: 640,
            ..Default::default()
        });
        e.initialize_frame(7, Some(payload.as_slice())).unwrap();
        assert_eq!(e.dynamic_max_content_light_level(), 640);

        assert!(e.initialize_frame(8, None).is_err());
        assert!(e.initialize_frame(8, Some(&b"max_pq = \"x\""[..])).is_err());
    }

    #[test]
    fn test_large_weights_do_not_overflow() {
        let metadata = ReferenceMetadata {
            el_weight: MAX_WEIGHT,
            chroma_luma_weight: -MAX_WEIGHT,
            ..Default::default()
        };
        let e = engine(metadata, &settings());
        assert_eq!(e.process_sample_y(1000, 0), 0);
        assert_eq!(e.process_sample_y(1000, 65535), 65535);
        assert_eq!(e.process_sample_u(1000, 32768, 65535, 0, 0), 0);
        assert_eq!(e.process_sample_v(1000, 32768, 0, 0, 0), 65535);
    }

    #[test]
    fn test_rejects_out_of_range_weights() {
        for text in ["el_weight = 70000", "chroma_luma_weight = -70000"] {
            let err = ReferenceMetadata::from_toml_str(text).unwrap_err();
            assert!(matches!(err, Error::Metadata(_)), "{}", text);
        }
        let ok = ReferenceMetadata::from_toml_str("el_weight = 65536").unwrap();
        assert_eq!(ok.el_weight, MAX_WEIGHT);
    }

    #[test]
    fn test_rejects_bad_bit_depth() {
        let s = EngineSettings {
            bl_bit_depth: 4,
            ..Default::default()
        };
        let err = ReferenceFactory
            .create(MetadataBinding::Parse(MetadataSource::Embedded), &s)
            .unwrap_err();
        assert!(matches!(err, Error::EngineInit(_)));
    }
}
