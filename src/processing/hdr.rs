//! HDR frame tagging
//!
//! Provides:
//! - Color tags written on output frames (H.273 code points)
//! - Dolby Vision light level tags for downstream tone mapping
//! - PQ (SMPTE ST 2084) transfer helpers

use serde::{Deserialize, Serialize};

/// Transfer characteristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferFunction {
    /// PQ (Perceptual Quantizer) - HDR10, Dolby Vision
    Pq,
}

impl TransferFunction {
    /// H.273 transfer characteristics value
    pub fn code(&self) -> i64 {
        match self {
            TransferFunction::Pq => 16, // SMPTE ST 2084
        }
    }
}

/// Color primaries (color gamut)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorPrimaries {
    /// BT.2020 (HDR, UHD)
    Bt2020,
}

impl ColorPrimaries {
    /// H.273 colour primaries value
    pub fn code(&self) -> i64 {
        match self {
            ColorPrimaries::Bt2020 => 9,
        }
    }
}

/// Color matrix coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMatrix {
    /// Identity, used for RGB output
    Rgb,
    /// BT.2020 NCL (Non-Constant Luminance)
    Bt2020Ncl,
}

impl ColorMatrix {
    /// H.273 matrix coefficients value
    pub fn code(&self) -> i64 {
        match self {
            ColorMatrix::Rgb => 0,
            ColorMatrix::Bt2020Ncl => 9,
        }
    }
}

/// Quantization range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorRange {
    #[default]
    Full,
    Limited,
}

impl ColorRange {
    pub fn code(&self) -> i64 {
        match self {
            ColorRange::Full => 0,
            ColorRange::Limited => 1,
        }
    }
}

/// Dolby Vision light levels reported by the mapping engine for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LightLevels {
    /// Frame minimum, 12-bit PQ code
    pub dynamic_min_pq: u16,
    /// Frame maximum, 12-bit PQ code
    pub dynamic_max_pq: u16,
    /// Frame maximum content light level (nits)
    pub dynamic_max_cll: u16,
    /// Clip minimum, 12-bit PQ code
    pub static_min_pq: u16,
    /// Clip maximum, 12-bit PQ code
    pub static_max_pq: u16,
    /// MaxCLL (nits)
    pub static_max_cll: u16,
    /// MaxFALL (nits)
    pub static_max_fall: u16,
    /// Mastering display peak (nits)
    pub master_display_max_luminance: u16,
    /// Mastering display black level (nits)
    pub master_display_min_luminance: u16,
}

/// Tags attached to a frame produced by the baker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameProps {
    pub matrix: Option<ColorMatrix>,
    pub range: Option<ColorRange>,
    pub primaries: Option<ColorPrimaries>,
    pub transfer: Option<TransferFunction>,
    /// Frame starts a new scene
    pub scene_change: Option<bool>,
    pub levels: Option<LightLevels>,
}

impl FrameProps {
    /// Tags for YUV output: BT.2020 NCL, limited range, PQ
    pub fn yuv_output() -> Self {
        Self {
            matrix: Some(ColorMatrix::Bt2020Ncl),
            range: Some(ColorRange::Limited),
            primaries: Some(ColorPrimaries::Bt2020),
            transfer: Some(TransferFunction::Pq),
            ..Default::default()
        }
    }

    /// Tags for RGB output
    pub fn rgb_output(limited_range: bool) -> Self {
        Self {
            matrix: Some(ColorMatrix::Rgb),
            range: Some(if limited_range {
                ColorRange::Limited
            } else {
                ColorRange::Full
            }),
            ..Default::default()
        }
    }

    /// Named integer tags as exported to the host
    pub fn tags(&self) -> Vec<(&'static str, i64)> {
        let mut tags = Vec::new();
        if let Some(matrix) = self.matrix {
            tags.push(("_Matrix", matrix.code()));
        }
        if let Some(range) = self.range {
            tags.push(("_ColorRange", range.code()));
        }
        if let Some(primaries) = self.primaries {
            tags.push(("_Primaries", primaries.code()));
        }
        if let Some(transfer) = self.transfer {
            tags.push(("_Transfer", transfer.code()));
        }
        if let Some(scene_change) = self.scene_change {
            tags.push(("_SceneChangePrev", i64::from(scene_change)));
        }
        if let Some(l) = self.levels {
            tags.extend([
                ("_dovi_dynamic_min_pq", i64::from(l.dynamic_min_pq)),
                ("_dovi_dynamic_max_pq", i64::from(l.dynamic_max_pq)),
                ("_dovi_dynamic_max_content_light_level", i64::from(l.dynamic_max_cll)),
                ("_dovi_static_min_pq", i64::from(l.static_min_pq)),
                ("_dovi_static_max_pq", i64::from(l.static_max_pq)),
                ("_dovi_static_max_content_light_level", i64::from(l.static_max_cll)),
                ("_dovi_static_max_avg_content_light_level", i64::from(l.static_max_fall)),
                (
                    "_dovi_static_master_display_max_luminance",
                    i64::from(l.master_display_max_luminance),
                ),
                (
                    "_dovi_static_master_display_min_luminance",
                    i64::from(l.master_display_min_luminance),
                ),
            ]);
        }
        tags
    }

    /// Look up a single named tag
    pub fn tag(&self, name: &str) -> Option<i64> {
        self.tags()
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }
}

const M1: f32 = 0.1593017578125; // 2610/16384
const M2: f32 = 78.84375; // 2523/32 * 128
const C1: f32 = 0.8359375; // 3424/4096
const C2: f32 = 18.8515625; // 2413/128
const C3: f32 = 18.6875; // 2392/128

/// Apply PQ (SMPTE ST 2084) transfer function
/// Converts linear light in nits to a PQ encoded value in [0, 1]
pub fn linear_to_pq(linear: f32) -> f32 {
    let y = (linear / 10000.0).max(0.0);
    let y_m1 = y.powf(M1);
    ((C1 + C2 * y_m1) / (1.0 + C3 * y_m1)).powf(M2)
}

/// Nits to a 16-bit PQ code value
pub fn nits_to_pq16(nits: f32) -> u16 {
    (linear_to_pq(nits).clamp(0.0, 1.0) * 65535.0).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pq_anchor_points() {
        assert!(linear_to_pq(0.0) < 1e-6);
        assert!((linear_to_pq(10000.0) - 1.0).abs() < 1e-4);
        // 100 nits sits at roughly half of the PQ range
        let pq = linear_to_pq(100.0);
        assert!((pq - 0.508).abs() < 0.01);
        assert_eq!(nits_to_pq16(0.0), 0);
        assert_eq!(nits_to_pq16(10000.0), 65535);
        assert!(nits_to_pq16(100.0) < nits_to_pq16(1000.0));
    }

    #[test]
    fn test_yuv_tags() {
        let props = FrameProps::yuv_output();
        assert_eq!(props.tag("_Matrix"), Some(9));
        assert_eq!(props.tag("_ColorRange"), Some(1));
        assert_eq!(props.tag("_Primaries"), Some(9));
        assert_eq!(props.tag("_Transfer"), Some(16));
        assert_eq!(props.tag("_SceneChangePrev"), None);
    }

    #[test]
    fn test_level_tags() {
        let props = FrameProps {
            scene_change: Some(true),
            levels: Some(LightLevels {
                dynamic_max_pq: 3079,
                static_max_fall: 400,
                ..Default::default()
            }),
            ..FrameProps::rgb_output(false)
        };
        assert_eq!(props.tag("_Matrix"), Some(0));
        assert_eq!(props.tag("_ColorRange"), Some(0));
        assert_eq!(props.tag("_SceneChangePrev"), Some(1));
        assert_eq!(props.tag("_dovi_dynamic_max_pq"), Some(3079));
        assert_eq!(props.tag("_dovi_static_max_avg_content_light_level"), Some(400));
    }
}
