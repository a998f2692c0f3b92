//! BL/EL sampling geometry and path dispatch

use super::quick::bake_quick;
use crate::engine::MappingEngine;
use crate::error::{Error, Result};
use crate::types::{Frame, LayerInfo};

/// Fast combined path specialized for one geometry
pub type QuickPath<E> = fn(&mut Frame, &Frame, &Frame, &E);

/// Sampling relationship between the base and enhancement layers
///
/// Fixed at construction; selects one of eight specialized quick paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameGeometry {
    /// BL chroma is 4:2:0
    pub bl_chroma_subsampled: bool,
    /// EL chroma is 4:2:0
    pub el_chroma_subsampled: bool,
    /// EL is half the BL width and height
    pub quarter_resolution_el: bool,
}

impl FrameGeometry {
    pub const ALL: [FrameGeometry; 8] = [
        FrameGeometry::new(false, false, false),
        FrameGeometry::new(false, false, true),
        FrameGeometry::new(false, true, false),
        FrameGeometry::new(false, true, true),
        FrameGeometry::new(true, false, false),
        FrameGeometry::new(true, false, true),
        FrameGeometry::new(true, true, false),
        FrameGeometry::new(true, true, true),
    ];

    pub const fn new(bl_chroma: bool, el_chroma: bool, quarter: bool) -> Self {
        Self {
            bl_chroma_subsampled: bl_chroma,
            el_chroma_subsampled: el_chroma,
            quarter_resolution_el: quarter,
        }
    }

    /// Derive the geometry from the negotiated layers, rejecting
    /// unsupported ratios
    pub fn detect(bl: &LayerInfo, el: Option<&LayerInfo>) -> Result<Self> {
        if !bl.format.is_yuv() {
            return Err(Error::UnsupportedFormat(format!(
                "base layer must be planar YUV, got {}",
                bl.format
            )));
        }
        if bl.width() == 0 || bl.height() == 0 {
            return Err(Error::UnsupportedFormat(format!(
                "base layer has empty resolution {}",
                bl.resolution
            )));
        }

        let geometry = match el {
            None => Self::new(
                bl.format.is_chroma_subsampled(),
                bl.format.is_chroma_subsampled(),
                false,
            ),
            Some(el) => {
                if !el.format.is_yuv() {
                    return Err(Error::UnsupportedFormat(format!(
                        "enhancement layer must be planar YUV, got {}",
                        el.format
                    )));
                }
                if el.num_frames != bl.num_frames {
                    return Err(Error::LayerMismatch(format!(
                        "BL has {} frames, EL has {}",
                        bl.num_frames, el.num_frames
                    )));
                }
                let quarter = if el.resolution == bl.resolution {
                    false
                } else if el.width() * 2 == bl.width() && el.height() * 2 == bl.height() {
                    true
                } else {
                    return Err(Error::LayerMismatch(format!(
                        "EL {} must equal BL {} or be exactly half of it",
                        el.resolution, bl.resolution
                    )));
                };
                Self::new(
                    bl.format.is_chroma_subsampled(),
                    el.format.is_chroma_subsampled(),
                    quarter,
                )
            }
        };

        let align = 1usize << geometry.bl_chroma_shift().max(geometry.el_chroma_shift());
        if bl.width() % align != 0 || bl.height() % align != 0 {
            return Err(Error::UnsupportedFormat(format!(
                "BL {} is not a multiple of {} as required by {}",
                bl.resolution, align, geometry
            )));
        }
        Ok(geometry)
    }

    /// Log2 ratio of BL luma to BL chroma
    pub fn bl_chroma_shift(&self) -> u32 {
        u32::from(self.bl_chroma_subsampled)
    }

    /// Log2 ratio of BL luma to EL luma
    pub fn el_luma_shift(&self) -> u32 {
        u32::from(self.quarter_resolution_el)
    }

    /// Log2 ratio of BL luma to EL chroma
    pub fn el_chroma_shift(&self) -> u32 {
        u32::from(self.el_chroma_subsampled) + self.el_luma_shift()
    }

    /// Chroma of the combined frame stays 4:2:0 after format reconciliation
    pub fn reconciled_chroma_subsampled(&self) -> bool {
        self.bl_chroma_subsampled && self.el_chroma_subsampled
    }

    /// Pick the quick path specialized for this geometry
    pub fn select_quick_path<E: MappingEngine>(&self) -> QuickPath<E> {
        match (
            self.bl_chroma_subsampled,
            self.el_chroma_subsampled,
            self.quarter_resolution_el,
        ) {
            (false, false, false) => bake_quick::<E, false, false, false>,
            (false, false, true) => bake_quick::<E, false, false, true>,
            (false, true, false) => bake_quick::<E, false, true, false>,
            (false, true, true) => bake_quick::<E, false, true, true>,
            (true, false, false) => bake_quick::<E, true, false, false>,
            (true, false, true) => bake_quick::<E, true, false, true>,
            (true, true, false) => bake_quick::<E, true, true, false>,
            (true, true, true) => bake_quick::<E, true, true, true>,
        }
    }
}

impl std::fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cs = |sub: bool| if sub { "4:2:0" } else { "4:4:4" };
        write!(
            f,
            "BL {} / EL {}{}",
            cs(self.bl_chroma_subsampled),
            cs(self.el_chroma_subsampled),
            if self.quarter_resolution_el {
                " quarter"
            } else {
                ""
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameFormat;

    fn layer(w: u32, h: u32, format: FrameFormat) -> LayerInfo {
        LayerInfo::new(w, h, format).with_frames(24)
    }

    #[test]
    fn test_detect_without_el() {
        let bl = layer(1920, 1080, FrameFormat::Yuv420p16);
        let g = FrameGeometry::detect(&bl, None).unwrap();
        assert_eq!(g, FrameGeometry::new(true, true, false));
        assert!(g.reconciled_chroma_subsampled());
    }

    #[test]
    fn test_detect_quarter_el() {
        let bl = layer(1920, 1080, FrameFormat::Yuv420p16);
        let el = layer(960, 540, FrameFormat::Yuv420p16);
        let g = FrameGeometry::detect(&bl, Some(&el)).unwrap();
        assert!(g.quarter_resolution_el);
        assert_eq!(g.el_chroma_shift(), 2);
        assert_eq!(g.to_string(), "BL 4:2:0 / EL 4:2:0 quarter");
    }

    #[test]
    fn test_detect_rejects_bad_ratio() {
        let bl = layer(1920, 1080, FrameFormat::Yuv420p16);
        let el = layer(1280, 720, FrameFormat::Yuv420p16);
        assert!(matches!(
            FrameGeometry::detect(&bl, Some(&el)),
            Err(Error::LayerMismatch(_))
        ));
    }

    #[test]
    fn test_detect_rejects_frame_count_mismatch() {
        let bl = layer(64, 32, FrameFormat::Yuv444p16);
        let el = layer(64, 32, FrameFormat::Yuv444p16).with_frames(23);
        assert!(matches!(
            FrameGeometry::detect(&bl, Some(&el)),
            Err(Error::LayerMismatch(_))
        ));
    }

    #[test]
    fn test_detect_rejects_rgb_and_misaligned() {
        let rgb = layer(64, 32, FrameFormat::Rgbp16);
        assert!(matches!(
            FrameGeometry::detect(&rgb, None),
            Err(Error::UnsupportedFormat(_))
        ));

        // Quarter-resolution 4:2:0 EL needs BL dimensions divisible by 4
        let bl = layer(68, 34, FrameFormat::Yuv420p16);
        let el = layer(34, 17, FrameFormat::Yuv420p16);
        assert!(matches!(
            FrameGeometry::detect(&bl, Some(&el)),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_all_geometries_distinct() {
        let set: std::collections::HashSet<_> = FrameGeometry::ALL.into_iter().collect();
        assert_eq!(set.len(), 8);
    }
}
