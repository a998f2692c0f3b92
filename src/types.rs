//! Common types used throughout DoViBake

use crate::error::{Error, Result};
use crate::processing::FrameProps;
use serde::{Deserialize, Serialize};

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    // Common resolutions
    pub const HD_720P: Self = Self::new(1280, 720);
    pub const FHD_1080P: Self = Self::new(1920, 1080);
    pub const UHD_4K: Self = Self::new(3840, 2160);

    /// Calculate total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Half width and half height (quarter-resolution layer)
    pub fn quarter(&self) -> Self {
        Self::new(self.width / 2, self.height / 2)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FHD_1080P
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Frame format / pixel format
///
/// Every format is planar with 16-bit unsigned samples. Plane order is
/// Y, U, V for YUV formats and R, G, B for RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FrameFormat {
    /// Planar YUV 4:2:0, chroma at half width and half height
    #[default]
    Yuv420p16,
    /// Planar YUV 4:4:4
    Yuv444p16,
    /// Planar RGB (RGB48)
    Rgbp16,
}

impl FrameFormat {
    /// YUV format with or without 4:2:0 chroma subsampling
    pub fn yuv(chroma_subsampled: bool) -> Self {
        if chroma_subsampled {
            FrameFormat::Yuv420p16
        } else {
            FrameFormat::Yuv444p16
        }
    }

    pub fn is_yuv(&self) -> bool {
        !matches!(self, FrameFormat::Rgbp16)
    }

    pub fn is_chroma_subsampled(&self) -> bool {
        matches!(self, FrameFormat::Yuv420p16)
    }

    /// Log2 of the luma-to-chroma ratio along each axis
    pub fn chroma_shift(&self) -> u32 {
        u32::from(self.is_chroma_subsampled())
    }

    /// `(width, height)` of each plane for a frame of the given size
    pub fn plane_dims(&self, width: usize, height: usize) -> [(usize, usize); 3] {
        let shift = self.chroma_shift();
        let chroma = (width >> shift, height >> shift);
        [(width, height), chroma, chroma]
    }

    /// Human-readable plane names
    pub fn plane_names(&self) -> [&'static str; 3] {
        if self.is_yuv() {
            ["Y", "U", "V"]
        } else {
            ["R", "G", "B"]
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FrameFormat::Yuv420p16 => "yuv420p16",
            FrameFormat::Yuv444p16 => "yuv444p16",
            FrameFormat::Rgbp16 => "rgb48",
        };
        f.write_str(name)
    }
}

/// Negotiated description of one input layer (or the output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    /// Luma resolution
    pub resolution: Resolution,
    /// Pixel format
    pub format: FrameFormat,
    /// Significant bits per sample inside the 16-bit container
    pub bit_depth: u8,
    /// Number of frames in the clip
    pub num_frames: u32,
}

impl LayerInfo {
    pub fn new(width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            resolution: Resolution::new(width, height),
            format,
            bit_depth: 16,
            num_frames: 1,
        }
    }

    pub fn with_bit_depth(mut self, bits: u8) -> Self {
        self.bit_depth = bits;
        self
    }

    pub fn with_frames(mut self, frames: u32) -> Self {
        self.num_frames = frames;
        self
    }

    pub fn width(&self) -> usize {
        self.resolution.width as usize
    }

    pub fn height(&self) -> usize {
        self.resolution.height as usize
    }
}

/// Minimum buffer length holding `height` rows of `width` samples at `stride`
fn required_len(width: usize, height: usize, stride: usize) -> usize {
    if height == 0 {
        0
    } else {
        stride * (height - 1) + width
    }
}

fn check_layout(len: usize, width: usize, height: usize, stride: usize) -> Result<()> {
    if stride < width {
        return Err(Error::InvalidFrame(format!(
            "stride {} is smaller than width {}",
            stride, width
        )));
    }
    let needed = required_len(width, height, stride);
    if len < needed {
        return Err(Error::InvalidFrame(format!(
            "plane buffer holds {} samples, {}x{} at stride {} needs {}",
            len, width, height, stride, needed
        )));
    }
    Ok(())
}

/// An owned plane of 16-bit samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u16>,
    width: usize,
    height: usize,
    /// Row stride in samples
    stride: usize,
}

impl Plane {
    /// Allocate a zeroed plane with minimum stride
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: usize, height: usize, value: u16) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
            stride: width,
        }
    }

    /// Wrap existing samples; `stride` is counted in samples
    pub fn from_vec(data: Vec<u16>, width: usize, height: usize, stride: usize) -> Result<Self> {
        check_layout(data.len(), width, height, stride)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn row(&self, y: usize) -> &[u16] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.data[y * self.stride + x]
    }

    pub fn view(&self) -> PlaneRef<'_> {
        PlaneRef {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    pub fn view_mut(&mut self) -> PlaneMut<'_> {
        PlaneMut {
            data: &mut self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    /// Samples row by row without stride padding
    pub fn to_packed(&self) -> Vec<u16> {
        (0..self.height).flat_map(|y| self.row(y).iter().copied()).collect()
    }
}

/// Read-only view of a plane
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    data: &'a [u16],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> PlaneRef<'a> {
    /// Create a view over borrowed samples; `stride` is counted in samples
    pub fn new(data: &'a [u16], width: usize, height: usize, stride: usize) -> Result<Self> {
        check_layout(data.len(), width, height, stride)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride * std::mem::size_of::<u16>()
    }

    pub fn row(&self, y: usize) -> &'a [u16] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.data[y * self.stride + x]
    }
}

/// Writable view of a plane
#[derive(Debug)]
pub struct PlaneMut<'a> {
    data: &'a mut [u16],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> PlaneMut<'a> {
    /// Create a view over borrowed samples; `stride` is counted in samples
    pub fn new(data: &'a mut [u16], width: usize, height: usize, stride: usize) -> Result<Self> {
        check_layout(data.len(), width, height, stride)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride * std::mem::size_of::<u16>()
    }

    pub fn row(&self, y: usize) -> &[u16] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    pub fn set(&mut self, x: usize, y: usize, value: u16) {
        self.data[y * self.stride + x] = value;
    }

    /// Read-only reborrow
    pub fn as_view(&self) -> PlaneRef<'_> {
        PlaneRef {
            data: self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }
}

/// A planar video frame
#[derive(Debug, Clone)]
pub struct Frame {
    format: FrameFormat,
    width: usize,
    height: usize,
    planes: [Plane; 3],
    /// Tags attached to the frame for downstream consumers
    pub props: FrameProps,
    /// Per-frame reshaping metadata payload attached by the host
    pub embedded_metadata: Option<Vec<u8>>,
}

impl Frame {
    /// Create a new zeroed frame
    pub fn new(width: usize, height: usize, format: FrameFormat) -> Self {
        let planes = format.plane_dims(width, height).map(|(w, h)| Plane::new(w, h));
        Self {
            format,
            width,
            height,
            planes,
            props: FrameProps::default(),
            embedded_metadata: None,
        }
    }

    /// Create a frame from existing planes
    pub fn from_planes(
        format: FrameFormat,
        width: usize,
        height: usize,
        planes: [Plane; 3],
    ) -> Result<Self> {
        let expected = format.plane_dims(width, height);
        for (i, (plane, (w, h))) in planes.iter().zip(expected).enumerate() {
            if plane.width() != w || plane.height() != h {
                return Err(Error::InvalidFrame(format!(
                    "{} plane {} is {}x{}, expected {}x{}",
                    format,
                    format.plane_names()[i],
                    plane.width(),
                    plane.height(),
                    w,
                    h
                )));
            }
        }
        Ok(Self {
            format,
            width,
            height,
            planes,
            props: FrameProps::default(),
            embedded_metadata: None,
        })
    }

    pub fn with_embedded_metadata(mut self, payload: Vec<u8>) -> Self {
        self.embedded_metadata = Some(payload);
        self
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width as u32, self.height as u32)
    }

    pub fn plane(&self, index: usize) -> PlaneRef<'_> {
        self.planes[index].view()
    }

    pub fn plane_mut(&mut self, index: usize) -> PlaneMut<'_> {
        self.planes[index].view_mut()
    }

    /// All three planes for simultaneous writing
    pub fn planes_mut(&mut self) -> [PlaneMut<'_>; 3] {
        let [a, b, c] = &mut self.planes;
        [a.view_mut(), b.view_mut(), c.view_mut()]
    }

    pub fn owned_plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    pub fn into_planes(self) -> [Plane; 3] {
        self.planes
    }

    /// Does this frame have the shape described by `info`?
    pub fn matches(&self, info: &LayerInfo) -> bool {
        self.format == info.format && self.width == info.width() && self.height == info.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_dims() {
        assert_eq!(
            FrameFormat::Yuv420p16.plane_dims(1920, 1080),
            [(1920, 1080), (960, 540), (960, 540)]
        );
        assert_eq!(
            FrameFormat::Rgbp16.plane_dims(4, 2),
            [(4, 2), (4, 2), (4, 2)]
        );
    }

    #[test]
    fn test_plane_stride() {
        let data: Vec<u16> = (0..12).collect();
        let plane = Plane::from_vec(data, 3, 3, 4).unwrap();
        assert_eq!(plane.row(1), &[4, 5, 6]);
        assert_eq!(plane.view().stride_bytes(), 8);
        assert_eq!(plane.to_packed(), vec![0, 1, 2, 4, 5, 6, 8, 9, 10]);

        assert!(Plane::from_vec(vec![0; 5], 3, 2, 4).is_err());
        assert!(PlaneRef::new(&[0; 8], 4, 2, 3).is_err());
    }

    #[test]
    fn test_frame_from_planes_checks_dims() {
        let planes = [Plane::new(4, 4), Plane::new(2, 2), Plane::new(2, 2)];
        assert!(Frame::from_planes(FrameFormat::Yuv420p16, 4, 4, planes.clone()).is_ok());
        assert!(Frame::from_planes(FrameFormat::Yuv444p16, 4, 4, planes).is_err());
    }

    #[test]
    fn test_frame_matches_layer() {
        let frame = Frame::new(8, 4, FrameFormat::Yuv444p16);
        assert!(frame.matches(&LayerInfo::new(8, 4, FrameFormat::Yuv444p16)));
        assert!(!frame.matches(&LayerInfo::new(8, 4, FrameFormat::Yuv420p16)));
    }
}
