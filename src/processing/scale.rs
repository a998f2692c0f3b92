//! Separable 2x upsampling
//!
//! Each pass doubles one dimension. Every source row (or column) yields an
//! even and an odd output computed from the same tap neighborhood, with taps
//! outside the plane clamped to the nearest edge sample.

use crate::engine::{MappingEngine, Upscaler};
use crate::error::{Error, Result};
use crate::types::{Frame, FrameFormat, Plane, PlaneMut, PlaneRef};

/// Tap layout of a resampling kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSpec<const N: usize> {
    /// Offset of each tap relative to the source position
    pub offsets: [isize; N],
    /// Index of the zero-offset tap
    pub center: usize,
}

impl<const N: usize> KernelSpec<N> {
    /// Taps read before the center
    pub fn look_back(&self) -> usize {
        self.center
    }

    /// Taps read after the center
    pub fn look_ahead(&self) -> usize {
        N - 1 - self.center
    }

    fn clamped(&self, pos: usize, tap: usize, extent: usize) -> usize {
        (pos as isize + self.offsets[tap]).clamp(0, extent as isize - 1) as usize
    }
}

/// 5-tap luma layout: two look-back, center, two look-ahead
pub const LUMA_KERNEL: KernelSpec<5> = KernelSpec {
    offsets: [-2, -1, 0, 1, 2],
    center: 2,
};

/// 4-tap chroma layout: one look-back, center, two look-ahead
pub const CHROMA_KERNEL: KernelSpec<4> = KernelSpec {
    offsets: [-1, 0, 1, 2],
    center: 1,
};

/// A kernel layout with its even and odd phase filters
#[derive(Clone, Copy)]
pub struct Upsampler<const N: usize> {
    pub spec: KernelSpec<N>,
    pub even: Upscaler<N>,
    pub odd: Upscaler<N>,
}

impl Upsampler<5> {
    pub fn luma<E: MappingEngine>() -> Self {
        Self {
            spec: LUMA_KERNEL,
            even: E::upsample_luma_even,
            odd: E::upsample_luma_odd,
        }
    }
}

impl Upsampler<4> {
    pub fn chroma<E: MappingEngine>() -> Self {
        Self {
            spec: CHROMA_KERNEL,
            even: E::upsample_chroma_even,
            odd: E::upsample_chroma_odd,
        }
    }
}

/// Double the height of `src` into `dst`
pub fn upsample_vertical<const N: usize>(
    dst: &mut PlaneMut<'_>,
    src: PlaneRef<'_>,
    up: &Upsampler<N>,
) -> Result<()> {
    let (w, h) = (src.width(), src.height());
    if dst.width() != w || dst.height() != 2 * h {
        return Err(Error::InvalidFrame(format!(
            "vertical upsample of {}x{} needs a {}x{} target, got {}x{}",
            w,
            h,
            w,
            2 * h,
            dst.width(),
            dst.height()
        )));
    }
    let center = up.spec.center;

    for y in 0..h {
        let rows: [&[u16]; N] = std::array::from_fn(|k| src.row(up.spec.clamped(y, k, h)));
        for (parity, kernel) in [(0, up.even), (1, up.odd)] {
            let out = dst.row_mut(2 * y + parity);
            for (x, sample) in out.iter_mut().enumerate() {
                let taps: [u16; N] = std::array::from_fn(|k| rows[k][x]);
                *sample = kernel(&taps, center);
            }
        }
    }
    Ok(())
}

/// Double the width of `src` into `dst`
pub fn upsample_horizontal<const N: usize>(
    dst: &mut PlaneMut<'_>,
    src: PlaneRef<'_>,
    up: &Upsampler<N>,
) -> Result<()> {
    let (w, h) = (src.width(), src.height());
    if dst.width() != 2 * w || dst.height() != h {
        return Err(Error::InvalidFrame(format!(
            "horizontal upsample of {}x{} needs a {}x{} target, got {}x{}",
            w,
            h,
            2 * w,
            h,
            dst.width(),
            dst.height()
        )));
    }
    let center = up.spec.center;
    let back = up.spec.look_back();
    let interior = back..w.saturating_sub(up.spec.look_ahead());

    for y in 0..h {
        let row = src.row(y);
        let out = dst.row_mut(y);
        for x in 0..w {
            let taps: [u16; N] = if interior.contains(&x) {
                let mut taps = [0u16; N];
                taps.copy_from_slice(&row[x - back..x - back + N]);
                taps
            } else {
                std::array::from_fn(|k| row[up.spec.clamped(x, k, w)])
            };
            out[2 * x] = (up.even)(&taps, center);
            out[2 * x + 1] = (up.odd)(&taps, center);
        }
    }
    Ok(())
}

/// Double both dimensions of a plane, vertical pass first
pub fn upsample_plane<const N: usize>(src: PlaneRef<'_>, up: &Upsampler<N>) -> Result<Plane> {
    let (w, h) = (src.width(), src.height());
    let mut tall = Plane::new(w, 2 * h);
    upsample_vertical(&mut tall.view_mut(), src, up)?;
    let mut full = Plane::new(2 * w, 2 * h);
    upsample_horizontal(&mut full.view_mut(), tall.view(), up)?;
    Ok(full)
}

/// Bring a quarter-resolution EL frame to twice its size
pub fn upscale_el<E: MappingEngine>(el: &Frame) -> Result<Frame> {
    let luma = Upsampler::luma::<E>();
    let chroma = Upsampler::chroma::<E>();
    let planes = [
        upsample_plane(el.plane(0), &luma)?,
        upsample_plane(el.plane(1), &chroma)?,
        upsample_plane(el.plane(2), &chroma)?,
    ];
    Frame::from_planes(el.format(), 2 * el.width(), 2 * el.height(), planes)
}

/// Convert a 4:2:0 frame to 4:4:4; other formats are returned unchanged
pub fn upsample_chroma<E: MappingEngine>(frame: &Frame) -> Result<Frame> {
    if !frame.format().is_chroma_subsampled() {
        return Ok(frame.clone());
    }
    let chroma = Upsampler::chroma::<E>();
    let planes = [
        frame.owned_plane(0).clone(),
        upsample_plane(frame.plane(1), &chroma)?,
        upsample_plane(frame.plane(2), &chroma)?,
    ];
    let mut out = Frame::from_planes(FrameFormat::Yuv444p16, frame.width(), frame.height(), planes)?;
    out.props = frame.props.clone();
    out.embedded_metadata = frame.embedded_metadata.clone();
    Ok(out)
}
