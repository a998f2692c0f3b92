//! RGB conversion, trim and raw planar I/O

use crate::engine::MappingEngine;
use crate::error::{Error, Result};
use crate::types::{Frame, FrameFormat, Plane};

/// Convert a 4:4:4 YUV frame to planar RGB through the mapping engine
pub fn convert_to_rgb<E: MappingEngine>(dst: &mut Frame, src: &Frame, engine: &E) -> Result<()> {
    if src.format() != FrameFormat::Yuv444p16 || dst.format() != FrameFormat::Rgbp16 {
        return Err(Error::InvalidFrame(format!(
            "RGB conversion needs yuv444p16 -> rgb48, got {} -> {}",
            src.format(),
            dst.format()
        )));
    }
    if src.resolution() != dst.resolution() {
        return Err(Error::InvalidFrame(format!(
            "RGB conversion from {} into {}",
            src.resolution(),
            dst.resolution()
        )));
    }

    let (sy, su, sv) = (src.plane(0), src.plane(1), src.plane(2));
    let [mut r, mut g, mut b] = dst.planes_mut();
    for y in 0..src.height() {
        let (y_row, u_row, v_row) = (sy.row(y), su.row(y), sv.row(y));
        let (r_row, g_row, b_row) = (r.row_mut(y), g.row_mut(y), b.row_mut(y));
        for x in 0..y_row.len() {
            let [rv, gv, bv] = engine.sample_to_rgb(y_row[x], u_row[x], v_row[x]);
            r_row[x] = rv;
            g_row[x] = gv;
            b_row[x] = bv;
        }
    }
    Ok(())
}

/// Apply the engine's luminance-range trim to an RGB frame in place
pub fn apply_trim<E: MappingEngine>(frame: &mut Frame, engine: &E) -> Result<()> {
    if frame.format() != FrameFormat::Rgbp16 {
        return Err(Error::InvalidFrame(format!(
            "trim applies to rgb48 frames, got {}",
            frame.format()
        )));
    }
    let height = frame.height();
    let [mut r, mut g, mut b] = frame.planes_mut();
    for y in 0..height {
        let (r_row, g_row, b_row) = (r.row_mut(y), g.row_mut(y), b.row_mut(y));
        for x in 0..r_row.len() {
            let [rv, gv, bv] = engine.process_trim([r_row[x], g_row[x], b_row[x]]);
            r_row[x] = rv;
            g_row[x] = gv;
            b_row[x] = bv;
        }
    }
    Ok(())
}

/// Bytes of one raw planar little-endian 16-bit frame
pub fn raw_frame_size(format: FrameFormat, width: usize, height: usize) -> usize {
    format
        .plane_dims(width, height)
        .iter()
        .map(|(w, h)| w * h * 2)
        .sum()
}

/// Build a frame from raw planar little-endian 16-bit samples
pub fn frame_from_le_bytes(
    input: &[u8],
    format: FrameFormat,
    width: usize,
    height: usize,
) -> Result<Frame> {
    let expected = raw_frame_size(format, width, height);
    if input.len() != expected {
        return Err(Error::InvalidFrame(format!(
            "raw {} {}x{} frame needs {} bytes, got {}",
            format,
            width,
            height,
            expected,
            input.len()
        )));
    }

    let mut offset = 0;
    let mut planes = Vec::with_capacity(3);
    for (w, h) in format.plane_dims(width, height) {
        let len = w * h * 2;
        let data = input[offset..offset + len]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        planes.push(Plane::from_vec(data, w, h, w)?);
        offset += len;
    }
    let planes: [Plane; 3] = planes
        .try_into()
        .map_err(|_| Error::InvalidFrame("expected three planes".into()))?;
    Frame::from_planes(format, width, height, planes)
}

/// Append a frame as raw planar little-endian 16-bit samples
pub fn write_le_bytes(frame: &Frame, output: &mut Vec<u8>) {
    output.reserve(raw_frame_size(frame.format(), frame.width(), frame.height()));
    for i in 0..3 {
        let plane = frame.plane(i);
        for y in 0..plane.height() {
            for sample in plane.row(y) {
                output.extend_from_slice(&sample.to_le_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetadataSource;
    use crate::engine::{EngineFactory, EngineSettings, MetadataBinding, ReferenceEngine, ReferenceFactory};

    fn engine() -> ReferenceEngine {
        let settings = EngineSettings {
            bl_bit_depth: 16,
            ..Default::default()
        };
        ReferenceFactory
            .create(MetadataBinding::Parse(MetadataSource::Embedded), &settings)
            .unwrap()
    }

    #[test]
    fn test_raw_frame_io() {
        let mut frame = Frame::new(4, 2, FrameFormat::Yuv420p16);
        frame.plane_mut(0).row_mut(1).copy_from_slice(&[1, 2, 3, 0x1234]);
        frame.plane_mut(2).set(1, 0, 0xBEEF);

        let mut bytes = Vec::new();
        write_le_bytes(&frame, &mut bytes);
        assert_eq!(bytes.len(), raw_frame_size(FrameFormat::Yuv420p16, 4, 2));
        assert_eq!(bytes.len(), (8 + 2 + 2) * 2);
        assert_eq!(&bytes[14..16], &[0x34, 0x12]);

        let back = frame_from_le_bytes(&bytes, FrameFormat::Yuv420p16, 4, 2).unwrap();
        assert_eq!(back.owned_plane(0), frame.owned_plane(0));
        assert_eq!(back.plane(2).get(1, 0), 0xBEEF);

        assert!(frame_from_le_bytes(&bytes[1..], FrameFormat::Yuv420p16, 4, 2).is_err());
    }

    #[test]
    fn test_convert_gray_frame() {
        let mut src = Frame::new(2, 2, FrameFormat::Yuv444p16);
        for (i, value) in [(0, 30000), (1, 32768), (2, 32768)] {
            for y in 0..2 {
                src.plane_mut(i).row_mut(y).fill(value);
            }
        }
        let mut dst = Frame::new(2, 2, FrameFormat::Rgbp16);
        convert_to_rgb(&mut dst, &src, &engine()).unwrap();
        for i in 0..3 {
            assert_eq!(dst.owned_plane(i).to_packed(), vec![30000; 4]);
        }
    }

    #[test]
    fn test_convert_requires_full_chroma() {
        let src = Frame::new(2, 2, FrameFormat::Yuv420p16);
        let mut dst = Frame::new(2, 2, FrameFormat::Rgbp16);
        assert!(matches!(
            convert_to_rgb(&mut dst, &src, &engine()),
            Err(Error::InvalidFrame(_))
        ));
        let mut yuv = Frame::new(2, 2, FrameFormat::Yuv444p16);
        assert!(apply_trim(&mut yuv, &engine()).is_err());
    }
}
