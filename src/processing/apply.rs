//! Full-resolution BL/EL combination
//!
//! All inputs share the BL resolution here; the only specialization left is
//! whether the destination chroma stays 4:2:0. For 4:2:0 the chroma luma
//! proxy averages the two co-sited BL luma rows with 1:2:1 weights, 3:1 at
//! the first column and 1:3 at the last.

use crate::engine::MappingEngine;
use crate::types::Frame;

/// Weighted sum of one luma row around chroma column `cx`, with rounding
#[inline]
fn row_weight(row: &[u16], cx: usize, chroma_width: usize) -> u32 {
    let at = |i: usize| u32::from(row[i]);
    if cx == 0 {
        // One-column rows take the first-column weights
        3 * at(0) + at(1) + 2
    } else if cx + 1 == chroma_width {
        at(2 * cx - 1) + 3 * at(2 * cx) + 2
    } else {
        at(2 * cx - 1) + 2 * at(2 * cx) + at(2 * cx + 1) + 2
    }
}

/// Luma proxy for the 4:2:0 chroma sample at column `cx`
#[inline]
fn subsampled_proxy(r0: &[u16], r1: &[u16], cx: usize, chroma_width: usize) -> u16 {
    let w0 = row_weight(r0, cx, chroma_width) >> 2;
    let w1 = row_weight(r1, cx, chroma_width) >> 2;
    ((w0 + w1 + 1) >> 1) as u16
}

/// Combine BL and EL into `dst` through the mapping engine
///
/// Luma comes from `bl_y`/`el_y`, chroma from `bl_uv`/`el_uv` (which may be
/// chroma-upsampled copies). `CS` is true when `dst` chroma is 4:2:0.
pub fn apply_mapping<E: MappingEngine, const CS: bool>(
    dst: &mut Frame,
    bl_y: &Frame,
    bl_uv: &Frame,
    el_y: &Frame,
    el_uv: &Frame,
    engine: &E,
) {
    let (bl_luma, el_luma) = (bl_y.plane(0), el_y.plane(0));
    let (bl_u, bl_v) = (bl_uv.plane(1), bl_uv.plane(2));
    let (el_u, el_v) = (el_uv.plane(1), el_uv.plane(2));
    let [mut dst_y, mut dst_u, mut dst_v] = dst.planes_mut();

    for y in 0..dst_y.height() {
        let (bl_row, el_row) = (bl_luma.row(y), el_luma.row(y));
        for (x, out) in dst_y.row_mut(y).iter_mut().enumerate() {
            *out = engine.process_sample_y(bl_row[x], el_row[x]);
        }
    }

    let chroma_width = dst_u.width();
    for cy in 0..dst_u.height() {
        let (bu_row, bv_row) = (bl_u.row(cy), bl_v.row(cy));
        let (eu_row, ev_row) = (el_u.row(cy), el_v.row(cy));
        let (r0, r1) = if CS {
            (bl_luma.row(2 * cy), bl_luma.row(2 * cy + 1))
        } else {
            (bl_luma.row(cy), bl_luma.row(cy))
        };
        let (u_row, v_row) = (dst_u.row_mut(cy), dst_v.row_mut(cy));

        for cx in 0..chroma_width {
            let proxy = if CS {
                subsampled_proxy(r0, r1, cx, chroma_width)
            } else {
                r0[cx]
            };
            let (blu, blv) = (bu_row[cx], bv_row[cx]);
            u_row[cx] = engine.process_sample_u(blu, eu_row[cx], proxy, blu, blv);
            v_row[cx] = engine.process_sample_v(blv, ev_row[cx], proxy, blu, blv);
        }
    }
}
