//! Fast combined path
//!
//! A single pass over the native-resolution layers straight to RGB, without
//! an intermediate frame. Chroma is mapped once per point of the finer of
//! the two chroma grids; its luma proxy is the BL luma sample co-sited with
//! the BL chroma sample.

use crate::engine::MappingEngine;
use crate::types::Frame;

/// Write RGB for `bl`/`el` into `dst`
///
/// `BL_CS`/`EL_CS` select 4:2:0 chroma on each layer, `QR` a
/// half-resolution EL. `dst` must be planar RGB at BL resolution.
pub fn bake_quick<E: MappingEngine, const BL_CS: bool, const EL_CS: bool, const QR: bool>(
    dst: &mut Frame,
    bl: &Frame,
    el: &Frame,
    engine: &E,
) {
    let cb = u32::from(BL_CS);
    let el_luma = u32::from(QR);
    let ce = u32::from(EL_CS) + el_luma;
    let g = cb.min(ce);
    let block = 1usize << g;

    let (width, height) = (bl.width(), bl.height());
    let grid_width = width >> g;

    let (bl_y, bl_u, bl_v) = (bl.plane(0), bl.plane(1), bl.plane(2));
    let (el_y, el_u, el_v) = (el.plane(0), el.plane(1), el.plane(2));
    let [mut dst_r, mut dst_g, mut dst_b] = dst.planes_mut();

    let mut chroma = vec![(0u16, 0u16); grid_width];

    for gy in 0..height >> g {
        let bl_cy = gy >> (cb - g);
        let (bu_row, bv_row) = (bl_u.row(bl_cy), bl_v.row(bl_cy));
        let (eu_row, ev_row) = (el_u.row(gy >> (ce - g)), el_v.row(gy >> (ce - g)));
        let proxy_row = bl_y.row(bl_cy << cb);

        for (gx, uv) in chroma.iter_mut().enumerate() {
            let bl_cx = gx >> (cb - g);
            let el_cx = gx >> (ce - g);
            let (blu, blv) = (bu_row[bl_cx], bv_row[bl_cx]);
            let proxy = proxy_row[bl_cx << cb];
            *uv = (
                engine.process_sample_u(blu, eu_row[el_cx], proxy, blu, blv),
                engine.process_sample_v(blv, ev_row[el_cx], proxy, blu, blv),
            );
        }

        for ly in (gy << g)..(gy << g) + block {
            let bl_row = bl_y.row(ly);
            let el_row = el_y.row(ly >> el_luma);
            let (r_row, g_row, b_row) = (dst_r.row_mut(ly), dst_g.row_mut(ly), dst_b.row_mut(ly));
            for lx in 0..width {
                let (u, v) = chroma[lx >> g];
                let y = engine.process_sample_y(bl_row[lx], el_row[lx >> el_luma]);
                let [r, gr, b] = engine.sample_to_rgb(y, u, v);
                r_row[lx] = r;
                g_row[lx] = gr;
                b_row[lx] = b;
            }
        }
    }
}
