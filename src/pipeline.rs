//! Frame reconstruction pipeline
//!
//! Ties the pieces together per output frame:
//! lease engine → load frame metadata → quick path or full-quality path →
//! optional trim → release engine.

use crate::config::BakerConfig;
use crate::engine::{EngineFactory, EngineSettings, MappingEngine, MetadataBinding};
use crate::error::{Error, Result};
use crate::pool::{self, EnginePool};
use crate::processing::{
    apply_mapping, apply_trim, convert_to_rgb, upsample_chroma, upscale_el, FrameGeometry,
    FrameProps, LightLevels, QuickPath,
};
use crate::types::{Frame, FrameFormat, LayerInfo};

/// Reconstructs single-layer frames from BL/EL pairs
pub struct Baker<E: MappingEngine> {
    config: BakerConfig,
    bl: LayerInfo,
    el: Option<LayerInfo>,
    output: LayerInfo,
    geometry: FrameGeometry,
    quick_path: Option<QuickPath<E>>,
    pool: EnginePool<E>,
}

impl<E: MappingEngine> Baker<E> {
    /// Validate the configuration against the layers and build the engine pool
    pub fn new<F>(
        config: BakerConfig,
        factory: &F,
        bl: LayerInfo,
        el: Option<LayerInfo>,
    ) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        config.validate()?;
        let geometry = FrameGeometry::detect(&bl, el.as_ref())?;
        if config.is_yuv_output() && geometry.bl_chroma_subsampled != geometry.el_chroma_subsampled
        {
            return Err(Error::LayerMismatch(format!(
                "YUV output needs matching BL/EL chroma subsampling ({})",
                geometry
            )));
        }

        let settings = EngineSettings {
            bl_bit_depth: bl.bit_depth,
            el_bit_depth: el.map_or(0, |el| el.bit_depth),
            source_profile: config.source_profile,
            rgb_proof: config.rgb_proof,
            nlq_proof: config.nlq_proof,
            trim: config.trim,
        };
        let primary = factory.create(MetadataBinding::Parse(config.metadata.clone()), &settings)?;
        if !primary.is_integrated_metadata() {
            if let Some(length) = primary.clip_length() {
                if length != bl.num_frames {
                    return Err(Error::LayerMismatch(format!(
                        "metadata describes {} frames, BL has {}",
                        length, bl.num_frames
                    )));
                }
            }
        }

        let size = config.pool_size.unwrap_or_else(pool::pool_size);
        let pool = EnginePool::with_primary(primary, factory, &settings, size)?;

        let format = if config.is_yuv_output() {
            FrameFormat::yuv(geometry.bl_chroma_subsampled)
        } else {
            FrameFormat::Rgbp16
        };
        let output = LayerInfo {
            format,
            bit_depth: 16,
            ..bl
        };
        let quick_path = config.quick.then(|| geometry.select_quick_path::<E>());

        tracing::info!(
            "Baker ready: {} {} -> {}, {}, {} engines, {} path",
            bl.resolution,
            bl.format,
            output.format,
            geometry,
            pool.capacity(),
            if quick_path.is_some() { "quick" } else { "full-quality" }
        );

        Ok(Self {
            config,
            bl,
            el,
            output,
            geometry,
            quick_path,
            pool,
        })
    }

    pub fn config(&self) -> &BakerConfig {
        &self.config
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Shape of the produced frames
    pub fn output_info(&self) -> LayerInfo {
        self.output
    }

    pub fn output_format(&self) -> FrameFormat {
        self.output.format
    }

    pub fn pool(&self) -> &EnginePool<E> {
        &self.pool
    }

    /// Produce output frame `n`
    ///
    /// A frame whose metadata cannot be loaded comes back zeroed and untagged
    /// instead of failing.
    pub fn get_frame(&self, n: u32, bl: &Frame, el: Option<&Frame>) -> Result<Frame> {
        self.check_inputs(bl, el)?;
        let el_frame = el.unwrap_or(bl);
        let mut dst = Frame::new(self.output.width(), self.output.height(), self.output.format);

        let mut engine = self.pool.acquire();
        let payload = if engine.is_integrated_metadata() {
            bl.embedded_metadata
                .as_deref()
                .or_else(|| el.and_then(|f| f.embedded_metadata.as_deref()))
        } else {
            None
        };
        if let Err(e) = engine.initialize_frame(n, payload) {
            if e.is_recoverable() {
                tracing::warn!("Frame {} left unprocessed: {}", n, e);
                return Ok(dst);
            }
            return Err(e);
        }

        dst.props = self.frame_props(&engine);
        match self.quick_path {
            Some(path) => path(&mut dst, bl, el_frame, &*engine),
            None => self.bake_full(&mut dst, bl, el_frame, &*engine)?,
        }
        if !self.config.is_yuv_output() && engine.trim_processing_enabled() {
            apply_trim(&mut dst, &*engine)?;
        }

        tracing::trace!("Frame {} baked", n);
        Ok(dst)
    }

    fn check_inputs(&self, bl: &Frame, el: Option<&Frame>) -> Result<()> {
        if !bl.matches(&self.bl) {
            return Err(Error::InvalidFrame(format!(
                "BL frame is {} {}, expected {} {}",
                bl.resolution(),
                bl.format(),
                self.bl.resolution,
                self.bl.format
            )));
        }
        match (&self.el, el) {
            (Some(info), Some(frame)) if !frame.matches(info) => Err(Error::InvalidFrame(format!(
                "EL frame is {} {}, expected {} {}",
                frame.resolution(),
                frame.format(),
                info.resolution,
                info.format
            ))),
            (Some(_), None) => Err(Error::InvalidFrame("EL frame missing".into())),
            (None, Some(_)) => Err(Error::InvalidFrame(
                "EL frame given to a BL-only baker".into(),
            )),
            _ => Ok(()),
        }
    }

    fn frame_props(&self, engine: &E) -> FrameProps {
        let base = if self.config.is_yuv_output() {
            FrameProps::yuv_output()
        } else {
            FrameProps::rgb_output(engine.is_limited_range_output())
        };
        FrameProps {
            scene_change: Some(engine.is_scene_change()),
            levels: Some(LightLevels {
                dynamic_min_pq: engine.dynamic_min_pq(),
                dynamic_max_pq: engine.dynamic_max_pq(),
                dynamic_max_cll: engine.dynamic_max_content_light_level(),
                static_min_pq: engine.static_min_pq(),
                static_max_pq: engine.static_max_pq(),
                static_max_cll: engine.static_max_content_light_level(),
                static_max_fall: engine.static_max_avg_content_light_level(),
                master_display_max_luminance: engine.static_master_display_max_luminance(),
                master_display_min_luminance: engine.static_master_display_min_luminance(),
            }),
            ..base
        }
    }

    fn bake_full(&self, dst: &mut Frame, bl: &Frame, el: &Frame, engine: &E) -> Result<()> {
        let g = self.geometry;
        let yuv_output = self.config.is_yuv_output();
        let el_enabled = engine.el_processing_enabled();

        let el_scaled = if el_enabled && g.quarter_resolution_el {
            Some(upscale_el::<E>(el)?)
        } else {
            None
        };
        let el_full = if el_enabled {
            el_scaled.as_ref().unwrap_or(el)
        } else {
            bl
        };

        // Chroma formats are reconciled on the coarser side for RGB output only
        let reconcile = el_enabled && !yuv_output;
        let el_444 = if reconcile && !g.bl_chroma_subsampled && g.el_chroma_subsampled {
            Some(upsample_chroma::<E>(el_full)?)
        } else {
            None
        };
        let bl_444 = if reconcile && g.bl_chroma_subsampled && !g.el_chroma_subsampled {
            Some(upsample_chroma::<E>(bl)?)
        } else {
            None
        };
        let frame_cs = g.bl_chroma_subsampled && el_444.is_none() && bl_444.is_none();
        let bl_uv = bl_444.as_ref().unwrap_or(bl);
        let el_uv = el_444.as_ref().unwrap_or(el_full);

        if yuv_output {
            map_layers(dst, bl, bl_uv, el_full, el_uv, engine, frame_cs);
            return Ok(());
        }

        let mut mez = Frame::new(bl.width(), bl.height(), FrameFormat::yuv(frame_cs));
        map_layers(&mut mez, bl, bl_uv, el_full, el_uv, engine, frame_cs);
        let mez = if frame_cs {
            upsample_chroma::<E>(&mez)?
        } else {
            mez
        };
        convert_to_rgb(dst, &mez, engine)
    }
}

fn map_layers<E: MappingEngine>(
    dst: &mut Frame,
    bl_y: &Frame,
    bl_uv: &Frame,
    el_y: &Frame,
    el_uv: &Frame,
    engine: &E,
    chroma_subsampled: bool,
) {
    if chroma_subsampled {
        apply_mapping::<E, true>(dst, bl_y, bl_uv, el_y, el_uv, engine)
    } else {
        apply_mapping::<E, false>(dst, bl_y, bl_uv, el_y, el_uv, engine)
    }
}
