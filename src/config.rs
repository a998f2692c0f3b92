//! Configuration types for DoViBake

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the reshaping metadata comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    /// Parsed once from a file covering the whole clip
    File(PathBuf),
    /// Carried by each frame and parsed lazily
    #[default]
    Embedded,
}

/// Output color family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFamily {
    /// Planar RGB48
    #[default]
    Rgb,
    /// Planar YUV, keeping the BL chroma subsampling
    Yuv,
}

/// Luminance-range trim target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// 12-bit PQ code of the trim to apply (0 disables trimming)
    pub trim_pq: u16,
    /// Target display black level in nits
    pub target_min_nits: f32,
    /// Target display peak in nits
    pub target_max_nits: f32,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            trim_pq: 0,
            target_min_nits: 0.0,
            target_max_nits: 100.0,
        }
    }
}

impl TrimConfig {
    pub fn is_enabled(&self) -> bool {
        self.trim_pq > 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.trim_pq > 4095 {
            return Err(Error::InvalidTrim(format!(
                "trim_pq {} exceeds the 12-bit PQ range",
                self.trim_pq
            )));
        }
        let (min, max) = (self.target_min_nits, self.target_max_nits);
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::InvalidTrim("target nits must be finite".into()));
        }
        if min < 0.0 || max > 10000.0 || min >= max {
            return Err(Error::InvalidTrim(format!(
                "target range [{}, {}] nits must satisfy 0 <= min < max <= 10000",
                min, max
            )));
        }
        Ok(())
    }
}

/// Baker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BakerConfig {
    /// Single-pass reduced-latency processing
    pub quick: bool,
    /// Diagnostic: emit the combined YUV triple instead of RGB
    pub rgb_proof: bool,
    /// Diagnostic: emit only the EL (NLQ) contribution
    pub nlq_proof: bool,
    /// Output color family
    pub output: OutputFamily,
    /// Luminance-range trim
    pub trim: TrimConfig,
    /// Source Dolby Vision profile: 0 (auto), 7 or 8
    pub source_profile: u8,
    /// Reshaping metadata source
    pub metadata: MetadataSource,
    /// Engine pool size (None = derived from hardware parallelism)
    pub pool_size: Option<usize>,
}

impl BakerConfig {
    pub fn with_quick(mut self, quick: bool) -> Self {
        self.quick = quick;
        self
    }

    pub fn with_output(mut self, output: OutputFamily) -> Self {
        self.output = output;
        self
    }

    pub fn with_rgb_proof(mut self, enabled: bool) -> Self {
        self.rgb_proof = enabled;
        self
    }

    pub fn with_nlq_proof(mut self, enabled: bool) -> Self {
        self.nlq_proof = enabled;
        self
    }

    pub fn with_trim(mut self, trim_pq: u16, target_min_nits: f32, target_max_nits: f32) -> Self {
        self.trim = TrimConfig {
            trim_pq,
            target_min_nits,
            target_max_nits,
        };
        self
    }

    pub fn with_source_profile(mut self, profile: u8) -> Self {
        self.source_profile = profile;
        self
    }

    pub fn with_metadata(mut self, source: MetadataSource) -> Self {
        self.metadata = source;
        self
    }

    pub fn with_metadata_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_metadata(MetadataSource::File(path.into()))
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    pub fn is_yuv_output(&self) -> bool {
        self.output == OutputFamily::Yuv
    }

    /// Check settings that do not depend on the input layers
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.source_profile, 0 | 7 | 8) {
            return Err(Error::Config(format!(
                "source_profile must be 0 (auto), 7, or 8, got {}",
                self.source_profile
            )));
        }
        if self.is_yuv_output() {
            if self.quick {
                return Err(Error::Config(
                    "quick mode cannot be used with YUV output".into(),
                ));
            }
            if self.rgb_proof {
                return Err(Error::Config(
                    "rgb_proof cannot be used with YUV output".into(),
                ));
            }
        }
        if self.pool_size == Some(0) {
            return Err(Error::Config("pool_size must be at least 1".into()));
        }
        self.trim.validate()
    }

    /// Parse a TOML configuration
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply a preset configuration
    pub fn from_preset(preset: Preset) -> Self {
        preset.into()
    }
}

/// High-level presets for common use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    /// Full-quality RGB reconstruction
    Reference,
    /// Single-pass RGB for scrubbing and previews
    Preview,
    /// YUV output for re-encoding
    YuvMezzanine,
    /// RGB with a 100-nit SDR trim
    Sdr100,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Reference,
        Preset::Preview,
        Preset::YuvMezzanine,
        Preset::Sdr100,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Reference => "reference",
            Preset::Preview => "preview",
            Preset::YuvMezzanine => "yuv-mezzanine",
            Preset::Sdr100 => "sdr100",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::Reference => "RGB48, full-quality upsampling",
            Preset::Preview => "RGB48, single pass, native-resolution layers",
            Preset::YuvMezzanine => "YUV 16-bit, BL chroma subsampling kept",
            Preset::Sdr100 => "RGB48, full quality, trimmed to 100 nits",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

impl From<Preset> for BakerConfig {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Reference => BakerConfig::default(),
            Preset::Preview => BakerConfig {
                quick: true,
                ..Default::default()
            },
            Preset::YuvMezzanine => BakerConfig {
                output: OutputFamily::Yuv,
                ..Default::default()
            },
            Preset::Sdr100 => BakerConfig {
                trim: TrimConfig {
                    trim_pq: 2081,
                    target_min_nits: 0.0,
                    target_max_nits: 100.0,
                },
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_presets_validate() {
        for preset in Preset::ALL {
            BakerConfig::from_preset(preset).validate().unwrap();
            assert_eq!(Preset::from_name(preset.name()), Some(preset));
        }
        let names: Vec<_> = Preset::ALL.iter().map(Preset::name).collect();
        assert_eq!(names, ["reference", "preview", "yuv-mezzanine", "sdr100"]);
        assert_eq!(
            BakerConfig::from(Preset::from_name("YUV-Mezzanine").unwrap()).output,
            OutputFamily::Yuv
        );
    }

    #[test]
    fn test_yuv_output_restrictions() {
        let yuv = BakerConfig::default().with_output(OutputFamily::Yuv);
        assert!(yuv.clone().validate().is_ok());
        assert!(matches!(
            yuv.clone().with_quick(true).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            yuv.with_rgb_proof(true).validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_invalid_trim_bounds() {
        let err = BakerConfig::default()
            .with_trim(2081, 100.0, 50.0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTrim(_)));
        assert!(err.is_configuration_error());

        assert!(BakerConfig::default()
            .with_trim(5000, 0.0, 100.0)
            .validate()
            .is_err());
        assert!(BakerConfig::default()
            .with_trim(2081, 0.0, f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_invalid_source_profile() {
        assert!(BakerConfig::default().with_source_profile(5).validate().is_err());
        assert!(BakerConfig::default().with_source_profile(7).validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
quick = true
pool_size = 4

[trim]
trim_pq = 2081
target_max_nits = 203.0

[metadata]
file = "clip.toml"
"#
        )
        .unwrap();

        let config = BakerConfig::from_file(file.path()).unwrap();
        assert!(config.quick);
        assert_eq!(config.pool_size, Some(4));
        assert_eq!(config.trim.trim_pq, 2081);
        assert_eq!(config.trim.target_min_nits, 0.0);
        assert_eq!(config.trim.target_max_nits, 203.0);
        assert_eq!(config.metadata, MetadataSource::File("clip.toml".into()));
        assert_eq!(config.output, OutputFamily::Rgb);
    }

    #[test]
    fn test_config_parse_error() {
        let err = BakerConfig::from_toml_str("quick = \"yes\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
