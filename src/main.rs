//! DoViBake CLI
//!
//! Command-line interface for baking raw planar dual-layer streams.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use dovibake::{
    config::{BakerConfig, OutputFamily, Preset},
    processing::{frame_from_le_bytes, raw_frame_size, write_le_bytes},
    Baker, Frame, FrameFormat, LayerInfo, MetadataSource, ReferenceEngine, ReferenceFactory,
    Resolution,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Input chroma layout
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Chroma {
    /// 4:2:0
    #[default]
    Yuv420,
    /// 4:4:4
    Yuv444,
}

impl From<Chroma> for FrameFormat {
    fn from(c: Chroma) -> Self {
        match c {
            Chroma::Yuv420 => FrameFormat::Yuv420p16,
            Chroma::Yuv444 => FrameFormat::Yuv444p16,
        }
    }
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {}", s))?;
    let w = w.parse().map_err(|_| format!("bad width in {}", s))?;
    let h = h.parse().map_err(|_| format!("bad height in {}", s))?;
    Ok(Resolution::new(w, h))
}

#[derive(Parser)]
#[command(name = "dovibake")]
#[command(about = "Dual-layer Dolby Vision reconstruction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, pool size and supported formats
    Info,

    /// Bake raw planar 16-bit BL/EL files into a single layer
    Bake {
        /// Base layer file (planar little-endian 16-bit)
        #[arg(long)]
        bl: PathBuf,

        /// Base layer resolution (e.g., 1920x1080)
        #[arg(long, value_parser = parse_resolution)]
        bl_size: Resolution,

        /// Base layer chroma layout
        #[arg(long, value_enum, default_value = "yuv420")]
        bl_chroma: Chroma,

        /// Significant bits per BL sample
        #[arg(long, default_value = "10")]
        bl_bits: u8,

        /// Enhancement layer file
        #[arg(long)]
        el: Option<PathBuf>,

        /// Enhancement layer resolution (defaults to the BL resolution)
        #[arg(long, value_parser = parse_resolution)]
        el_size: Option<Resolution>,

        /// Enhancement layer chroma layout
        #[arg(long, value_enum, default_value = "yuv420")]
        el_chroma: Chroma,

        /// Significant bits per EL sample
        #[arg(long, default_value = "10")]
        el_bits: u8,

        /// Reshaping metadata (TOML)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Baker configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use a preset instead of a configuration file
        #[arg(short, long)]
        preset: Option<String>,

        /// Single-pass reduced-latency processing
        #[arg(long)]
        quick: bool,

        /// Emit YUV instead of RGB
        #[arg(long)]
        yuv: bool,

        /// Worker threads (defaults to the pool size)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<u32>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List available presets
    Presets,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dovibake=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info => cmd_info(),
        Commands::Bake {
            bl,
            bl_size,
            bl_chroma,
            bl_bits,
            el,
            el_size,
            el_chroma,
            el_bits,
            metadata,
            config,
            preset,
            quick,
            yuv,
            workers,
            frames,
            output,
        } => {
            let config = load_config(config, preset, metadata, quick, yuv)?;
            let bl = RawLayer::open(&bl, bl_size, bl_chroma.into(), bl_bits)?;
            let el = el
                .map(|path| RawLayer::open(&path, el_size.unwrap_or(bl_size), el_chroma.into(), el_bits))
                .transpose()?;
            cmd_bake(config, bl, el, workers, frames, &output)
        }
        Commands::Presets => cmd_presets(),
    }
}

fn cmd_info() -> anyhow::Result<()> {
    println!("DoViBake {}", dovibake::VERSION);
    println!("=============\n");

    println!("Engine pool size: {}", dovibake::pool_size());
    println!("Input formats:");
    for format in [FrameFormat::Yuv420p16, FrameFormat::Yuv444p16] {
        println!("  - {}", format);
    }
    println!("Output formats:");
    for format in [FrameFormat::Rgbp16, FrameFormat::Yuv420p16, FrameFormat::Yuv444p16] {
        println!("  - {}", format);
    }
    println!("EL resolutions: equal to BL, or half width and half height");

    Ok(())
}

fn load_config(
    path: Option<PathBuf>,
    preset: Option<String>,
    metadata: Option<PathBuf>,
    quick: bool,
    yuv: bool,
) -> anyhow::Result<BakerConfig> {
    let mut config = match (path, preset) {
        (Some(path), _) => BakerConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(name)) => match Preset::from_name(&name) {
            Some(preset) => preset.into(),
            None => bail!(
                "Unknown preset: {}. Use 'dovibake presets' to see available.",
                name
            ),
        },
        (None, None) => BakerConfig::default(),
    };

    if let Some(metadata) = metadata {
        config = config.with_metadata_file(metadata);
    }
    if quick {
        config = config.with_quick(true);
    }
    if yuv {
        config = config.with_output(OutputFamily::Yuv);
    }
    if config.metadata == MetadataSource::Embedded {
        bail!("raw input carries no per-frame metadata; pass --metadata");
    }
    Ok(config)
}

/// A raw planar file read frame by frame
struct RawLayer {
    reader: BufReader<File>,
    info: LayerInfo,
    frame_bytes: usize,
}

impl RawLayer {
    fn open(path: &Path, size: Resolution, format: FrameFormat, bits: u8) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let len = file.metadata()?.len() as usize;
        let frame_bytes = raw_frame_size(format, size.width as usize, size.height as usize);
        if frame_bytes == 0 || len % frame_bytes != 0 {
            bail!(
                "{} holds {} bytes, not a multiple of one {} {} frame ({} bytes)",
                path.display(),
                len,
                size,
                format,
                frame_bytes
            );
        }
        let info = LayerInfo {
            resolution: size,
            format,
            bit_depth: bits,
            num_frames: (len / frame_bytes) as u32,
        };
        Ok(Self {
            reader: BufReader::new(file),
            info,
            frame_bytes,
        })
    }

    fn next_frame(&mut self) -> anyhow::Result<Frame> {
        let mut buf = vec![0u8; self.frame_bytes];
        self.reader.read_exact(&mut buf)?;
        Ok(frame_from_le_bytes(
            &buf,
            self.info.format,
            self.info.width(),
            self.info.height(),
        )?)
    }
}

fn cmd_bake(
    config: BakerConfig,
    mut bl: RawLayer,
    mut el: Option<RawLayer>,
    workers: Option<usize>,
    frames: Option<u32>,
    output: &Path,
) -> anyhow::Result<()> {
    let baker: Baker<ReferenceEngine> =
        Baker::new(config, &ReferenceFactory, bl.info, el.as_ref().map(|l| l.info))?;
    let out_info = baker.output_info();
    let total = frames.map_or(bl.info.num_frames, |f| f.min(bl.info.num_frames));
    let workers = workers.unwrap_or(baker.pool().capacity()).max(1);

    println!("Configuration:");
    println!("  BL: {} {}", bl.info.resolution, bl.info.format);
    if let Some(el) = &el {
        println!("  EL: {} {}", el.info.resolution, el.info.format);
    }
    println!("  Geometry: {}", baker.geometry());
    println!("  Output: {} {}", out_info.resolution, out_info.format);
    println!("  Frames: {}", total);
    println!("  Workers: {}", workers);
    println!();

    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("creating {}", output.display()))?,
    );
    let start = std::time::Instant::now();

    std::thread::scope(|s| -> anyhow::Result<()> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<(u32, Frame, Option<Frame>)>(workers * 2);
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<(u32, dovibake::Result<Frame>)>();

        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let baker = &baker;
            s.spawn(move || {
                for (n, bl, el) in job_rx {
                    let result = baker.get_frame(n, &bl, el.as_ref());
                    if done_tx.send((n, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(done_tx);

        let reader = s.spawn(move || -> anyhow::Result<()> {
            for n in 0..total {
                let bl_frame = bl.next_frame()?;
                let el_frame = el.as_mut().map(RawLayer::next_frame).transpose()?;
                if job_tx.send((n, bl_frame, el_frame)).is_err() {
                    break;
                }
            }
            Ok(())
        });

        // Frames finish out of order; write them in sequence
        let mut pending = BTreeMap::new();
        let mut next = 0u32;
        let mut bytes = Vec::new();
        for (n, result) in done_rx {
            pending.insert(n, result.with_context(|| format!("frame {}", n))?);
            while let Some(frame) = pending.remove(&next) {
                bytes.clear();
                write_le_bytes(&frame, &mut bytes);
                writer.write_all(&bytes)?;
                next += 1;
            }
        }

        match reader.join() {
            Ok(result) => result?,
            Err(_) => bail!("reader thread panicked"),
        }
        if next != total {
            bail!("only {} of {} frames were written", next, total);
        }
        Ok(())
    })?;
    writer.flush()?;

    let elapsed = start.elapsed();
    println!("Results:");
    println!("  Total time: {:.2}s", elapsed.as_secs_f64());
    println!("  FPS: {:.1}", total as f64 / elapsed.as_secs_f64());
    println!("  Written: {}", output.display());

    Ok(())
}

fn cmd_presets() -> anyhow::Result<()> {
    println!("Available Presets");
    println!("=================\n");

    for preset in Preset::ALL {
        println!("  {:<12} - {}", preset.name(), preset.description());
    }

    println!("\nUsage: dovibake bake --preset <name> ...");

    Ok(())
}
