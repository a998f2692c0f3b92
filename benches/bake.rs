//! Benchmark the quick and full-quality reconstruction paths

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dovibake::engine::reference::FrameRecord;
use dovibake::processing::{upsample_plane, Upsampler};
use dovibake::{Baker, BakerConfig, Frame, FrameFormat, LayerInfo, ReferenceEngine, ReferenceFactory, ReferenceMetadata};

fn gradient(width: usize, height: usize, format: FrameFormat) -> Frame {
    let mut frame = Frame::new(width, height, format);
    for (i, mut plane) in frame.planes_mut().into_iter().enumerate() {
        for y in 0..plane.height() {
            for (x, sample) in plane.row_mut(y).iter_mut().enumerate() {
                *sample = ((x * 97 + y * 31 + i * 4099) % 65536) as u16;
            }
        }
    }
    frame.with_embedded_metadata(ReferenceMetadata::embed(&FrameRecord::default()))
}

fn bench_bake(c: &mut Criterion) {
    let mut group = c.benchmark_group("bake");

    let (width, height) = (1920, 1080);
    let bl_info = LayerInfo::new(width as u32, height as u32, FrameFormat::Yuv420p16);
    let el_info = LayerInfo::new(width as u32 / 2, height as u32 / 2, FrameFormat::Yuv420p16);
    let bl = gradient(width, height, FrameFormat::Yuv420p16);
    let el = gradient(width / 2, height / 2, FrameFormat::Yuv420p16);

    group.throughput(Throughput::Elements((width * height) as u64));

    for (name, quick) in [("quick", true), ("full", false)] {
        let config = BakerConfig::default().with_quick(quick).with_pool_size(1);
        let baker: Baker<ReferenceEngine> =
            match Baker::new(config, &ReferenceFactory, bl_info, Some(el_info)) {
                Ok(baker) => baker,
                Err(e) => panic!("baker setup failed: {e}"),
            };

        group.bench_with_input(BenchmarkId::from_parameter(name), &baker, |b, baker| {
            b.iter(|| baker.get_frame(0, black_box(&bl), Some(black_box(&el))))
        });
    }

    group.finish();
}

fn bench_upsample(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsample");
    let frame = gradient(960, 540, FrameFormat::Yuv444p16);

    group.throughput(Throughput::Elements(960 * 540 * 4));
    group.bench_function("luma_960x540", |b| {
        let up = Upsampler::luma::<ReferenceEngine>();
        b.iter(|| upsample_plane(black_box(frame.plane(0)), &up))
    });
    group.bench_function("chroma_960x540", |b| {
        let up = Upsampler::chroma::<ReferenceEngine>();
        b.iter(|| upsample_plane(black_box(frame.plane(1)), &up))
    });

    group.finish();
}

criterion_group!(benches, bench_bake, bench_upsample);
criterion_main!(benches);
