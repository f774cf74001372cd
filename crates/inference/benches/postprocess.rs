use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use inference::{Candidate, DetectionPostProcessor, OutputLayout, non_max_suppression};
use schema::{BoundingBox, TensorBuffer};

/// YOLOv8-style output with a deterministic scatter of boxes and scores
fn create_yolov8_output(anchors: usize, classes: usize) -> TensorBuffer {
    let channels = 4 + classes;
    let mut data = vec![0.0f32; channels * anchors];
    for i in 0..anchors {
        data[i] = ((i * 37) % 640) as f32;
        data[anchors + i] = ((i * 91) % 640) as f32;
        data[2 * anchors + i] = 20.0 + (i % 60) as f32;
        data[3 * anchors + i] = 20.0 + (i % 45) as f32;
        let class = i % classes;
        data[(4 + class) * anchors + i] = (i % 100) as f32 / 100.0;
    }
    TensorBuffer::from_f32(vec![1, channels, anchors], &data).unwrap()
}

fn create_candidates(n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|i| Candidate {
            bbox: BoundingBox::new(
                (i % 50) as f32 / 50.0,
                (i / 50 % 50) as f32 / 50.0,
                0.05,
                0.05,
            ),
            confidence: (i % 97) as f32 / 97.0,
            class_index: i % 80,
        })
        .collect()
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection_postprocess");

    let output = create_yolov8_output(8400, 80);
    for threshold in [0.25f32, 0.5] {
        let post = DetectionPostProcessor {
            confidence_threshold: threshold,
            ..DetectionPostProcessor::new(OutputLayout::YoloV8, (640, 640))
        };

        group.bench_with_input(
            BenchmarkId::new("yolov8_8400", threshold),
            &output,
            |b, output| {
                b.iter(|| post.detect(black_box(std::slice::from_ref(output))).unwrap());
            },
        );
    }

    group.finish();
}

fn benchmark_nms(c: &mut Criterion) {
    let mut group = c.benchmark_group("nms");

    for n in [100usize, 1000, 2500] {
        let candidates = create_candidates(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &candidates, |b, candidates| {
            b.iter(|| non_max_suppression(black_box(candidates.clone()), 0.45));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_decode, benchmark_nms);
criterion_main!(benches);
