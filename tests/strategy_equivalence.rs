//! Every threading strategy must produce the same blocks and bytes.

use parjpeg::jpeg::strategy::Strategy;
use parjpeg::{DctMethod, EncodeOptions, Encoder, EntropyCoding, RgbImage};

mod support;
use support::synthetic;

fn strategies() -> Vec<Strategy> {
    let mut all = Vec::new();
    for threads in [1, 2, 4, 7] {
        all.extend(Strategy::all(threads));
    }
    all.push(Strategy::Pipeline {
        dct_workers: 3,
        quant_workers: 1,
    });
    all
}

fn assert_equivalent(image: &RgbImage, base: EncodeOptions) {
    let baseline = Encoder::new(base.with_strategy(Strategy::Sequential)).unwrap();
    let expected_blocks = baseline.process_blocks(image).unwrap();
    let expected = baseline.encode(image).unwrap();

    for strategy in strategies() {
        let encoder = Encoder::new(base.with_strategy(strategy)).unwrap();
        let blocks = encoder.process_blocks(image).unwrap();
        assert_eq!(blocks, expected_blocks, "{strategy}: blocks differ");
        let encoded = encoder.encode(image).unwrap();
        assert_eq!(encoded, expected, "{strategy}: output differs");
    }
}

#[test]
fn test_strategies_identical_on_pattern() {
    let image = RgbImage::test_pattern(64, 64).unwrap();
    assert_equivalent(&image, EncodeOptions::default().with_quality(75));
}

#[test]
fn test_strategies_identical_on_partial_blocks() {
    // Neither dimension is a multiple of 8 or 16
    let image = synthetic::textured(45, 23);
    assert_equivalent(&image, EncodeOptions::default().with_quality(50));
}

#[test]
fn test_strategies_identical_run_length_fast_dct() {
    let image = synthetic::noise(40, 40, 7);
    let options = EncodeOptions::default()
        .with_quality(90)
        .with_dct(DctMethod::Fast)
        .with_entropy(EntropyCoding::RunLength);
    assert_equivalent(&image, options);
}

#[test]
fn test_parallel_color_conversion_identical() {
    let image = synthetic::textured(33, 29);
    let expected = parjpeg::jpeg::encode(&image, 80).unwrap();
    for threads in [2, 3, 8, 64] {
        let options = EncodeOptions::default()
            .with_quality(80)
            .with_color_threads(threads)
            .with_strategy(Strategy::DataParallel { threads });
        let encoded = Encoder::new(options).unwrap().encode(&image).unwrap();
        assert_eq!(encoded, expected, "{threads} color threads");
    }
}

#[test]
fn test_encoder_reusable() {
    let image = RgbImage::test_pattern(32, 32).unwrap();
    let encoder = Encoder::new(
        EncodeOptions::default().with_strategy(Strategy::WorkerPool { threads: 3 }),
    )
    .unwrap();
    let first = encoder.encode(&image).unwrap();
    for _ in 0..3 {
        assert_eq!(encoder.encode(&image).unwrap(), first);
    }
}
