//! Property tests for the codec building blocks.

use std::collections::BTreeMap;

use parjpeg::jpeg::block::{from_zigzag, to_zigzag, ZIGZAG};
use parjpeg::jpeg::dct::{forward_dct_fast, forward_dct_reference, DctTables};
use parjpeg::jpeg::huffman::{build_code_table, build_tree, category, extend, magnitude, CodeTable};
use parjpeg::jpeg::quantize::QuantizationTable;
use parjpeg::jpeg::strategy::Strategy as EncodeStrategy;
use parjpeg::{EncodeOptions, Encoder, RgbImage};
use proptest::prelude::*;

fn frequency_map() -> impl Strategy<Value = BTreeMap<i32, u64>> {
    prop::collection::btree_map(-300i32..300, 1u64..10_000, 1..60)
}

fn image_strategy() -> impl Strategy<Value = RgbImage> {
    (1u32..40, 1u32..40).prop_flat_map(|(w, h)| {
        prop::collection::vec(any::<u8>(), (w * h * 3) as usize)
            .prop_map(move |data| RgbImage::from_raw(w, h, data).unwrap())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_huffman_prefix_free(frequencies in frequency_map()) {
        let tree = build_tree(&frequencies).unwrap();
        let table = build_code_table(&tree);
        prop_assert_eq!(table.len(), frequencies.len());

        let codes: Vec<_> = table.iter().map(|(_, code)| code).collect();
        for (i, a) in codes.iter().enumerate() {
            prop_assert!(a.length >= 1);
            for b in &codes[i + 1..] {
                let shorter = a.length.min(b.length);
                let a_prefix = a.code >> (a.length - shorter);
                let b_prefix = b.code >> (b.length - shorter);
                prop_assert_ne!(a_prefix, b_prefix);
            }
        }

        if codes.len() > 1 {
            // A full binary tree fills the Kraft sum exactly
            let kraft: f64 = codes.iter().map(|c| 0.5f64.powi(c.length as i32)).sum();
            prop_assert!((kraft - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_huffman_frequent_symbols_not_longer(frequencies in frequency_map()) {
        let table = CodeTable::from_frequencies(&frequencies).unwrap();
        for (&a, &fa) in &frequencies {
            for (&b, &fb) in &frequencies {
                if fa > fb {
                    prop_assert!(table.get(a).unwrap().length <= table.get(b).unwrap().length);
                }
            }
        }
    }

    #[test]
    fn prop_single_symbol_one_bit(symbol in any::<i32>(), count in 1u64..1_000_000) {
        let frequencies = BTreeMap::from([(symbol, count)]);
        let table = CodeTable::from_frequencies(&frequencies).unwrap();
        let code = table.get(symbol).unwrap();
        prop_assert_eq!((code.code, code.length), (0, 1));
    }

    #[test]
    fn prop_zigzag_bijection(
        block in prop::array::uniform32(any::<i32>()),
        tail in prop::array::uniform32(any::<i32>())
    ) {
        let mut full = [0i32; 64];
        full[..32].copy_from_slice(&block);
        full[32..].copy_from_slice(&tail);
        prop_assert_eq!(from_zigzag(&to_zigzag(&full)), full);
        prop_assert_eq!(to_zigzag(&from_zigzag(&full)), full);
    }

    #[test]
    fn prop_quantization_table_bounds(quality in 1u8..=100) {
        let table = QuantizationTable::with_quality(quality).unwrap();
        prop_assert!(table.values().iter().all(|&v| (1..=255).contains(&v)));
        if quality < 100 {
            let finer = QuantizationTable::with_quality(quality + 1).unwrap();
            for (coarse, fine) in table.values().iter().zip(finer.values()) {
                prop_assert!(fine <= coarse);
            }
        }
    }

    #[test]
    fn prop_quantize_error_bounded(
        quality in 1u8..=100,
        seed in prop::collection::vec(-1024.0f64..1024.0, 64)
    ) {
        let table = QuantizationTable::with_quality(quality).unwrap();
        let mut coefficients = [0.0f64; 64];
        coefficients.copy_from_slice(&seed);
        let restored = table.dequantize(&table.quantize(&coefficients)).unwrap();
        for i in 0..64 {
            let step = table.values()[i] as f64;
            prop_assert!((restored[i] as f64 - coefficients[i]).abs() <= step / 2.0 + 1e-9);
        }
    }

    #[test]
    fn prop_fast_dct_matches_reference(samples in prop::collection::vec(-128.0f64..128.0, 64)) {
        let tables = DctTables::new();
        let mut block = [0.0f64; 64];
        block.copy_from_slice(&samples);
        let reference = forward_dct_reference(&tables, &block);
        let fast = forward_dct_fast(&block);
        for i in 0..64 {
            let tolerance = 1e-6 * reference[i].abs().max(1.0);
            prop_assert!((fast[i] - reference[i]).abs() < tolerance, "coefficient {}", i);
        }
    }

    #[test]
    fn prop_category_magnitude_extend(value in -32767i32..=32767) {
        let cat = category(value);
        if value == 0 {
            prop_assert_eq!(cat, 0);
        } else {
            prop_assert!(value.unsigned_abs() < 1 << cat);
            prop_assert!(value.unsigned_abs() >= 1 << (cat - 1));
            prop_assert_eq!(extend(magnitude(value), cat), value);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_strategies_agree_on_random_images(image in image_strategy(), quality in 1u8..=100) {
        let base = EncodeOptions::default().with_quality(quality);
        let expected = Encoder::new(base).unwrap().encode(&image).unwrap();
        for strategy in EncodeStrategy::all(3) {
            let encoder = Encoder::new(base.with_strategy(strategy)).unwrap();
            let encoded = encoder.encode(&image).unwrap();
            prop_assert_eq!(&encoded, &expected, "{}", strategy);
        }
    }

    #[test]
    fn prop_decode_matches_block_path(image in image_strategy(), quality in 1u8..=100) {
        let encoder = Encoder::new(EncodeOptions::default().with_quality(quality)).unwrap();
        let blocks = encoder.process_blocks(&image).unwrap();
        let encoded = encoder.encode_blocks(&blocks, image.width(), image.height()).unwrap();
        let from_stream = parjpeg::decode::decode(&encoded).unwrap();
        let from_blocks = parjpeg::decode::decode_from_blocks(
            &blocks,
            encoder.quantization(),
            image.width(),
            image.height(),
        )
        .unwrap();
        prop_assert_eq!(from_stream, from_blocks);
    }
}

#[test]
fn test_zigzag_is_permutation() {
    let mut seen = [false; 64];
    for &index in &ZIGZAG {
        assert!(!seen[index]);
        seen[index] = true;
    }
}
