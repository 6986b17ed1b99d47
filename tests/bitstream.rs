//! Bit writer / reader interplay, including 0xFF escaping.

use parjpeg::bits::{stuff_bytes, BitWriter};
use parjpeg::decode::BitReader;
use parjpeg::Error;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_writes(seed: u64, count: usize) -> Vec<(u32, u8)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let bits: u8 = rng.gen_range(1..=32);
            let value = if bits == 32 {
                rng.gen()
            } else {
                rng.gen_range(0..(1u32 << bits))
            };
            (value, bits)
        })
        .collect()
}

#[test]
fn test_random_writes_read_back() {
    for seed in 0..8 {
        let writes = random_writes(seed, 500);
        let mut writer = BitWriter::new();
        for &(value, bits) in &writes {
            writer.write_bits(value, bits).unwrap();
        }
        let data = writer.finish();

        let mut reader = BitReader::new(&data);
        for (i, &(value, bits)) in writes.iter().enumerate() {
            assert_eq!(reader.read_bits(bits).unwrap(), value, "seed {seed}, write {i}");
        }
    }
}

#[test]
fn test_every_ff_is_escaped() {
    for seed in 0..8 {
        let mut writer = BitWriter::new();
        for (value, bits) in random_writes(seed, 300) {
            writer.write_bits(value, bits).unwrap();
        }
        // Force a run of 0xFF bytes as well
        for _ in 0..4 {
            writer.write_bits(u32::MAX, 32).unwrap();
        }
        let data = writer.finish();

        let mut i = 0;
        while i < data.len() {
            if data[i] == 0xFF {
                assert_eq!(data.get(i + 1), Some(&0x00), "seed {seed}, offset {i}");
                i += 2;
            } else {
                i += 1;
            }
        }
    }
}

#[test]
fn test_ones_then_zeros() {
    let mut writer = BitWriter::new();
    writer.write_bits(0xFF, 8).unwrap();
    writer.write_bits(0x00, 8).unwrap();
    writer.write_bits(0xFF, 8).unwrap();
    let data = writer.finish();
    assert_eq!(data, vec![0xFF, 0x00, 0x00, 0xFF, 0x00]);

    let mut reader = BitReader::new(&data);
    assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
    assert_eq!(reader.read_bits(8).unwrap(), 0x00);
    assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
    assert!(reader.is_empty());
    assert_eq!(reader.read_bit(), Err(Error::EndOfStream));
}

#[test]
fn test_stuff_bytes_matches_writer() {
    let mut rng = StdRng::seed_from_u64(99);
    let raw: Vec<u8> = (0..1024)
        .map(|_| if rng.gen_bool(0.2) { 0xFF } else { rng.gen() })
        .collect();
    let mut writer = BitWriter::new();
    for &byte in &raw {
        writer.write_bits(byte as u32, 8).unwrap();
    }
    assert_eq!(writer.finish(), stuff_bytes(&raw));
}

#[test]
fn test_long_codes() {
    let mut writer = BitWriter::new();
    writer.write_code(0x1_2345_6789, 33).unwrap();
    writer.write_code(0b101, 3).unwrap();
    let data = writer.finish();

    let mut reader = BitReader::new(&data);
    assert!(reader.read_bit().unwrap());
    assert_eq!(reader.read_bits(32).unwrap(), 0x2345_6789);
    assert_eq!(reader.read_bits(3).unwrap(), 0b101);
}

#[test]
fn test_invalid_counts() {
    let mut writer = BitWriter::new();
    assert_eq!(writer.write_bits(0, 0), Err(Error::InvalidBitCount(0)));
    assert_eq!(writer.write_bits(0, 33), Err(Error::InvalidBitCount(33)));
    assert!(writer.is_empty());

    let mut reader = BitReader::new(&[0xAB]);
    assert_eq!(reader.read_bits(33), Err(Error::InvalidBitCount(33)));
}
