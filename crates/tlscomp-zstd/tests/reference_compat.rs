//! Cross-library checks against the reference zstd library.
//!
//! Native frames must decode with the reference decoder and reference
//! frames must decode natively, with and without dictionaries.

use std::io::Write;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tlscomp_core::CompressionLevel;
use tlscomp_zstd::{compress, decompress, decompress_with_dictionary, ZstdConfig, ZstdDictionary};

fn generate_text_data(size: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .cycle()
        .take(size)
        .copied()
        .collect()
}

/// Certificate-like records with random serials and keys.
fn generate_chain(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(b"0\x82\x05\x120\x82\x03\xfa\xa0\x03\x02\x01\x02\x02\x10");
        data.extend((0..16).map(|_| rng.gen::<u8>()));
        data.extend_from_slice(b"1\x0b0\t\x06\x03U\x04\x06\x13\x02US1\x130\x11\x06\x03U\x04\n\x13\nExample CA");
        data.extend((0..rng.gen_range(8..128)).map(|_| rng.gen::<u8>()));
        data.extend_from_slice(b"0\r\x06\t*\x86H\x86\xf7\r\x01\x01\x0b\x05\x00");
    }
    data.truncate(size);
    data
}

fn corpora() -> Vec<(&'static str, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(42);
    vec![
        ("empty", Vec::new()),
        ("tiny", b"abc".to_vec()),
        ("text_64k", generate_text_data(65536)),
        ("chain_20k", generate_chain(20_000, 1)),
        ("chain_300k", generate_chain(300_000, 2)),
        ("random_10k", (0..10_000).map(|_| rng.gen()).collect()),
        ("run_200k", vec![0u8; 200_000]),
        ("skewed_50k", (0..50_000).map(|_| rng.gen_range(0u8..8) * 3).collect()),
    ]
}

#[test]
fn test_native_compress_reference_decompress() {
    for (name, data) in corpora() {
        for level in [CompressionLevel::Fast, CompressionLevel::Default, CompressionLevel::Best] {
            for checksum in [false, true] {
                let config = ZstdConfig::default().with_level(level).with_checksum(checksum);
                let compressed = compress(&data, &config).unwrap();
                let decoded = zstd::decode_all(compressed.as_slice())
                    .unwrap_or_else(|e| panic!("{name} {level:?}: reference rejected frame: {e}"));
                assert_eq!(decoded, data, "{name} {level:?} checksum={checksum}");
            }
        }
    }
}

#[test]
fn test_native_small_window_reference_decompress() {
    let data = generate_chain(100_000, 5);
    let config = ZstdConfig::default().with_window_log(10).with_content_size(false);
    let compressed = compress(&data, &config).unwrap();
    assert_eq!(zstd::decode_all(compressed.as_slice()).unwrap(), data);
}

#[test]
fn test_reference_compress_native_decompress() {
    for (name, data) in corpora() {
        for level in [1, 3, 9, 19] {
            let compressed = zstd::encode_all(data.as_slice(), level).unwrap();
            let decoded = decompress(&compressed)
                .unwrap_or_else(|e| panic!("{name} level {level}: {e}"));
            assert_eq!(decoded, data, "{name} level {level}");
        }
    }
}

#[test]
fn test_reference_checksum_native_decompress() {
    let data = generate_chain(40_000, 9);
    let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3).unwrap();
    encoder.include_checksum(true).unwrap();
    encoder.write_all(&data).unwrap();
    let mut compressed = encoder.finish().unwrap();
    assert_eq!(decompress(&compressed).unwrap(), data);

    let last = compressed.len() - 1;
    compressed[last] ^= 0xFF;
    assert!(decompress(&compressed).is_err());
}

#[test]
fn test_formatted_dictionary_both_directions() {
    let dictionary = Arc::new(ZstdDictionary::build(0x51C0, generate_chain(16_384, 11)).unwrap());
    let dict_bytes = dictionary.to_bytes();
    let data = generate_chain(4096, 11);

    let native = compress(&data, &ZstdConfig::default().with_dictionary(dictionary.clone())).unwrap();
    let mut reference_decoder = zstd::bulk::Decompressor::with_dictionary(&dict_bytes).unwrap();
    assert_eq!(reference_decoder.decompress(&native, data.len()).unwrap(), data);

    let mut reference_encoder = zstd::bulk::Compressor::with_dictionary(3, &dict_bytes).unwrap();
    let reference = reference_encoder.compress(&data).unwrap();
    assert_eq!(
        decompress_with_dictionary(&reference, Some(&dictionary)).unwrap(),
        data
    );
}

#[test]
fn test_raw_content_dictionary_both_directions() {
    let content = generate_chain(8192, 21);
    let dictionary = Arc::new(ZstdDictionary::from_content(content.clone()).unwrap());
    let data = generate_chain(3000, 21);

    let native = compress(&data, &ZstdConfig::default().with_dictionary(dictionary.clone())).unwrap();
    let mut reference_decoder = zstd::bulk::Decompressor::with_dictionary(&content).unwrap();
    assert_eq!(reference_decoder.decompress(&native, data.len()).unwrap(), data);

    let mut reference_encoder = zstd::bulk::Compressor::with_dictionary(3, &content).unwrap();
    let reference = reference_encoder.compress(&data).unwrap();
    assert_eq!(
        decompress_with_dictionary(&reference, Some(&dictionary)).unwrap(),
        data
    );
}

#[test]
fn test_concatenated_reference_and_native_frames() {
    let first = generate_text_data(5000);
    let second = generate_chain(7000, 31);
    let mut input = zstd::encode_all(first.as_slice(), 3).unwrap();
    input.extend_from_slice(&compress(&second, &ZstdConfig::default()).unwrap());

    let mut expected = first;
    expected.extend_from_slice(&second);
    assert_eq!(decompress(&input).unwrap(), expected);
}
