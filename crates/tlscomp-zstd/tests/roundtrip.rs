//! Round-trip, malformed-input and multi-frame tests.
//!
//! Run with: cargo test -p tlscomp-zstd --test roundtrip

use std::sync::Arc;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tlscomp_core::{CompressionLevel, ErrorKind};
use tlscomp_zstd::bytes::ByteReader;
use tlscomp_zstd::frame::{BlockHeader, BlockType};
use tlscomp_zstd::{
    compress, decompress, decompress_frame, decompress_with_dictionary, read_frame_info,
    write_skippable_frame, FrameInfo, ZstdConfig, ZstdDictionary,
};

/// Mixed corpus: runs, repeated phrases and noise.
fn generate_mixed(rng: &mut StdRng, size: usize) -> Vec<u8> {
    let phrases: [&[u8]; 4] = [
        b"-----BEGIN CERTIFICATE-----\n",
        b"MIIFazCCA1OgAwIBAgIRAIIQz7DSQONZRGPgu2OCiwAwDQYJKoZIhvcNAQELBQAw",
        b"\x06\x03U\x04\x03\x13\x0eexample.com",
        b"-----END CERTIFICATE-----\n",
    ];
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        match rng.gen_range(0..4) {
            0 => {
                let byte = rng.gen::<u8>();
                let len = rng.gen_range(1..300);
                data.extend(std::iter::repeat(byte).take(len));
            }
            1 | 2 => data.extend_from_slice(phrases[rng.gen_range(0..phrases.len())]),
            _ => {
                let len = rng.gen_range(1..64);
                data.extend((0..len).map(|_| rng.gen::<u8>()));
            }
        }
    }
    data.truncate(size);
    data
}

fn sample_dictionary(id: u32) -> Arc<ZstdDictionary> {
    let mut rng = StdRng::seed_from_u64(u64::from(id));
    Arc::new(ZstdDictionary::build(id, generate_mixed(&mut rng, 8192)).unwrap())
}

#[test]
fn test_roundtrip_edge_sizes() {
    let config = ZstdConfig::default();
    for data in [vec![], vec![0x42], vec![0x61, 0x62, 0x63], vec![7u8; 2]] {
        let compressed = compress(&data, &config).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), data);
    }
}

#[test]
fn test_abc_with_checksum() {
    let config = ZstdConfig::default().with_checksum(true);
    let compressed = compress(&[0x61, 0x62, 0x63], &config).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), vec![0x61, 0x62, 0x63]);
}

#[test]
fn test_roundtrip_seeded_corpora() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    for size in [1000, 17_000, 131_072, 131_073, 400_000] {
        let data = generate_mixed(&mut rng, size);
        for level in [CompressionLevel::Fast, CompressionLevel::Default, CompressionLevel::Best] {
            let config = ZstdConfig::default().with_level(level).with_checksum(true);
            let compressed = compress(&data, &config).unwrap();
            assert_eq!(decompress(&compressed).unwrap(), data, "size {size} level {level:?}");
        }
    }
}

#[test]
fn test_roundtrip_one_mebibyte_multi_block() {
    let mut rng = StdRng::seed_from_u64(1 << 20);
    let data = generate_mixed(&mut rng, 1 << 20);
    let config = ZstdConfig::default().with_checksum(true);
    let compressed = compress(&data, &config).unwrap();
    assert!(compressed.len() < data.len());
    assert_eq!(decompress(&compressed).unwrap(), data);

    // Window smaller than the input: matches must stay inside it.
    let small_window = config.with_window_log(12).with_content_size(false);
    let compressed = compress(&data, &small_window).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), data);
}

#[test]
fn test_long_run_reassembles() {
    let data = vec![0xEEu8; 200_000];
    let compressed = compress(&data, &ZstdConfig::default()).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), data);

    let FrameInfo::Zstd { header_len, .. } = read_frame_info(&compressed).unwrap() else {
        panic!("expected a zstd frame");
    };
    let mut reader = ByteReader::new(&compressed);
    reader.skip(header_len).unwrap();
    let mut blocks = Vec::new();
    loop {
        let block = BlockHeader::parse(&mut reader).unwrap();
        reader.skip(block.payload_size()).unwrap();
        blocks.push((block.block_type, block.block_size));
        if block.last_block {
            break;
        }
    }
    assert_eq!(reader.position(), compressed.len());
    assert_eq!(blocks, vec![(BlockType::Rle, 131_072), (BlockType::Rle, 68_928)]);
}

#[test]
fn test_truncation_by_one_byte() {
    let mut rng = StdRng::seed_from_u64(99);
    let data = generate_mixed(&mut rng, 5000);
    for checksum in [false, true] {
        let compressed = compress(&data, &ZstdConfig::default().with_checksum(checksum)).unwrap();
        let err = decompress(&compressed[..compressed.len() - 1]).unwrap_err();
        assert!(
            matches!(
                err.kind(),
                ErrorKind::UnexpectedEndOfStream | ErrorKind::InvalidFrameHeader
            ),
            "unexpected error {err:?}"
        );
    }
}

#[test]
fn test_every_truncation_fails() {
    let data = b"truncate me anywhere, ".repeat(30);
    let compressed = compress(&data, &ZstdConfig::default().with_checksum(true)).unwrap();
    for cut in 0..compressed.len() {
        assert!(
            decompress(&compressed[..cut]).is_err(),
            "prefix of {cut} bytes decoded"
        );
    }
}

#[test]
fn test_checksum_flip_in_raw_content() {
    let mut rng = StdRng::seed_from_u64(7);
    let data: Vec<u8> = (0..300).map(|_| rng.gen()).collect();
    let compressed = compress(&data, &ZstdConfig::default().with_checksum(true)).unwrap();
    // Incompressible input is stored raw: header, 3-byte block header, content, checksum.
    let content_start = compressed.len() - 4 - data.len();
    for i in content_start..compressed.len() - 4 {
        let mut corrupted = compressed.clone();
        corrupted[i] ^= 0x01;
        let err = decompress(&corrupted).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch, "flip at {i}");
    }
}

#[test]
fn test_flips_never_decode_to_wrong_data() {
    let data = b"Certificate chain with repetition. Certificate chain again. ".repeat(20);
    let compressed = compress(&data, &ZstdConfig::default().with_checksum(true)).unwrap();
    for i in 0..compressed.len() {
        for mask in [0x01u8, 0x80] {
            let mut corrupted = compressed.clone();
            corrupted[i] ^= mask;
            if let Ok(decoded) = decompress(&corrupted) {
                assert_eq!(decoded, data, "flip {mask:#x} at {i} decoded wrong bytes");
            }
        }
    }
}

#[test]
fn test_multi_frame_with_skippable() {
    let mut rng = StdRng::seed_from_u64(3);
    let first = generate_mixed(&mut rng, 3000);
    let second = generate_mixed(&mut rng, 70_000);

    let mut input = compress(&first, &ZstdConfig::default()).unwrap();
    let first_len = input.len();
    let junk: Vec<u8> = (0..200).map(|_| rng.gen()).collect();
    input.extend_from_slice(&write_skippable_frame(0xA, &junk).unwrap());
    input.extend_from_slice(
        &compress(&second, &ZstdConfig::default().with_checksum(true)).unwrap(),
    );

    let mut expected = first.clone();
    expected.extend_from_slice(&second);
    assert_eq!(decompress(&input).unwrap(), expected);

    let (content, consumed) = decompress_frame(&input, None).unwrap();
    assert_eq!(content, first);
    assert_eq!(consumed, first_len);
}

#[test]
fn test_dictionary_determinism_and_mismatch() {
    let dictionary = sample_dictionary(0xC0FFEE);
    let other = sample_dictionary(0xBEEF);
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    // Same generator as the dictionary content, so the first block can
    // reference it.
    let data = generate_mixed(&mut rng, 2000);

    let config = ZstdConfig::default().with_dictionary(dictionary.clone());
    let compressed = compress(&data, &config).unwrap();
    assert_eq!(compress(&data, &config).unwrap(), compressed);
    assert_eq!(
        decompress_with_dictionary(&compressed, Some(&dictionary)).unwrap(),
        data
    );

    let without = compress(&data, &ZstdConfig::default()).unwrap();
    assert!(compressed.len() < without.len());

    assert_eq!(
        decompress(&compressed).unwrap_err().kind(),
        ErrorKind::DictionaryMismatch
    );
    assert_eq!(
        decompress_with_dictionary(&compressed, Some(&other))
            .unwrap_err()
            .kind(),
        ErrorKind::DictionaryMismatch
    );
}

#[test]
fn test_serialized_dictionary_roundtrip() {
    let dictionary = sample_dictionary(4321);
    let parsed = Arc::new(ZstdDictionary::parse(&dictionary.to_bytes()).unwrap());
    let data = b"subject alt names repeat across chains ".repeat(10);
    let compressed = compress(&data, &ZstdConfig::default().with_dictionary(dictionary)).unwrap();
    assert_eq!(
        decompress_with_dictionary(&compressed, Some(&parsed)).unwrap(),
        data
    );
}

#[test]
fn test_raw_content_dictionary() {
    let content = b"raw content dictionaries are plain history bytes ".repeat(8);
    let dictionary = Arc::new(ZstdDictionary::from_content(content).unwrap());
    let data = b"plain history bytes are raw content".to_vec();
    let compressed = compress(&data, &ZstdConfig::default().with_dictionary(dictionary.clone())).unwrap();
    assert_eq!(
        decompress_with_dictionary(&compressed, Some(&dictionary)).unwrap(),
        data
    );
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_roundtrip_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let compressed = compress(&data, &ZstdConfig::default()).unwrap();
        prop_assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_low_entropy(
        data in prop::collection::vec(0u8..4, 0..20_000),
        level in 0i32..25,
        checksum in any::<bool>(),
    ) {
        let config = ZstdConfig::default()
            .with_level(CompressionLevel::from_level(level))
            .with_checksum(checksum);
        let compressed = compress(&data, &config).unwrap();
        prop_assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_small_blocks(
        unit in prop::collection::vec(any::<u8>(), 1..40),
        reps in 1usize..400,
        block_log in 10u32..14,
    ) {
        let data = unit.repeat(reps);
        let config = ZstdConfig::default().with_max_block_size(1 << block_log);
        let compressed = compress(&data, &config).unwrap();
        prop_assert_eq!(decompress(&compressed).unwrap(), data);
    }
}
