//! Literals section encoding.
//!
//! Every applicable representation is built and the smallest wins:
//!
//! | Type       | Payload                              |
//! |------------|--------------------------------------|
//! | Raw        | the bytes                            |
//! | Rle        | one byte (all literals identical)    |
//! | Compressed | tree description + Huffman streams   |
//! | Treeless   | Huffman streams with the last tree   |

use crate::block::{LiteralsBlockType, LiteralsHeader};
use crate::bytes::ByteWriter;
use crate::huffman::HuffmanEncoder;
use tracing::trace;

/// Below this many literals a single Huffman stream is used.
const SINGLE_STREAM_LIMIT: usize = 256;

/// Huffman is not attempted below this many literals.
const MIN_HUFFMAN_LITERALS: usize = 16;

fn histogram(literals: &[u8]) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &b in literals {
        hist[b as usize] += 1;
    }
    hist
}

/// Huffman streams for `literals`, single or four-stream by size.
fn huffman_streams(encoder: &HuffmanEncoder, literals: &[u8]) -> Option<(Vec<u8>, bool)> {
    if literals.len() < SINGLE_STREAM_LIMIT {
        Some((encoder.encode_stream(literals), false))
    } else {
        encoder.encode_four_streams(literals).map(|s| (s, true))
    }
}

fn write_huffman_section(
    block_type: LiteralsBlockType,
    regenerated: usize,
    tree: &[u8],
    streams: &[u8],
    four_streams: bool,
) -> Vec<u8> {
    let compressed_size = tree.len() + streams.len();
    let mut writer = ByteWriter::with_capacity(5 + compressed_size);
    LiteralsHeader::huffman(block_type, regenerated, compressed_size, four_streams)
        .write(&mut writer);
    writer.write_bytes(tree);
    writer.write_bytes(streams);
    writer.into_inner()
}

/// Encode `literals` as the cheapest section.
///
/// `previous` is the Huffman encoder the decoder currently holds; it is
/// replaced when a new tree is transmitted.
pub fn encode_literals(literals: &[u8], previous: &mut Option<HuffmanEncoder>) -> Vec<u8> {
    let mut best = {
        let mut writer = ByteWriter::with_capacity(3 + literals.len());
        LiteralsHeader::raw(literals.len()).write(&mut writer);
        writer.write_bytes(literals);
        writer.into_inner()
    };

    if let Some(&first) = literals.first() {
        if literals.iter().all(|&b| b == first) {
            let mut writer = ByteWriter::with_capacity(4);
            LiteralsHeader::rle(literals.len()).write(&mut writer);
            writer.write_u8(first);
            trace!(size = literals.len(), "rle literals");
            return writer.into_inner();
        }
    }

    if literals.len() < MIN_HUFFMAN_LITERALS {
        return best;
    }

    let hist = histogram(literals);
    let mut fresh: Option<HuffmanEncoder> = None;

    if let Some(encoder) = HuffmanEncoder::build(&hist) {
        if let (Some(tree), Some((streams, four))) =
            (encoder.write_header(), huffman_streams(&encoder, literals))
        {
            let section = write_huffman_section(
                LiteralsBlockType::Compressed,
                literals.len(),
                &tree,
                &streams,
                four,
            );
            if section.len() < best.len() {
                best = section;
                fresh = Some(encoder);
            }
        }
    }

    let mut reused = false;
    if let Some(encoder) = previous.as_ref().filter(|e| e.covers(&hist)) {
        if let Some((streams, four)) = huffman_streams(encoder, literals) {
            let section =
                write_huffman_section(LiteralsBlockType::Treeless, literals.len(), &[], &streams, four);
            if section.len() <= best.len() {
                best = section;
                reused = true;
            }
        }
    }

    if !reused {
        if let Some(encoder) = fresh {
            *previous = Some(encoder);
        }
    }
    trace!(
        size = literals.len(),
        encoded = best.len(),
        treeless = reused,
        "literals section"
    );
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::decode_literals;
    use crate::huffman::HuffmanTable;

    fn decode(section: &[u8], table: &mut Option<HuffmanTable>) -> Vec<u8> {
        let mut out = Vec::new();
        let consumed = decode_literals(section, 1 << 17, table, &mut out).unwrap();
        assert_eq!(consumed, section.len());
        out
    }

    #[test]
    fn test_short_literals_stay_raw() {
        let mut previous = None;
        let section = encode_literals(b"abc", &mut previous);
        assert_eq!(section, vec![3 << 3, b'a', b'b', b'c']);
        assert!(previous.is_none());
    }

    #[test]
    fn test_uniform_literals_rle() {
        let mut previous = None;
        let section = encode_literals(&[7u8; 300], &mut previous);
        assert_eq!(section.len(), 3);
        assert_eq!(decode(&section, &mut None), vec![7u8; 300]);
    }

    #[test]
    fn test_skewed_literals_compressed() {
        let literals: Vec<u8> = b"aaaaaaaabbbbccd".iter().copied().cycle().take(2000).collect();
        let mut previous = None;
        let section = encode_literals(&literals, &mut previous);
        assert!(section.len() < literals.len() / 2);
        assert!(previous.is_some());
        assert_eq!(
            LiteralsHeader::parse(&section).unwrap().0.block_type,
            LiteralsBlockType::Compressed
        );

        let mut table = None;
        assert_eq!(decode(&section, &mut table), literals);
        assert!(table.is_some());
    }

    #[test]
    fn test_second_block_goes_treeless() {
        let literals: Vec<u8> = b"hello huffman world ".iter().copied().cycle().take(600).collect();
        let mut previous = None;
        let first = encode_literals(&literals, &mut previous);
        let second = encode_literals(&literals, &mut previous);
        assert_eq!(
            LiteralsHeader::parse(&second).unwrap().0.block_type,
            LiteralsBlockType::Treeless
        );
        assert!(second.len() < first.len());

        let mut table = None;
        assert_eq!(decode(&first, &mut table), literals);
        assert_eq!(decode(&second, &mut table), literals);
    }

    #[test]
    fn test_random_literals_fall_back_to_raw() {
        let literals: Vec<u8> = (0..=255u8).collect();
        let mut previous = None;
        let section = encode_literals(&literals, &mut previous);
        assert_eq!(
            LiteralsHeader::parse(&section).unwrap().0.block_type,
            LiteralsBlockType::Raw
        );
        assert!(previous.is_none());
    }
}
