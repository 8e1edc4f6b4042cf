//! Huffman tree description parsing and stream decoding.

use super::table::{complete_weights, HuffmanTable};
use super::{HUFFMAN_MAX_SYMBOLS, HUFFMAN_MAX_WEIGHT, HUFFMAN_WEIGHT_MAX_LOG};
use crate::bits::BackwardBitReader;
use crate::fse::{FseDecoder, FseTable};
use tlscomp_core::{Error, Result};

/// Huffman bitstream decoder.
///
/// Each lookup peeks `max_bits`, then consumes only the code's own length.
/// Reads past the start of the stream see zeros; the caller checks for
/// overrun once the expected symbol count has been produced.
#[derive(Debug)]
pub struct HuffmanDecoder<'a> {
    table: &'a HuffmanTable,
}

impl<'a> HuffmanDecoder<'a> {
    pub fn new(table: &'a HuffmanTable) -> Self {
        Self { table }
    }

    #[inline]
    pub fn decode_symbol(&self, bits: &mut BackwardBitReader<'_>) -> u8 {
        let entry = self.table.lookup(bits.peek(self.table.max_bits() as u32) as usize);
        bits.consume(entry.num_bits as u32);
        entry.symbol
    }

    /// Decode exactly `count` symbols from one stream into `out`.
    ///
    /// The stream must be consumed exactly, down to its first bit.
    pub fn decode_stream(&self, stream: &[u8], count: usize, out: &mut Vec<u8>) -> Result<()> {
        let mut bits = BackwardBitReader::new(stream)?;
        out.reserve(count);
        for _ in 0..count {
            out.push(self.decode_symbol(&mut bits));
        }
        if bits.is_overflowed() {
            return Err(Error::unexpected_end(0));
        }
        if !bits.is_finished() {
            return Err(Error::corrupted(
                format!("{} unread bits after Huffman stream", bits.remaining()),
                0,
            ));
        }
        Ok(())
    }

    /// Decode the four-stream layout: a 6-byte jump table holding the sizes
    /// of the first three streams, then the streams back to back.
    ///
    /// Streams 1-3 regenerate `(regenerated + 3) / 4` bytes each; the
    /// fourth regenerates the rest.
    pub fn decode_four_streams(
        &self,
        data: &[u8],
        regenerated: usize,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        if data.len() < 10 {
            return Err(Error::corrupted(
                format!("{} bytes cannot hold four Huffman streams", data.len()),
                0,
            ));
        }
        let sizes = [
            u16::from_le_bytes([data[0], data[1]]) as usize,
            u16::from_le_bytes([data[2], data[3]]) as usize,
            u16::from_le_bytes([data[4], data[5]]) as usize,
        ];
        let body = 6 + sizes.iter().sum::<usize>();
        if body >= data.len() {
            return Err(Error::corrupted(
                format!("jump table spans {body} of {} bytes", data.len()),
                0,
            ));
        }

        let segment = (regenerated + 3) / 4;
        let last = regenerated.checked_sub(3 * segment).ok_or_else(|| {
            Error::corrupted(
                format!("{regenerated} literals cannot be split across four streams"),
                0,
            )
        })?;

        let mut start = 6;
        let bounds = [
            (sizes[0], segment),
            (sizes[1], segment),
            (sizes[2], segment),
            (data.len() - body, last),
        ];
        for (size, count) in bounds {
            let stream = &data[start..start + size];
            self.decode_stream(stream, count, out)
                .map_err(|e| e.at_offset(start))?;
            start += size;
        }
        Ok(())
    }
}

/// Parse a Huffman tree description.
///
/// Returns the complete weight list (the implied last weight appended)
/// and the number of header bytes consumed.
///
/// A first byte below 128 is the size of an FSE-compressed weight stream;
/// from 128 up it encodes `count + 127` weights packed as 4-bit nibbles,
/// high nibble first.
pub fn parse_huffman_weights(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let header = *data.first().ok_or_else(|| Error::unexpected_end(0))?;

    let (partial, consumed) = if header < 128 {
        let size = header as usize;
        if size == 0 {
            return Err(Error::huffman("empty compressed weight stream", 0));
        }
        let compressed = data.get(1..1 + size).ok_or_else(|| Error::unexpected_end(data.len()))?;
        let weights = decode_compressed_weights(compressed).map_err(|e| e.at_offset(1))?;
        (weights, 1 + size)
    } else {
        let count = header as usize - 127;
        let packed = data
            .get(1..1 + (count + 1) / 2)
            .ok_or_else(|| Error::unexpected_end(data.len()))?;
        let weights = (0..count)
            .map(|i| {
                let byte = packed[i / 2];
                if i % 2 == 0 {
                    byte >> 4
                } else {
                    byte & 0x0F
                }
            })
            .collect::<Vec<u8>>();
        (weights, 1 + packed.len())
    };

    let weights = complete_weights(&partial)?;
    Ok((weights, consumed))
}

/// Parse a tree description and build its decoding table.
pub fn read_huffman_table(data: &[u8]) -> Result<(HuffmanTable, usize)> {
    let (weights, consumed) = parse_huffman_weights(data)?;
    let table = HuffmanTable::from_weights(&weights)?;
    Ok((table, consumed))
}

/// Two interleaved FSE states decode the weights alternately until the
/// bitstream runs dry; the other state's current symbol is the final weight.
fn decode_compressed_weights(data: &[u8]) -> Result<Vec<u8>> {
    let (table, header_len) = FseTable::parse(data, HUFFMAN_WEIGHT_MAX_LOG, HUFFMAN_MAX_WEIGHT)?;
    let stream = &data[header_len..];
    let mut bits = BackwardBitReader::new(stream).map_err(|e| e.at_offset(header_len))?;

    let mut first = FseDecoder::new(&table, &mut bits);
    let mut second = FseDecoder::new(&table, &mut bits);
    let mut weights = Vec::with_capacity(HUFFMAN_MAX_SYMBOLS);

    loop {
        if weights.len() + 2 > HUFFMAN_MAX_SYMBOLS - 1 {
            return Err(Error::huffman("more than 255 compressed weights", 0));
        }
        weights.push(first.decode_symbol(&mut bits));
        if bits.is_overflowed() {
            weights.push(second.peek_symbol());
            break;
        }
        weights.push(second.decode_symbol(&mut bits));
        if bits.is_overflowed() {
            weights.push(first.peek_symbol());
            break;
        }
    }
    Ok(weights)
}
