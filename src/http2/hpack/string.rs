//! String literals of RFC 7541 5.2: a 7-bit prefixed length whose top bit
//! flags Huffman coding, then the raw or Huffman octets.

use algorithm::buf::{Bt, BtMut};

use super::huffman::{self, HuffmanDecoder};
use super::integer::{encode_integer, IntegerDecoder};
use super::HpackError;

/// When the encoder reaches for the Huffman table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HuffmanMode {
    /// Whichever of raw and Huffman is shorter.
    #[default]
    Smallest,
    Never,
    Always,
}

/// Encodes one string literal, returning the octets written.
pub fn encode_string<B: BtMut>(src: &[u8], mode: HuffmanMode, buf: &mut B) -> usize {
    let huffman = match mode {
        HuffmanMode::Never => false,
        HuffmanMode::Always => true,
        HuffmanMode::Smallest => huffman::encoded_len(src) < src.len(),
    };
    if huffman {
        let mut size = encode_integer(huffman::encoded_len(src) as u64, 7, 0x80, buf);
        size += huffman::encode_to(src, buf);
        size
    } else {
        let mut size = encode_integer(src.len() as u64, 7, 0x00, buf);
        size += buf.put_slice(src);
        size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringState {
    Init,
    Length,
    Value,
}

/// Restartable decoder for one string literal.
///
/// The octets are accumulated internally across calls; Huffman decoding
/// runs once the full length has arrived.
#[derive(Debug)]
pub struct StringDecoder {
    state: StringState,
    huffman: bool,
    length: usize,
    integer: IntegerDecoder,
    data: Vec<u8>,
}

impl StringDecoder {
    pub fn new() -> StringDecoder {
        StringDecoder {
            state: StringState::Init,
            huffman: false,
            length: 0,
            integer: IntegerDecoder::new(),
            data: Vec::new(),
        }
    }

    /// Feeds more input. `Ok(None)` means the literal is still incomplete;
    /// `Ok(Some(_))` hands the decoded octets over and resets the decoder.
    pub fn decode<B: Bt>(&mut self, buf: &mut B, max_len: usize) -> Result<Option<Vec<u8>>, HpackError> {
        if self.state == StringState::Init {
            if !buf.has_remaining() {
                return Ok(None);
            }
            self.huffman = buf.chunk()[0] & 0x80 == 0x80;
            self.state = StringState::Length;
        }

        if self.state == StringState::Length {
            match self.integer.decode(7, buf)? {
                None => return Ok(None),
                Some(length) => {
                    if length > max_len as u64 {
                        return Err(HpackError::StringLengthExceedsLimit);
                    }
                    self.length = length as usize;
                    self.data.reserve(self.length);
                    self.state = StringState::Value;
                }
            }
        }

        while self.data.len() < self.length && buf.has_remaining() {
            let chunk = buf.chunk();
            let take = chunk.len().min(self.length - self.data.len());
            self.data.extend_from_slice(&chunk[..take]);
            buf.advance(take);
        }
        if self.data.len() < self.length {
            return Ok(None);
        }

        let raw = std::mem::take(&mut self.data);
        let value = if self.huffman {
            HuffmanDecoder::new().decode(&raw).map_err(HpackError::from)?
        } else {
            raw
        };
        self.state = StringState::Init;
        self.length = 0;
        Ok(Some(value))
    }
}
