// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
// -----
// Created Date: 2023/09/15 14:27:46

use algorithm::buf::BtMut;

use crate::{CompressionHint, HeaderField};

use super::header_index::HeaderIndex;
use super::integer::encode_integer;
use super::string::{encode_string, HuffmanMode};

/// Size-update bookkeeping between header blocks.
///
/// `last` is the most recent value the peer handed us, `smallest` the
/// minimum seen since the last block that announced an update. The next
/// block opens with `smallest` (when it undercuts `last`) and then `last`,
/// so the peer observes every intermediate shrink of the table.
#[derive(Debug, Clone, Copy)]
struct PendingSizeUpdate {
    pending: bool,
    last: usize,
    smallest: usize,
}

/// Encodes header lists into HPACK header blocks, maintaining the dynamic
/// table shared with the peer's decoder.
pub struct Encoder {
    index: HeaderIndex,
    huffman: HuffmanMode,
    size_update: PendingSizeUpdate,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder::with_huffman_mode(HuffmanMode::default())
    }

    pub fn with_huffman_mode(huffman: HuffmanMode) -> Encoder {
        let index = HeaderIndex::new();
        let max = index.get_max_table_size();
        Encoder {
            index,
            huffman,
            size_update: PendingSizeUpdate {
                pending: false,
                last: max,
                smallest: max,
            },
        }
    }

    pub fn index(&self) -> &HeaderIndex {
        &self.index
    }

    /// Applies an acknowledged peer SETTINGS_HEADER_TABLE_SIZE. The table
    /// shrinks right away; the announcement is queued for the next block.
    pub fn set_max_table_size(&mut self, new_max_size: usize) {
        self.size_update.pending = true;
        self.size_update.smallest = self.size_update.smallest.min(new_max_size);
        self.size_update.last = new_max_size;
        self.index.set_max_table_size(new_max_size);
    }

    /// Encodes one header block into `dst`, returning the octets written.
    pub fn encode<'b, B, I>(&mut self, fields: I, dst: &mut B) -> usize
    where
        B: BtMut,
        I: IntoIterator<Item = &'b HeaderField>,
    {
        let mut size = self.flush_size_update(dst);
        for field in fields {
            size += self.encode_field(field, dst);
        }
        log::trace!("hpack: encoded header block of {} octets", size);
        size
    }

    /// One or two Dynamic Table Size Updates ahead of the block, RFC 7541
    /// 4.2: every shrink below the final value must be visible to the peer.
    fn flush_size_update<B: BtMut>(&mut self, dst: &mut B) -> usize {
        if !self.size_update.pending {
            return 0;
        }
        let mut size = 0;
        if self.size_update.smallest < self.size_update.last {
            size += encode_integer(self.size_update.smallest as u64, 5, 0x20, dst);
        }
        size += encode_integer(self.size_update.last as u64, 5, 0x20, dst);

        let max = self.index.get_max_table_size();
        self.size_update = PendingSizeUpdate {
            pending: false,
            last: max,
            smallest: max,
        };
        size
    }

    fn encode_field<B: BtMut>(&mut self, field: &HeaderField, dst: &mut B) -> usize {
        if field.hint() == CompressionHint::NoCacheNoIndex {
            return self.encode_literal(field, 4, 0x10, dst);
        }

        match self.index.find_header(field.name(), field.value()) {
            Some((index, true)) => {
                // The full header was found in one of the tables, so we
                // just encode the index.
                encode_integer(index as u64, 7, 0x80, dst)
            }
            _ if field.hint() == CompressionHint::UseCache => {
                let size = self.encode_literal(field, 6, 0x40, dst);
                self.index
                    .add_header(field.name().to_vec(), field.value().to_vec());
                size
            }
            _ => self.encode_literal(field, 4, 0x00, dst),
        }
    }

    /// Literal representation with the given prefix and tag bits; the name
    /// goes by table index when either table knows it.
    fn encode_literal<B: BtMut>(
        &mut self,
        field: &HeaderField,
        prefix_bits: u8,
        starting: u8,
        dst: &mut B,
    ) -> usize {
        let name_index = self.index.find_name(field.name());
        let mut size = encode_integer(name_index as u64, prefix_bits, starting, dst);
        if name_index == 0 {
            size += encode_string(field.name(), self.huffman, dst);
        }
        size += encode_string(field.value(), self.huffman, dst);
        size
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algorithm::buf::{BinaryMut, Bt};

    #[test]
    fn full_static_match_is_one_octet() {
        let mut encoder = Encoder::new();
        let mut dst = BinaryMut::new();
        let fields = vec![HeaderField::new(&b":method"[..], &b"GET"[..])];
        encoder.encode(fields.iter(), &mut dst);
        assert_eq!(dst.chunk(), &[0x82]);
    }

    #[test]
    fn use_cache_hint_populates_the_table() {
        let mut encoder = Encoder::with_huffman_mode(HuffmanMode::Never);
        let mut dst = BinaryMut::new();
        let fields = vec![HeaderField::new(&b":path"[..], &b"/path/hello"[..])];
        encoder.encode(fields.iter(), &mut dst);
        // Indexed name 4, literal value.
        assert_eq!(dst.chunk()[0], 0x44);
        assert_eq!(encoder.index().find_field(b":path", b"/path/hello"), 62);

        // The second block hits the dynamic table outright.
        let mut again = BinaryMut::new();
        encoder.encode(fields.iter(), &mut again);
        assert_eq!(again.chunk(), &[0x80 | 62]);
    }

    #[test]
    fn no_cache_hint_leaves_the_table_alone() {
        let mut encoder = Encoder::with_huffman_mode(HuffmanMode::Never);
        let mut dst = BinaryMut::new();
        let fields = vec![HeaderField::with_hint(
            &b"x-transient"[..],
            &b"1"[..],
            CompressionHint::NoCache,
        )];
        encoder.encode(fields.iter(), &mut dst);
        assert_eq!(dst.chunk()[0], 0x00);
        assert!(encoder.index().is_empty());
    }

    #[test]
    fn never_indexed_uses_the_0x10_tag() {
        let mut encoder = Encoder::with_huffman_mode(HuffmanMode::Never);
        let mut dst = BinaryMut::new();
        let fields = vec![HeaderField::with_hint(
            &b"authorization"[..],
            &b"secret"[..],
            CompressionHint::NoCacheNoIndex,
        )];
        encoder.encode(fields.iter(), &mut dst);
        // authorization is static index 23: 0x10 | 23 with a 4-bit prefix
        // saturates to 0x1F 0x08.
        assert_eq!(dst.chunk()[0], 0x1F);
        assert_eq!(dst.chunk()[1], 0x08);
        assert!(encoder.index().is_empty());
    }

    #[test]
    fn pending_updates_flush_smallest_then_last() {
        let mut encoder = Encoder::new();
        encoder.set_max_table_size(100);
        encoder.set_max_table_size(200);
        encoder.set_max_table_size(300);

        let mut dst = BinaryMut::new();
        encoder.encode(std::iter::empty(), &mut dst);
        // 100 then 300, each with a 5-bit prefix.
        assert_eq!(dst.chunk(), &[0x3F, 0x45, 0x3F, 0x8D, 0x02]);

        // A block that announced the update clears the pending state.
        let mut next = BinaryMut::new();
        encoder.encode(std::iter::empty(), &mut next);
        assert_eq!(next.remaining(), 0);
    }

    #[test]
    fn single_update_flushes_once() {
        let mut encoder = Encoder::new();
        encoder.set_max_table_size(4096 * 2);
        let mut dst = BinaryMut::new();
        encoder.encode(std::iter::empty(), &mut dst);
        // Growing from the default emits the old floor and the new value.
        assert_eq!(dst.chunk()[0], 0x3F);
    }
}
