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
// Created Date: 2023/09/14 11:10:44

pub mod decoder;
pub mod encoder;
pub mod header_index;
pub mod huffman;
pub mod integer;
pub mod static_table;
pub mod string;

pub use decoder::{Decoded, Decoder};
pub use encoder::Encoder;
pub use header_index::HeaderIndex;
pub use huffman::{HuffmanDecoder, HuffmanDecoderError};
pub use string::HuffmanMode;

/// Everything that can go wrong while coding an hpack header block.
/// Any of these leaves the codec instance unusable.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum HpackError {
    /// Continuation octets that can never terminate a prefixed integer.
    MalformedInteger,
    /// The accumulated integer no longer fits 64 bits.
    IntegerOverflow,
    /// A string literal announced a length above the configured limit.
    StringLengthExceedsLimit,
    HuffmanDecode(HuffmanDecoderError),
    /// Index 0, or an index past the end of the combined tables.
    InvalidTableIndex,
    /// Dynamic table size update after a field of the same block.
    SizeUpdateAfterHeader,
    /// Dynamic table size update above our advertised setting.
    SizeUpdateExceedsSetting,
    /// name + value + 32 above the configured per-field limit.
    FieldSizeExceedsLimit,
}

impl HpackError {
    #[inline]
    pub fn description_str(&self) -> &'static str {
        match self {
            HpackError::MalformedInteger => "malformed integer",
            HpackError::IntegerOverflow => "integer overflow",
            HpackError::StringLengthExceedsLimit => "string length exceeds limit",
            HpackError::HuffmanDecode(e) => e.description_str(),
            HpackError::InvalidTableIndex => "invalid table index",
            HpackError::SizeUpdateAfterHeader => "size update after header",
            HpackError::SizeUpdateExceedsSetting => "size update exceeds setting",
            HpackError::FieldSizeExceedsLimit => "field size exceeds limit",
        }
    }
}

impl From<HuffmanDecoderError> for HpackError {
    fn from(e: HuffmanDecoderError) -> Self {
        HpackError::HuffmanDecode(e)
    }
}
