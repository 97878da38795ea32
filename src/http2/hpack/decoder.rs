//! Exposes the struct `Decoder` that allows for HPACK-encoded header blocks
//! to be decoded into header fields.
//!
//! The decoder only follows HPACK rules, without performing any additional
//! (semantic) checks on the header name/value pairs, i.e. it considers the
//! headers as opaque octets.
//!
//! Input is consumed incrementally: each call eats as many octets as it can
//! and returns at most one decode result, so a header block may arrive in
//! arbitrary fragments, down to one octet at a time.
//!
//! # Example
//!
//! ```rust
//! use algorithm::buf::BinaryMut;
//! use webstream::{Decoded, Decoder};
//!
//! let mut decoder = Decoder::new();
//! let mut buf = BinaryMut::from(vec![0x82, 0x84]);
//!
//! match decoder.decode(&mut buf).unwrap() {
//!     Decoded::Field(field) => {
//!         assert_eq!(field.name(), b":method");
//!         assert_eq!(field.value(), b"GET");
//!     }
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```

use algorithm::buf::Bt;

use crate::{CompressionHint, HeaderField, WebResult};

use super::header_index::HeaderIndex;
use super::integer::IntegerDecoder;
use super::string::StringDecoder;
use super::HpackError;
use crate::http2::DEFAULT_MAX_FIELD_SIZE;

/// Different variants of how a particular header field can be represented in
/// an HPACK encoding.
enum FieldRepresentation {
    Indexed,
    LiteralWithIncrementalIndexing,
    SizeUpdate,
    LiteralNeverIndexed,
    LiteralWithoutIndexing,
}

impl FieldRepresentation {
    /// Based on the given octet, returns the type of the field representation.
    ///
    /// The given octet should be the top-order byte of the header field that
    /// is about to be decoded.
    fn new(octet: u8) -> FieldRepresentation {
        if octet & 128 == 128 {
            // High-order bit set
            FieldRepresentation::Indexed
        } else if octet & 64 == 64 {
            // Bit pattern `01`
            FieldRepresentation::LiteralWithIncrementalIndexing
        } else if octet & 32 == 32 {
            // Bit pattern `001`
            FieldRepresentation::SizeUpdate
        } else if octet & 16 == 16 {
            // Bit pattern `0001`
            FieldRepresentation::LiteralNeverIndexed
        } else {
            // None of the top 4 bits is set => bit pattern `0000xxxx`
            FieldRepresentation::LiteralWithoutIndexing
        }
    }
}

/// The literal forms, carrying their RFC 7541 6.2 prefix size and the hint
/// the decoded field should surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralForm {
    IncrementalIndexing,
    WithoutIndexing,
    NeverIndexed,
}

impl LiteralForm {
    fn prefix_bits(&self) -> u8 {
        match self {
            LiteralForm::IncrementalIndexing => 6,
            LiteralForm::WithoutIndexing => 4,
            LiteralForm::NeverIndexed => 4,
        }
    }

    fn hint(&self) -> CompressionHint {
        match self {
            LiteralForm::IncrementalIndexing => CompressionHint::UseCache,
            LiteralForm::WithoutIndexing => CompressionHint::NoCache,
            LiteralForm::NeverIndexed => CompressionHint::NoCacheNoIndex,
        }
    }
}

/// Per-entry decode progress. Each variant owns the sub-decoder (and, past
/// the name stage, the scratch name octets) it needs to resume mid-entry.
enum DecodeState {
    Init,
    Indexed {
        integer: IntegerDecoder,
    },
    LiteralBegin {
        form: LiteralForm,
        integer: IntegerDecoder,
    },
    LiteralName {
        form: LiteralForm,
        string: StringDecoder,
    },
    LiteralValue {
        form: LiteralForm,
        name: Vec<u8>,
        string: StringDecoder,
    },
    SizeUpdate {
        integer: IntegerDecoder,
    },
}

/// One step of decoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete header field.
    Field(HeaderField),
    /// The peer resized the dynamic table; the table is already resized.
    SizeUpdate(usize),
    /// The input ran dry mid-entry; feed more octets.
    Ongoing,
}

/// Decodes headers encoded using HPACK, maintaining the state necessary to
/// correctly decode subsequent blocks. One instance per connection
/// direction; after any error it refuses further input.
pub struct Decoder {
    index: HeaderIndex,
    state: DecodeState,
    header_seen: bool,
    failure: Option<HpackError>,
    max_field_size: usize,
}

impl Decoder {
    /// Creates a new `Decoder` with all settings set to default values.
    pub fn new() -> Decoder {
        Decoder {
            index: HeaderIndex::new(),
            state: DecodeState::Init,
            header_seen: false,
            failure: None,
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
        }
    }

    pub fn index(&self) -> &HeaderIndex {
        &self.index
    }

    /// Bound on a single decoded field (name + value + 32 octets).
    pub fn set_max_field_size(&mut self, max_field_size: usize) {
        self.max_field_size = max_field_size;
    }

    /// Applies our own SETTINGS_HEADER_TABLE_SIZE: the ceiling the peer's
    /// size updates are checked against.
    pub fn set_protocol_max_size(&mut self, size: usize) {
        self.index.set_protocol_max_size(size);
    }

    /// Marks the end of a header block (END_HEADERS at the frame layer),
    /// re-arming the rule that size updates only open a block.
    pub fn finish_block(&mut self) {
        self.header_seen = false;
    }

    /// Decodes the next entry out of `buf`, consuming only the octets that
    /// belong to it. Returns `Decoded::Ongoing` when the input ends
    /// mid-entry; the accumulated progress is kept for the next call.
    pub fn decode<B: Bt>(&mut self, buf: &mut B) -> WebResult<Decoded> {
        if let Some(e) = self.failure {
            return Err(e.into());
        }
        match self.step(buf) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.failure = Some(e);
                Err(e.into())
            }
        }
    }

    /// Decodes a whole header-block fragment, collecting the fields. Size
    /// updates apply to the table and are not reported individually.
    pub fn decode_block<B: Bt>(&mut self, buf: &mut B) -> WebResult<Vec<HeaderField>> {
        let mut fields = Vec::new();
        loop {
            match self.decode(buf)? {
                Decoded::Field(field) => fields.push(field),
                Decoded::SizeUpdate(_) => (),
                Decoded::Ongoing => return Ok(fields),
            }
        }
    }

    fn step<B: Bt>(&mut self, buf: &mut B) -> Result<Decoded, HpackError> {
        loop {
            match &mut self.state {
                DecodeState::Init => {
                    if !buf.has_remaining() {
                        return Ok(Decoded::Ongoing);
                    }
                    // The type of the entry can always be determined from
                    // the first octet; the integer decoder re-reads it.
                    let initial_octet = buf.chunk()[0];
                    self.state = match FieldRepresentation::new(initial_octet) {
                        FieldRepresentation::Indexed => DecodeState::Indexed {
                            integer: IntegerDecoder::new(),
                        },
                        FieldRepresentation::LiteralWithIncrementalIndexing => {
                            DecodeState::LiteralBegin {
                                form: LiteralForm::IncrementalIndexing,
                                integer: IntegerDecoder::new(),
                            }
                        }
                        FieldRepresentation::LiteralWithoutIndexing => {
                            DecodeState::LiteralBegin {
                                form: LiteralForm::WithoutIndexing,
                                integer: IntegerDecoder::new(),
                            }
                        }
                        FieldRepresentation::LiteralNeverIndexed => DecodeState::LiteralBegin {
                            form: LiteralForm::NeverIndexed,
                            integer: IntegerDecoder::new(),
                        },
                        FieldRepresentation::SizeUpdate => {
                            if self.header_seen {
                                return Err(HpackError::SizeUpdateAfterHeader);
                            }
                            DecodeState::SizeUpdate {
                                integer: IntegerDecoder::new(),
                            }
                        }
                    };
                }
                DecodeState::Indexed { integer } => match integer.decode(7, buf)? {
                    None => return Ok(Decoded::Ongoing),
                    Some(0) => return Err(HpackError::InvalidTableIndex),
                    Some(index) => {
                        let (name, value) = self
                            .index
                            .get_from_index(index as usize)
                            .ok_or(HpackError::InvalidTableIndex)?;
                        let field = HeaderField::new(name, value);
                        self.state = DecodeState::Init;
                        self.header_seen = true;
                        return Ok(Decoded::Field(field));
                    }
                },
                DecodeState::LiteralBegin { form, integer } => {
                    let form = *form;
                    match integer.decode(form.prefix_bits(), buf)? {
                        None => return Ok(Decoded::Ongoing),
                        Some(0) => {
                            self.state = DecodeState::LiteralName {
                                form,
                                string: StringDecoder::new(),
                            };
                        }
                        Some(index) => {
                            let name = self
                                .index
                                .get_from_index(index as usize)
                                .ok_or(HpackError::InvalidTableIndex)?
                                .0
                                .to_vec();
                            self.state = DecodeState::LiteralValue {
                                form,
                                name,
                                string: StringDecoder::new(),
                            };
                        }
                    }
                }
                DecodeState::LiteralName { form, string } => {
                    let form = *form;
                    match string.decode(buf, self.max_field_size)? {
                        None => return Ok(Decoded::Ongoing),
                        Some(name) => {
                            self.state = DecodeState::LiteralValue {
                                form,
                                name,
                                string: StringDecoder::new(),
                            };
                        }
                    }
                }
                DecodeState::LiteralValue { form, name, string } => {
                    match string.decode(buf, self.max_field_size)? {
                        None => return Ok(Decoded::Ongoing),
                        Some(value) => {
                            let form = *form;
                            let name = std::mem::take(name);
                            if name.len() + value.len() + 32 > self.max_field_size {
                                return Err(HpackError::FieldSizeExceedsLimit);
                            }
                            if form == LiteralForm::IncrementalIndexing {
                                self.index.add_header(name.clone(), value.clone());
                            }
                            let field = HeaderField::with_hint(name, value, form.hint());
                            self.state = DecodeState::Init;
                            self.header_seen = true;
                            return Ok(Decoded::Field(field));
                        }
                    }
                }
                DecodeState::SizeUpdate { integer } => match integer.decode(5, buf)? {
                    None => return Ok(Decoded::Ongoing),
                    Some(size) => {
                        let size = size as usize;
                        if size > self.index.protocol_max_size() {
                            return Err(HpackError::SizeUpdateExceedsSetting);
                        }
                        log::debug!("hpack: peer resized dynamic table to {} octets", size);
                        self.index.set_max_table_size(size);
                        self.state = DecodeState::Init;
                        return Ok(Decoded::SizeUpdate(size));
                    }
                },
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}
