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
// Created Date: 2023/09/18 11:14:46

use std::fmt;

use algorithm::buf::{BinaryMut, Bt, BtMut};

use crate::http2::{Decoder, Encoder};
use crate::{HeaderField, Http2Error, WebResult};

use super::{Flag, FrameHeader, Kind, StreamIdentifier};

/// A HEADERS frame: one header block on one stream.
///
/// CONTINUATION is not modelled; callers concatenate the fragments of a
/// block before parsing and keep a block under the frame size when
/// encoding.
#[derive(Eq, PartialEq)]
pub struct Headers {
    /// The ID of the stream with which this frame is associated.
    stream_id: StreamIdentifier,

    /// The decoded header block fragment
    fields: Vec<HeaderField>,

    /// The associated flags
    flags: Flag,
}

impl Headers {
    pub fn new(stream_id: StreamIdentifier, fields: Vec<HeaderField>) -> Headers {
        let mut flags = Flag::zero();
        flags.set_end_headers();
        Headers {
            stream_id,
            fields,
            flags,
        }
    }

    pub fn stream_id(&self) -> StreamIdentifier {
        self.stream_id
    }

    pub fn flags(&self) -> Flag {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut Flag {
        &mut self.flags
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<HeaderField> {
        self.fields
    }

    pub fn parse<B: Bt>(header: FrameHeader, buffer: &mut B, decoder: &mut Decoder) -> WebResult<Headers> {
        if header.flag().is_priority() {
            // Stream dependency and weight; the priority tree is not kept.
            if buffer.remaining() < 5 {
                return Err(Http2Error::BadFrameSize.into());
            }
            buffer.advance(5);
        }

        let fields = decoder.decode_block(buffer)?;
        if header.flag().is_end_headers() {
            decoder.finish_block();
        }
        Ok(Headers {
            stream_id: header.stream_id(),
            fields,
            flags: header.flag(),
        })
    }

    pub fn encode<B: Bt + BtMut>(self, encoder: &mut Encoder, dst: &mut B) -> WebResult<usize> {
        let mut payload = BinaryMut::new();
        encoder.encode(self.fields.iter(), &mut payload);

        let mut head = FrameHeader::new(Kind::Headers, self.flags, self.stream_id);
        head.length = payload.remaining() as u32;
        let mut size = head.encode(dst);
        size += dst.put_slice(payload.chunk());
        log::trace!("http2: encoded headers frame; len={}", size);
        Ok(size)
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Headers")
            .field("stream_id", &self.stream_id)
            .field("flags", &self.flags)
            .field("fields", &self.fields.len())
            .finish()
    }
}
