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
// Created Date: 2023/09/18 10:21:54

use algorithm::buf::{Bt, BtMut};

use crate::http2::{Decoder, Encoder};
use crate::{Http2Error, WebResult};

use super::{encode_u24, read_u24, Flag, GoAway, Headers, Kind, Settings, StreamIdentifier};

pub const FRAME_HEADER_BYTES: usize = 9;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    pub length: u32,
    pub kind: Kind,
    pub flag: Flag,
    pub id: StreamIdentifier,
}

/// The frame kinds this crate parses: the ones that delimit header blocks
/// and the two control frames the stream layer consumes.
#[derive(Debug)]
pub enum Frame {
    Headers(Headers),
    Settings(Settings),
    GoAway(GoAway),
}

impl Frame {
    #[inline]
    pub fn trim_padding<B: Bt>(header: &FrameHeader, buf: &mut B) -> WebResult<()> {
        if header.flag.is_padded() && buf.has_remaining() {
            let pad_length = buf.peek().unwrap();
            if pad_length as u32 > header.length {
                return Err(Http2Error::TooMuchPadding(pad_length).into());
            }
            buf.advance(1);
        }
        Ok(())
    }

    pub fn parse<T: Bt>(header: FrameHeader, mut buf: T, decoder: &mut Decoder) -> WebResult<Frame> {
        Frame::trim_padding(&header, &mut buf)?;
        match header.kind() {
            Kind::Headers => Ok(Frame::Headers(Headers::parse(header, &mut buf, decoder)?)),
            Kind::Settings => Ok(Frame::Settings(Settings::parse(header, &mut buf)?)),
            Kind::GoAway => Ok(Frame::GoAway(GoAway::parse(&mut buf)?)),
            kind => Err(Http2Error::InvalidFrameKind(*kind).into()),
        }
    }

    pub fn encode<B: Bt + BtMut>(self, buf: &mut B, encoder: &mut Encoder) -> WebResult<usize> {
        let size = match self {
            Frame::Headers(headers) => headers.encode(encoder, buf)?,
            Frame::Settings(settings) => settings.encode(buf)?,
            Frame::GoAway(go_away) => go_away.encode(buf)?,
        };
        log::trace!("http2: encoded frame of {} octets", size);
        Ok(size)
    }

    pub fn stream_id(&self) -> StreamIdentifier {
        match self {
            Frame::Headers(headers) => headers.stream_id(),
            Frame::Settings(_) => StreamIdentifier::zero(),
            Frame::GoAway(_) => StreamIdentifier::zero(),
        }
    }

    pub fn is_end_headers(&self) -> bool {
        match self {
            Frame::Headers(headers) => headers.flags().is_end_headers(),
            _ => false,
        }
    }
}

impl FrameHeader {
    pub fn new(kind: Kind, flag: Flag, id: StreamIdentifier) -> FrameHeader {
        FrameHeader {
            length: 0,
            kind,
            flag,
            id,
        }
    }

    #[inline]
    pub fn parse<T: Bt>(buffer: &mut T) -> WebResult<FrameHeader> {
        if buffer.remaining() < FRAME_HEADER_BYTES {
            return Err(Http2Error::Short.into());
        }
        let length = read_u24(buffer);
        let kind = Kind::new(buffer.get_u8());
        let flag = buffer.get_u8();
        let flag = Flag::new(flag).map_err(|()| Http2Error::BadFlag(flag))?;
        let id = StreamIdentifier::parse(buffer);
        Ok(FrameHeader {
            length,
            kind,
            flag,
            id,
        })
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn stream_id(&self) -> StreamIdentifier {
        self.id
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    pub fn encode<B: BtMut>(&self, buffer: &mut B) -> usize {
        let mut size = 0;
        size += encode_u24(buffer, self.length);
        size += buffer.put_u8(self.kind.encode());
        size += buffer.put_u8(self.flag.bits());
        size += self.id.encode(buffer);
        size
    }
}
