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
// Created Date: 2023/09/14 11:02:17

use std::fmt;

use crate::WebError;

use super::frame::Kind;
use super::HpackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Http2Error {
    /// Not enough bytes to hold a full frame header.
    Short,
    /// Frame payload shorter than its kind requires.
    BadFrameSize,
    BadFlag(u8),
    /// Frame kind with no parser in this crate.
    InvalidFrameKind(Kind),
    TooMuchPadding(u8),
    Hpack(HpackError),
}

impl Http2Error {
    #[inline]
    pub fn description_str(&self) -> &'static str {
        match self {
            Http2Error::Short => "not enough frame header bytes",
            Http2Error::BadFrameSize => "bad frame size",
            Http2Error::BadFlag(_) => "bad frame flag",
            Http2Error::InvalidFrameKind(_) => "invalid frame kind",
            Http2Error::TooMuchPadding(_) => "too much padding",
            Http2Error::Hpack(e) => e.description_str(),
        }
    }
}

impl fmt::Display for Http2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description_str())
    }
}

impl From<HpackError> for Http2Error {
    fn from(e: HpackError) -> Self {
        Http2Error::Hpack(e)
    }
}

impl From<HpackError> for WebError {
    fn from(e: HpackError) -> Self {
        WebError::Http2(Http2Error::Hpack(e))
    }
}
