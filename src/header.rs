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
// Created Date: 2023/09/14 10:33:02

use std::fmt;

/// How the hpack encoder is allowed to treat a header field.
///
/// `UseCache` lets the encoder add the field to the dynamic table,
/// `NoCache` forbids insertion, `NoCacheNoIndex` additionally forces the
/// never-indexed literal form so intermediaries must not re-index it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionHint {
    #[default]
    UseCache,
    NoCache,
    NoCacheNoIndex,
}

/// A single header field as seen by the hpack codec: opaque name and value
/// octets plus the compression hint. Names are compared case-sensitively,
/// any HTTP-level normalization happens before the codec.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HeaderField {
    name: Vec<u8>,
    value: Vec<u8>,
    hint: CompressionHint,
}

impl HeaderField {
    pub fn new<N, V>(name: N, value: V) -> HeaderField
    where
        N: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        HeaderField {
            name: name.into(),
            value: value.into(),
            hint: CompressionHint::UseCache,
        }
    }

    pub fn with_hint<N, V>(name: N, value: V, hint: CompressionHint) -> HeaderField
    where
        N: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        HeaderField {
            name: name.into(),
            value: value.into(),
            hint,
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn hint(&self) -> CompressionHint {
        self.hint
    }

    pub fn set_hint(&mut self, hint: CompressionHint) {
        self.hint = hint;
    }

    /// Table size of this field per RFC 7541 4.1.
    pub fn entry_size(&self) -> usize {
        self.name.len() + self.value.len() + 32
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.name, self.value)
    }
}

impl fmt::Debug for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderField")
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("value", &String::from_utf8_lossy(&self.value))
            .field("hint", &self.hint)
            .finish()
    }
}

impl<N, V> From<(N, V)> for HeaderField
where
    N: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    fn from(src: (N, V)) -> HeaderField {
        HeaderField::new(src.0, src.1)
    }
}
