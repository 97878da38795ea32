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
// Created Date: 2023/09/15 09:02:11

use std::collections::HashMap;

use lazy_static::lazy_static;

/// (HPACK, Appendix A)
pub static STATIC_TABLE: &[(&[u8], &[u8])] = &[
    (b":authority", b""),
    (b":method", b"GET"),
    (b":method", b"POST"),
    (b":path", b"/"),
    (b":path", b"/index.html"),
    (b":scheme", b"http"),
    (b":scheme", b"https"),
    (b":status", b"200"),
    (b":status", b"204"),
    (b":status", b"206"),
    (b":status", b"304"),
    (b":status", b"400"),
    (b":status", b"404"),
    (b":status", b"500"),
    (b"accept-charset", b""),
    (b"accept-encoding", b"gzip, deflate"),
    (b"accept-language", b""),
    (b"accept-ranges", b""),
    (b"accept", b""),
    (b"access-control-allow-origin", b""),
    (b"age", b""),
    (b"allow", b""),
    (b"authorization", b""),
    (b"cache-control", b""),
    (b"content-disposition", b""),
    (b"content-encoding", b""),
    (b"content-language", b""),
    (b"content-length", b""),
    (b"content-location", b""),
    (b"content-range", b""),
    (b"content-type", b""),
    (b"cookie", b""),
    (b"date", b""),
    (b"etag", b""),
    (b"expect", b""),
    (b"expires", b""),
    (b"from", b""),
    (b"host", b""),
    (b"if-match", b""),
    (b"if-modified-since", b""),
    (b"if-none-match", b""),
    (b"if-range", b""),
    (b"if-unmodified-since", b""),
    (b"last-modified", b""),
    (b"link", b""),
    (b"location", b""),
    (b"max-forwards", b""),
    (b"proxy-authenticate", b""),
    (b"proxy-authorization", b""),
    (b"range", b""),
    (b"referer", b""),
    (b"refresh", b""),
    (b"retry-after", b""),
    (b"server", b""),
    (b"set-cookie", b""),
    (b"strict-transport-security", b""),
    (b"transfer-encoding", b""),
    (b"user-agent", b""),
    (b"vary", b""),
    (b"via", b""),
    (b"www-authenticate", b""),
];

pub const STATIC_TABLE_LEN: usize = 61;

struct NameEntry {
    first: usize,
    values: HashMap<&'static [u8], usize>,
}

lazy_static! {
    static ref STATIC_HASH: HashMap<&'static [u8], NameEntry> = {
        let mut m: HashMap<&'static [u8], NameEntry> = HashMap::new();
        for (idx, &(name, value)) in STATIC_TABLE.iter().enumerate() {
            let entry = m.entry(name).or_insert_with(|| NameEntry {
                first: idx + 1,
                values: HashMap::new(),
            });
            entry.values.insert(value, idx + 1);
        }
        m
    };
}

/// Index of the exact (name, value) entry, or 0 when absent.
pub fn find_field(name: &[u8], value: &[u8]) -> usize {
    STATIC_HASH
        .get(name)
        .and_then(|entry| entry.values.get(value))
        .copied()
        .unwrap_or(0)
}

/// Index of the first entry with this name, or 0 when absent.
pub fn find_name(name: &[u8]) -> usize {
    STATIC_HASH.get(name).map(|entry| entry.first).unwrap_or(0)
}

/// 1-indexed lookup over the table.
pub fn get(index: usize) -> Option<(&'static [u8], &'static [u8])> {
    if index == 0 || index > STATIC_TABLE_LEN {
        return None;
    }
    Some(STATIC_TABLE[index - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc_indices() {
        assert_eq!(STATIC_TABLE.len(), STATIC_TABLE_LEN);
        assert_eq!(get(2), Some((&b":method"[..], &b"GET"[..])));
        assert_eq!(get(61), Some((&b"www-authenticate"[..], &b""[..])));
        assert_eq!(get(0), None);
        assert_eq!(get(62), None);
    }

    #[test]
    fn finds_first_name_match() {
        assert_eq!(find_name(b":method"), 2);
        assert_eq!(find_name(b":status"), 8);
        assert_eq!(find_field(b":status", b"404"), 13);
        assert_eq!(find_field(b":status", b"418"), 0);
        assert_eq!(find_name(b"x-custom"), 0);
    }
}
