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
// Created Date: 2023/09/14 10:40:51

pub const HTTP2_MAGIC: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";
pub const MAGIC_LEN: usize = HTTP2_MAGIC.len();

pub const MAX_WINDOW_SIZE: WindowSize = (1 << 31) - 1;

/// 默认的header动态表大小
pub const DEFAULT_SETTINGS_HEADER_TABLE_SIZE: usize = 4_096;

/// 默认的发送窗口大小值
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65_535;

/// 默认的单帧大小
pub const DEFAULT_MAX_FRAME_SIZE: FrameSize = 16_384;

/// 最大的单帧大小
pub const MAX_MAX_FRAME_SIZE: FrameSize = (1 << 24) - 1;

/// Upper bound for a single decoded header field (name + value + 32).
pub const DEFAULT_MAX_FIELD_SIZE: usize = 16_384;

/// Streams a fresh connection is assumed to allow until its SETTINGS arrive.
pub const DEFAULT_ASSUME_MAX_CONCURRENT_STREAMS: usize = 100;

mod error;
pub mod frame;
mod hpack;
pub mod stream;

pub use error::Http2Error;
pub use hpack::*;

pub type FrameSize = u32;
pub type WindowSize = u32;
