
#[macro_use] extern crate bitflags;

pub mod http2;
mod error;
mod header;

pub use error::{WebError, WebResult};
pub use header::{CompressionHint, HeaderField};
pub use http2::{Decoded, Decoder, Encoder, HpackError, Http2Error, HuffmanMode};
pub use http2::stream::{
    ConnectionHandle, ConnectionManager, EventLoop, Http2Stream, RequestMessage,
    StreamError, StreamManager, StreamManagerOptions, StreamOptions,
};
