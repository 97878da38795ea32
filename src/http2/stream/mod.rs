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
// Created Date: 2023/09/20 09:31:47

//! Multiplexes stream acquisitions over a pool of http2 connections.
//!
//! Users ask the [`StreamManager`] for streams; the manager binds each
//! acquisition to the live connection with the most spare capacity or asks
//! the [`ConnectionManager`] for new connections, sized by the assumed
//! per-connection stream limit. All outcomes are delivered through
//! callbacks, never while the manager's lock is held.

mod connection;
mod manager;

use std::fmt;
use std::sync::Arc;

use algorithm::buf::Binary;

use crate::HeaderField;

use super::frame::Reason;

pub use connection::{ConnectionHandle, ConnectionManager, EventLoop, OnConnectionAcquired, Task};
pub use manager::{Http2Stream, StreamManager, StreamManagerOptions};

/// Why an acquisition could not produce a stream. Delivered through the
/// acquisition callback; the manager itself keeps running.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The manager lost its last external reference before the acquisition
    /// was bound.
    ShuttingDown,
    /// The connection pool could not produce a connection.
    ConnectionAcquireFailed,
    /// The bound connection stopped accepting streams before the request
    /// task ran.
    StreamCreateFailed,
    /// The bound connection's event loop is no longer runnable.
    TaskCancelled,
}

impl StreamError {
    #[inline]
    pub fn description_str(&self) -> &'static str {
        match self {
            StreamError::ShuttingDown => "stream manager is shutting down",
            StreamError::ConnectionAcquireFailed => "connection acquire failed",
            StreamError::StreamCreateFailed => "stream create failed",
            StreamError::TaskCancelled => "event loop task cancelled",
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description_str())
    }
}

/// The request a stream will carry, shared between the user and the
/// acquisition record until the stream is activated.
#[derive(Debug, Clone)]
pub struct RequestMessage {
    headers: Vec<HeaderField>,
    body: Binary,
}

impl RequestMessage {
    pub fn new(headers: Vec<HeaderField>) -> RequestMessage {
        RequestMessage {
            headers,
            body: Binary::new(),
        }
    }

    pub fn with_body(headers: Vec<HeaderField>, body: Binary) -> RequestMessage {
        RequestMessage { headers, body }
    }

    pub fn headers(&self) -> &[HeaderField] {
        &self.headers
    }

    pub fn body(&self) -> &Binary {
        &self.body
    }
}

/// Per-stream event callbacks plus the request message, handed to
/// `acquire_stream`.
pub struct StreamOptions {
    pub request: Arc<RequestMessage>,
    pub on_headers: Option<Box<dyn FnMut(&[HeaderField]) + Send>>,
    pub on_headers_done: Option<Box<dyn FnOnce() + Send>>,
    pub on_body: Option<Box<dyn FnMut(Binary) + Send>>,
    pub on_complete: Option<Box<dyn FnOnce(Reason) + Send>>,
}

impl StreamOptions {
    pub fn new(request: Arc<RequestMessage>) -> StreamOptions {
        StreamOptions {
            request,
            on_headers: None,
            on_headers_done: None,
            on_body: None,
            on_complete: None,
        }
    }
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("request", &self.request)
            .finish()
    }
}

/// Exactly-once completion callback of one `acquire_stream` call.
pub type OnStreamAcquired = Box<dyn FnOnce(Result<Http2Stream, StreamError>) + Send>;
