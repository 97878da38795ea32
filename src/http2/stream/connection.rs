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
// Created Date: 2023/09/20 09:50:12

use std::fmt;
use std::sync::Arc;

use crate::WebResult;

/// A unit of work queued onto a connection's event loop.
pub type Task = Box<dyn FnOnce() + Send>;

/// Scheduling surface of a connection's channel thread. Stream creation
/// always runs here, never on the caller's thread.
pub trait EventLoop: Send + Sync {
    /// Queues `task`; hands it back when the loop is no longer runnable.
    fn schedule(&self, task: Task) -> Result<(), Task>;
}

/// Completion callback of one `acquire_connection` call.
pub type OnConnectionAcquired = Box<dyn FnOnce(WebResult<ConnectionHandle>) + Send>;

/// The acquire/release contract of the connection pool. The pool itself
/// (channel setup, TLS, reconnects) lives behind this trait.
pub trait ConnectionManager: Send + Sync {
    fn acquire_connection(&self, on_acquired: OnConnectionAcquired);
    fn release_connection(&self, conn: ConnectionHandle);
    /// Begins pool shutdown; `on_complete` fires once every pooled
    /// connection is gone.
    fn shutdown(&self, on_complete: Box<dyn FnOnce() + Send>);
}

struct ConnectionInner {
    id: u64,
    event_loop: Arc<dyn EventLoop>,
}

/// A pooled http2 connection as the stream manager sees it: an identity
/// plus the event loop requests are dispatched on. Clones share the
/// underlying connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionInner>,
}

impl ConnectionHandle {
    pub fn new(id: u64, event_loop: Arc<dyn EventLoop>) -> ConnectionHandle {
        ConnectionHandle {
            inner: Arc::new(ConnectionInner { id, event_loop }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn schedule(&self, task: Task) -> Result<(), Task> {
        self.inner.event_loop.schedule(task)
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .finish()
    }
}
