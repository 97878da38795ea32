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
// Created Date: 2023/09/20 10:12:35

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use algorithm::buf::Binary;

use crate::http2::frame::{GoAway, Reason, Settings, StreamIdentifier};
use crate::http2::{DEFAULT_ASSUME_MAX_CONCURRENT_STREAMS, DEFAULT_INITIAL_WINDOW_SIZE};
use crate::{HeaderField, WebResult};

use super::connection::{ConnectionHandle, ConnectionManager, Task};
use super::{OnStreamAcquired, StreamError, StreamOptions};

#[derive(Debug, Clone)]
pub struct StreamManagerOptions {
    pub host: String,
    pub port: u16,
    /// Hard cap on pooled connections, live plus in flight.
    pub max_connections: usize,
    pub initial_window_size: u32,
    /// Streams a fresh connection is assumed to accept until its SETTINGS
    /// say otherwise; sizes how many connections a backlog asks for.
    pub assume_max_concurrent_streams: usize,
    pub back_pressure: bool,
}

impl Default for StreamManagerOptions {
    fn default() -> Self {
        StreamManagerOptions {
            host: String::new(),
            port: 443,
            max_connections: 8,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            assume_max_concurrent_streams: DEFAULT_ASSUME_MAX_CONCURRENT_STREAMS,
            back_pressure: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Ready,
    ShuttingDown,
}

/// One queued `acquire_stream` call, detached from the queue once a
/// connection is chosen for it.
struct Acquisition {
    options: StreamOptions,
    on_acquired: OnStreamAcquired,
}

struct ManagedConnection {
    conn: ConnectionHandle,
    num_streams_open: usize,
    next_stream_id: StreamIdentifier,
    goaway: bool,
}

impl ManagedConnection {
    fn new(conn: ConnectionHandle) -> ManagedConnection {
        ManagedConnection {
            conn,
            num_streams_open: 0,
            next_stream_id: StreamIdentifier::client_first(),
            goaway: false,
        }
    }
}

/// Everything mutable, behind the manager's single lock.
struct State {
    lifecycle: Lifecycle,
    external_refs: usize,
    pending: VecDeque<Acquisition>,
    pending_count: usize,
    connections: Vec<ManagedConnection>,
    connections_acquiring: usize,
    open_stream_count: usize,
    assume_max_concurrent_streams: usize,
    max_connections: usize,
    pool_shutdown_started: bool,
}

/// A bound acquisition on its way to the connection's event loop.
struct MakeRequest {
    acquisition: Acquisition,
    conn: ConnectionHandle,
    stream_id: StreamIdentifier,
}

/// The side effects one locked section decided on, executed afterwards.
/// This is the only thing a critical section hands to the outside.
#[derive(Default)]
struct Transaction {
    to_fail: Vec<(Acquisition, StreamError)>,
    to_release: Vec<ConnectionHandle>,
    make_requests: Vec<MakeRequest>,
    new_connections: usize,
    start_pool_shutdown: bool,
}

struct Shared {
    options: StreamManagerOptions,
    pool: Arc<dyn ConnectionManager>,
    lock: Mutex<State>,
    on_shutdown_complete: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

/// Hands out http2 streams over a managed set of connections.
///
/// Callable from any thread. Clones share one manager and act as the
/// external reference count: when the last clone drops, the manager drains,
/// releases its connections, shuts the pool down and then fires the
/// shutdown-complete callback exactly once.
pub struct StreamManager {
    shared: Arc<Shared>,
}

impl StreamManager {
    pub fn new(
        options: StreamManagerOptions,
        pool: Arc<dyn ConnectionManager>,
        on_shutdown_complete: Option<Box<dyn FnOnce() + Send>>,
    ) -> StreamManager {
        log::debug!(
            "http2: stream manager for {}:{} (max {} connections, window {})",
            options.host,
            options.port,
            options.max_connections,
            options.initial_window_size
        );
        let state = State {
            lifecycle: Lifecycle::Ready,
            external_refs: 1,
            pending: VecDeque::new(),
            pending_count: 0,
            connections: Vec::new(),
            connections_acquiring: 0,
            open_stream_count: 0,
            assume_max_concurrent_streams: options.assume_max_concurrent_streams.max(1),
            max_connections: options.max_connections.max(1),
            pool_shutdown_started: false,
        };
        StreamManager {
            shared: Arc::new(Shared {
                options,
                pool,
                lock: Mutex::new(state),
                on_shutdown_complete: Mutex::new(on_shutdown_complete),
            }),
        }
    }

    /// Queues one stream acquisition. The callback fires exactly once, with
    /// a stream or an error, always on the chosen connection's event loop
    /// (or the failing thread), never synchronously under the lock.
    pub fn acquire_stream<F>(&self, options: StreamOptions, on_acquired: F)
    where
        F: FnOnce(Result<Http2Stream, StreamError>) + Send + 'static,
    {
        let acquisition = Acquisition {
            options,
            on_acquired: Box::new(on_acquired),
        };
        let mut txn = Transaction::default();
        {
            let mut state = self.shared.state();
            if state.lifecycle == Lifecycle::ShuttingDown {
                txn.to_fail.push((acquisition, StreamError::ShuttingDown));
            } else {
                state.pending.push_back(acquisition);
                state.pending_count += 1;
            }
            Shared::plan(&mut state, &mut txn);
        }
        self.shared.execute(txn);
    }

    /// Folds a connection's SETTINGS into the working stream-cap estimate
    /// and re-plans the backlog against it.
    pub fn apply_settings(&self, settings: &Settings) {
        let max = match settings.max_concurrent_streams() {
            Some(max) => (max as usize).max(1),
            None => return,
        };
        let mut txn = Transaction::default();
        {
            let mut state = self.shared.state();
            log::debug!("http2: assumed max concurrent streams now {}", max);
            state.assume_max_concurrent_streams = max;
            Shared::plan(&mut state, &mut txn);
        }
        self.shared.execute(txn);
    }

    /// Records a peer GOAWAY: the connection takes no new streams and goes
    /// back to the pool once its last stream completes.
    pub fn connection_goaway(&self, conn: &ConnectionHandle, frame: &GoAway) {
        let mut txn = Transaction::default();
        {
            let mut state = self.shared.state();
            log::debug!(
                "http2: goaway on connection {} (last stream {})",
                conn.id(),
                frame.last_stream_id()
            );
            if let Some(pos) = state.connections.iter().position(|mc| mc.conn == *conn) {
                state.connections[pos].goaway = true;
                if state.connections[pos].num_streams_open == 0 {
                    let mc = state.connections.remove(pos);
                    txn.to_release.push(mc.conn);
                }
            }
            Shared::plan(&mut state, &mut txn);
        }
        self.shared.execute(txn);
    }

    pub fn pending_acquisition_count(&self) -> usize {
        self.shared.state().pending_count
    }

    pub fn open_stream_count(&self) -> usize {
        self.shared.state().open_stream_count
    }

    pub fn connection_count(&self) -> usize {
        self.shared.state().connections.len()
    }

    pub fn options(&self) -> &StreamManagerOptions {
        &self.shared.options
    }
}

impl Clone for StreamManager {
    fn clone(&self) -> Self {
        self.shared.state().external_refs += 1;
        StreamManager {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        let mut txn = Transaction::default();
        {
            let mut state = self.shared.state();
            state.external_refs -= 1;
            if state.external_refs == 0 && state.lifecycle == Lifecycle::Ready {
                state.lifecycle = Lifecycle::ShuttingDown;
                log::debug!("http2: last external reference gone, stream manager draining");
            }
            Shared::plan(&mut state, &mut txn);
        }
        self.shared.execute(txn);
    }
}

impl fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state();
        f.debug_struct("StreamManager")
            .field("pending", &state.pending_count)
            .field("connections", &state.connections.len())
            .field("open_streams", &state.open_stream_count)
            .finish()
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The transaction builder. Runs under the lock on every external event
    /// and turns the current state into the work the executor performs once
    /// the lock is gone.
    fn plan(state: &mut State, txn: &mut Transaction) {
        match state.lifecycle {
            Lifecycle::Ready => {
                // Bind the queue head to the emptiest connection with spare
                // capacity, in enqueue order, until none qualifies.
                loop {
                    if state.pending_count == 0 {
                        break;
                    }
                    let mut best: Option<usize> = None;
                    for (pos, mc) in state.connections.iter().enumerate() {
                        if mc.goaway || mc.num_streams_open >= state.assume_max_concurrent_streams {
                            continue;
                        }
                        match best {
                            None => best = Some(pos),
                            Some(b) => {
                                if mc.num_streams_open < state.connections[b].num_streams_open {
                                    best = Some(pos);
                                }
                            }
                        }
                    }
                    let pos = match best {
                        Some(pos) => pos,
                        None => break,
                    };
                    let acquisition = match state.pending.pop_front() {
                        Some(acquisition) => acquisition,
                        None => break,
                    };
                    state.pending_count -= 1;
                    state.open_stream_count += 1;
                    let mc = &mut state.connections[pos];
                    mc.num_streams_open += 1;
                    let stream_id = mc.next_stream_id.next_id();
                    txn.make_requests.push(MakeRequest {
                        acquisition,
                        conn: mc.conn.clone(),
                        stream_id,
                    });
                }

                // Size the residue in whole connections, net of acquires
                // already in flight and the connection cap.
                if state.pending_count > 0 {
                    let assume = state.assume_max_concurrent_streams;
                    let needed = (state.pending_count + assume - 1) / assume;
                    if needed > state.connections_acquiring {
                        let want = needed - state.connections_acquiring;
                        let room = state
                            .max_connections
                            .saturating_sub(state.connections.len() + state.connections_acquiring);
                        let count = want.min(room);
                        state.connections_acquiring += count;
                        txn.new_connections += count;
                    }
                }
            }
            Lifecycle::ShuttingDown => {
                while let Some(acquisition) = state.pending.pop_front() {
                    txn.to_fail.push((acquisition, StreamError::ShuttingDown));
                }
                state.pending_count = 0;

                let mut pos = 0;
                while pos < state.connections.len() {
                    if state.connections[pos].num_streams_open == 0 {
                        let mc = state.connections.remove(pos);
                        txn.to_release.push(mc.conn);
                    } else {
                        pos += 1;
                    }
                }

                if state.connections_acquiring == 0
                    && state.open_stream_count == 0
                    && !state.pool_shutdown_started
                {
                    state.pool_shutdown_started = true;
                    txn.start_pool_shutdown = true;
                }
            }
        }
    }

    /// Performs a transaction's side effects. Never called with the lock
    /// held; everything that touches user callbacks or the pool goes
    /// through here.
    fn execute(self: &Arc<Self>, txn: Transaction) {
        for (acquisition, error) in txn.to_fail {
            log::trace!("http2: failing acquisition: {}", error);
            (acquisition.on_acquired)(Err(error));
        }
        for conn in txn.to_release {
            log::trace!("http2: releasing connection {} to the pool", conn.id());
            self.pool.release_connection(conn);
        }
        for request in txn.make_requests {
            self.schedule_request(request);
        }
        for _ in 0..txn.new_connections {
            let shared = self.clone();
            self.pool.acquire_connection(Box::new(move |result| {
                shared.connection_acquired(result);
            }));
        }
        if txn.start_pool_shutdown {
            let shared = self.clone();
            self.pool.shutdown(Box::new(move || {
                shared.pool_shutdown_complete();
            }));
        }
    }

    /// Queues the request-making task onto the bound connection's event
    /// loop. The acquisition travels in a shared slot so a dead loop can
    /// still fail it exactly once from this thread.
    fn schedule_request(self: &Arc<Self>, request: MakeRequest) {
        let MakeRequest {
            acquisition,
            conn,
            stream_id,
        } = request;
        let slot = Arc::new(Mutex::new(Some(acquisition)));
        let task_slot = slot.clone();
        let task_conn = conn.clone();
        let shared = self.clone();
        let task: Task = Box::new(move || {
            let acquisition = match task_slot.lock() {
                Ok(mut slot) => slot.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            let acquisition = match acquisition {
                Some(acquisition) => acquisition,
                None => return,
            };
            if let Err(error) = shared.try_activate(&task_conn) {
                log::debug!("http2: stream {} failed on connection {}: {}", stream_id, task_conn.id(), error);
                (acquisition.on_acquired)(Err(error));
                return;
            }
            let header_count = acquisition.options.request.headers().len();
            let stream = Http2Stream::new(stream_id, task_conn.clone(), shared.clone(), acquisition.options);
            (acquisition.on_acquired)(Ok(stream.clone()));
            log::trace!(
                "http2: stream {} active on connection {} ({} request headers)",
                stream_id,
                task_conn.id(),
                header_count
            );
        });

        if conn.schedule(task).is_err() {
            let acquisition = match slot.lock() {
                Ok(mut slot) => slot.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            if let Some(acquisition) = acquisition {
                log::warn!("http2: event loop of connection {} is gone", conn.id());
                self.stream_closed(&conn);
                (acquisition.on_acquired)(Err(StreamError::TaskCancelled));
            }
        }
    }

    /// Last gate before a bound acquisition becomes a stream: the
    /// connection may have seen GOAWAY since binding.
    fn try_activate(self: &Arc<Self>, conn: &ConnectionHandle) -> Result<(), StreamError> {
        let goaway = {
            let state = self.state();
            state
                .connections
                .iter()
                .find(|mc| mc.conn == *conn)
                .map(|mc| mc.goaway)
        };
        match goaway {
            Some(true) => {
                self.stream_closed(conn);
                Err(StreamError::StreamCreateFailed)
            }
            _ => Ok(()),
        }
    }

    /// A tracked stream slot on `conn` went away, by completion or by a
    /// failed dispatch. Releases the connection once it is both empty and
    /// unacceptable for new streams.
    fn stream_closed(self: &Arc<Self>, conn: &ConnectionHandle) {
        let mut txn = Transaction::default();
        {
            let mut state = self.state();
            state.open_stream_count -= 1;
            if let Some(pos) = state.connections.iter().position(|mc| mc.conn == *conn) {
                state.connections[pos].num_streams_open -= 1;
                if state.connections[pos].num_streams_open == 0 && state.connections[pos].goaway {
                    let mc = state.connections.remove(pos);
                    txn.to_release.push(mc.conn);
                }
            }
            Shared::plan(&mut state, &mut txn);
        }
        self.execute(txn);
    }

    /// Completion of one of our `acquire_connection` calls.
    fn connection_acquired(self: &Arc<Self>, result: WebResult<ConnectionHandle>) {
        let mut txn = Transaction::default();
        {
            let mut state = self.state();
            state.connections_acquiring -= 1;
            match result {
                Ok(conn) => {
                    if state.lifecycle == Lifecycle::ShuttingDown {
                        txn.to_release.push(conn);
                    } else {
                        log::debug!("http2: connection {} joined the managed set", conn.id());
                        state.connections.push(ManagedConnection::new(conn));
                    }
                }
                Err(e) => {
                    // Fail only the backlog the remaining in-flight acquires
                    // cannot carry, newest first; one bad connect must not
                    // wipe the whole queue.
                    log::warn!("http2: connection acquire failed: {}", e);
                    let capacity =
                        state.connections_acquiring * state.assume_max_concurrent_streams;
                    while state.pending_count > capacity {
                        match state.pending.pop_back() {
                            Some(acquisition) => {
                                state.pending_count -= 1;
                                txn.to_fail
                                    .push((acquisition, StreamError::ConnectionAcquireFailed));
                            }
                            None => break,
                        }
                    }
                }
            }
            Shared::plan(&mut state, &mut txn);
        }
        self.execute(txn);
    }

    /// The pool finished its own shutdown; the manager is now gone from the
    /// user's point of view.
    fn pool_shutdown_complete(self: &Arc<Self>) {
        let on_complete = {
            let mut slot = match self.on_shutdown_complete.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        };
        if let Some(on_complete) = on_complete {
            log::debug!("http2: stream manager shutdown complete");
            on_complete();
        }
    }
}

/// Callbacks a stream still owes its user.
struct StreamEvents {
    on_headers: Option<Box<dyn FnMut(&[HeaderField]) + Send>>,
    on_headers_done: Option<Box<dyn FnOnce() + Send>>,
    on_body: Option<Box<dyn FnMut(Binary) + Send>>,
    on_complete: Option<Box<dyn FnOnce(Reason) + Send>>,
}

struct StreamInner {
    id: StreamIdentifier,
    conn: ConnectionHandle,
    shared: Arc<Shared>,
    completed: AtomicBool,
    events: Mutex<StreamEvents>,
}

/// A live stream handed to the acquisition callback. Clones share the
/// stream; completion is idempotent and reported to the manager once.
#[derive(Clone)]
pub struct Http2Stream {
    inner: Arc<StreamInner>,
}

impl Http2Stream {
    fn new(
        id: StreamIdentifier,
        conn: ConnectionHandle,
        shared: Arc<Shared>,
        options: StreamOptions,
    ) -> Http2Stream {
        Http2Stream {
            inner: Arc::new(StreamInner {
                id,
                conn,
                shared,
                completed: AtomicBool::new(false),
                events: Mutex::new(StreamEvents {
                    on_headers: options.on_headers,
                    on_headers_done: options.on_headers_done,
                    on_body: options.on_body,
                    on_complete: options.on_complete,
                }),
            }),
        }
    }

    pub fn id(&self) -> StreamIdentifier {
        self.inner.id
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.inner.conn
    }

    fn events(&self) -> MutexGuard<'_, StreamEvents> {
        match self.inner.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Response headers arrived on the channel.
    pub fn deliver_headers(&self, fields: &[HeaderField]) {
        let mut on_headers = self.events().on_headers.take();
        if let Some(cb) = on_headers.as_mut() {
            cb(fields);
        }
        if let Some(cb) = on_headers {
            let mut events = self.events();
            if events.on_headers.is_none() {
                events.on_headers = Some(cb);
            }
        }
    }

    /// The response header block is complete.
    pub fn deliver_headers_done(&self) {
        let on_headers_done = self.events().on_headers_done.take();
        if let Some(cb) = on_headers_done {
            cb();
        }
    }

    /// A chunk of response body arrived on the channel.
    pub fn deliver_body(&self, data: Binary) {
        let mut on_body = self.events().on_body.take();
        if let Some(cb) = on_body.as_mut() {
            cb(data);
        }
        if let Some(cb) = on_body {
            let mut events = self.events();
            if events.on_body.is_none() {
                events.on_body = Some(cb);
            }
        }
    }

    /// Ends the stream. Only the first call counts: the completion callback
    /// runs, then the manager reconsiders the connection.
    pub fn complete(&self, reason: Reason) {
        if self.inner.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        let on_complete = self.events().on_complete.take();
        if let Some(cb) = on_complete {
            cb(reason);
        }
        self.inner.shared.stream_closed(&self.inner.conn);
    }
}

impl fmt::Debug for Http2Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http2Stream")
            .field("id", &self.inner.id)
            .field("connection", &self.inner.conn.id())
            .finish()
    }
}
