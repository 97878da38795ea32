use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use webstream::http2::frame::{GoAway, Reason, Settings, StreamIdentifier};
use webstream::http2::stream::{OnConnectionAcquired, Task};
use webstream::{
    ConnectionHandle, ConnectionManager, EventLoop, Http2Stream, RequestMessage, StreamError,
    StreamManager, StreamManagerOptions, StreamOptions, WebError,
};

/// Event loop under test control: tasks queue up until `run_all`.
struct TestLoop {
    tasks: Mutex<VecDeque<Task>>,
    dead: AtomicBool,
}

impl TestLoop {
    fn new() -> Arc<TestLoop> {
        Arc::new(TestLoop {
            tasks: Mutex::new(VecDeque::new()),
            dead: AtomicBool::new(false),
        })
    }

    fn dead() -> Arc<TestLoop> {
        let event_loop = TestLoop::new();
        event_loop.dead.store(true, Ordering::SeqCst);
        event_loop
    }

    fn queued(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.tasks.lock().unwrap().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl EventLoop for TestLoop {
    fn schedule(&self, task: Task) -> Result<(), Task> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(task);
        }
        self.tasks.lock().unwrap().push_back(task);
        Ok(())
    }
}

/// Connection pool under test control: acquire callbacks are parked until
/// the test supplies or fails a connection.
struct TestPool {
    waiting: Mutex<VecDeque<OnConnectionAcquired>>,
    released: Mutex<Vec<u64>>,
    on_shutdown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    next_id: AtomicU64,
}

impl TestPool {
    fn new() -> Arc<TestPool> {
        Arc::new(TestPool {
            waiting: Mutex::new(VecDeque::new()),
            released: Mutex::new(Vec::new()),
            on_shutdown: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    fn acquire_requests(&self) -> usize {
        self.waiting.lock().unwrap().len()
    }

    fn released_ids(&self) -> Vec<u64> {
        self.released.lock().unwrap().clone()
    }

    fn supply_connection(&self, event_loop: Arc<TestLoop>) -> ConnectionHandle {
        let on_acquired = self.waiting.lock().unwrap().pop_front().expect("no acquire waiting");
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let conn = ConnectionHandle::new(id, event_loop);
        on_acquired(Ok(conn.clone()));
        conn
    }

    fn fail_connection(&self) {
        let on_acquired = self.waiting.lock().unwrap().pop_front().expect("no acquire waiting");
        on_acquired(Err(WebError::Extension("connect refused")));
    }

    fn shutdown_requested(&self) -> bool {
        self.on_shutdown.lock().unwrap().is_some()
    }

    fn finish_shutdown(&self) {
        let on_complete = self.on_shutdown.lock().unwrap().take().expect("no shutdown waiting");
        on_complete();
    }
}

impl ConnectionManager for TestPool {
    fn acquire_connection(&self, on_acquired: OnConnectionAcquired) {
        self.waiting.lock().unwrap().push_back(on_acquired);
    }

    fn release_connection(&self, conn: ConnectionHandle) {
        self.released.lock().unwrap().push(conn.id());
    }

    fn shutdown(&self, on_complete: Box<dyn FnOnce() + Send>) {
        *self.on_shutdown.lock().unwrap() = Some(on_complete);
    }
}

fn options(assume: usize, max_connections: usize) -> StreamManagerOptions {
    StreamManagerOptions {
        host: "queue.internal".to_string(),
        port: 8443,
        max_connections,
        assume_max_concurrent_streams: assume,
        ..StreamManagerOptions::default()
    }
}

fn request() -> StreamOptions {
    StreamOptions::new(Arc::new(RequestMessage::new(vec![
        (&b":method"[..], &b"GET"[..]).into(),
        (&b":path"[..], &b"/"[..]).into(),
    ])))
}

type Outcome = Result<Http2Stream, StreamError>;

/// Collects acquisition outcomes in callback order.
fn recorder() -> (Arc<Mutex<Vec<(usize, Outcome)>>>, impl Fn(usize) -> Box<dyn FnOnce(Outcome) + Send>) {
    let outcomes: Arc<Mutex<Vec<(usize, Outcome)>>> = Arc::new(Mutex::new(Vec::new()));
    let handle = outcomes.clone();
    let make = move |tag: usize| -> Box<dyn FnOnce(Outcome) + Send> {
        let handle = handle.clone();
        Box::new(move |outcome| {
            handle.lock().unwrap().push((tag, outcome));
        })
    };
    (outcomes, make)
}

#[test]
fn backlog_requests_ceil_of_pending_over_assumed_connections() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(100, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    for tag in 0..250 {
        manager.acquire_stream(request(), record(tag));
    }
    // ceil(250 / 100) = 3 connections, no completions yet.
    assert_eq!(pool.acquire_requests(), 3);
    assert_eq!(manager.pending_acquisition_count(), 250);
    assert!(outcomes.lock().unwrap().is_empty());

    let event_loop = TestLoop::new();
    pool.supply_connection(event_loop.clone());

    // The first arrival binds one connection's worth, oldest first.
    assert_eq!(event_loop.queued(), 100);
    assert_eq!(manager.pending_acquisition_count(), 150);
    assert_eq!(pool.acquire_requests(), 2);
    assert!(outcomes.lock().unwrap().is_empty());

    assert_eq!(event_loop.run_all(), 100);
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 100);
    for (pos, (tag, outcome)) in outcomes.iter().enumerate() {
        assert_eq!(*tag, pos);
        assert!(outcome.is_ok());
    }
    assert_eq!(manager.open_stream_count(), 100);
}

#[test]
fn acquire_failure_fans_out_to_the_excess_backlog_only() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(2, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    for tag in 0..5 {
        manager.acquire_stream(request(), record(tag));
    }
    assert_eq!(pool.acquire_requests(), 3);

    // Two in-flight acquires can still carry 4 streams: one failure costs
    // the newest acquisition only.
    pool.fail_connection();
    {
        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, 4);
        assert_eq!(outcomes[0].1.as_ref().unwrap_err(), &StreamError::ConnectionAcquireFailed);
    }

    pool.fail_connection();
    assert_eq!(outcomes.lock().unwrap().len(), 3);

    pool.fail_connection();
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 5);
    let mut failed: Vec<usize> = outcomes.iter().map(|(tag, _)| *tag).collect();
    failed.sort();
    assert_eq!(failed, vec![0, 1, 2, 3, 4]);
    assert!(outcomes.iter().all(|(_, outcome)| outcome.is_err()));
    assert_eq!(manager.pending_acquisition_count(), 0);
}

#[test]
fn callbacks_run_without_the_manager_lock() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(4, 8), pool.clone(), None);

    let reentered = Arc::new(AtomicBool::new(false));
    let inner_flag = reentered.clone();
    let inner_manager = manager.clone();
    manager.acquire_stream(request(), move |outcome| {
        let stream = outcome.unwrap();
        // A held lock would deadlock both of these calls.
        assert_eq!(inner_manager.open_stream_count(), 1);
        inner_manager.acquire_stream(request(), move |second| {
            second.unwrap();
            inner_flag.store(true, Ordering::SeqCst);
        });
        stream.complete(Reason::NO_ERROR);
    });

    let event_loop = TestLoop::new();
    pool.supply_connection(event_loop.clone());
    // First task acquires, completes, and enqueues the second acquisition.
    while event_loop.run_all() > 0 {}
    assert!(reentered.load(Ordering::SeqCst));
    assert_eq!(manager.open_stream_count(), 1);
}

#[test]
fn streams_spread_to_the_emptiest_connection() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(2, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    for tag in 0..3 {
        manager.acquire_stream(request(), record(tag));
    }
    let loop_a = TestLoop::new();
    let loop_b = TestLoop::new();
    pool.supply_connection(loop_a.clone());
    pool.supply_connection(loop_b.clone());

    // First connection fills to the cap before the second takes the rest.
    assert_eq!(loop_a.queued(), 2);
    assert_eq!(loop_b.queued(), 1);
    loop_a.run_all();
    loop_b.run_all();

    let outcomes = outcomes.lock().unwrap();
    let conn_of = |tag: usize| {
        outcomes
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, outcome)| outcome.as_ref().unwrap().connection().id())
            .unwrap()
    };
    assert_eq!(conn_of(0), conn_of(1));
    assert_ne!(conn_of(0), conn_of(2));
}

#[test]
fn stream_ids_follow_client_numbering_per_connection() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(4, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    for tag in 0..3 {
        manager.acquire_stream(request(), record(tag));
    }
    let event_loop = TestLoop::new();
    pool.supply_connection(event_loop.clone());
    event_loop.run_all();

    let outcomes = outcomes.lock().unwrap();
    let ids: Vec<StreamIdentifier> = outcomes
        .iter()
        .map(|(_, outcome)| outcome.as_ref().unwrap().id())
        .collect();
    assert_eq!(ids, vec![StreamIdentifier(1), StreamIdentifier(3), StreamIdentifier(5)]);
}

#[test]
fn goaway_connection_is_released_after_its_last_stream() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(4, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    manager.acquire_stream(request(), record(0));
    let event_loop = TestLoop::new();
    let conn = pool.supply_connection(event_loop.clone());
    event_loop.run_all();

    let stream = match outcomes.lock().unwrap().remove(0) {
        (_, Ok(stream)) => stream,
        (_, Err(e)) => panic!("acquisition failed: {}", e),
    };

    // GOAWAY with a stream still open defers the release.
    manager.connection_goaway(&conn, &GoAway::new(StreamIdentifier(1), Reason::NO_ERROR));
    assert!(pool.released_ids().is_empty());

    stream.complete(Reason::NO_ERROR);
    assert_eq!(pool.released_ids(), vec![conn.id()]);
    assert_eq!(manager.connection_count(), 0);
    assert_eq!(manager.open_stream_count(), 0);
}

#[test]
fn goaway_before_the_task_runs_fails_the_bound_acquisition() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(4, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    manager.acquire_stream(request(), record(0));
    let event_loop = TestLoop::new();
    let conn = pool.supply_connection(event_loop.clone());
    assert_eq!(event_loop.queued(), 1);

    manager.connection_goaway(&conn, &GoAway::new(StreamIdentifier::zero(), Reason::NO_ERROR));
    event_loop.run_all();

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].1.as_ref().unwrap_err(), &StreamError::StreamCreateFailed);
    // The slot was handed back and the empty goaway connection released.
    assert_eq!(manager.open_stream_count(), 0);
    assert_eq!(pool.released_ids(), vec![conn.id()]);
}

#[test]
fn dead_event_loop_cancels_the_dispatch() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(4, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    manager.acquire_stream(request(), record(0));
    pool.supply_connection(TestLoop::dead());

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].1.as_ref().unwrap_err(), &StreamError::TaskCancelled);
    assert_eq!(manager.open_stream_count(), 0);
}

#[test]
fn settings_update_reshapes_the_backlog() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(2, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    for tag in 0..5 {
        manager.acquire_stream(request(), record(tag));
    }
    let event_loop = TestLoop::new();
    pool.supply_connection(event_loop.clone());
    assert_eq!(event_loop.queued(), 2);
    assert_eq!(manager.pending_acquisition_count(), 3);

    // The connection's SETTINGS turn out to allow five concurrent streams.
    let mut settings = Settings::default();
    settings.set_max_concurrent_streams(Some(5));
    manager.apply_settings(&settings);

    assert_eq!(event_loop.queued(), 5);
    assert_eq!(manager.pending_acquisition_count(), 0);
    event_loop.run_all();
    assert_eq!(outcomes.lock().unwrap().len(), 5);
}

#[test]
fn dropping_the_last_handle_fails_unbound_acquisitions() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(2, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    for tag in 0..3 {
        manager.acquire_stream(request(), record(tag));
    }
    let second_handle = manager.clone();
    drop(manager);
    assert!(outcomes.lock().unwrap().is_empty());

    drop(second_handle);
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 3);
    for (_, outcome) in outcomes.iter() {
        assert_eq!(outcome.as_ref().unwrap_err(), &StreamError::ShuttingDown);
    }
}

#[test]
fn shutdown_completes_after_the_last_stream_and_pool_teardown() {
    let pool = TestPool::new();
    let shutdown_done = Arc::new(AtomicBool::new(false));
    let flag = shutdown_done.clone();
    let manager = StreamManager::new(
        options(4, 8),
        pool.clone(),
        Some(Box::new(move || {
            flag.store(true, Ordering::SeqCst);
        })),
    );
    let (outcomes, record) = recorder();

    manager.acquire_stream(request(), record(0));
    manager.acquire_stream(request(), record(1));
    let event_loop = TestLoop::new();
    let conn = pool.supply_connection(event_loop.clone());
    event_loop.run_all();

    let streams: Vec<Http2Stream> = outcomes
        .lock()
        .unwrap()
        .drain(..)
        .map(|(_, outcome)| outcome.unwrap())
        .collect();

    drop(manager);
    // Two streams still open: nothing released, no pool shutdown yet.
    assert!(pool.released_ids().is_empty());
    assert!(!pool.shutdown_requested());

    streams[0].complete(Reason::NO_ERROR);
    assert!(!pool.shutdown_requested());

    streams[1].complete(Reason::NO_ERROR);
    assert_eq!(pool.released_ids(), vec![conn.id()]);
    assert!(pool.shutdown_requested());
    assert!(!shutdown_done.load(Ordering::SeqCst));

    pool.finish_shutdown();
    assert!(shutdown_done.load(Ordering::SeqCst));
}

#[test]
fn completion_is_idempotent() {
    let pool = TestPool::new();
    let manager = StreamManager::new(options(4, 8), pool.clone(), None);
    let (outcomes, record) = recorder();

    let completions = Arc::new(AtomicU64::new(0));
    let counter = completions.clone();
    let mut stream_options = request();
    stream_options.on_complete = Some(Box::new(move |_reason| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    manager.acquire_stream(stream_options, record(0));
    let event_loop = TestLoop::new();
    pool.supply_connection(event_loop.clone());
    event_loop.run_all();

    let stream = match outcomes.lock().unwrap().remove(0) {
        (_, Ok(stream)) => stream,
        (_, Err(e)) => panic!("acquisition failed: {}", e),
    };

    stream.complete(Reason::NO_ERROR);
    stream.complete(Reason::CANCEL);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(manager.open_stream_count(), 0);

    // The connection survived and takes the next acquisition directly.
    manager.acquire_stream(request(), record(1));
    assert_eq!(event_loop.queued(), 1);
}
