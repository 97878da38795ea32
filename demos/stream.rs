use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use webstream::http2::stream::{OnConnectionAcquired, Task};
use webstream::{
    ConnectionHandle, ConnectionManager, EventLoop, RequestMessage, StreamManager,
    StreamManagerOptions, StreamOptions,
};
use webstream::http2::frame::Reason;

/// Single-threaded loop that runs tasks when pumped.
struct DemoLoop {
    tasks: Mutex<VecDeque<Task>>,
}

impl DemoLoop {
    fn new() -> Arc<DemoLoop> {
        Arc::new(DemoLoop {
            tasks: Mutex::new(VecDeque::new()),
        })
    }

    fn pump(&self) {
        loop {
            let task = self.tasks.lock().unwrap().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

impl EventLoop for DemoLoop {
    fn schedule(&self, task: Task) -> Result<(), Task> {
        self.tasks.lock().unwrap().push_back(task);
        Ok(())
    }
}

/// Pool that produces connections on demand, all on one loop.
struct DemoPool {
    event_loop: Arc<DemoLoop>,
    next_id: AtomicU64,
}

impl ConnectionManager for DemoPool {
    fn acquire_connection(&self, on_acquired: OnConnectionAcquired) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        println!("pool: connection {} up", id);
        on_acquired(Ok(ConnectionHandle::new(id, self.event_loop.clone())));
    }

    fn release_connection(&self, conn: ConnectionHandle) {
        println!("pool: connection {} released", conn.id());
    }

    fn shutdown(&self, on_complete: Box<dyn FnOnce() + Send>) {
        println!("pool: shutdown");
        on_complete();
    }
}

fn main() {
    let event_loop = DemoLoop::new();
    let pool = Arc::new(DemoPool {
        event_loop: event_loop.clone(),
        next_id: AtomicU64::new(1),
    });

    let manager = StreamManager::new(
        StreamManagerOptions {
            host: "example.com".to_string(),
            port: 443,
            assume_max_concurrent_streams: 2,
            ..StreamManagerOptions::default()
        },
        pool,
        Some(Box::new(|| println!("manager: shutdown complete"))),
    );

    let streams = Arc::new(Mutex::new(Vec::new()));
    for index in 0..5 {
        let request = Arc::new(RequestMessage::new(vec![
            (&b":method"[..], &b"GET"[..]).into(),
            (&b":path"[..], format!("/item/{}", index).into_bytes()).into(),
        ]));
        let streams = streams.clone();
        manager.acquire_stream(StreamOptions::new(request), move |outcome| match outcome {
            Ok(stream) => {
                println!("acquired stream {} on connection {}", stream.id(), stream.connection().id());
                streams.lock().unwrap().push(stream);
            }
            Err(e) => println!("acquisition failed: {}", e),
        });
    }

    event_loop.pump();
    for stream in streams.lock().unwrap().drain(..) {
        stream.complete(Reason::NO_ERROR);
    }
    drop(manager);
}
