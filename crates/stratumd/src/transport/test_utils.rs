//! Test helpers for the transport module.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::ConnectionHandler;
use super::frame::FrameWrite;

/// Counts connections and answers each with the running total.
pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, mut stream: UnixStream) {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let seen = i32::try_from(count).unwrap_or(i32::MAX);
        if stream.write_int(seen).is_ok() {
            let _ = stream.flush();
        }
    }
}
