//! Fetch execution: a worker pool and a host-driven variant.
//!
//! Requests are submitted from the engine thread and completions are
//! drained back on it. Neither fetcher touches tile bookkeeping.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, trace, warn};

use crate::error::FetchError;
use crate::request::{FetchCompletion, FetchRequest};
use crate::transport::Transport;

/// Something that can execute fetch requests.
pub trait Fetcher: Send {
    /// Queue a request. Every submitted request produces exactly one
    /// completion, failed if it could never be executed.
    fn submit(&mut self, request: FetchRequest);

    /// Collect every completion that has arrived since the last call.
    fn drain(&mut self) -> Vec<FetchCompletion>;

    /// Requests submitted but not yet drained.
    fn in_flight(&self) -> u64;
}

/// Fetches on a pool of named worker threads through a [`Transport`].
pub struct ThreadedFetcher {
    request_sender: Sender<FetchRequest>,
    completion_receiver: Receiver<FetchCompletion>,
    backlog: VecDeque<FetchRequest>,
    rejected: Vec<FetchCompletion>,
    in_flight: Arc<AtomicU64>,
}

impl ThreadedFetcher {
    /// Start `thread_count` workers (0 picks one per CPU, capped at 8).
    ///
    /// `queue_capacity` bounds the number of requests waiting for a worker;
    /// submissions beyond it are held back and handed over as workers free
    /// up, on later submits and drains.
    pub fn new(
        transport: Arc<dyn Transport>,
        thread_count: usize,
        queue_capacity: usize,
    ) -> Result<Self, FetchError> {
        let threads = if thread_count == 0 {
            num_cpus::get().clamp(1, 8)
        } else {
            thread_count
        };
        let capacity = queue_capacity.max(1);
        let (request_sender, request_receiver) = bounded::<FetchRequest>(capacity);
        let (completion_sender, completion_receiver) = bounded::<FetchCompletion>(capacity * 2);
        let in_flight = Arc::new(AtomicU64::new(0));

        // Workers exit once the request sender is dropped.
        for n in 0..threads {
            let receiver = request_receiver.clone();
            let sender = completion_sender.clone();
            let transport = Arc::clone(&transport);
            std::thread::Builder::new()
                .name(format!("relight-fetch-{n}"))
                .spawn(move || {
                    while let Ok(mut request) = receiver.recv() {
                        trace!(url = %request.url, "fetching");
                        let mut buffer = std::mem::take(&mut request.buffer);
                        let result = transport.fetch(&request.url, &mut buffer);
                        if result.is_err() {
                            buffer.clear();
                        }
                        let completion = FetchCompletion {
                            tag: request.tag,
                            url: request.url,
                            buffer,
                            result,
                        };
                        if sender.send(completion).is_err() {
                            break;
                        }
                    }
                })
                .map_err(FetchError::Spawn)?;
        }
        debug!(threads, capacity, "fetch workers started");

        Ok(Self {
            request_sender,
            completion_receiver,
            backlog: VecDeque::new(),
            rejected: Vec::new(),
            in_flight,
        })
    }
}

impl ThreadedFetcher {
    /// Requests held back because the worker queue was full.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Move held-back requests to the workers, oldest first, until the queue
    /// is full again.
    fn flush_backlog(&mut self) {
        while let Some(request) = self.backlog.pop_front() {
            match self.request_sender.try_send(request) {
                Ok(()) => {}
                Err(TrySendError::Full(request)) => {
                    self.backlog.push_front(request);
                    break;
                }
                Err(TrySendError::Disconnected(request)) => self.reject(request),
            }
        }
    }

    fn reject(&mut self, request: FetchRequest) {
        let url = request.url.clone();
        warn!(%url, "fetch workers gone, request dropped");
        self.rejected
            .push(FetchCompletion::failure(request, FetchError::Rejected { url }));
    }
}

impl Fetcher for ThreadedFetcher {
    fn submit(&mut self, request: FetchRequest) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.flush_backlog();
        if !self.backlog.is_empty() {
            self.backlog.push_back(request);
            return;
        }
        match self.request_sender.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(request)) => {
                trace!(url = %request.url, "fetch queue full, holding request");
                self.backlog.push_back(request);
            }
            Err(TrySendError::Disconnected(request)) => self.reject(request),
        }
    }

    fn drain(&mut self) -> Vec<FetchCompletion> {
        self.flush_backlog();
        let mut completions = std::mem::take(&mut self.rejected);
        while let Ok(completion) = self.completion_receiver.try_recv() {
            completions.push(completion);
        }
        self.in_flight
            .fetch_sub(completions.len() as u64, Ordering::Relaxed);
        completions
    }

    fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

/// Fetcher driven by the host: requests are handed out with
/// [`take_requests`](ExternalFetcher::take_requests) and answered with
/// [`complete`](ExternalFetcher::complete).
#[derive(Debug, Default)]
pub struct ExternalFetcher {
    pending: Vec<FetchRequest>,
    completed: Vec<FetchCompletion>,
    in_flight: u64,
}

impl ExternalFetcher {
    /// Empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests submitted since the last call.
    pub fn take_requests(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.pending)
    }

    /// Answer a request taken earlier.
    pub fn complete(&mut self, completion: FetchCompletion) {
        self.completed.push(completion);
    }

    /// URLs of the requests not yet taken.
    #[must_use]
    pub fn pending_urls(&self) -> Vec<&str> {
        self.pending.iter().map(|r| r.url.as_str()).collect()
    }
}

impl Fetcher for ExternalFetcher {
    fn submit(&mut self, request: FetchRequest) {
        self.in_flight += 1;
        self.pending.push(request);
    }

    fn drain(&mut self) -> Vec<FetchCompletion> {
        let completions = std::mem::take(&mut self.completed);
        self.in_flight = self.in_flight.saturating_sub(completions.len() as u64);
        completions
    }

    fn in_flight(&self) -> u64 {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestTag;
    use std::time::{Duration, Instant};

    struct EchoTransport;

    impl Transport for EchoTransport {
        fn fetch(&self, url: &str, buffer: &mut Vec<u8>) -> Result<(), FetchError> {
            if url.ends_with("missing") {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            buffer.clear();
            buffer.extend_from_slice(url.as_bytes());
            Ok(())
        }
    }

    /// A transport that parks until told to go.
    struct GateTransport(Receiver<()>);

    impl Transport for GateTransport {
        fn fetch(&self, _url: &str, _buffer: &mut Vec<u8>) -> Result<(), FetchError> {
            let _ = self.0.recv();
            Ok(())
        }
    }

    fn drain_until(fetcher: &mut impl Fetcher, count: usize) -> Vec<FetchCompletion> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut all = Vec::new();
        while all.len() < count && Instant::now() < deadline {
            all.extend(fetcher.drain());
            std::thread::sleep(Duration::from_millis(2));
        }
        all
    }

    #[test]
    fn test_threaded_fetcher_round_trip() {
        let mut fetcher = ThreadedFetcher::new(Arc::new(EchoTransport), 2, 8).unwrap();
        fetcher.submit(FetchRequest::new(RequestTag::Info { load: 1 }, "a/info.json"));
        fetcher.submit(FetchRequest::new(RequestTag::BasisBlob { load: 1 }, "a/missing"));
        assert_eq!(fetcher.in_flight(), 2);

        let completions = drain_until(&mut fetcher, 2);
        assert_eq!(completions.len(), 2);
        assert_eq!(fetcher.in_flight(), 0);

        let info = completions
            .iter()
            .find(|c| c.tag == RequestTag::Info { load: 1 })
            .unwrap();
        assert!(info.result.is_ok());
        assert_eq!(info.buffer, b"a/info.json");

        let blob = completions
            .iter()
            .find(|c| c.tag == RequestTag::BasisBlob { load: 1 })
            .unwrap();
        assert!(matches!(blob.result, Err(FetchError::Status { status: 404, .. })));
    }

    #[test]
    fn test_full_queue_holds_requests_until_workers_free() {
        let (go, gate) = bounded::<()>(0);
        let mut fetcher = ThreadedFetcher::new(Arc::new(GateTransport(gate)), 1, 1).unwrap();
        // One request blocks the worker, one fills the queue, the rest wait.
        for n in 0..4 {
            fetcher.submit(FetchRequest::new(RequestTag::Info { load: 1 }, format!("r{n}")));
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(fetcher.backlog_len() > 0);
        assert!(
            fetcher
                .drain()
                .iter()
                .all(|c| !matches!(c.result, Err(FetchError::Rejected { .. })))
        );
        assert_eq!(fetcher.in_flight(), 4);

        drop(go);
        let done = drain_until(&mut fetcher, 4);
        assert_eq!(done.len(), 4);
        assert!(done.iter().all(|c| c.result.is_ok()));
        assert_eq!(fetcher.backlog_len(), 0);
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[test]
    fn test_external_fetcher_hands_out_requests() {
        let mut fetcher = ExternalFetcher::new();
        fetcher.submit(FetchRequest::new(RequestTag::Info { load: 1 }, "x/info.json"));
        assert_eq!(fetcher.pending_urls(), ["x/info.json"]);

        let requests = fetcher.take_requests();
        assert!(fetcher.take_requests().is_empty());
        assert_eq!(fetcher.in_flight(), 1);

        for request in requests {
            fetcher.complete(FetchCompletion::success(request, b"{}"));
        }
        let done = fetcher.drain();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].buffer, b"{}");
        assert_eq!(fetcher.in_flight(), 0);
    }
}
