use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("worker did not answer in time")]
    TimedOut,
    #[error("worker has stopped")]
    Closed,
}

/// Request/reply with a worker thread. Every request carries a sequence
/// number that the worker echoes back; replies to earlier requests that
/// arrive late are discarded.
pub struct TaggedExchange<T> {
    requests: Option<Sender<u64>>,
    replies: Receiver<(u64, T)>,
    last_sent: u64,
    timeout: Duration,
}

impl<T> TaggedExchange<T> {
    pub fn new(requests: Sender<u64>, replies: Receiver<(u64, T)>, timeout: Duration) -> Self {
        Self {
            requests: Some(requests),
            replies,
            last_sent: 0,
            timeout,
        }
    }

    pub fn request(&mut self) -> Result<T, ExchangeError> {
        let requests = self.requests.as_ref().ok_or(ExchangeError::Closed)?;
        self.last_sent += 1;
        let tag = self.last_sent;
        let deadline = Instant::now() + self.timeout;

        requests.send_deadline(tag, deadline).map_err(|e| match e {
            SendTimeoutError::Timeout(_) => ExchangeError::TimedOut,
            SendTimeoutError::Disconnected(_) => ExchangeError::Closed,
        })?;
        loop {
            match self.replies.recv_deadline(deadline) {
                Ok((reply_tag, value)) if reply_tag == tag => return Ok(value),
                Ok((reply_tag, _)) => log::debug!("Dropping late reply {reply_tag} (waiting for {tag})"),
                Err(RecvTimeoutError::Timeout) => return Err(ExchangeError::TimedOut),
                Err(RecvTimeoutError::Disconnected) => return Err(ExchangeError::Closed),
            }
        }
    }

    /// Hangs up on the worker; its request loop ends once it notices.
    pub fn close(&mut self) {
        self.requests.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Replies `tag * 10`; the first request is answered after `first_delay`.
    fn spawn_worker(first_delay: Duration) -> (TaggedExchange<u64>, thread::JoinHandle<()>) {
        let (request_tx, request_rx) = crossbeam_channel::bounded::<u64>(1);
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        let handle = thread::spawn(move || {
            for tag in request_rx.iter() {
                if tag == 1 {
                    thread::sleep(first_delay);
                }
                let _ = reply_tx.send((tag, tag * 10));
            }
        });
        (
            TaggedExchange::new(request_tx, reply_rx, Duration::from_millis(100)),
            handle,
        )
    }

    #[test]
    fn test_replies_are_matched_to_requests() {
        let (mut exchange, handle) = spawn_worker(Duration::ZERO);
        assert_eq!(exchange.request(), Ok(10));
        assert_eq!(exchange.request(), Ok(20));
        exchange.close();
        handle.join().unwrap();
    }

    #[test]
    fn test_late_reply_is_not_returned_to_next_request() {
        let (mut exchange, handle) = spawn_worker(Duration::from_millis(300));

        assert_eq!(exchange.request(), Err(ExchangeError::TimedOut));
        // Wait for the late reply to land in the channel first.
        thread::sleep(Duration::from_millis(300));
        assert_eq!(exchange.request(), Ok(20));

        exchange.close();
        handle.join().unwrap();
    }

    #[test]
    fn test_closed_exchange_reports_closed() {
        let (mut exchange, handle) = spawn_worker(Duration::ZERO);
        exchange.close();
        handle.join().unwrap();
        assert_eq!(exchange.request(), Err(ExchangeError::Closed));
    }

    #[test]
    fn test_stopped_worker_reports_closed() {
        let (request_tx, request_rx) = crossbeam_channel::bounded::<u64>(1);
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<(u64, u64)>();
        drop(reply_tx);
        let mut exchange = TaggedExchange::new(request_tx, reply_rx, Duration::from_millis(100));
        assert_eq!(exchange.request(), Err(ExchangeError::Closed));
        drop(request_rx);
    }
}
