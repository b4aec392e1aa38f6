//! Unbounded, order-preserving receive buffer.
//!
//! The network read loop pushes chunks with [`RecvBuffer::put`] and never
//! waits for the consumer. Items queue up in a FIFO backlog; at most one is
//! promoted into a single-slot hand-off channel at a time. The consumer
//! waits on [`RecvHandle::get`] and, after accepting an item, calls
//! [`RecvBuffer::load`] to promote the next one.
//!
//! ```text
//! put ─► backlog (VecDeque, mutex) ─► try_send ─► [slot: 1] ─► get
//!                 ▲                                              │
//!                 └──────────────────── load ◄───────────────────┘
//! ```
//!
//! The lock only guards the backlog append/promote; it is never held while
//! waiting on the consumer.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Terminal condition of a receive buffer.
#[derive(Debug, Clone)]
pub enum Terminal {
    /// The peer closed the stream.
    Eof,
    /// The transport failed.
    Transport(Arc<io::Error>),
}

impl Terminal {
    /// Wrap a transport error.
    pub fn transport(err: io::Error) -> Self {
        Terminal::Transport(Arc::new(err))
    }
}

/// An item passed from the network side to the reader.
#[derive(Debug, Clone)]
pub enum RecvMsg {
    /// A chunk of bytes read off the socket.
    Data(Bytes),
    /// End of the stream, clean or not.
    Terminal(Terminal),
}

struct Shared {
    tx: mpsc::Sender<RecvMsg>,
    backlog: Mutex<VecDeque<RecvMsg>>,
}

impl Shared {
    /// Offer the backlog head to the hand-off slot if it is empty.
    ///
    /// Caller holds the backlog lock.
    fn promote(&self, backlog: &mut VecDeque<RecvMsg>) {
        let Some(head) = backlog.pop_front() else {
            return;
        };
        match self.tx.try_send(head) {
            Ok(()) => {}
            Err(TrySendError::Full(head)) => backlog.push_front(head),
            Err(TrySendError::Closed(_)) => {
                // Consumer is gone; nothing will ever read the backlog.
                backlog.clear();
            }
        }
    }
}

/// Producer side of the receive buffer.
///
/// Cheap to clone; any number of producers may `put`.
#[derive(Clone)]
pub struct RecvBuffer {
    shared: Arc<Shared>,
}

/// Consumer side of the receive buffer. There is exactly one.
pub struct RecvHandle {
    rx: mpsc::Receiver<RecvMsg>,
    terminal: Option<Terminal>,
}

impl RecvBuffer {
    /// Create a receive buffer and its single consumer handle.
    pub fn new() -> (RecvBuffer, RecvHandle) {
        let (tx, rx) = mpsc::channel(1);
        let buffer = RecvBuffer {
            shared: Arc::new(Shared {
                tx,
                backlog: Mutex::new(VecDeque::new()),
            }),
        };
        let handle = RecvHandle { rx, terminal: None };
        (buffer, handle)
    }

    /// Append an item and offer the backlog head to the consumer.
    ///
    /// Never blocks on the consumer.
    pub fn put(&self, msg: RecvMsg) {
        let mut backlog = self.shared.backlog.lock();
        backlog.push_back(msg);
        self.shared.promote(&mut backlog);
    }

    /// Promote the next backlog item into the hand-off slot.
    ///
    /// Called by the consumer right after it accepted an item.
    pub fn load(&self) {
        let mut backlog = self.shared.backlog.lock();
        self.shared.promote(&mut backlog);
    }

    /// Number of items waiting in the backlog (excluding the hand-off slot).
    pub fn backlog_len(&self) -> usize {
        self.shared.backlog.lock().len()
    }
}

impl RecvHandle {
    /// Poll for the next hand-off item.
    ///
    /// Once a [`RecvMsg::Terminal`] has been delivered, every later poll
    /// returns that same terminal immediately.
    pub fn poll_get(&mut self, cx: &mut Context<'_>) -> Poll<RecvMsg> {
        if let Some(t) = &self.terminal {
            return Poll::Ready(RecvMsg::Terminal(t.clone()));
        }
        let msg = match self.rx.poll_recv(cx) {
            Poll::Ready(Some(msg)) => msg,
            // Every producer dropped without a terminal item.
            Poll::Ready(None) => RecvMsg::Terminal(Terminal::Eof),
            Poll::Pending => return Poll::Pending,
        };
        if let RecvMsg::Terminal(t) = &msg {
            self.terminal = Some(t.clone());
        }
        Poll::Ready(msg)
    }

    /// Wait for the next hand-off item.
    pub async fn get(&mut self) -> RecvMsg {
        std::future::poll_fn(|cx| self.poll_get(cx)).await
    }

    /// The terminal condition, once one has been delivered.
    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }
}
