//! Channels and `選択`
//!
//! A channel owns both ends of a crossbeam channel. Closing drops the
//! sender, so receivers drain whatever is still queued and then see the
//! disconnect, which the language reports as `無`.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Select, Sender};
use parking_lot::Mutex;

use crate::error::RuntimeError;
use crate::value::Value;

/// A multi-producer multi-consumer FIFO queue. Capacity 0 makes every
/// send wait for a receiver.
pub struct Channel {
    sender: Mutex<Option<Sender<Value>>>,
    receiver: Receiver<Value>,
    capacity: usize,
}

impl Channel {
    /// Create a channel holding at most `capacity` queued values.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: rx,
            capacity,
        }
    }

    /// Buffer size given at creation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values currently queued.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// A sender handle, unless closed. The lock is not held while sending,
    /// so a blocked sender does not block `close`.
    fn sender(&self) -> Option<Sender<Value>> {
        self.sender.lock().clone()
    }

    /// Send `value`, blocking while the buffer is full.
    pub fn send(&self, value: Value) -> Result<(), RuntimeError> {
        let tx = self.sender().ok_or(RuntimeError::ChannelClosed)?;
        tx.send(value).map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Receive the next value; `None` once closed and drained.
    pub fn recv(&self) -> Option<Value> {
        self.receiver.recv().ok()
    }

    /// Receive without blocking.
    pub fn try_recv(&self) -> Option<Value> {
        self.receiver.try_recv().ok()
    }

    /// Close the channel. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.sender.lock().take().is_some()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("capacity", &self.capacity)
            .field("queued", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Select
// ═══════════════════════════════════════════════════════════════════════

/// One arm of a `選択`.
#[derive(Debug, Clone)]
pub enum SelectCase {
    /// Receive from the channel
    Recv(Arc<Channel>),
    /// Send the value on the channel
    Send(Arc<Channel>, Value),
}

/// Which arm of a `選択` completed.
#[derive(Debug, Clone)]
pub enum Selected {
    /// A receive completed; `None` means the channel was closed and drained
    Received {
        /// Index of the arm
        index: usize,
        /// The value received
        value: Option<Value>,
    },
    /// A send completed
    Sent {
        /// Index of the arm
        index: usize,
    },
    /// No arm was ready and the caller asked not to block
    Default,
}

/// Wait until one of `cases` can proceed and perform it. With
/// `non_blocking`, return [`Selected::Default`] instead of waiting.
pub fn select(cases: &[SelectCase], non_blocking: bool) -> Result<Selected, RuntimeError> {
    let mut senders = Vec::with_capacity(cases.len());
    for case in cases {
        senders.push(match case {
            SelectCase::Send(ch, _) => Some(ch.sender().ok_or(RuntimeError::ChannelClosed)?),
            SelectCase::Recv(_) => None,
        });
    }

    let mut sel = Select::new();
    for (case, sender) in cases.iter().zip(&senders) {
        match (case, sender) {
            (SelectCase::Recv(ch), _) => sel.recv(&ch.receiver),
            (SelectCase::Send(..), Some(tx)) => sel.send(tx),
            (SelectCase::Send(..), None) => return Err(RuntimeError::ChannelClosed),
        };
    }

    let oper = if non_blocking {
        match sel.try_select() {
            Ok(oper) => oper,
            Err(_) => return Ok(Selected::Default),
        }
    } else {
        sel.select()
    };

    let index = oper.index();
    match (&cases[index], &senders[index]) {
        (SelectCase::Recv(ch), _) => Ok(Selected::Received {
            index,
            value: oper.recv(&ch.receiver).ok(),
        }),
        (SelectCase::Send(_, value), Some(tx)) => {
            oper.send(tx, value.clone())
                .map_err(|_| RuntimeError::ChannelClosed)?;
            Ok(Selected::Sent { index })
        }
        (SelectCase::Send(..), None) => Err(RuntimeError::ChannelClosed),
    }
}
