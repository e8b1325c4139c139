//! The paired channel joining the two contexts.
//!
//! Main → hook frames travel over a tokio unbounded mpsc, consumed by the
//! hook context's async loop. Hook → main frames travel over a crossbeam
//! channel plus a [`Notify`]: the main context's async pump waits on the
//! notify and drains with `try_recv`, while a main thread blocked in a
//! synchronous call can `recv` directly.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Notify, mpsc};
use tracing::warn;

use crate::message::serializer::encode_hook;
use crate::message::types::HookMessage;

/// Creates a connected pair of endpoints.
pub fn channel() -> (HostEndpoint, HookEndpoint) {
    let (outbound, inbound) = mpsc::unbounded_channel();
    let (tx, rx) = crossbeam_channel::unbounded();
    let notify = Arc::new(Notify::new());

    let host = HostEndpoint {
        outbound,
        inbound: rx,
        notify: Arc::clone(&notify),
    };
    let hook = HookEndpoint {
        inbound,
        sender: HookSender {
            tx: Some(tx),
            notify,
        },
    };
    (host, hook)
}

/// The main context's end.
#[derive(Debug)]
pub struct HostEndpoint {
    pub(crate) outbound: mpsc::UnboundedSender<Bytes>,
    pub(crate) inbound: crossbeam_channel::Receiver<Bytes>,
    pub(crate) notify: Arc<Notify>,
}

/// The hook context's end.
#[derive(Debug)]
pub struct HookEndpoint {
    /// Frames from the main context.
    pub inbound: mpsc::UnboundedReceiver<Bytes>,
    /// Sender for frames to the main context.
    pub sender: HookSender,
}

/// Cloneable sender of hook → main frames.
///
/// Every send and every drop wakes the main context's pump, so it also
/// notices when the last sender is gone.
#[derive(Debug, Clone)]
pub struct HookSender {
    tx: Option<crossbeam_channel::Sender<Bytes>>,
    notify: Arc<Notify>,
}

impl HookSender {
    /// Encodes and sends `msg`. Returns `false` if the main side is gone.
    pub fn send(&self, msg: &HookMessage) -> bool {
        match encode_hook(msg) {
            Ok(frame) => self.send_frame(frame),
            Err(e) => {
                warn!(error = %e, "Failed to encode hook message");
                false
            }
        }
    }

    /// Sends a raw frame.
    pub fn send_frame(&self, frame: Bytes) -> bool {
        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(frame).is_ok());
        self.notify.notify_one();
        sent
    }
}

impl Drop for HookSender {
    fn drop(&mut self) {
        drop(self.tx.take());
        self.notify.notify_one();
    }
}
