//! In-process transport: a linked pair of channels.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::{Transport, TransportError};
use crate::builtin::{self, BuiltinServer};
use crate::protocol::JsonRpcMessage;

type Peer = (Box<InMemoryTransport>, Arc<dyn BuiltinServer>);

/// One half of a linked in-process channel pair.
///
/// Messages are handed to the peer as values, never serialized.
pub struct InMemoryTransport {
    to_peer: StdMutex<Option<mpsc::UnboundedSender<JsonRpcMessage>>>,
    from_peer: Mutex<mpsc::UnboundedReceiver<JsonRpcMessage>>,
    /// Server half and its implementation, until `start` spawns it.
    pending_peer: StdMutex<Option<Peer>>,
    server_task: StdMutex<Option<JoinHandle<()>>>,
}

impl InMemoryTransport {
    /// Create two transports wired to each other.
    pub fn linked_pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::new(b_tx, a_rx), Self::new(a_tx, b_rx))
    }

    /// Client half of a pair whose server half runs `server` once started.
    pub fn for_builtin(server: Arc<dyn BuiltinServer>) -> Self {
        let (client, peer) = Self::linked_pair();
        *client
            .pending_peer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((Box::new(peer), server));
        client
    }

    fn new(
        to_peer: mpsc::UnboundedSender<JsonRpcMessage>,
        from_peer: mpsc::UnboundedReceiver<JsonRpcMessage>,
    ) -> Self {
        Self {
            to_peer: StdMutex::new(Some(to_peer)),
            from_peer: Mutex::new(from_peer),
            pending_peer: StdMutex::new(None),
            server_task: StdMutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn start(&self) -> Result<(), TransportError> {
        let pending = self
            .pending_peer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some((peer, server)) = pending {
            let peer: Arc<dyn Transport> = Arc::new(*peer);
            let handle = tokio::spawn(builtin::serve(server, peer));
            *self
                .server_task
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
        Ok(())
    }

    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        let guard = self.to_peer.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message).map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Option<JsonRpcMessage> {
        self.from_peer.lock().await.recv().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.to_peer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = self
            .server_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::methods;

    #[tokio::test]
    async fn test_linked_pair_delivers_both_ways() {
        let (a, b) = InMemoryTransport::linked_pair();

        a.send(JsonRpcMessage::notification(methods::PING, None))
            .await
            .unwrap();
        assert_eq!(b.receive().await.unwrap().method(), Some(methods::PING));

        b.send(JsonRpcMessage::notification(methods::INITIALIZED, None))
            .await
            .unwrap();
        assert_eq!(a.receive().await.unwrap().method(), Some(methods::INITIALIZED));
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = InMemoryTransport::linked_pair();
        a.close().await.unwrap();

        assert!(b.receive().await.is_none());
        assert!(matches!(
            a.send(JsonRpcMessage::notification(methods::PING, None)).await,
            Err(TransportError::Closed)
        ));
    }
}
