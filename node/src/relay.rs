//! # Message Relay
//!
//! A TCP switchboard. Each client connects, sends a [`Hello`] frame with
//! its name, and from then on every frame it sends is forwarded unchanged
//! to the connection registered under the frame's `receiver`. Frames
//! addressed to the ledger service are answered by [`LedgerService`]
//! instead.
//!
//! ```text
//! alice ──frame(receiver=bob)──▶ relay ──same bytes──▶ bob
//! alice ──frame(receiver=ledger)──▶ relay ──answer──▶ alice
//! ```
//!
//! Each connection gets a reader task (this module's `handle_connection`)
//! and a writer task draining a bounded outbox. The registry maps names to
//! outboxes; a reconnect under the same name replaces the old entry.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use cipherchain::network::{
    read_frame, read_frame_bytes, write_frame_bytes, Envelope, Hello, LedgerService, RouteHeader,
};

/// Frames queued per connection before senders start waiting.
const OUTBOX_CAPACITY: usize = 64;

type Outbox = mpsc::Sender<Vec<u8>>;

pub struct Relay {
    peers: Mutex<HashMap<String, Outbox>>,
    service: LedgerService,
}

impl Relay {
    pub fn new(service: LedgerService) -> Arc<Self> {
        Arc::new(Self {
            peers: Mutex::new(HashMap::new()),
            service,
        })
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, addr) = listener
                .accept()
                .await
                .context("failed to accept connection")?;
            tracing::debug!(%addr, "connection accepted");
            let relay = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = relay.handle_connection(stream).await {
                    tracing::warn!(%addr, error = %e, "connection closed with error");
                }
            });
        }
    }

    fn outbox(&self, name: &str) -> Option<Outbox> {
        self.peers.lock().get(name).cloned()
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        let Some(Hello { name }) = read_frame(&mut reader).await? else {
            return Ok(());
        };
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTBOX_CAPACITY);
        self.peers.lock().insert(name.clone(), tx.clone());
        tracing::info!(client = %name, "client connected");

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write_frame_bytes(&mut writer, &frame).await {
                    tracing::debug!(error = %e, "writer stopped");
                    break;
                }
            }
        });

        let result = self.pump(&name, &mut reader, &tx).await;

        {
            let mut peers = self.peers.lock();
            if peers.get(&name).is_some_and(|current| current.same_channel(&tx)) {
                peers.remove(&name);
            }
        }
        drop(tx);
        writer_task.abort();
        tracing::info!(client = %name, "client disconnected");
        result
    }

    async fn pump(
        &self,
        name: &str,
        reader: &mut tokio::net::tcp::OwnedReadHalf,
        own: &Outbox,
    ) -> Result<()> {
        while let Some(frame) = read_frame_bytes(reader).await? {
            let header: RouteHeader = match serde_json::from_slice(&frame) {
                Ok(header) => header,
                Err(e) => {
                    tracing::warn!(client = %name, error = %e, "unroutable frame dropped");
                    continue;
                }
            };

            if header.receiver == self.service.name() {
                let answer = self.answer(&frame).await?;
                if let Some(answer) = answer {
                    // The peer may have gone; nothing left to do then.
                    let _ = own.send(answer).await;
                }
                continue;
            }

            tracing::debug!(from = %header.sender, to = %header.receiver, "forwarding frame");
            match self.outbox(&header.receiver) {
                Some(outbox) => {
                    if outbox.send(frame).await.is_err() {
                        tracing::warn!(to = %header.receiver, "receiver went away");
                    }
                }
                None => tracing::warn!(to = %header.receiver, "unknown receiver, frame dropped"),
            }
        }
        Ok(())
    }

    /// Run a ledger request on a blocking thread (appending may mine) and
    /// serialize the answer.
    async fn answer(&self, frame: &[u8]) -> Result<Option<Vec<u8>>> {
        let request: Envelope = match serde_json::from_slice(frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "malformed ledger request dropped");
                return Ok(None);
            }
        };
        let service = self.service.clone();
        let reply = tokio::task::spawn_blocking(move || service.handle(&request))
            .await
            .context("ledger task failed")?;
        match reply {
            Ok(reply) => Ok(Some(serde_json::to_vec(&reply)?)),
            Err(e) => {
                tracing::warn!(error = %e, "ledger request refused");
                Ok(None)
            }
        }
    }
}
