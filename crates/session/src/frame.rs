//! Wire frames and the transport seam (spec §4.8). The multiplexer depends
//! on a split send/recv abstraction rather than a concrete websocket crate,
//! so the frame codec and HTTP upgrade handshake stay pluggable external
//! collaborators: a real implementation wraps something like a
//! `tokio-tungstenite` stream split into its sink and stream halves.

use serde::Deserialize;

use fanout_core::Domain;

/// A client → server frame. Field names and casing match spec §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ClientFrame {
    Request {
        domain: Domain,
        scope: String,
        #[serde(rename = "clusterId", default)]
        cluster_id: Option<String>,
    },
    Cancel {
        domain: Domain,
        scope: String,
    },
}

/// The writer half: sends one server frame (an `Update`) at a time.
#[async_trait::async_trait]
pub trait FrameSender: Send {
    async fn send(&mut self, update: &fanout_core::Update) -> anyhow::Result<()>;
}

/// The reader half: receives one client frame at a time. `Ok(None)` means the
/// transport closed cleanly.
#[async_trait::async_trait]
pub trait FrameReceiver: Send {
    async fn recv(&mut self) -> anyhow::Result<Option<ClientFrame>>;
}

/// A full-duplex transport that splits into independently owned halves, the
/// same way the session multiplexer runs its reader and writer as
/// independent tasks (spec §4.8).
pub trait FrameTransport: Send {
    type Sender: FrameSender + 'static;
    type Receiver: FrameReceiver + 'static;

    fn split(self) -> (Self::Sender, Self::Receiver);
}
