//! Session Multiplexer and Cluster Router (spec §4.8, §4.9): the
//! transport-facing half of the fan-out engine, sitting between a websocket
//! connection and the per-cluster [`fanout_kubehub::Manager`]s.

#![forbid(unsafe_code)]

pub mod frame;
pub mod multiplexer;
pub mod router;

pub use frame::{ClientFrame, FrameReceiver, FrameSender, FrameTransport};
pub use multiplexer::SessionMultiplexer;
pub use router::ClusterRouter;
