//! Process wiring: turns a `NodeConfig` into a running replica — consensus
//! core, TCP transport and RPC server, state projector, finality bus,
//! delivery enqueuer and workers, and the operator-facing admin interface.
//! Everything a standalone binary needs lives in [`node::bootstrap`]; the
//! rest of this crate is the machinery it assembles.

mod admin;
mod config;
mod node;
mod server;
mod transport;
mod wire;

pub use admin::{router as admin_router, serve as serve_admin, AdminState};
pub use config::{Config, NodeConfig, PeerConfig};
pub use node::{bootstrap, NodeHandles};
pub use server::serve as serve_consensus_rpc;
pub use transport::TcpTransport;
pub use wire::{read_frame, write_frame, WireRequest, WireResponse};
