use crate::wire::{read_frame, write_frame, WireRequest, WireResponse};
use hyperraft_consensus::RpcInbox;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

/// Accepts consensus RPC connections until `shutdown` fires. Each connection
/// carries exactly one request/response pair, matching `TcpTransport`'s
/// one-shot-per-call dialing.
pub async fn serve(
    listen_address: SocketAddr,
    inbox: RpcInbox,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(listen_address).await?;
    tracing::info!(%listen_address, "consensus RPC server listening");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("consensus RPC server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, inbox).await {
                        debug!(%peer_addr, %err, "consensus RPC connection ended with an error");
                    }
                });
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, inbox: RpcInbox) -> std::io::Result<()> {
    let request: WireRequest = read_frame(&mut stream).await?;
    let response = match request {
        WireRequest::RequestVote(req) => match inbox.request_vote(req).await {
            Ok(resp) => WireResponse::RequestVote(resp),
            Err(err) => {
                warn!(%err, "request_vote dispatch failed");
                return Ok(());
            }
        },
        WireRequest::AppendEntries(req) => match inbox.append_entries(req).await {
            Ok(resp) => WireResponse::AppendEntries(resp),
            Err(err) => {
                warn!(%err, "append_entries dispatch failed");
                return Ok(());
            }
        },
        WireRequest::InstallSnapshot(req) => match inbox.install_snapshot(req).await {
            Ok(resp) => WireResponse::InstallSnapshot(resp),
            Err(err) => {
                warn!(%err, "install_snapshot dispatch failed");
                return Ok(());
            }
        },
    };
    write_frame(&mut stream, &response).await
}
