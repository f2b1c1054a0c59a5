use crate::admin::{self, AdminState};
use crate::config::NodeConfig;
use crate::transport::TcpTransport;
use anyhow::Result;
use hyperraft_bus::{BusMetrics, FinalityBus};
use hyperraft_clock::SystemClock;
use hyperraft_consensus::{ClusterConfig, ConsensusHandle, ConsensusMetrics, Core, HmacSigner};
use hyperraft_delivery::{DeliveryMetrics, DeliveryWorker, Enqueuer, SecretLookup};
use hyperraft_projector::{Projector, ProjectorMetrics};
use hyperraft_storage::memory::{MemoryApprovalView, MemoryDeliveryStore, MemoryLogStore};
use prometheus::Registry;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

/// Everything a running node spawned: handles a caller can use to interact
/// with consensus, and the shutdown senders for every long-running task.
pub struct NodeHandles {
    pub consensus: ConsensusHandle,
    pub registry: Registry,
    shutdowns: Vec<oneshot::Sender<()>>,
}

impl NodeHandles {
    /// Signals every spawned task to stop. Best-effort: a task that already
    /// exited silently drops its sender, which is fine.
    pub fn shutdown(self) {
        for tx in self.shutdowns {
            let _ = tx.send(());
        }
    }
}

pub async fn bootstrap(config: NodeConfig) -> Result<NodeHandles> {
    let registry = Registry::new();
    let self_id = hyperraft_types::NodeId(config.node_id.clone());

    let peer_addresses: HashMap<hyperraft_types::NodeId, SocketAddr> = config
        .peers
        .iter()
        .map(|p| (hyperraft_types::NodeId(p.node_id.clone()), p.rpc_address))
        .collect();

    let cluster = ClusterConfig {
        self_id: self_id.clone(),
        peers: config.peer_ids(),
        fault_tolerance: config.fault_tolerance,
    };

    let clock = Arc::new(SystemClock::default());
    let transport = Arc::new(TcpTransport::new(peer_addresses));
    let log = Arc::new(MemoryLogStore::new());
    let signer = Arc::new(HmacSigner::new(self_id.clone(), hashmap_secrets(&config)));
    let consensus_metrics = Arc::new(ConsensusMetrics::new(&registry));

    let (core_handles, _core_join) = Core::spawn(
        cluster,
        clock.clone(),
        transport,
        log,
        signer,
        consensus_metrics,
    );

    let mut shutdowns = vec![core_handles.shutdown_tx];

    let (rpc_shutdown_tx, rpc_shutdown_rx) = oneshot::channel();
    shutdowns.push(rpc_shutdown_tx);
    let rpc_listen_address = config.rpc_listen_address;
    let inbox = core_handles.inbox.clone();
    tokio::spawn(async move {
        if let Err(err) = crate::server::serve(rpc_listen_address, inbox, rpc_shutdown_rx).await {
            tracing::error!(%err, "consensus RPC server exited");
        }
    });

    let approvals = Arc::new(MemoryApprovalView::new());
    let projector_metrics = Arc::new(ProjectorMetrics::new(&registry));
    let bus_metrics = Arc::new(BusMetrics::new(&registry));
    let bus = Arc::new(FinalityBus::new(bus_metrics));
    let projector = Arc::new(Projector::new(
        approvals.clone(),
        bus.clone(),
        projector_metrics,
    ));

    let mut committed = core_handles.handle.subscribe_committed();
    let projector_for_apply = projector.clone();
    tokio::spawn(async move {
        loop {
            match committed.recv().await {
                Ok(entry) => {
                    if let Err(err) = projector_for_apply.apply(&entry).await {
                        tracing::error!(%err, "failed to apply committed entry to the approval view");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "projector lagged behind the commit stream");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let deliveries = Arc::new(MemoryDeliveryStore::new(config.delivery_partitions));
    let delivery_metrics = Arc::new(DeliveryMetrics::new(&registry));
    let finality_rx = bus.subscribe();
    let enqueuer = Enqueuer::new(
        deliveries.clone(),
        clock.clone(),
        config.webhooks.clone(),
        delivery_metrics.clone(),
    );
    tokio::spawn(async move {
        enqueuer.run(finality_rx).await;
    });

    let secrets: SecretLookup = config
        .webhooks
        .iter()
        .map(|w| (w.webhook_id.clone(), w.secret.clone()))
        .collect();
    for partition in 0..config.delivery_partitions {
        for _ in 0..config.delivery_workers_per_partition {
            let (worker_shutdown_tx, worker_shutdown_rx) = oneshot::channel();
            shutdowns.push(worker_shutdown_tx);
            let worker = DeliveryWorker::new(
                deliveries.clone(),
                clock.clone(),
                secrets.clone(),
                delivery_metrics.clone(),
            );
            tokio::spawn(async move {
                worker.run(partition, worker_shutdown_rx).await;
            });
        }
    }

    let admin_state = Arc::new(AdminState {
        consensus: core_handles.handle.clone(),
        approvals,
        deliveries,
        registry: registry.clone(),
        delivery_partitions: config.delivery_partitions,
    });
    let admin_address = config.admin_address;
    tokio::spawn(async move {
        if let Err(err) = admin::serve(admin_address, admin_state).await {
            tracing::error!(%err, "admin interface exited");
        }
    });

    info!(node_id = %config.node_id, %rpc_listen_address, %admin_address, "node bootstrapped");

    Ok(NodeHandles {
        consensus: core_handles.handle,
        registry,
        shutdowns,
    })
}

fn hashmap_secrets(config: &NodeConfig) -> HashMap<hyperraft_types::NodeId, Vec<u8>> {
    config
        .node_secrets
        .iter()
        .map(|(id, secret)| (hyperraft_types::NodeId(id.clone()), secret.as_bytes().to_vec()))
        .collect()
}
