use anyhow::Result;
use hyperraft_delivery::WebhookConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Marker trait for on-disk YAML-backed configs; gives every config type
/// `load`/`save` for free.
pub trait Config: Serialize + serde::de::DeserializeOwned {
    fn load<P: AsRef<Path>>(path: P) -> Result<Self>
    where
        Self: Sized,
    {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_admin_address() -> SocketAddr {
    use std::net::{IpAddr, Ipv4Addr};
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 9091)
}

fn default_metrics_address() -> SocketAddr {
    use std::net::{IpAddr, Ipv4Addr};
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 9092)
}

fn default_fault_tolerance() -> u32 {
    1
}

fn default_delivery_partitions() -> u32 {
    8
}

fn default_delivery_workers_per_partition() -> u32 {
    1
}

/// Another cluster member's stable id and where to dial it for consensus RPC.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeerConfig {
    pub node_id: String,
    pub rpc_address: SocketAddr,
}

/// A node's full configuration: identity, cluster membership, the local
/// listen addresses for consensus RPC/admin/metrics, the webhook fan-out
/// list, and the shared HMAC secrets used both for inter-node signed acks
/// and for the Byzantine signer capability.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeConfig {
    pub node_id: String,
    pub rpc_listen_address: SocketAddr,
    pub peers: Vec<PeerConfig>,

    #[serde(default = "default_fault_tolerance")]
    pub fault_tolerance: u32,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_admin_address")]
    pub admin_address: SocketAddr,
    #[serde(default = "default_metrics_address")]
    pub metrics_address: SocketAddr,

    #[serde(default = "default_delivery_partitions")]
    pub delivery_partitions: u32,
    #[serde(default = "default_delivery_workers_per_partition")]
    pub delivery_workers_per_partition: u32,

    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,

    /// Shared signing secret per node id, used both by the Byzantine ack
    /// signer and to look up each peer's verification key. In production
    /// this would be sourced from a secrets manager rather than the file
    /// loaded verbatim; kept inline here to match the HMAC reference scheme
    /// the signer capability implements.
    pub node_secrets: HashMap<String, String>,
}

impl Config for NodeConfig {}

impl NodeConfig {
    pub fn peer_ids(&self) -> Vec<hyperraft_types::NodeId> {
        self.peers
            .iter()
            .map(|p| hyperraft_types::NodeId(p.node_id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeConfig {
        let mut node_secrets = HashMap::new();
        node_secrets.insert("node-a".to_string(), "secret-a".to_string());
        node_secrets.insert("node-b".to_string(), "secret-b".to_string());
        NodeConfig {
            node_id: "node-a".to_string(),
            rpc_listen_address: "127.0.0.1:7000".parse().unwrap(),
            peers: vec![PeerConfig {
                node_id: "node-b".to_string(),
                rpc_address: "127.0.0.1:7001".parse().unwrap(),
            }],
            fault_tolerance: 0,
            data_dir: default_data_dir(),
            admin_address: default_admin_address(),
            metrics_address: default_metrics_address(),
            delivery_partitions: default_delivery_partitions(),
            delivery_workers_per_partition: default_delivery_workers_per_partition(),
            webhooks: vec![],
            node_secrets,
        }
    }

    #[test]
    fn round_trips_through_yaml() {
        let cfg = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.yaml");
        cfg.save(&path).unwrap();
        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded.node_id, cfg.node_id);
        assert_eq!(loaded.peers.len(), 1);
    }

    #[test]
    fn peer_ids_maps_peer_configs_to_node_ids() {
        let cfg = sample();
        assert_eq!(cfg.peer_ids(), vec![hyperraft_types::NodeId("node-b".into())]);
    }
}
