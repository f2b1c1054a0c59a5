use hmac::{Hmac, Mac};
use hyperraft_types::NodeId;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Capability used to produce and verify `SignedAck`s. Kept abstract so a
/// deployment can swap in real asymmetric keys without touching the
/// replication loop; the in-memory HMAC implementation below is the
/// reference one, suitable for a single trusted operator distributing
/// shared secrets out of band.
pub trait Signer: Send + Sync {
    fn sign(&self, message: &[u8]) -> Vec<u8>;

    fn verify(&self, voter: &NodeId, message: &[u8], signature: &[u8]) -> bool;
}

/// HMAC-SHA256 signer keyed by a shared secret per voter, loaded from
/// configuration. `sign` always uses this node's own secret; `verify`
/// looks up the claimed voter's secret.
pub struct HmacSigner {
    self_id: NodeId,
    secrets: HashMap<NodeId, Vec<u8>>,
}

impl HmacSigner {
    pub fn new(self_id: NodeId, secrets: HashMap<NodeId, Vec<u8>>) -> Self {
        HmacSigner { self_id, secrets }
    }
}

impl Signer for HmacSigner {
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let key = self
            .secrets
            .get(&self.self_id)
            .expect("signer configured without a secret for its own node id");
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    fn verify(&self, voter: &NodeId, message: &[u8], signature: &[u8]) -> bool {
        let Some(key) = self.secrets.get(voter) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
            return false;
        };
        mac.update(message);
        mac.verify_slice(signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> HashMap<NodeId, Vec<u8>> {
        let mut m = HashMap::new();
        m.insert(NodeId::from("n1"), b"secret-one".to_vec());
        m.insert(NodeId::from("n2"), b"secret-two".to_vec());
        m
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = HmacSigner::new(NodeId::from("n1"), secrets());
        let sig = signer.sign(b"hello");
        assert!(signer.verify(&NodeId::from("n1"), b"hello", &sig));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let signer = HmacSigner::new(NodeId::from("n1"), secrets());
        let sig = signer.sign(b"hello");
        assert!(!signer.verify(&NodeId::from("n1"), b"goodbye", &sig));
    }

    #[test]
    fn verify_rejects_unknown_voter() {
        let signer = HmacSigner::new(NodeId::from("n1"), secrets());
        let sig = signer.sign(b"hello");
        assert!(!signer.verify(&NodeId::from("n3"), b"hello", &sig));
    }
}
