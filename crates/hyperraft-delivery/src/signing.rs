use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `base64(HMAC-SHA256(secret, body))`, used both to sign an outbound
/// delivery and to let a receiver's test harness verify one.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    base64::encode(mac.finalize().into_bytes())
}

pub fn verify(secret: &[u8], body: &[u8], signature_b64: &str) -> bool {
    let Ok(expected) = base64::decode(signature_b64) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let sig = sign(b"top-secret", b"hello world");
        assert!(verify(b"top-secret", b"hello world", &sig));
    }

    #[test]
    fn verify_rejects_any_bit_flip_in_the_body() {
        let sig = sign(b"top-secret", b"hello world");
        assert!(!verify(b"top-secret", b"hello worlD", &sig));
    }

    #[test]
    fn verify_rejects_any_bit_flip_in_the_signature() {
        let mut sig = sign(b"top-secret", b"hello world");
        sig.pop();
        sig.push(if sig.ends_with('A') { 'B' } else { 'A' });
        assert!(!verify(b"top-secret", b"hello world", &sig));
    }
}
