use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Server password check. Only an HMAC tag of the configured password is
/// kept, under a key drawn when the session starts; candidates are compared
/// with `verify_slice`, which runs in constant time.
pub struct PasswordGuard {
    key: [u8; 32],
    tag: Option<Vec<u8>>,
}

impl PasswordGuard {
    /// An empty or missing password disables the check.
    pub fn new(password: Option<&str>) -> Self {
        let key: [u8; 32] = rand::random();
        let tag = password
            .filter(|p| !p.is_empty())
            .and_then(|p| Self::mac(&key, p))
            .map(|mac| mac.finalize().into_bytes().to_vec());
        Self { key, tag }
    }

    fn mac(key: &[u8], password: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(key).ok()?;
        mac.update(password.as_bytes());
        Some(mac)
    }

    pub fn is_required(&self) -> bool {
        self.tag.is_some()
    }

    pub fn verify(&self, candidate: Option<&str>) -> bool {
        let Some(tag) = &self.tag else {
            return true;
        };
        Self::mac(&self.key, candidate.unwrap_or_default())
            .is_some_and(|mac| mac.verify_slice(tag).is_ok())
    }
}

impl std::fmt::Debug for PasswordGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGuard")
            .field("required", &self.is_required())
            .finish_non_exhaustive()
    }
}
