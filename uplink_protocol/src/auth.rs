// Keyed message authentication for the uplink. The satellite and the ground
// station hold identical copies of the secret, exchanged out of band; the
// secret never leaves volatile memory and never crosses the wire.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over `message | counter`, hex-encoded.
pub struct HmacAuthenticator {
    secret: Vec<u8>,
}

impl HmacAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Digest over the concatenation of `message`, a literal `|` separator,
    /// and the decimal text of `counter`, as a lowercase hex string.
    pub fn generate(&self, message: &str, counter: u16) -> String {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .expect("hmac accepts keys of any length");
        mac.update(message.as_bytes());
        mac.update(b"|");
        mac.update(counter.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recomputes the digest and compares in constant time. A mismatch is an
    /// expected outcome on hostile input, so this never fails, it answers.
    pub fn verify(&self, message: &str, counter: u16, candidate: &str) -> bool {
        let expected = self.generate(message, counter);
        bool::from(expected.as_bytes().ct_eq(candidate.as_bytes()))
    }
}
