//! HMAC over the registered hash functions (RFC 2104), grounded on
//! spec.md's MAC payload shape (`userKey+len; macState; lastMAC`) and
//! `cryptlib/context/ctx_hmd5.c`/`ctx_hsha.c`'s wrap-the-hash-twice
//! construction.

use crate::algorithms::{md5::Md5, sha1::Sha1, sha256::Sha256};
use crate::error::{CryptoError, CryptoResult};

/// The block size RFC 2104 pads keys/pads to; all three registered
/// hashes share it.
const HMAC_BLOCK_SIZE: usize = 64;

/// Which registered hash a MAC context is keyed over.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => crate::algorithms::md5::DIGEST_SIZE,
            HashAlgorithm::Sha1 => crate::algorithms::sha1::DIGEST_SIZE,
            HashAlgorithm::Sha256 => crate::algorithms::sha256::DIGEST_SIZE,
        }
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Md5 => crate::algorithms::md5::digest(data).to_vec(),
            HashAlgorithm::Sha1 => crate::algorithms::sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => crate::algorithms::sha256::digest(data).to_vec(),
        }
    }
}

/// One inflight hash computation, enum-dispatched since each registered
/// hash has its own state shape and digest width.
#[derive(Clone)]
enum InnerState {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl InnerState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => InnerState::Md5(Md5::new()),
            HashAlgorithm::Sha1 => InnerState::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => InnerState::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            InnerState::Md5(h) => h.update(data),
            InnerState::Sha1(h) => h.update(data),
            InnerState::Sha256(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            InnerState::Md5(h) => h.finalize().to_vec(),
            InnerState::Sha1(h) => h.finalize().to_vec(),
            InnerState::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

/// Incremental HMAC context: userKey is consumed at construction into
/// the inner/outer pads (spec.md's `userKey+len`); `update`/`finalize`
/// mirror the original's `macState`/`lastMAC` pair.
pub struct Hmac {
    algorithm: HashAlgorithm,
    outer_key_pad: Vec<u8>,
    inner: InnerState,
}

impl Hmac {
    pub fn new(algorithm: HashAlgorithm, key: &[u8]) -> Self {
        let block_key = if key.len() > HMAC_BLOCK_SIZE {
            algorithm.digest(key)
        } else {
            key.to_vec()
        };
        let mut inner_key_pad = vec![0x36u8; HMAC_BLOCK_SIZE];
        let mut outer_key_pad = vec![0x5cu8; HMAC_BLOCK_SIZE];
        for (i, &b) in block_key.iter().enumerate() {
            inner_key_pad[i] ^= b;
            outer_key_pad[i] ^= b;
        }
        let mut inner = InnerState::new(algorithm);
        inner.update(&inner_key_pad);
        Self {
            algorithm,
            outer_key_pad,
            inner,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Consumes the context, producing `lastMAC`.
    pub fn finalize(self) -> Vec<u8> {
        let inner_digest = self.inner.finalize();
        let mut outer_input = self.outer_key_pad;
        outer_input.extend_from_slice(&inner_digest);
        self.algorithm.digest(&outer_input)
    }
}

/// One-shot convenience wrapper around [`Hmac`].
pub fn compute(algorithm: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::new(algorithm, key);
    mac.update(data);
    mac.finalize()
}

/// Constant-time tag comparison; MACs must never be compared with `==`.
pub fn verify(algorithm: HashAlgorithm, key: &[u8], data: &[u8], tag: &[u8]) -> CryptoResult<bool> {
    use subtle::ConstantTimeEq;
    if tag.len() != algorithm.digest_size() {
        return Err(CryptoError::bad_data());
    }
    let expected = compute(algorithm, key, data);
    Ok(expected.ct_eq(tag).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// RFC 2202 test case 1: key = 20 bytes of 0x0b, data = "Hi There".
    #[test]
    fn hmac_md5_rfc2202_case1() {
        let key = [0x0bu8; 16];
        let tag = compute(HashAlgorithm::Md5, &key, b"Hi There");
        assert_eq!(hex(&tag), "9294727a3638bb1c13f48ef8158bfc9d");
    }

    /// RFC 2202 test case 1 for HMAC-SHA1.
    #[test]
    fn hmac_sha1_rfc2202_case1() {
        let key = [0x0bu8; 20];
        let tag = compute(HashAlgorithm::Sha1, &key, b"Hi There");
        assert_eq!(hex(&tag), "b617318655057264e28bc0b6fb378c8ef146be00");
    }

    #[test]
    fn incremental_matches_one_shot() {
        let key = b"secret-key";
        let data = b"the quick brown fox jumps over the lazy dog";
        let one_shot = compute(HashAlgorithm::Sha256, key, data);

        let mut mac = Hmac::new(HashAlgorithm::Sha256, key);
        mac.update(&data[..10]);
        mac.update(&data[10..]);
        assert_eq!(mac.finalize(), one_shot);
    }

    #[test]
    fn verify_rejects_tampered_tag() {
        let key = b"key";
        let tag = compute(HashAlgorithm::Sha256, key, b"message");
        let mut tampered = tag.clone();
        tampered[0] ^= 0xff;
        assert!(!verify(HashAlgorithm::Sha256, key, b"message", &tampered).unwrap());
        assert!(verify(HashAlgorithm::Sha256, key, b"message", &tag).unwrap());
    }
}
