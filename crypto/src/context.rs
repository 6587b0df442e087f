//! `CryptoContext`: the tagged union over {Conventional, PublicKey,
//! Hash, MAC} described in spec.md §3, collapsing the original's C
//! union-plus-discriminator (`ctxConv`, `ctxPKC`, ...) into a Rust sum
//! type whose variants own their payload outright (spec.md §9's
//! "Tagged unions over variant payloads" redesign note). Dispatch
//! happens through ordinary `match` on [`ContextPayload`] rather than a
//! function-pointer table. The capability registry (`capability.rs`)
//! still describes *what* each algorithm supports, but no longer needs
//! to route calls, since each payload variant already knows how to
//! drive its own algorithm module.

use zeroize::Zeroize;

use crate::algorithms::aes::AesKey;
use crate::algorithms::md5::Md5;
use crate::algorithms::sha1::Sha1;
use crate::algorithms::sha256::Sha256;
use crate::bignum::MontgomeryContext;
use crate::dh::{DhKeyPair, DhParams};
use crate::dlp::DlpParams;
use crate::dsa::{self, Signature as DsaSignature};
use crate::elgamal::{self, Ciphertext as ElgamalCiphertext};
use crate::error::{CryptoError, CryptoResult};
use crate::flags::ContextFlags;
use crate::mac::HashAlgorithm;
use crate::modes::{self, BlockCipher, Mode, ModeState};
use crate::rsa::RsaKey;

use num_bigint::BigUint;

/// Upper bound on [`CryptoContext::label`], per spec.md §3.
pub const MAX_LABEL_BYTES: usize = 64;

/// Which stage of an operation an error is attributed to, for the
/// `errorLocus`/`errorType` pair spec.md §3 carries on every context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorLocus {
    Key,
    Iv,
    Mode,
    Algorithm,
    State,
}

/// The one conventional cipher the registry ships (spec.md §4.1's
/// "Stream cipher ⇒ ..." rule is exercised by the registry consistency
/// check, not by a concrete stream cipher here, AES is block-only).
enum ConventionalCipher {
    Aes(AesKey),
}

impl ConventionalCipher {
    fn as_block_cipher(&self) -> &dyn BlockCipher {
        match self {
            ConventionalCipher::Aes(k) => k,
        }
    }
}

/// Conventional-cipher payload: mode, key material, running IV state.
/// The user key lives in a `Vec<u8>` zeroised on drop (`Zeroize`), per
/// spec.md §3's "userKey buffer must be zeroised on context destruction".
struct ConventionalPayload {
    mode: Mode,
    user_key: Vec<u8>,
    cipher: Option<ConventionalCipher>,
    mode_state: Option<ModeState>,
}

impl Drop for ConventionalPayload {
    fn drop(&mut self) {
        self.user_key.zeroize();
    }
}

/// Per-algorithm public-key state. Each variant corresponds to one of
/// spec.md §4's PKC algorithms; the "up to 8 named big-integer
/// parameters" of the abstract model are this enum's concrete fields.
enum PkcPayload {
    Rsa(RsaKey),
    Dsa {
        params: DlpParams,
        x: Option<BigUint>,
        y: BigUint,
    },
    Dh {
        params: DhParams,
        keypair: Option<DhKeyPair>,
    },
    Elgamal {
        params: DlpParams,
        x: Option<BigUint>,
        y: BigUint,
    },
    /// A context backed by an external device (smart card, HSM): no
    /// key material lives here, only opaque handles the owning
    /// `CryptoContext` already carries. Operations on this variant
    /// always fail with `ErrorNotAvail` from the core's side. A host
    /// integration routes them to the device instead.
    Device,
}

struct PublicKeyPayload {
    key_size_bits: usize,
    key_id: Vec<u8>,
    creation_time: Option<i64>,
    inner: PkcPayload,
}

enum HashInner {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

struct HashPayload {
    algorithm: HashAlgorithm,
    state: Option<HashInner>,
    last_digest: Vec<u8>,
}

struct MacPayload {
    algorithm: HashAlgorithm,
    user_key: Vec<u8>,
    state: Option<crate::mac::Hmac>,
    last_mac: Vec<u8>,
}

impl Drop for MacPayload {
    fn drop(&mut self) {
        self.user_key.zeroize();
    }
}

enum ContextPayload {
    Conventional(ConventionalPayload),
    PublicKey(PublicKeyPayload),
    Hash(HashPayload),
    Mac(MacPayload),
}

/// The uniform context object described in spec.md §3: a label, flags,
/// error attribution, optional device handles, and exactly one live
/// variant payload.
pub struct CryptoContext {
    label: String,
    flags: ContextFlags,
    error_locus: Option<ErrorLocus>,
    error_type: Option<CryptoError>,
    owner_handle: Option<u64>,
    object_handle: Option<u64>,
    payload: ContextPayload,
}

impl CryptoContext {
    fn new(payload: ContextPayload, label: &str) -> CryptoResult<Self> {
        if label.len() > MAX_LABEL_BYTES {
            return Err(CryptoError::bad_data());
        }
        Ok(Self {
            label: label.to_string(),
            flags: ContextFlags::empty(),
            error_locus: None,
            error_type: None,
            owner_handle: None,
            object_handle: None,
            payload,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    pub fn last_error(&self) -> Option<(ErrorLocus, &CryptoError)> {
        match (&self.error_locus, &self.error_type) {
            (Some(locus), Some(err)) => Some((*locus, err)),
            _ => None,
        }
    }

    fn record_error(&mut self, locus: ErrorLocus, err: CryptoError) -> CryptoError {
        self.error_locus = Some(locus);
        self.error_type = Some(err.clone());
        err
    }

    pub fn set_device(&mut self, owner: u64, object: u64) {
        self.owner_handle = Some(owner);
        self.object_handle = Some(object);
        self.flags.insert(ContextFlags::DUMMY);
    }

    // ---- Conventional ----

    /// Creates a conventional-cipher context. Per spec.md §4.1, the
    /// default mode is CBC if available, else CFB, else OFB, else ECB;
    /// `preferred_modes` is the capability's supported-mode list in
    /// that preference order already applied by the caller, or a
    /// caller can force a specific mode via `mode`.
    pub fn new_aes(mode: Mode, label: &str) -> CryptoResult<Self> {
        Self::new(
            ContextPayload::Conventional(ConventionalPayload {
                mode,
                user_key: Vec::new(),
                cipher: None,
                mode_state: None,
            }),
            label,
        )
    }

    /// Picks the default mode per spec.md §4.1 given a capability's
    /// supported-mode set.
    pub fn default_mode(supported: &[Mode]) -> Option<Mode> {
        [Mode::Cbc, Mode::Cfb, Mode::Ofb, Mode::Ecb]
            .into_iter()
            .find(|m| supported.contains(m))
    }

    pub fn set_key(&mut self, key: &[u8]) -> CryptoResult<()> {
        match &mut self.payload {
            ContextPayload::Conventional(c) => {
                let cipher = AesKey::new(key).ok_or_else(CryptoError::bad_data)?;
                c.user_key = key.to_vec();
                c.cipher = Some(ConventionalCipher::Aes(cipher));
                self.flags.insert(ContextFlags::KEY_SET);
                Ok(())
            }
            ContextPayload::Mac(m) => {
                m.user_key = key.to_vec();
                m.state = Some(crate::mac::Hmac::new(m.algorithm, key));
                self.flags.insert(ContextFlags::KEY_SET);
                Ok(())
            }
            _ => Err(self.record_error(ErrorLocus::Key, CryptoError::not_avail())),
        }
    }

    pub fn set_iv(&mut self, iv: &[u8]) -> CryptoResult<()> {
        match &mut self.payload {
            ContextPayload::Conventional(c) => {
                if iv.len() != crate::algorithms::aes::BLOCK_SIZE {
                    return Err(self.record_error(ErrorLocus::Iv, CryptoError::bad_data()));
                }
                c.mode_state = Some(ModeState::new(c.mode, iv));
                self.flags.insert(ContextFlags::IV_SET);
                Ok(())
            }
            _ => Err(self.record_error(ErrorLocus::Iv, CryptoError::not_avail())),
        }
    }

    fn require_key(&self) -> CryptoResult<()> {
        if self.flags.contains(ContextFlags::KEY_SET) {
            Ok(())
        } else {
            Err(CryptoError::not_inited())
        }
    }

    /// IV is required for CBC/CFB/OFB of non-stream ciphers, per
    /// spec.md §3's invariant list; ECB needs none.
    fn require_iv_if_needed(&self, mode: Mode) -> CryptoResult<()> {
        if mode == Mode::Ecb || self.flags.contains(ContextFlags::IV_SET) {
            Ok(())
        } else {
            Err(CryptoError::not_inited())
        }
    }

    pub fn encrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        self.require_key()?;
        match &mut self.payload {
            ContextPayload::Conventional(c) => {
                self.require_iv_if_needed_inner(c.mode)?;
                let cipher = c.cipher.as_ref().ok_or_else(CryptoError::not_inited)?;
                let state = c.mode_state.as_mut().ok_or_else(CryptoError::not_inited)?;
                modes::encrypt(cipher.as_block_cipher(), state, data)
            }
            _ => Err(CryptoError::not_avail()),
        }
    }

    pub fn decrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        self.require_key()?;
        match &mut self.payload {
            ContextPayload::Conventional(c) => {
                self.require_iv_if_needed_inner(c.mode)?;
                let cipher = c.cipher.as_ref().ok_or_else(CryptoError::not_inited)?;
                let state = c.mode_state.as_mut().ok_or_else(CryptoError::not_inited)?;
                modes::decrypt(cipher.as_block_cipher(), state, data)
            }
            _ => Err(CryptoError::not_avail()),
        }
    }

    fn require_iv_if_needed_inner(&self, mode: Mode) -> CryptoResult<()> {
        self.require_iv_if_needed(mode)
    }

    // ---- Hash ----

    pub fn new_hash(algorithm: HashAlgorithm, label: &str) -> CryptoResult<Self> {
        let mut ctx = Self::new(
            ContextPayload::Hash(HashPayload {
                algorithm,
                state: None,
                last_digest: Vec::new(),
            }),
            label,
        )?;
        ctx.hash_init()?;
        Ok(ctx)
    }

    fn hash_init(&mut self) -> CryptoResult<()> {
        match &mut self.payload {
            ContextPayload::Hash(h) => {
                h.state = Some(match h.algorithm {
                    HashAlgorithm::Md5 => HashInner::Md5(Md5::new()),
                    HashAlgorithm::Sha1 => HashInner::Sha1(Sha1::new()),
                    HashAlgorithm::Sha256 => HashInner::Sha256(Sha256::new()),
                });
                self.flags.insert(ContextFlags::HASH_INITED);
                Ok(())
            }
            _ => Err(CryptoError::not_avail()),
        }
    }

    /// Feeds data into the running hash. Per spec.md §3's `HashDone ⇒
    /// HashInited` invariant, once `HashDone` is set no further updates
    /// are possible.
    pub fn hash_update(&mut self, data: &[u8]) -> CryptoResult<()> {
        if self.flags.contains(ContextFlags::HASH_DONE) {
            return Err(CryptoError::not_avail());
        }
        match &mut self.payload {
            ContextPayload::Hash(h) => {
                match h.state.as_mut().ok_or_else(CryptoError::not_inited)? {
                    HashInner::Md5(s) => s.update(data),
                    HashInner::Sha1(s) => s.update(data),
                    HashInner::Sha256(s) => s.update(data),
                }
                Ok(())
            }
            ContextPayload::Mac(m) => {
                m.state
                    .as_mut()
                    .ok_or_else(CryptoError::not_inited)?
                    .update(data);
                Ok(())
            }
            _ => Err(CryptoError::not_avail()),
        }
    }

    pub fn hash_finalize(&mut self) -> CryptoResult<Vec<u8>> {
        if self.flags.contains(ContextFlags::HASH_DONE) {
            return Err(CryptoError::not_avail());
        }
        let digest = match &mut self.payload {
            ContextPayload::Hash(h) => {
                let state = h.state.take().ok_or_else(CryptoError::not_inited)?;
                let digest = match state {
                    HashInner::Md5(s) => s.finalize().to_vec(),
                    HashInner::Sha1(s) => s.finalize().to_vec(),
                    HashInner::Sha256(s) => s.finalize().to_vec(),
                };
                h.last_digest = digest.clone();
                digest
            }
            ContextPayload::Mac(m) => {
                let state = m.state.take().ok_or_else(CryptoError::not_inited)?;
                let tag = state.finalize();
                m.last_mac = tag.clone();
                tag
            }
            _ => return Err(CryptoError::not_avail()),
        };
        self.flags.insert(ContextFlags::HASH_DONE);
        Ok(digest)
    }

    // ---- MAC ----

    pub fn new_mac(algorithm: HashAlgorithm, label: &str) -> CryptoResult<Self> {
        Self::new(
            ContextPayload::Mac(MacPayload {
                algorithm,
                user_key: Vec::new(),
                state: None,
                last_mac: Vec::new(),
            }),
            label,
        )
    }

    // ---- Public key ----

    pub fn new_rsa(key: RsaKey, label: &str) -> CryptoResult<Self> {
        let key_size_bits = key.key_size_bits();
        let is_private = key.is_private();
        let mut ctx = Self::new(
            ContextPayload::PublicKey(PublicKeyPayload {
                key_size_bits,
                key_id: Vec::new(),
                creation_time: None,
                inner: PkcPayload::Rsa(key),
            }),
            label,
        )?;
        ctx.flags.insert(ContextFlags::KEY_SET);
        ctx.flags.insert(if is_private {
            ContextFlags::IS_PRIVATE_KEY
        } else {
            ContextFlags::IS_PUBLIC_KEY
        });
        Ok(ctx)
    }

    pub fn enable_side_channel_protection(&mut self) -> CryptoResult<()> {
        match &mut self.payload {
            ContextPayload::PublicKey(p) => match &mut p.inner {
                PkcPayload::Rsa(key) => {
                    key.enable_blinding(&mut rand::thread_rng())?;
                    self.flags.insert(ContextFlags::SIDE_CHANNEL_PROTECTION);
                    Ok(())
                }
                _ => Err(CryptoError::not_avail()),
            },
            _ => Err(CryptoError::not_avail()),
        }
    }

    pub fn rsa_public_op(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        self.require_key()?;
        match &self.payload {
            ContextPayload::PublicKey(p) => match &p.inner {
                PkcPayload::Rsa(key) => key.public_op(input),
                _ => Err(CryptoError::not_avail()),
            },
            _ => Err(CryptoError::not_avail()),
        }
    }

    pub fn rsa_private_op(&mut self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        self.require_key()?;
        match &mut self.payload {
            ContextPayload::PublicKey(p) => match &mut p.inner {
                PkcPayload::Rsa(key) => key.private_op(input),
                _ => Err(CryptoError::not_avail()),
            },
            _ => Err(CryptoError::not_avail()),
        }
    }

    pub fn new_dsa(params: DlpParams, x: Option<BigUint>, y: BigUint, label: &str) -> CryptoResult<Self> {
        let key_size_bits = params.p.bits() as usize;
        let is_private = x.is_some();
        let mut ctx = Self::new(
            ContextPayload::PublicKey(PublicKeyPayload {
                key_size_bits,
                key_id: Vec::new(),
                creation_time: None,
                inner: PkcPayload::Dsa { params, x, y },
            }),
            label,
        )?;
        ctx.flags.insert(ContextFlags::KEY_SET);
        ctx.flags.insert(if is_private {
            ContextFlags::IS_PRIVATE_KEY
        } else {
            ContextFlags::IS_PUBLIC_KEY
        });
        Ok(ctx)
    }

    pub fn dsa_sign(&self, hash: &[u8]) -> CryptoResult<DsaSignature> {
        self.require_key()?;
        match &self.payload {
            ContextPayload::PublicKey(p) => match &p.inner {
                PkcPayload::Dsa {
                    params,
                    x: Some(x),
                    ..
                } => dsa::sign(params, x, hash, &mut rand::thread_rng()),
                PkcPayload::Dsa { x: None, .. } => Err(CryptoError::wrong_key()),
                _ => Err(CryptoError::not_avail()),
            },
            _ => Err(CryptoError::not_avail()),
        }
    }

    pub fn dsa_verify(&self, hash: &[u8], signature: &DsaSignature) -> CryptoResult<bool> {
        self.require_key()?;
        match &self.payload {
            ContextPayload::PublicKey(p) => match &p.inner {
                PkcPayload::Dsa { params, y, .. } => dsa::verify(params, y, hash, signature),
                _ => Err(CryptoError::not_avail()),
            },
            _ => Err(CryptoError::not_avail()),
        }
    }

    // DH and Elgamal contexts are internal-only per spec.md §4.1 ("DLP
    // algorithms" get no externally invocable action permissions);
    // these constructors and operations exist for a host's signing /
    // key-agreement layer to call directly, not for general dispatch.

    pub fn new_dh(params: DhParams, keypair: Option<DhKeyPair>, label: &str) -> CryptoResult<Self> {
        let key_size_bits = params.p.bits() as usize;
        let mut ctx = Self::new(
            ContextPayload::PublicKey(PublicKeyPayload {
                key_size_bits,
                key_id: Vec::new(),
                creation_time: None,
                inner: PkcPayload::Dh { params, keypair },
            }),
            label,
        )?;
        ctx.flags.insert(ContextFlags::KEY_SET);
        // DH is considered IsPrivateKey internally per spec.md §3.
        ctx.flags.insert(ContextFlags::IS_PRIVATE_KEY);
        Ok(ctx)
    }

    pub fn dh_derive_shared_secret(&self, their_y: &BigUint) -> CryptoResult<BigUint> {
        self.require_key()?;
        match &self.payload {
            ContextPayload::PublicKey(p) => match &p.inner {
                PkcPayload::Dh {
                    params,
                    keypair: Some(kp),
                } => Ok(crate::dh::derive_shared_secret(params, their_y, &kp.x)),
                PkcPayload::Dh { keypair: None, .. } => Err(CryptoError::not_inited()),
                _ => Err(CryptoError::not_avail()),
            },
            _ => Err(CryptoError::not_avail()),
        }
    }

    pub fn new_elgamal(
        params: DlpParams,
        x: Option<BigUint>,
        y: BigUint,
        label: &str,
    ) -> CryptoResult<Self> {
        let key_size_bits = params.p.bits() as usize;
        let is_private = x.is_some();
        let mut ctx = Self::new(
            ContextPayload::PublicKey(PublicKeyPayload {
                key_size_bits,
                key_id: Vec::new(),
                creation_time: None,
                inner: PkcPayload::Elgamal { params, x, y },
            }),
            label,
        )?;
        ctx.flags.insert(ContextFlags::KEY_SET);
        ctx.flags.insert(if is_private {
            ContextFlags::IS_PRIVATE_KEY
        } else {
            ContextFlags::IS_PUBLIC_KEY
        });
        Ok(ctx)
    }

    pub fn elgamal_encrypt(&self, message: &BigUint) -> CryptoResult<ElgamalCiphertext> {
        self.require_key()?;
        match &self.payload {
            ContextPayload::PublicKey(p) => match &p.inner {
                PkcPayload::Elgamal { params, y, .. } => {
                    elgamal::encrypt(params, y, message, &mut rand::thread_rng())
                }
                _ => Err(CryptoError::not_avail()),
            },
            _ => Err(CryptoError::not_avail()),
        }
    }

    pub fn elgamal_decrypt(&self, ciphertext: &ElgamalCiphertext) -> CryptoResult<BigUint> {
        self.require_key()?;
        match &self.payload {
            ContextPayload::PublicKey(p) => match &p.inner {
                PkcPayload::Elgamal {
                    params,
                    x: Some(x),
                    ..
                } => elgamal::decrypt(params, x, ciphertext),
                PkcPayload::Elgamal { x: None, .. } => Err(CryptoError::wrong_key()),
                _ => Err(CryptoError::not_avail()),
            },
            _ => Err(CryptoError::not_avail()),
        }
    }

    /// A context backed by an external device: no in-process key
    /// material, operations always fail `NotAvail` here (the host
    /// routes them to the device out of band).
    pub fn new_device(owner: u64, object: u64, label: &str) -> CryptoResult<Self> {
        let mut ctx = Self::new(
            ContextPayload::PublicKey(PublicKeyPayload {
                key_size_bits: 0,
                key_id: Vec::new(),
                creation_time: None,
                inner: PkcPayload::Device,
            }),
            label,
        )?;
        ctx.set_device(owner, object);
        Ok(ctx)
    }
}

/// A Montgomery-backed DLP or RSA modulus shared across a key's
/// lifetime; re-exported so hosts assembling their own PKC payloads
/// don't need to reach into `bignum` directly.
pub type SharedModulus = MontgomeryContext;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::Mode;

    #[test]
    fn aes_cbc_context_round_trips() {
        let key = [0x2bu8; 16];
        let iv = [0u8; 16];
        let mut enc = CryptoContext::new_aes(Mode::Cbc, "enc").unwrap();
        enc.set_key(&key).unwrap();
        enc.set_iv(&iv).unwrap();
        let mut data = b"0123456789ABCDEF".to_vec();
        let original = data.clone();
        enc.encrypt(&mut data).unwrap();
        assert_ne!(data, original);

        let mut dec = CryptoContext::new_aes(Mode::Cbc, "dec").unwrap();
        dec.set_key(&key).unwrap();
        dec.set_iv(&iv).unwrap();
        dec.decrypt(&mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn encrypt_without_key_is_not_inited() {
        let mut ctx = CryptoContext::new_aes(Mode::Ecb, "x").unwrap();
        let mut data = vec![0u8; 16];
        assert_eq!(
            ctx.encrypt(&mut data).unwrap_err().kind(),
            &crate::error::CryptoErrorKind::NotInited
        );
    }

    #[test]
    fn set_iv_rejects_wrong_length() {
        let mut ctx = CryptoContext::new_aes(Mode::Cbc, "x").unwrap();
        ctx.set_key(&[0u8; 16]).unwrap();
        assert_eq!(
            ctx.set_iv(&[0u8; 4]).unwrap_err().kind(),
            &crate::error::CryptoErrorKind::BadData
        );
        assert!(!ctx.flags().contains(ContextFlags::IV_SET));
    }

    #[test]
    fn cbc_without_iv_is_not_inited() {
        let mut ctx = CryptoContext::new_aes(Mode::Cbc, "x").unwrap();
        ctx.set_key(&[0u8; 16]).unwrap();
        let mut data = vec![0u8; 16];
        assert_eq!(
            ctx.encrypt(&mut data).unwrap_err().kind(),
            &crate::error::CryptoErrorKind::NotInited
        );
    }

    #[test]
    fn hash_context_matches_free_function() {
        let mut ctx = CryptoContext::new_hash(HashAlgorithm::Sha256, "h").unwrap();
        ctx.hash_update(b"abc").unwrap();
        let digest = ctx.hash_finalize().unwrap();
        assert_eq!(digest, crate::algorithms::sha256::digest(b"abc").to_vec());
    }

    #[test]
    fn hash_done_rejects_further_updates() {
        let mut ctx = CryptoContext::new_hash(HashAlgorithm::Sha1, "h").unwrap();
        ctx.hash_update(b"abc").unwrap();
        ctx.hash_finalize().unwrap();
        assert!(ctx.hash_update(b"more").is_err());
    }

    #[test]
    fn mac_context_matches_free_function() {
        let mut ctx = CryptoContext::new_mac(HashAlgorithm::Sha256, "m").unwrap();
        ctx.set_key(b"secret-key").unwrap();
        ctx.hash_update(b"message").unwrap();
        let tag = ctx.hash_finalize().unwrap();
        assert_eq!(tag, crate::mac::compute(HashAlgorithm::Sha256, b"secret-key", b"message"));
    }

    #[test]
    fn rsa_context_round_trips_via_crt() {
        let key = crate::rsa::self_test_key();
        let mut payload = vec![0u8; 64];
        payload[1..6].copy_from_slice(b"abcde");
        let mut ctx = CryptoContext::new_rsa(key, "rsa").unwrap();
        let ciphertext = ctx.rsa_public_op(&payload).unwrap();
        let recovered = ctx.rsa_private_op(&ciphertext).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn device_context_operations_are_not_available() {
        let ctx = CryptoContext::new_device(7, 42, "card").unwrap();
        assert!(ctx.flags().contains(ContextFlags::DUMMY));
        assert!(ctx.rsa_public_op(&[0u8; 8]).is_err());
    }

    #[test]
    fn label_over_max_length_is_rejected() {
        let long_label = "x".repeat(MAX_LABEL_BYTES + 1);
        assert!(CryptoContext::new_aes(Mode::Ecb, &long_label).is_err());
    }
}
