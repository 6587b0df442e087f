//! RSA: key generation, CRT private-key operation with blinding, and
//! public-key operation. Grounded on `cryptlib/context/ctx_rsa.c`.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;
use zeroize::Zeroize;

use crate::bignum::{mod_inverse, random_bits, MontgomeryContext};
use crate::error::{CryptoError, CryptoResult};
use crate::primality::{generate_probable_prime, CancellationToken, SmallPrimeTable};

/// Default public exponent, F4 = 65537.
pub const DEFAULT_PUBLIC_EXPONENT: u32 = 65537;

/// Minimum separation between p and q, in bits, per spec.md §4.3 step 1.
const MIN_PRIME_SEPARATION_BITS: u64 = 128;

/// An RSA key pair: public `(n, e)` plus, when present, the CRT private
/// components `(d, p, q, u, e1, e2)`.
pub struct RsaKey {
    pub n: BigUint,
    pub e: BigUint,
    pub d: Option<BigUint>,
    pub p: Option<BigUint>,
    pub q: Option<BigUint>,
    pub u: Option<BigUint>,
    pub e1: Option<BigUint>,
    pub e2: Option<BigUint>,
    mont_n: MontgomeryContext,
    mont_p: Option<MontgomeryContext>,
    mont_q: Option<MontgomeryContext>,
    /// Blinding state `(k, k^-1 mod n)`, present when side-channel
    /// protection is enabled. Advanced after each private-key operation
    /// per spec.md §4.3.
    blinding: Option<(BigUint, BigUint)>,
}

impl Drop for RsaKey {
    fn drop(&mut self) {
        if let Some(d) = self.d.take() {
            let mut bytes = d.to_bytes_le();
            bytes.zeroize();
        }
    }
}

impl RsaKey {
    pub fn key_size_bits(&self) -> usize {
        self.n.bits() as usize
    }

    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Enables blinding, seeding `(k, k^-1)` from a fresh random value
    /// coprime to n. No-op if already enabled.
    pub fn enable_blinding<R: RngCore>(&mut self, rng: &mut R) -> CryptoResult<()> {
        if self.blinding.is_some() {
            return Ok(());
        }
        let bits = self.key_size_bits();
        loop {
            let k = random_bits(rng, bits, true) % &self.n;
            if k.is_zero() {
                continue;
            }
            if let Some(k_inv) = mod_inverse(&k, &self.n) {
                self.blinding = Some((k, k_inv));
                return Ok(());
            }
        }
    }

    /// Public-key operation: `C = M^e mod n`.
    pub fn public_op(&self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        self.check_input_length(input, false)?;
        let m = BigUint::from_bytes_be(input);
        let c = self.mont_n.mod_exp(&m, &self.e);
        Ok(pad_to_key_size(&c, self.key_bytes()))
    }

    /// Private-key operation via CRT, with optional blinding when
    /// `enable_blinding` has been called.
    pub fn private_op(&mut self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        self.check_input_length(input, true)?;
        let (p, q, u, e1, e2) = match (&self.p, &self.q, &self.u, &self.e1, &self.e2) {
            (Some(p), Some(q), Some(u), Some(e1), Some(e2)) => {
                (p.clone(), q.clone(), u.clone(), e1.clone(), e2.clone())
            }
            _ => return Err(CryptoError::not_avail()),
        };
        let mont_p = self.mont_p.as_ref().ok_or_else(CryptoError::not_inited)?;
        let mont_q = self.mont_q.as_ref().ok_or_else(CryptoError::not_inited)?;

        let c = BigUint::from_bytes_be(input);

        let (blinded_c, blind_factor) = if let Some((k, _)) = &self.blinding {
            let ke = self.mont_n.mod_exp(k, &self.e);
            ((&ke * &c) % &self.n, true)
        } else {
            (c, false)
        };

        let m = crt_decrypt(&blinded_c, &p, &q, &u, &e1, &e2, mont_p, mont_q);

        let m = if blind_factor {
            let (k, k_inv) = self.blinding.as_ref().unwrap();
            let unblinded = (&m * k_inv) % &self.n;
            let k2 = (k * k) % &self.n;
            let k_inv2 = mod_inverse(&k2, &self.n).ok_or_else(CryptoError::failed)?;
            self.blinding = Some((k2, k_inv2));
            unblinded
        } else {
            m
        };

        Ok(pad_to_key_size(&m, self.key_bytes()))
    }

    fn key_bytes(&self) -> usize {
        (self.n.bits() as usize + 7) / 8
    }

    /// RSA encrypt/decrypt require a buffer of length exactly `keyBytes`.
    /// To reject suspiciously short data quantities, find the first
    /// non-zero byte at index `i`; the number of significant bytes
    /// `keyBytes - i` must be at least 56. Private-key operations
    /// additionally accept the distinguished length 36 (SSL-style
    /// MD5+SHA-1 raw signatures) as an exception to both checks, kept
    /// as the source carries it (see Open Question on its intent).
    fn check_input_length(&self, input: &[u8], allow_ssl_36: bool) -> CryptoResult<()> {
        let key_bytes = self.key_bytes();
        if allow_ssl_36 && input.len() == 36 {
            return Ok(());
        }
        if input.len() != key_bytes {
            return Err(CryptoError::bad_data());
        }
        let first_nonzero = input.iter().position(|&b| b != 0).unwrap_or(key_bytes);
        let significant = key_bytes - first_nonzero;
        let exempt = allow_ssl_36 && significant == 36;
        if significant < 56 && !exempt {
            return Err(CryptoError::bad_data());
        }
        Ok(())
    }
}

fn pad_to_key_size(value: &BigUint, key_bytes: usize) -> Vec<u8> {
    let raw = value.to_bytes_be();
    let mut out = vec![0u8; key_bytes];
    let offset = key_bytes.saturating_sub(raw.len());
    out[offset..].copy_from_slice(&raw[raw.len().saturating_sub(key_bytes)..]);
    out
}

/// `p2 = C^e1 mod p; q2 = C^e2 mod q; p2 -= q2 (mod p, non-negative);
/// M = ((p2 * u) mod p) * q + q2`, per spec.md §4.3.
fn crt_decrypt(
    c: &BigUint,
    p: &BigUint,
    q: &BigUint,
    u: &BigUint,
    e1: &BigUint,
    e2: &BigUint,
    mont_p: &MontgomeryContext,
    mont_q: &MontgomeryContext,
) -> BigUint {
    let c_mod_p = c % p;
    let c_mod_q = c % q;
    let mut p2 = mont_p.mod_exp(&c_mod_p, e1);
    let q2 = mont_q.mod_exp(&c_mod_q, e2);

    while p2 < q2 {
        p2 += p;
    }
    p2 -= &q2;

    ((p2 * u) % p) * q + q2
}

/// Generates an RSA key pair of (approximately) `bits` total modulus
/// size. Follows spec.md §4.3: independent p, q probable primes each
/// roughly half the target size, `e = 65537` fixed, rejecting any
/// candidate with `gcd(prime-1, e) != 1` during the search itself.
pub fn generate_key<R: RngCore>(
    rng: &mut R,
    bits: usize,
    table: &SmallPrimeTable,
    cancel: Option<&CancellationToken>,
) -> CryptoResult<RsaKey> {
    let e = BigUint::from(DEFAULT_PUBLIC_EXPONENT);
    let p_bits = bits / 2;
    let q_bits = bits - p_bits;

    let mut p = generate_probable_prime(rng, p_bits, table, cancel, |candidate| {
        let minus_one = candidate - BigUint::one();
        (&minus_one % &e).is_zero()
    })?;
    let mut q;
    loop {
        q = generate_probable_prime(rng, q_bits, table, cancel, |candidate| {
            let minus_one = candidate - BigUint::one();
            (&minus_one % &e).is_zero()
        })?;
        let diff = if p > q { &p - &q } else { &q - &p };
        if diff.bits() as u64 >= MIN_PRIME_SEPARATION_BITS {
            break;
        }
    }

    // Canonicalise p > q.
    if p < q {
        std::mem::swap(&mut p, &mut q);
    }

    let p_minus_one = &p - BigUint::one();
    let q_minus_one = &q - BigUint::one();
    let lambda = lcm(&p_minus_one, &q_minus_one);
    let d = mod_inverse(&e, &lambda).ok_or_else(CryptoError::failed)?;
    let e1 = &d % &p_minus_one;
    let e2 = &d % &q_minus_one;
    let u = mod_inverse(&q, &p).ok_or_else(CryptoError::failed)?;
    let n = &p * &q;

    let mont_n = MontgomeryContext::new(n.clone());
    let mont_p = MontgomeryContext::new(p.clone());
    let mont_q = MontgomeryContext::new(q.clone());

    Ok(RsaKey {
        n,
        e,
        d: Some(d),
        p: Some(p),
        q: Some(q),
        u: Some(u),
        e1: Some(e1),
        e2: Some(e2),
        mont_n,
        mont_p: Some(mont_p),
        mont_q: Some(mont_q),
        blinding: None,
    })
}

fn lcm(a: &BigUint, b: &BigUint) -> BigUint {
    (a / a.gcd(b)) * b
}

/// Builds an `RsaKey` from known components (test vectors, imported
/// keys). Does not verify consistency; callers run
/// [`pairwise_consistency`] after construction.
pub fn from_components(
    n: BigUint,
    e: BigUint,
    d: Option<BigUint>,
    p: Option<BigUint>,
    q: Option<BigUint>,
    u: Option<BigUint>,
    e1: Option<BigUint>,
    e2: Option<BigUint>,
) -> RsaKey {
    let mont_n = MontgomeryContext::new(n.clone());
    let mont_p = p.clone().map(MontgomeryContext::new);
    let mont_q = q.clone().map(MontgomeryContext::new);
    RsaKey {
        n,
        e,
        d,
        p,
        q,
        u,
        e1,
        e2,
        mont_n,
        mont_p,
        mont_q,
        blinding: None,
    }
}

/// Pairwise consistency test: encrypt a fixed short payload with the
/// public key, decrypt with the private key, compare. Per spec.md §4.3,
/// run after load or generation; on mismatch the context is invalidated.
pub fn pairwise_consistency(key: &mut RsaKey) -> CryptoResult<bool> {
    let key_bytes = key.key_bytes();
    if key_bytes < 8 {
        return Err(CryptoError::bad_data());
    }
    let mut payload = vec![0u8; key_bytes];
    payload[1..6].copy_from_slice(b"abcde");

    let ciphertext = key.public_op(&payload)?;
    let recovered = key.private_op(&ciphertext)?;
    Ok(recovered == payload)
}

fn hex_to_biguint(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).unwrap()
}

/// The 512-bit test key from spec.md §4.3 / S3 (n, e=0x11, d, p, q, u, e1,
/// e2), reused by both the crate's own unit tests and the capability
/// registry's self-test (S3).
pub fn self_test_key() -> RsaKey {
    let n = hex_to_biguint(concat!(
        "E1954117B4CBDCD0CB9B11199CED046FBD702D5C8A32FF1622573",
        "03BD4599C01F0A370A16C16ACCC8CADB0A0AFC7CC494FD95D321C2A",
        "E84E15E1266CC4B894E1"
    ));
    let e = BigUint::from(0x11u32);
    let d = hex_to_biguint(concat!(
        "13E785BE53B7A28AE4C9EAEBABF6CBAF81A80400A2C843AF2125CF8",
        "CCEF8D90F10784C1A265D9018799042836EAE3E200B0C5B6B8E31E5",
        "CFD6E0BB41C1B82E17"
    ));
    let p = hex_to_biguint("EDE40290A4A4980D45A2F39609ED7B40CDF621CCC01F8309563797FB055B87B7");
    let q = hex_to_biguint("F2C164E869F85E548FFD208E6A2390F2AF572F4D10808E113C6144332BE05827");
    let u = hex_to_biguint("68450064329D096E0AD3F38AFE158C79AD843505192C1951AB83C7E85CACAD7A");
    let e1 = hex_to_biguint("99EDE38AC4E2F8F987697070248A9B0BD09033FCF4C9188D9223F8EDB82C2AA3");
    let e2 = hex_to_biguint("B9A2F2CFD890C09B04B2824EC9A2BA22FE8DF6FEB244306788869D908AF6D9FF");

    from_components(n, e, Some(d), Some(p), Some(q), Some(u), Some(e1), Some(e2))
}

/// Known-answer + pairwise-consistency self-test for the capability
/// registry (S3): round-trips the fixed CRT buffer layout through the
/// 512-bit test key, with and without blinding.
pub fn self_test() -> CryptoResult<()> {
    let mut key = self_test_key();
    if !pairwise_consistency(&mut key)? {
        return Err(CryptoError::failed());
    }
    key.enable_blinding(&mut rand::thread_rng())?;
    if !pairwise_consistency(&mut key)? {
        return Err(CryptoError::failed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaKey {
        self_test_key()
    }

    #[test]
    fn crt_round_trip_without_blinding() {
        let mut key = test_key();
        // Matches `ctx_rsa.c`'s pairwiseConsistencyTest buffer layout: one
        // leading zero byte, then "abcde", then zero padding to keyBytes.
        let mut payload = [0u8; 64];
        payload[1..6].copy_from_slice(b"abcde");

        let ciphertext = key.public_op(&payload).unwrap();
        let recovered = key.private_op(&ciphertext).unwrap();
        assert_eq!(&recovered[..], &payload[..]);
    }

    #[test]
    fn crt_round_trip_with_blinding() {
        let mut key = test_key();
        key.enable_blinding(&mut rand::thread_rng()).unwrap();
        let mut payload = [0u8; 64];
        payload[1..6].copy_from_slice(b"abcde");

        let ciphertext = key.public_op(&payload).unwrap();
        let recovered = key.private_op(&ciphertext).unwrap();
        assert_eq!(&recovered[..], &payload[..]);

        // A second operation must still round-trip after blinding advances.
        let ciphertext2 = key.public_op(&payload).unwrap();
        let recovered2 = key.private_op(&ciphertext2).unwrap();
        assert_eq!(&recovered2[..], &payload[..]);
    }

    #[test]
    fn rejects_wrong_length_input() {
        let key = test_key();
        let payload = vec![0u8; 10];
        assert!(key.public_op(&payload).is_err());
    }
}
