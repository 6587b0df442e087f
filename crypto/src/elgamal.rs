//! Elgamal encryption/decryption, grounded on `cryptlib/context/ctx_elg.c`.
//!
//! Signing is intentionally not ported: the original guards it behind
//! `#if 0` and spec.md §9 leaves it an open question; this module
//! resolves that by omission (recorded in DESIGN.md).

use num_bigint::BigUint;
use num_traits::One;
use rand::RngCore;

use crate::bignum::mod_inverse;
use crate::dlp::{generate_private_value, DlpParams};
use crate::error::{CryptoError, CryptoResult};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ciphertext {
    pub c1: BigUint,
    pub c2: BigUint,
}

/// Encrypts `message` under public value `y`, drawing a fresh ephemeral
/// key per call. `message` must be strictly less than `p`.
pub fn encrypt<R: RngCore>(
    params: &DlpParams,
    y: &BigUint,
    message: &BigUint,
    rng: &mut R,
) -> CryptoResult<Ciphertext> {
    let k = generate_private_value(rng, params.p.bits() as usize, Some(&params.q));
    encrypt_with_k(params, y, message, &k)
}

/// Encrypts with an explicitly supplied ephemeral `k`; exists so
/// self-test vectors can reproduce a known ciphertext deterministically.
pub fn encrypt_with_k(
    params: &DlpParams,
    y: &BigUint,
    message: &BigUint,
    k: &BigUint,
) -> CryptoResult<Ciphertext> {
    if message >= &params.p {
        return Err(CryptoError::bad_data());
    }
    let c1 = params.mont_p.mod_exp(&params.g, k);
    let shared = params.mont_p.mod_exp(y, k);
    let c2 = (message * &shared) % &params.p;
    Ok(Ciphertext { c1, c2 })
}

/// Recovers the message as `c2 * (c1^x)^-1 mod p`.
pub fn decrypt(params: &DlpParams, x: &BigUint, ciphertext: &Ciphertext) -> CryptoResult<BigUint> {
    let shared = params.mont_p.mod_exp(&ciphertext.c1, x);
    let shared_inv = mod_inverse(&shared, &params.p).ok_or_else(CryptoError::failed)?;
    Ok((&ciphertext.c2 * &shared_inv) % &params.p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bignum::MontgomeryContext;

    /// Same toy order-11 subgroup of `Z_23^*` used by the DH tests.
    fn toy_params() -> (DlpParams, BigUint, BigUint) {
        let p = BigUint::from(23u32);
        let q = BigUint::from(11u32);
        let g = BigUint::from(9u32);
        let mont_p = MontgomeryContext::new(p.clone());
        let x = BigUint::from(4u32);
        let y = mont_p.mod_exp(&g, &x);
        (DlpParams { p, q, g, mont_p }, x, y)
    }

    #[test]
    fn round_trip_with_fixed_k() {
        let (params, x, y) = toy_params();
        let message = BigUint::from(7u32);
        let k = BigUint::from(3u32);
        let ct = encrypt_with_k(&params, &y, &message, &k).unwrap();
        let recovered = decrypt(&params, &x, &ct).unwrap();
        assert_eq!(recovered, message);
    }

    #[test]
    fn round_trip_with_random_k() {
        let (params, x, y) = toy_params();
        let mut rng = rand::thread_rng();
        let message = BigUint::from(13u32);
        let ct = encrypt(&params, &y, &message, &mut rng).unwrap();
        let recovered = decrypt(&params, &x, &ct).unwrap();
        assert_eq!(recovered, message);
    }

    #[test]
    fn rejects_message_not_less_than_p() {
        let (params, _x, y) = toy_params();
        let mut rng = rand::thread_rng();
        let message = params.p.clone();
        assert!(encrypt(&params, &y, &message, &mut rng).is_err());
    }

    #[test]
    fn distinct_ephemeral_keys_give_distinct_ciphertexts() {
        let (params, _x, y) = toy_params();
        let message = BigUint::from(7u32);
        let ct1 = encrypt_with_k(&params, &y, &message, &BigUint::from(2u32)).unwrap();
        let ct2 = encrypt_with_k(&params, &y, &message, &BigUint::from(5u32)).unwrap();
        assert_ne!(ct1, ct2);
    }
}
