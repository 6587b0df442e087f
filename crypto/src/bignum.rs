//! Big-integer support: the arbitrary-precision arithmetic every PKC
//! algorithm and the DLP prime generator is built on.
//!
//! The original engine hand-rolls a `BIGNUM`/`BN_CTX`/`BN_MONT_CTX` stack
//! with scratch registers (`tmp1`, `tmp2`, `tmp3`, `dlpTmp1`, ...) reused
//! across calls. Rust's `num-bigint` gives us safe arbitrary-precision
//! integers with its own internally-optimised `modpow`; rather than
//! re-implement Montgomery reduction by hand (a classic source of subtle
//! side-channel and correctness bugs), [`MontgomeryContext`] wraps a
//! modulus once per key the way the original wraps `BN_MONT_CTX_init`
//! once per key, and every mod-exp against it funnels through one place
//! so a future hand-rolled Montgomery ladder can be dropped in without
//! touching call sites.

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;

pub type Bn = BigUint;

/// A modulus with its context of reusable derived values.
///
/// Created once per key (per spec.md §4.1/§9: "Montgomery contexts for
/// n, p, q") and reused for every operation against that key; never
/// reallocated per-call.
#[derive(Clone, Debug)]
pub struct MontgomeryContext {
    modulus: BigUint,
}

impl MontgomeryContext {
    pub fn new(modulus: BigUint) -> Self {
        Self { modulus }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// `base^exp mod modulus`.
    pub fn mod_exp(&self, base: &BigUint, exp: &BigUint) -> BigUint {
        base.modpow(exp, &self.modulus)
    }
}

/// Extended Euclidean algorithm; returns `(g, x, y)` with `a*x + b*y = g`.
fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    if b.is_zero() {
        (a.clone(), BigInt::one(), BigInt::zero())
    } else {
        let (q, r) = a.div_mod_floor(b);
        let (g, x, y) = extended_gcd(b, &r);
        (g, y.clone(), x - q * y)
    }
}

/// Modular multiplicative inverse of `a` mod `m`, if it exists.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let a_i = BigInt::from_biguint(Sign::Plus, a.clone());
    let m_i = BigInt::from_biguint(Sign::Plus, m.clone());
    let (g, x, _) = extended_gcd(&a_i, &m_i);
    if g != BigInt::one() && g != -BigInt::one() {
        return None;
    }
    let m_i_abs = m_i.clone();
    let mut result = x % &m_i_abs;
    if result.sign() == Sign::Minus {
        result += &m_i_abs;
    }
    result.to_biguint()
}

/// `gcd(a, b)`.
pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    a.gcd(b)
}

/// Draws a uniformly random `BigUint` of exactly `bits` bits, with the
/// top bit forced set (so the value has exactly that bit length) and,
/// if `odd` is set, the low bit forced set too. Mirrors
/// `generateBignum()`'s `high`/`low` byte-merge parameters from
/// `cryptlib/libs/lib_kg.c`.
pub fn random_bits<R: RngCore>(rng: &mut R, bits: usize, odd: bool) -> BigUint {
    assert!(bits >= 8);
    let mut value = rng.gen_biguint(bits as u64);
    let top = BigUint::one() << (bits - 1);
    value |= &top;
    if odd {
        value |= BigUint::one();
    }
    // gen_biguint can return a number with fewer significant bits set
    // than requested; the top-bit OR above corrects that, but a value
    // with more than `bits` bits must be masked down.
    let mask = (BigUint::one() << bits) - BigUint::one();
    value & mask | &top
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_inverse_matches_known_answer() {
        // e = 17, (p-1)(q-1) style modulus test vector.
        let a = BigUint::from(17u32);
        let m = BigUint::from(3120u32);
        let inv = mod_inverse(&a, &m).unwrap();
        assert_eq!((&a * &inv) % &m, BigUint::one());
    }

    #[test]
    fn random_bits_has_exact_length() {
        let mut rng = rand::thread_rng();
        let value = random_bits(&mut rng, 256, true);
        assert_eq!(value.bits(), 256);
        assert!(value.bit(0));
    }
}
