//! Diffie-Hellman key agreement, grounded on `cryptlib/libs/lib_dh.c`.
//!
//! Shares the `(p, q, g)` parameter shape and prime-generation machinery
//! with DSA and Elgamal ([`crate::dlp`]). Supports both the FIPS-186
//! style group (`q` known, private values sampled mod `q`) and the
//! PKCS #3 style group (`q` absent, private values sampled directly at
//! `getDLPexpSize(pBits)` bits) per spec.md §4.4's private-value note.

use num_bigint::BigUint;
use rand::RngCore;

use crate::bignum::MontgomeryContext;
use crate::dlp::{find_generator, generate_lim_lee_prime, generate_private_value};
use crate::error::CryptoResult;
use crate::primality::{CancellationToken, SmallPrimeTable};

/// DH domain parameters. `q` is `None` for a PKCS #3-style group: the
/// Lim-Lee construction still needs a real `q` internally to build `p`,
/// but a PKCS #3 group does not expose it, so private values are drawn
/// at the flat `getDLPexpSize(pBits)` width instead of reduced mod `q`.
#[derive(Clone, Debug)]
pub struct DhParams {
    pub p: BigUint,
    pub q: Option<BigUint>,
    pub g: BigUint,
    pub mont_p: MontgomeryContext,
}

#[derive(Clone, Debug)]
pub struct DhKeyPair {
    pub x: BigUint,
    pub y: BigUint,
}

/// Builds a fresh DH group by Lim-Lee prime construction followed by
/// generator search. `expose_q` controls whether the resulting
/// [`DhParams`] keeps `q` (FIPS-186 style) or drops it (PKCS #3 style);
/// either way the same composite-prime machinery is used to build `p`.
pub fn generate_params<R: RngCore>(
    rng: &mut R,
    p_bits: usize,
    q_bits: Option<usize>,
    expose_q: bool,
    table: &SmallPrimeTable,
    cancel: Option<&CancellationToken>,
) -> CryptoResult<DhParams> {
    let (p, q) = generate_lim_lee_prime(rng, p_bits, q_bits, table, cancel)?;
    let mont_p = MontgomeryContext::new(p.clone());
    let g = find_generator(&p, &q, &mont_p);
    Ok(DhParams {
        p,
        q: if expose_q { Some(q) } else { None },
        g,
        mont_p,
    })
}

/// Generates a private/public value pair `(x, y = g^x mod p)` within an
/// existing group.
pub fn generate_keypair<R: RngCore>(rng: &mut R, params: &DhParams) -> DhKeyPair {
    let x = generate_private_value(rng, params.p.bits() as usize, params.q.as_ref());
    let y = params.mont_p.mod_exp(&params.g, &x);
    DhKeyPair { x, y }
}

/// Derives the shared secret `theirY^ourX mod p`. Per P6, two parties
/// sharing `(p, q, g)` who each run this against the other's public
/// value arrive at the same result.
pub fn derive_shared_secret(params: &DhParams, their_y: &BigUint, our_x: &BigUint) -> BigUint {
    params.mont_p.mod_exp(their_y, our_x)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A toy order-11 subgroup of `Z_23^*` (p = 2q+1 with q = 11, g = 9
    /// has order 11): large enough to exercise the shared-secret
    /// symmetry property without paying for real prime generation in a
    /// unit test.
    fn toy_params() -> DhParams {
        let p = BigUint::from(23u32);
        let q = BigUint::from(11u32);
        let g = BigUint::from(9u32);
        let mont_p = MontgomeryContext::new(p.clone());
        DhParams {
            p,
            q: Some(q),
            g,
            mont_p,
        }
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let params = toy_params();
        let x_a = BigUint::from(4u32);
        let x_b = BigUint::from(7u32);
        let y_a = params.mont_p.mod_exp(&params.g, &x_a);
        let y_b = params.mont_p.mod_exp(&params.g, &x_b);

        let shared_a = derive_shared_secret(&params, &y_b, &x_a);
        let shared_b = derive_shared_secret(&params, &y_a, &x_b);
        assert_eq!(shared_a, shared_b);
        assert_eq!(shared_a, BigUint::from(3u32));
    }

    #[test]
    fn private_value_without_q_uses_flat_width() {
        let mut rng = rand::thread_rng();
        let params = DhParams {
            q: None,
            ..toy_params()
        };
        let pair = generate_keypair(&mut rng, &params);
        assert!(pair.x.bits() as usize <= crate::dlp::get_dlp_exp_size(params.p.bits() as usize));
    }
}
