//! Discrete-logarithm-problem parameter generation shared by DSA, DH, and
//! Elgamal: the safe-exponent-size function, Lim-Lee composite-prime
//! construction, generator search, and private/public value generation.
//!
//! Grounded on `cryptlib/libs/lib_kg.c`'s `getDLPexpSize`,
//! `generateDLPublicValues`, `findGeneratorForPQ`, and
//! `generateDLPrivateValue`.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;

use crate::bignum::MontgomeryContext;
use crate::error::{CryptoError, CryptoResult};
use crate::primality::{generate_probable_prime, miller_rabin, no_checks, CancellationToken, SmallPrimeTable};

/// Maximum number of Lim-Lee small-prime factors in `p = 2q * prod(factors) + 1`.
const MAX_NO_FACTORS: usize = 26; // (MAX_PKCSIZE_BITS / 160) + 1 for a 4096-bit ceiling.

/// Maximum size of the Lim-Lee candidate-prime pool before giving up.
const MAX_NO_PRIMES: usize = 128;

/// Safe DLP exponent size for a given prime size in bits, per spec.md
/// §4.4. Piecewise-linear interpolation across the reference table,
/// floored at 160 bits.
pub fn get_dlp_exp_size(prime_bits: usize) -> usize {
    const ANCHORS: &[(usize, usize)] = &[
        (512, 160),
        (1024, 169),
        (1536, 198),
        (2048, 225),
        (3072, 270),
        (4096, 305),
    ];

    if prime_bits <= ANCHORS[0].0 {
        return ANCHORS[0].1;
    }
    if prime_bits >= ANCHORS[ANCHORS.len() - 1].0 {
        let (x0, y0) = ANCHORS[ANCHORS.len() - 2];
        let (x1, y1) = ANCHORS[ANCHORS.len() - 1];
        let slope = (y1 as f64 - y0 as f64) / (x1 as f64 - x0 as f64);
        let value = y1 as f64 + slope * (prime_bits as f64 - x1 as f64);
        return value.round().max(160.0) as usize;
    }
    for w in ANCHORS.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        if prime_bits >= x0 && prime_bits <= x1 {
            let t = (prime_bits - x0) as f64 / (x1 - x0) as f64;
            let value = y0 as f64 + t * (y1 as f64 - y0 as f64);
            return value.round().max(160.0) as usize;
        }
    }
    160
}

/// Shared `(p, q, g)` DLP domain parameters.
#[derive(Clone, Debug)]
pub struct DlpParams {
    pub p: BigUint,
    pub q: BigUint,
    pub g: BigUint,
    pub mont_p: MontgomeryContext,
}

/// Constructs a Lim-Lee composite prime `p = 2q * f_1 * ... * f_n + 1`
/// with `q` itself prime, and returns `(p, q)`. Follows
/// `generateDLPublicValues`: seed a pool of small probable primes, widen
/// the pool by one on exhaustion (capped at [`MAX_NO_PRIMES`]), and
/// enumerate distinct `n`-subsets of the pool until a sieved,
/// Miller-Rabin-confirmed candidate is found.
pub fn generate_lim_lee_prime<R: RngCore>(
    rng: &mut R,
    p_bits: usize,
    q_bits: Option<usize>,
    table: &SmallPrimeTable,
    cancel: Option<&CancellationToken>,
) -> CryptoResult<(BigUint, BigUint)> {
    let safe_exp_bits = get_dlp_exp_size(p_bits);
    let q_bits = q_bits.unwrap_or(safe_exp_bits);
    let no_checks_p = no_checks(p_bits);

    // q is generated with one extra bit of headroom; the final real q is
    // q_with_headroom / 2 as per step 6 of spec.md §4.4 (we build the
    // doubled "base" value directly as b = 2q to match the original's
    // `q` field reuse, so no post-hoc halving is needed here).
    let q = generate_probable_prime(rng, q_bits, table, cancel, |_| false)?;
    let base = BigUint::from(2u32) * &q; // b = 2q

    let factor_bits = p_bits.saturating_sub(q_bits).saturating_sub(1);
    if factor_bits == 0 {
        return Err(CryptoError::bad_data());
    }
    let mut n_factors = (factor_bits / safe_exp_bits) + 1;
    n_factors = n_factors.clamp(1, MAX_NO_FACTORS);
    let factor_size = factor_bits / n_factors;
    if factor_size < 2 {
        return Err(CryptoError::bad_data());
    }

    let mut pool: Vec<BigUint> = Vec::with_capacity(n_factors + 1);
    while pool.len() < n_factors {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(CryptoError::async_aborted());
            }
        }
        pool.push(generate_probable_prime(
            rng,
            factor_size,
            table,
            cancel,
            |_| false,
        )?);
    }

    loop {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(CryptoError::async_aborted());
            }
        }
        if let Some(p) = try_combinations(&pool, n_factors, &base, table, no_checks_p, cancel)? {
            let real_q = q; // q stored is already the "real" q (see note above).
            return Ok((p, real_q));
        }
        if pool.len() >= MAX_NO_PRIMES {
            return Err(CryptoError::failed());
        }
        pool.push(generate_probable_prime(
            rng,
            factor_size,
            table,
            cancel,
            |_| false,
        )?);
    }
}

/// Enumerates all `n`-element subsets of `pool` (in combination order),
/// building `p = base * prod(subset) + 1` and testing each with the
/// sieve followed by Miller-Rabin. Returns the first accepted `p`, or
/// `None` if every combination in the current pool is exhausted.
fn try_combinations(
    pool: &[BigUint],
    n: usize,
    base: &BigUint,
    table: &SmallPrimeTable,
    no_checks_p: usize,
    cancel: Option<&CancellationToken>,
) -> CryptoResult<Option<BigUint>> {
    if pool.len() < n {
        return Ok(None);
    }
    let mut indices: Vec<usize> = (0..n).collect();
    loop {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(CryptoError::async_aborted());
            }
        }
        let mut product = BigUint::one();
        for &i in &indices {
            product *= &pool[i];
        }
        let candidate = base * &product + BigUint::one();
        if passes_sieve(&candidate, table) && miller_rabin(&candidate, no_checks_p, table, cancel)? {
            return Ok(Some(candidate));
        }
        if !advance_combination(&mut indices, pool.len()) {
            return Ok(None);
        }
    }
}

fn passes_sieve(candidate: &BigUint, table: &SmallPrimeTable) -> bool {
    for p in table.primes() {
        if candidate % BigUint::from(*p) == BigUint::zero() {
            return false;
        }
    }
    true
}

/// Advances `indices` (a strictly increasing selection of `k` indices
/// into `0..n`) to the next combination in lexicographic order. Returns
/// `false` once all combinations have been exhausted.
fn advance_combination(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    let mut i = k;
    loop {
        if i == 0 {
            return false;
        }
        i -= 1;
        if indices[i] != i + n - k {
            indices[i] += 1;
            for j in i + 1..k {
                indices[j] = indices[j - 1] + 1;
            }
            return true;
        }
    }
}

/// Finds a generator `g` of the order-`q` subgroup of `GF(p)*`: iterate
/// `c = 3, 4, 5, ...`, set `g = c^((p-1)/q) mod p`, accept the first
/// `g != 1`. Per `findGeneratorForPQ`.
pub fn find_generator(p: &BigUint, q: &BigUint, mont_p: &MontgomeryContext) -> BigUint {
    let j = (p - BigUint::one()) / q;
    let mut c = BigUint::from(2u32);
    loop {
        c += BigUint::one();
        let g = mont_p.mod_exp(&c, &j);
        if g != BigUint::one() {
            return g;
        }
    }
}

/// Generates the private exponent `x` for a DLP key. When `q` is
/// `Some`, samples a `(qBits+32)`-bit random value, reduces mod `q-2`,
/// and resamples at one fewer bit if the result falls below a 5-bit
/// safety margin, per spec.md §4.4; without `q` (PKCS #3-style DH),
/// samples `getDLPexpSize(pBits)` bits directly.
pub fn generate_private_value<R: RngCore>(
    rng: &mut R,
    p_bits: usize,
    q: Option<&BigUint>,
) -> BigUint {
    match q {
        Some(q) => {
            let q_bits = q.bits() as usize;
            let mut sample_bits = q_bits + 32;
            loop {
                let candidate = crate::bignum::random_bits(rng, sample_bits, false);
                let q_minus_two = q - BigUint::from(2u32);
                let reduced = &candidate % &q_minus_two;
                if reduced.bits() >= 5 {
                    return reduced + BigUint::from(2u32);
                }
                sample_bits = sample_bits.saturating_sub(1).max(q_bits);
            }
        }
        None => {
            let bits = get_dlp_exp_size(p_bits);
            crate::bignum::random_bits(rng, bits, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlp_exp_size_matches_reference_table() {
        assert_eq!(get_dlp_exp_size(512), 160);
        assert_eq!(get_dlp_exp_size(1024), 169);
        assert_eq!(get_dlp_exp_size(1536), 198);
        assert_eq!(get_dlp_exp_size(2048), 225);
        assert_eq!(get_dlp_exp_size(3072), 270);
        assert_eq!(get_dlp_exp_size(4096), 305);
    }

    #[test]
    fn private_value_within_range_when_q_known() {
        let mut rng = rand::thread_rng();
        let q = BigUint::parse_bytes(b"C773218C737EC8EE993B4F2DED30F48EDACE915F", 16).unwrap();
        let x = generate_private_value(&mut rng, 512, Some(&q));
        assert!(x >= BigUint::from(2u32));
        assert!(x <= &q - BigUint::from(2u32));
    }
}
