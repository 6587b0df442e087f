//! Primality testing: the small-prime sieve and Miller-Rabin probable-prime
//! test, grounded on `cryptlib/libs/lib_kg.c`'s `primeSieve`/`primeProbable`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// Default size of the small-prime table used by the sieve.
pub const DEFAULT_SIEVE_PRIME_COUNT: usize = 2048;
/// Smallest permitted sieve table size.
pub const MIN_SIEVE_PRIME_COUNT: usize = 256;

/// Number of candidate slots the sieve scans per round: `c, c+2, c+4, ...`
/// for `SIEVE_SIZE` odd offsets.
const SIEVE_SIZE: usize = 4096;

/// Cooperative cancellation token for long-running key generation.
///
/// Checked once per Miller-Rabin iteration and once per sieve scan, per
/// spec.md §4.5/§5. Cloning shares the same underlying flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A table of the first `count` small odd primes, used to sieve
/// Miller-Rabin candidates before paying for a modular exponentiation.
#[derive(Clone, Debug)]
pub struct SmallPrimeTable {
    primes: Vec<u32>,
}

impl SmallPrimeTable {
    /// Builds a table of the first `count` odd primes (3, 5, 7, 11, ...).
    /// `count` is clamped to `[MIN_SIEVE_PRIME_COUNT, ..]`.
    pub fn new(count: usize) -> Self {
        let count = count.max(MIN_SIEVE_PRIME_COUNT);
        let mut primes = Vec::with_capacity(count);
        let mut candidate: u32 = 3;
        while primes.len() < count {
            if is_small_prime(candidate, &primes) {
                primes.push(candidate);
            }
            candidate += 2;
        }
        Self { primes }
    }

    pub fn default_table() -> Self {
        Self::new(DEFAULT_SIEVE_PRIME_COUNT)
    }

    pub fn primes(&self) -> &[u32] {
        &self.primes
    }
}

fn is_small_prime(candidate: u32, known: &[u32]) -> bool {
    if candidate < 2 {
        return false;
    }
    for &p in known {
        if p * p > candidate {
            break;
        }
        if candidate % p == 0 {
            return false;
        }
    }
    true
}

/// Sieves the 4096 odd offsets `candidate, candidate+2, ..., candidate+2*(SIEVE_SIZE-1)`
/// against the small-prime table, marking composite positions.
///
/// Returns a boolean array where `true` means "known composite" and
/// `false` means "passed the sieve, Miller-Rabin candidate".
pub fn sieve(candidate: &BigUint, table: &SmallPrimeTable) -> Vec<bool> {
    let mut marks = vec![false; SIEVE_SIZE];
    for &r in table.primes() {
        let r_big = BigUint::from(r);
        let start = (candidate % &r_big).to_u32().unwrap_or(0);
        // We want k such that (candidate + 2k) mod r == 0,
        // i.e. 2k === -start (mod r).
        let two_inv = match mod_inverse_u32(2 % r, r) {
            Some(v) => v,
            None => continue, // r == 2 never occurs (table holds odd primes only)
        };
        let neg_start = (r - (start % r)) % r;
        let mut k = ((neg_start as u64 * two_inv as u64) % r as u64) as usize;
        while k < SIEVE_SIZE {
            marks[k] = true;
            k += r as usize;
        }
    }
    marks
}

fn mod_inverse_u32(a: u32, m: u32) -> Option<u32> {
    if m <= 1 {
        return None;
    }
    let (mut old_r, mut r) = (a as i64, m as i64);
    let (mut old_s, mut s) = (1i64, 0i64);
    while r != 0 {
        let q = old_r / r;
        let tmp_r = old_r - q * r;
        old_r = r;
        r = tmp_r;
        let tmp_s = old_s - q * s;
        old_s = s;
        s = tmp_s;
    }
    if old_r != 1 {
        return None;
    }
    Some(((old_s % m as i64 + m as i64) % m as i64) as u32)
}

/// A 12-bit linear-feedback shift register over GF(2) with polynomial
/// `0x1053`, used to visit all 4095 nonzero sieve positions in a
/// pseudo-arbitrary order starting from a random seed, per spec.md §4.5.
struct Lfsr12 {
    state: u16,
}

const LFSR_POLY: u16 = 0x1053;
const LFSR_MASK: u16 = 0x0FFF; // 12 bits

impl Lfsr12 {
    fn new(seed: u16) -> Self {
        let state = if seed & LFSR_MASK == 0 { 1 } else { seed & LFSR_MASK };
        Self { state }
    }

    /// Advances the register one step and returns the new state (1..=4095).
    fn next(&mut self) -> u16 {
        let lsb = self.state & 1;
        self.state >>= 1;
        if lsb != 0 {
            self.state ^= LFSR_POLY >> 1;
        }
        self.state &= LFSR_MASK;
        self.state
    }
}

/// Piecewise-constant Miller-Rabin iteration count as a function of the
/// candidate's bit length, targeting an error bound of `(1/2)^80` per
/// spec.md §4.5.
pub fn no_checks(bits: usize) -> usize {
    match bits {
        0..=149 => 18,
        150..=199 => 15,
        200..=249 => 12,
        250..=349 => 10,
        350..=449 => 8,
        450..=549 => 7,
        550..=649 => 6,
        650..=999 => 5,
        1000..=1249 => 4,
        1250..=1999 => 3,
        _ => 2,
    }
}

/// Standard-form Miller-Rabin: factor `n - 1 = 2^k * u` with `u` odd;
/// for `noChecks` iterations with successive small-prime bases, check
/// `a^u mod n` for the `1`/`n-1` escape and up to `k-1` further squarings.
pub fn miller_rabin(
    n: &BigUint,
    no_checks: usize,
    bases: &SmallPrimeTable,
    cancel: Option<&CancellationToken>,
) -> CryptoResult<bool> {
    if n <= &BigUint::from(3u32) {
        return Ok(n == &BigUint::from(2u32) || n == &BigUint::from(3u32));
    }
    if n.is_even() {
        return Ok(false);
    }

    let n_minus_one = n - BigUint::one();
    let mut k = 0u32;
    let mut u = n_minus_one.clone();
    while u.is_even() {
        u >>= 1;
        k += 1;
    }

    for i in 0..no_checks {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(CryptoError::async_aborted());
            }
        }
        let a = if i == 0 {
            BigUint::from(2u32)
        } else {
            BigUint::from(*bases.primes().get(i - 1).unwrap_or(&2))
        };
        if &a >= n {
            continue;
        }
        let mut x = a.modpow(&u, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        let mut composite = true;
        for _ in 0..k.saturating_sub(1) {
            x = (&x * &x) % n;
            if x == n_minus_one {
                composite = false;
                break;
            }
        }
        if composite {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Generates a probable prime of exactly `bits` bits: repeatedly draws an
/// odd candidate of the right size, sieves it against the small-prime
/// table using the LFSR-driven scan order, and runs Miller-Rabin on the
/// first unmarked position. `reject` allows callers (RSA's `p != q`/`e`
/// coprimality requirements) to veto a candidate before the expensive
/// primality test.
pub fn generate_probable_prime<R: RngCore>(
    rng: &mut R,
    bits: usize,
    table: &SmallPrimeTable,
    cancel: Option<&CancellationToken>,
    mut reject: impl FnMut(&BigUint) -> bool,
) -> CryptoResult<BigUint> {
    let no_checks = no_checks(bits);
    loop {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(CryptoError::async_aborted());
            }
        }
        let base = crate::bignum::random_bits(rng, bits, true);
        let marks = sieve(&base, table);
        let seed = (rng.next_u32() & 0x0FFF) as u16;
        let mut lfsr = Lfsr12::new(seed);
        for _ in 0..SIEVE_SIZE - 1 {
            let pos = lfsr.next() as usize;
            if marks[pos] {
                continue;
            }
            let candidate = &base + BigUint::from(2u32 * pos as u32);
            if reject(&candidate) {
                continue;
            }
            if miller_rabin(&candidate, no_checks, table, cancel)? {
                return Ok(candidate);
            }
        }
        // Exhausted this base; draw a fresh one and try again.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn no_checks_matches_table() {
        assert_eq!(no_checks(100), 18);
        assert_eq!(no_checks(1300), 2);
    }

    #[test]
    fn miller_rabin_rejects_composite() {
        let table = SmallPrimeTable::new(MIN_SIEVE_PRIME_COUNT);
        let n = BigUint::from(91u32); // 7 * 13
        assert!(!miller_rabin(&n, 18, &table, None).unwrap());
    }

    #[test]
    fn miller_rabin_accepts_known_prime() {
        let table = SmallPrimeTable::new(MIN_SIEVE_PRIME_COUNT);
        let n = BigUint::from(104729u32); // the 10000th prime
        assert!(miller_rabin(&n, 18, &table, None).unwrap());
    }

    #[test]
    fn generate_probable_prime_has_requested_size_and_is_odd() {
        let table = SmallPrimeTable::new(MIN_SIEVE_PRIME_COUNT);
        let mut rng = thread_rng();
        let p = generate_probable_prime(&mut rng, 128, &table, None, |_| false).unwrap();
        assert_eq!(p.bits(), 128);
        assert!(p.bit(0));
    }

    #[test]
    fn cancellation_aborts_generation() {
        let table = SmallPrimeTable::new(MIN_SIEVE_PRIME_COUNT);
        let mut rng = thread_rng();
        let token = CancellationToken::new();
        token.cancel();
        let err =
            generate_probable_prime(&mut rng, 128, &table, Some(&token), |_| false).unwrap_err();
        assert!(err.is_retryable());
    }
}
