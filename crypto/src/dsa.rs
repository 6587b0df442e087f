//! DSA signing and verification, built on the shared DLP parameter
//! machinery in [`crate::dlp`]. Grounded on `cryptlib/context/ctx_dsa.c`.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::RngCore;

use crate::bignum::{mod_inverse, random_bits, MontgomeryContext};
use crate::dlp::DlpParams;
use crate::error::{CryptoError, CryptoResult};

/// Size of each DSA signature component (a SHA-1/FIPS 186 hash), in bytes.
pub const SIGPART_SIZE: usize = 20;

/// A DSA signature `(r, s)`, each reduced mod q.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
}

/// On-wire encodings selectable at sign/verify time, per spec.md §6.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignatureFormat {
    /// `SEQUENCE { r INTEGER, s INTEGER }` (the cryptlib/X9.31 format).
    CryptlibSequence,
    /// 40-byte concatenation of r and s, each zero-padded to 20 bytes.
    Ssh,
    /// PGP MPI pair: each value as a 2-byte bit-length prefix followed by
    /// its big-endian bytes.
    PgpMpi,
}

impl Signature {
    pub fn encode(&self, format: SignatureFormat) -> Vec<u8> {
        match format {
            SignatureFormat::CryptlibSequence => encode_sequence(&self.r, &self.s),
            SignatureFormat::Ssh => encode_ssh(&self.r, &self.s),
            SignatureFormat::PgpMpi => encode_pgp_mpi(&self.r, &self.s),
        }
    }

    pub fn decode(format: SignatureFormat, bytes: &[u8]) -> CryptoResult<Self> {
        match format {
            SignatureFormat::CryptlibSequence => decode_sequence(bytes),
            SignatureFormat::Ssh => decode_ssh(bytes),
            SignatureFormat::PgpMpi => decode_pgp_mpi(bytes),
        }
    }
}

fn encode_sequence(r: &BigUint, s: &BigUint) -> Vec<u8> {
    let r_enc = encode_integer(r);
    let s_enc = encode_integer(s);
    let mut content = Vec::with_capacity(r_enc.len() + s_enc.len());
    content.extend_from_slice(&r_enc);
    content.extend_from_slice(&s_enc);
    let mut out = vec![0x30];
    out.extend(encode_der_length(content.len()));
    out.extend(content);
    out
}

fn encode_integer(v: &BigUint) -> Vec<u8> {
    let mut bytes = v.to_bytes_be();
    if bytes.is_empty() {
        bytes.push(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    let mut out = vec![0x02];
    out.extend(encode_der_length(bytes.len()));
    out.extend(bytes);
    out
}

fn encode_der_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        let bytes = len.to_be_bytes();
        let significant: Vec<u8> = bytes
            .iter()
            .copied()
            .skip_while(|&b| b == 0)
            .collect();
        let mut out = vec![0x80 | significant.len() as u8];
        out.extend(significant);
        out
    }
}

fn decode_sequence(bytes: &[u8]) -> CryptoResult<Signature> {
    let mut pos = 0;
    if bytes.get(pos) != Some(&0x30) {
        return Err(CryptoError::bad_data());
    }
    pos += 1;
    let (_, len_size) = decode_der_length(&bytes[pos..])?;
    pos += len_size;
    let (r, r_size) = decode_integer(&bytes[pos..])?;
    pos += r_size;
    let (s, _) = decode_integer(&bytes[pos..])?;
    Ok(Signature { r, s })
}

fn decode_der_length(bytes: &[u8]) -> CryptoResult<(usize, usize)> {
    let first = *bytes.first().ok_or_else(CryptoError::bad_data)?;
    if first & 0x80 == 0 {
        Ok((first as usize, 1))
    } else {
        let n = (first & 0x7f) as usize;
        if bytes.len() < 1 + n {
            return Err(CryptoError::bad_data());
        }
        let mut len = 0usize;
        for &b in &bytes[1..1 + n] {
            len = (len << 8) | b as usize;
        }
        Ok((len, 1 + n))
    }
}

fn decode_integer(bytes: &[u8]) -> CryptoResult<(BigUint, usize)> {
    if bytes.first() != Some(&0x02) {
        return Err(CryptoError::bad_data());
    }
    let (len, len_size) = decode_der_length(&bytes[1..])?;
    let start = 1 + len_size;
    let end = start + len;
    if bytes.len() < end {
        return Err(CryptoError::bad_data());
    }
    Ok((BigUint::from_bytes_be(&bytes[start..end]), end))
}

fn encode_ssh(r: &BigUint, s: &BigUint) -> Vec<u8> {
    let mut out = vec![0u8; 2 * SIGPART_SIZE];
    let r_bytes = r.to_bytes_be();
    let s_bytes = s.to_bytes_be();
    out[SIGPART_SIZE - r_bytes.len()..SIGPART_SIZE].copy_from_slice(&r_bytes);
    out[2 * SIGPART_SIZE - s_bytes.len()..].copy_from_slice(&s_bytes);
    out
}

fn decode_ssh(bytes: &[u8]) -> CryptoResult<Signature> {
    if bytes.len() != 2 * SIGPART_SIZE {
        return Err(CryptoError::bad_data());
    }
    let r = BigUint::from_bytes_be(&bytes[..SIGPART_SIZE]);
    let s = BigUint::from_bytes_be(&bytes[SIGPART_SIZE..]);
    Ok(Signature { r, s })
}

fn encode_pgp_mpi(r: &BigUint, s: &BigUint) -> Vec<u8> {
    let mut out = Vec::new();
    for v in [r, s] {
        let bytes = v.to_bytes_be();
        let bits = v.bits() as u16;
        out.extend_from_slice(&bits.to_be_bytes());
        out.extend_from_slice(&bytes);
    }
    out
}

fn decode_pgp_mpi(bytes: &[u8]) -> CryptoResult<Signature> {
    let (r, consumed) = decode_one_mpi(bytes)?;
    let (s, _) = decode_one_mpi(&bytes[consumed..])?;
    Ok(Signature { r, s })
}

fn decode_one_mpi(bytes: &[u8]) -> CryptoResult<(BigUint, usize)> {
    if bytes.len() < 2 {
        return Err(CryptoError::bad_data());
    }
    let bits = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let len = (bits + 7) / 8;
    if bytes.len() < 2 + len {
        return Err(CryptoError::bad_data());
    }
    Ok((BigUint::from_bytes_be(&bytes[2..2 + len]), 2 + len))
}

/// Signs a 20-byte hash with private value `x`, drawing `k` from `rng`.
/// Follows `ctx_dsa.c`'s `sign()`: `k` sampled at `qBits+32` bits then
/// reduced mod q (rather than generated directly at `qBits`, to avoid the
/// small statistical bias FIPS 186 warns about); `r = (g^k mod p) mod q`;
/// `s = k^-1 * (hash + x*r) mod q`.
pub fn sign<R: RngCore>(
    params: &DlpParams,
    x: &BigUint,
    hash: &[u8],
    rng: &mut R,
) -> CryptoResult<Signature> {
    let k = random_bits(rng, params.q.bits() as usize + 32, false) % &params.q;
    sign_with_k(params, x, hash, &k)
}

/// Signs using an explicitly supplied `k`, bypassing random generation,
/// used by the self-test to reproduce FIPS 186's fixed `k` value (S2).
pub fn sign_with_k(
    params: &DlpParams,
    x: &BigUint,
    hash: &[u8],
    k: &BigUint,
) -> CryptoResult<Signature> {
    let k = k % &params.q;
    if k.is_zero() {
        return Err(CryptoError::failed());
    }
    let hash_value = BigUint::from_bytes_be(hash);

    let r = params.mont_p.mod_exp(&params.g, &k) % &params.q;
    let k_inv = mod_inverse(&k, &params.q).ok_or_else(CryptoError::failed)?;

    let mut s = (x * &r) % &params.q;
    s += &hash_value;
    if s > params.q {
        s -= &params.q;
    }
    s = (&s * &k_inv) % &params.q;

    Ok(Signature { r, s })
}

/// Verifies `(r, s)` against `hash` and public value `y`. Follows
/// `ctx_dsa.c`'s `sigCheck()`: `w = s^-1 mod q`; `u1 = hash*w mod q`;
/// `u2 = r*w mod q`; accept iff `(g^u1 * y^u2 mod p) mod q == r`.
pub fn verify(
    params: &DlpParams,
    y: &BigUint,
    hash: &[u8],
    signature: &Signature,
) -> CryptoResult<bool> {
    if signature.r.is_zero()
        || signature.r >= params.q
        || signature.s.is_zero()
        || signature.s >= params.q
    {
        return Ok(false);
    }
    let hash_value = BigUint::from_bytes_be(hash);
    let w = mod_inverse(&signature.s, &params.q).ok_or_else(CryptoError::failed)?;
    let u1 = (&hash_value * &w) % &params.q;
    let u2 = (&signature.r * &w) % &params.q;

    let mont_y = MontgomeryContext::new(params.p.clone());
    let v = (params.mont_p.mod_exp(&params.g, &u1) * mont_y.mod_exp(y, &u2)) % &params.p;
    let v = v % &params.q;
    Ok(v == signature.r)
}

fn hex_to_biguint(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).unwrap()
}

/// The FIPS 186 sample key from `ctx_dsa.c` (S2 / P11), shared by the
/// crate's own unit tests and the capability registry's self-test.
pub fn self_test_params() -> (DlpParams, BigUint, BigUint) {
    let p = hex_to_biguint(concat!(
        "8DF2A494492276AA3D25759BB06869CBEAC0D83AFB8D0CF7CBB8324F0D7882E",
        "D0762FC5B7210EAFC2E9ADAC32AB7AAC49693DFBF83724C2EC0736EE31C80291"
    ));
    let q = hex_to_biguint("C773218C737EC8EE993B4F2DED30F48EDACE915F");
    let g = hex_to_biguint(concat!(
        "626D027839EA0A13413163A55B4CB500299D5522956CEFCB3BFF10F399CE2C2E",
        "71CB9DE5FA24BABF58E5B79521925C9CC42E9F6F464B088CC572AF53E6D78802"
    ));
    let x = hex_to_biguint("2070B3223DBA372FDE1C0FFC7B2E3B498B260614");
    let y = hex_to_biguint(concat!(
        "19131871D75B1612A819F29D78D1B0D7346F7AA77BB62A859BFD6C5675DA9D21",
        "2D3A36EF1672EF660B8C7C255CC0EC74858FBA33F44C06699630A76B030EE333"
    ));

    let mont_p = MontgomeryContext::new(p.clone());
    (DlpParams { p, q, g, mont_p }, x, y)
}

/// S2/P11: sign with the FIPS-specified `k`, verify against the
/// FIPS-specified public value.
pub fn self_test() -> CryptoResult<()> {
    let (params, x, y) = self_test_params();
    let hash = hex_to_biguint("A9993E364706816ABA3E25717850C26C9CD0D89D");
    let mut hash_bytes = hash.to_bytes_be();
    while hash_bytes.len() < SIGPART_SIZE {
        hash_bytes.insert(0, 0);
    }
    let k = hex_to_biguint("358DAD571462710F50E254CF1A376B2BDEAADFBF");

    let sig = sign_with_k(&params, &x, &hash_bytes, &k)?;
    if verify(&params, &y, &hash_bytes, &sig)? {
        Ok(())
    } else {
        Err(CryptoError::failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fips186_params() -> (DlpParams, BigUint, BigUint) {
        self_test_params()
    }

    #[test]
    fn fips186_self_test_vector() {
        self_test().unwrap();
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let (params, x, y) = fips186_params();
        let hash_bytes = [0x42u8; SIGPART_SIZE];
        let k = BigUint::from(12345u32);
        let mut sig = sign_with_k(&params, &x, &hash_bytes, &k).unwrap();
        sig.s += BigUint::one();
        assert!(!verify(&params, &y, &hash_bytes, &sig).unwrap());
    }

    #[test]
    fn sequence_encoding_round_trips() {
        let sig = Signature {
            r: BigUint::from(12345678901234567890u128),
            s: BigUint::from(98765432109876543210u128),
        };
        let encoded = sig.encode(SignatureFormat::CryptlibSequence);
        let decoded = Signature::decode(SignatureFormat::CryptlibSequence, &encoded).unwrap();
        assert_eq!(sig, decoded);
    }

    #[test]
    fn ssh_encoding_round_trips() {
        let sig = Signature {
            r: BigUint::from(42u32),
            s: BigUint::from(1337u32),
        };
        let encoded = sig.encode(SignatureFormat::Ssh);
        assert_eq!(encoded.len(), 40);
        let decoded = Signature::decode(SignatureFormat::Ssh, &encoded).unwrap();
        assert_eq!(sig, decoded);
    }

    #[test]
    fn pgp_mpi_encoding_round_trips() {
        let sig = Signature {
            r: BigUint::from(999999u32),
            s: BigUint::from(7u32),
        };
        let encoded = sig.encode(SignatureFormat::PgpMpi);
        let decoded = Signature::decode(SignatureFormat::PgpMpi, &encoded).unwrap();
        assert_eq!(sig, decoded);
    }
}
