//! Conventional-cipher mode machinery: ECB/CBC/CFB/OFB with partial-block
//! IV carry, plus the encryption-driver sanity check.
//!
//! Grounded on `cryptlib/context/ctx_misc.c`'s mode drivers (`modeECB`,
//! `modeCBC`, `modeCFB`, `modeOFB`) and the `checkCryptReturn`-style
//! catastrophic-encrypt sanity check wrapped around every encrypt call.

use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};

/// A block cipher with a fixed block size, keyed and ready to transform
/// single blocks. `aes::AesKey` is the only implementor the engine ships.
pub trait BlockCipher {
    fn block_size(&self) -> usize;
    fn encrypt_block(&self, block: &mut [u8]);
    fn decrypt_block(&self, block: &mut [u8]);
}

impl BlockCipher for crate::algorithms::aes::AesKey {
    fn block_size(&self) -> usize {
        crate::algorithms::aes::BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(block);
        crate::algorithms::aes::AesKey::encrypt_block(self, &mut buf);
        block.copy_from_slice(&buf);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(block);
        crate::algorithms::aes::AesKey::decrypt_block(self, &mut buf);
        block.copy_from_slice(&buf);
    }
}

/// A conventional-cipher mode, each carrying whatever running state it
/// needs across calls (the `currentIV`/`ivCount` pair of spec.md §4.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Ecb,
    Cbc,
    Cfb,
    Ofb,
}

/// Per-context mode state: the running IV and, for CFB/OFB, how many
/// bytes of the current keystream block have already been consumed.
#[derive(Clone)]
pub struct ModeState {
    pub mode: Mode,
    pub current_iv: Vec<u8>,
    pub iv_count: usize,
}

impl ModeState {
    pub fn new(mode: Mode, iv: &[u8]) -> Self {
        Self {
            mode,
            current_iv: iv.to_vec(),
            iv_count: 0,
        }
    }
}

impl Drop for ModeState {
    fn drop(&mut self) {
        self.current_iv.zeroize();
    }
}

/// Encrypts `data` in place under `cipher`/`state`, applying the
/// catastrophic-encrypt sanity check: if the first `min(16, len)` output
/// bytes equal the saved pre-encryption bytes, the output is zeroised and
/// `CryptoError::failed()` is returned (broken-hardware / IV-pathology
/// guard, approximate near 64-bit-block collision boundaries per
/// spec.md §4.2).
pub fn encrypt(
    cipher: &dyn BlockCipher,
    state: &mut ModeState,
    data: &mut [u8],
) -> CryptoResult<()> {
    let saved_len = data.len().min(16);
    let mut saved = [0u8; 16];
    saved[..saved_len].copy_from_slice(&data[..saved_len]);

    let result = match state.mode {
        Mode::Ecb => ecb_transform(cipher, data, true),
        Mode::Cbc => cbc_encrypt(cipher, state, data),
        Mode::Cfb => cfb_encrypt(cipher, state, data),
        Mode::Ofb => ofb_transform(cipher, state, data),
    };
    result?;

    if data[..saved_len] == saved[..saved_len] {
        data.zeroize();
        return Err(CryptoError::failed());
    }
    Ok(())
}

pub fn decrypt(
    cipher: &dyn BlockCipher,
    state: &mut ModeState,
    data: &mut [u8],
) -> CryptoResult<()> {
    match state.mode {
        Mode::Ecb => ecb_transform(cipher, data, false),
        Mode::Cbc => cbc_decrypt(cipher, state, data),
        Mode::Cfb => cfb_decrypt(cipher, state, data),
        Mode::Ofb => ofb_transform(cipher, state, data),
    }
}

fn ecb_transform(cipher: &dyn BlockCipher, data: &mut [u8], encrypt: bool) -> CryptoResult<()> {
    let block_size = cipher.block_size();
    if data.len() % block_size != 0 {
        return Err(CryptoError::bad_data());
    }
    for block in data.chunks_mut(block_size) {
        if encrypt {
            cipher.encrypt_block(block);
        } else {
            cipher.decrypt_block(block);
        }
    }
    Ok(())
}

fn cbc_encrypt(cipher: &dyn BlockCipher, state: &mut ModeState, data: &mut [u8]) -> CryptoResult<()> {
    let block_size = cipher.block_size();
    if data.len() % block_size != 0 {
        return Err(CryptoError::bad_data());
    }
    for block in data.chunks_mut(block_size) {
        for (b, iv) in block.iter_mut().zip(state.current_iv.iter()) {
            *b ^= iv;
        }
        cipher.encrypt_block(block);
        state.current_iv.copy_from_slice(block);
    }
    Ok(())
}

fn cbc_decrypt(cipher: &dyn BlockCipher, state: &mut ModeState, data: &mut [u8]) -> CryptoResult<()> {
    let block_size = cipher.block_size();
    if data.len() % block_size != 0 {
        return Err(CryptoError::bad_data());
    }
    for block in data.chunks_mut(block_size) {
        let saved_ciphertext = block.to_vec();
        cipher.decrypt_block(block);
        for (b, iv) in block.iter_mut().zip(state.current_iv.iter()) {
            *b ^= iv;
        }
        state.current_iv.copy_from_slice(&saved_ciphertext);
    }
    Ok(())
}

/// CFB encrypt: XOR input against the running keystream (`currentIV`
/// starting at `ivCount`), shifting the *ciphertext* bytes into the IV as
/// they're produced; once `ivCount` reaches the block size, re-encrypt
/// `currentIV` in place to derive a fresh keystream block.
fn cfb_encrypt(cipher: &dyn BlockCipher, state: &mut ModeState, data: &mut [u8]) -> CryptoResult<()> {
    let block_size = cipher.block_size();
    let mut offset = 0;
    while offset < data.len() {
        if state.iv_count == block_size {
            cipher.encrypt_block(&mut state.current_iv);
            state.iv_count = 0;
        }
        let take = (block_size - state.iv_count).min(data.len() - offset);
        for i in 0..take {
            data[offset + i] ^= state.current_iv[state.iv_count + i];
            state.current_iv[state.iv_count + i] = data[offset + i];
        }
        state.iv_count += take;
        offset += take;
    }
    Ok(())
}

fn cfb_decrypt(cipher: &dyn BlockCipher, state: &mut ModeState, data: &mut [u8]) -> CryptoResult<()> {
    let block_size = cipher.block_size();
    let mut offset = 0;
    while offset < data.len() {
        if state.iv_count == block_size {
            cipher.encrypt_block(&mut state.current_iv);
            state.iv_count = 0;
        }
        let take = (block_size - state.iv_count).min(data.len() - offset);
        for i in 0..take {
            let ciphertext_byte = data[offset + i];
            data[offset + i] ^= state.current_iv[state.iv_count + i];
            state.current_iv[state.iv_count + i] = ciphertext_byte;
        }
        state.iv_count += take;
        offset += take;
    }
    Ok(())
}

/// OFB: identical keystream derivation to CFB, but `currentIV` advances
/// purely by re-encrypting itself, ciphertext never feeds back.
fn ofb_transform(cipher: &dyn BlockCipher, state: &mut ModeState, data: &mut [u8]) -> CryptoResult<()> {
    let block_size = cipher.block_size();
    let mut offset = 0;
    while offset < data.len() {
        if state.iv_count == block_size {
            cipher.encrypt_block(&mut state.current_iv);
            state.iv_count = 0;
        }
        let take = (block_size - state.iv_count).min(data.len() - offset);
        for i in 0..take {
            data[offset + i] ^= state.current_iv[state.iv_count + i];
        }
        state.iv_count += take;
        offset += take;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::aes::AesKey;

    fn key() -> AesKey {
        AesKey::new(&[
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x0E, 0x0F,
        ])
        .unwrap()
    }

    #[test]
    fn ecb_round_trip() {
        let k = key();
        let mut state = ModeState::new(Mode::Ecb, &[]);
        let mut data = vec![0xAAu8; 32];
        let original = data.clone();
        encrypt(&k, &mut state, &mut data).unwrap();
        assert_ne!(data, original);
        let mut state2 = ModeState::new(Mode::Ecb, &[]);
        decrypt(&k, &mut state2, &mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn cbc_round_trip() {
        let k = key();
        let iv = [0u8; 16];
        let mut enc_state = ModeState::new(Mode::Cbc, &iv);
        let mut data = b"0123456789ABCDEF0123456789ABCDEF".to_vec();
        data.truncate(32);
        let original = data.clone();
        encrypt(&k, &mut enc_state, &mut data).unwrap();
        let mut dec_state = ModeState::new(Mode::Cbc, &iv);
        decrypt(&k, &mut dec_state, &mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn cfb_chunked_matches_whole() {
        let k = key();
        let iv = [0u8; 16];
        let plaintext = b"abcdefghijklmnopqrstuvwxyz012345".to_vec();

        let mut whole = plaintext.clone();
        let mut whole_state = ModeState::new(Mode::Cfb, &iv);
        encrypt(&k, &mut whole_state, &mut whole).unwrap();

        let mut chunked = plaintext.clone();
        let mut chunk_state = ModeState::new(Mode::Cfb, &iv);
        for chunk in chunked.chunks_mut(5) {
            encrypt(&k, &mut chunk_state, chunk).unwrap();
        }
        assert_eq!(whole, chunked);
    }

    #[test]
    fn ofb_round_trip() {
        let k = key();
        let iv = [0u8; 16];
        let mut enc_state = ModeState::new(Mode::Ofb, &iv);
        let mut data = b"the quick brown fox jumps over".to_vec();
        let original = data.clone();
        encrypt(&k, &mut enc_state, &mut data).unwrap();
        let mut dec_state = ModeState::new(Mode::Ofb, &iv);
        decrypt(&k, &mut dec_state, &mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn ecb_rejects_non_block_multiple() {
        let k = key();
        let mut state = ModeState::new(Mode::Ecb, &[]);
        let mut data = vec![0u8; 17];
        assert!(encrypt(&k, &mut state, &mut data).is_err());
    }
}
