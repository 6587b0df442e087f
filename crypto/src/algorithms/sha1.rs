//! SHA-1 (FIPS 180-4), grounded on `cryptlib/context/ctx_sha.c`. Used by
//! spec.md's DSA self-test vector (S2): `hash = SHA-1("abc")`.

pub const DIGEST_SIZE: usize = 20;
const BLOCK_SIZE: usize = 64;

#[derive(Clone)]
pub struct Sha1 {
    state: [u32; 5],
    buffer: Vec<u8>,
    len_bits: u64,
}

impl Default for Sha1 {
    fn default() -> Self {
        Self {
            state: [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0],
            buffer: Vec::with_capacity(BLOCK_SIZE),
            len_bits: 0,
        }
    }
}

impl Sha1 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.len_bits = self.len_bits.wrapping_add((data.len() as u64) * 8);
        self.buffer.extend_from_slice(data);
        let mut offset = 0;
        while self.buffer.len() - offset >= BLOCK_SIZE {
            let block = &self.buffer[offset..offset + BLOCK_SIZE];
            self.process_block(block);
            offset += BLOCK_SIZE;
        }
        self.buffer.drain(0..offset);
    }

    pub fn finalize(mut self) -> [u8; DIGEST_SIZE] {
        let bit_len = self.len_bits;
        self.buffer.push(0x80);
        while self.buffer.len() % BLOCK_SIZE != 56 {
            self.buffer.push(0);
        }
        self.buffer.extend_from_slice(&bit_len.to_be_bytes());
        let blocks = self.buffer.clone();
        for block in blocks.chunks(BLOCK_SIZE) {
            self.process_block(block);
        }
        let mut out = [0u8; DIGEST_SIZE];
        for (i, word) in self.state.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    fn process_block(&mut self, block: &[u8]) {
        let mut w = [0u32; 80];
        for i in 0..16 {
            w[i] = u32::from_be_bytes([
                block[i * 4],
                block[i * 4 + 1],
                block[i * 4 + 2],
                block[i * 4 + 3],
            ]);
        }
        for i in 16..80 {
            w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
        }
        let (mut a, mut b, mut c, mut d, mut e) = (
            self.state[0],
            self.state[1],
            self.state[2],
            self.state[3],
            self.state[4],
        );
        for (i, &wi) in w.iter().enumerate() {
            let (f, k) = match i {
                0..=19 => ((b & c) | (!b & d), 0x5A827999u32),
                20..=39 => (b ^ c ^ d, 0x6ED9EBA1),
                40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1BBCDC),
                _ => (b ^ c ^ d, 0xCA62C1D6),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(wi);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }
        self.state[0] = self.state[0].wrapping_add(a);
        self.state[1] = self.state[1].wrapping_add(b);
        self.state[2] = self.state[2].wrapping_add(c);
        self.state[3] = self.state[3].wrapping_add(d);
        self.state[4] = self.state[4].wrapping_add(e);
    }
}

pub fn digest(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut sha = Sha1::new();
    sha.update(data);
    sha.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abc_known_answer() {
        assert_eq!(
            hex(&digest(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
