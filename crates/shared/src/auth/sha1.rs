// SHA-1 message digest
// Self-contained FIPS 180-1 implementation used for salted password hashes.
//
// Every call owns its own state and message schedule, so the functions here
// are safe to call from any number of threads at once.

use byteorder::{BigEndian, ByteOrder};

/// Digest size in bytes (160 bits)
pub const DIGEST_LENGTH: usize = 20;

/// Block size in bytes (512 bits)
pub const BLOCK_LENGTH: usize = 64;

/// Initial chaining values
const INITIAL_STATE: [u32; 5] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476, 0xC3D2_E1F0];

/// Additive round constants, one per 20-round stage
const ROUND_CONSTANTS: [u32; 4] = [0x5A82_7999, 0x6ED9_EBA1, 0x8F1B_BCDC, 0xCA62_C1D6];

/// Hash `message` and return the digest as 40 lowercase hex characters.
pub fn hash(message: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(&digest(message))
}

/// Hash `message` and return the raw 20-byte digest.
pub fn digest(message: &[u8]) -> [u8; DIGEST_LENGTH] {
    let mut state = INITIAL_STATE;

    for block in pad(message).chunks_exact(BLOCK_LENGTH) {
        compress(&mut state, block);
    }

    let mut out = [0u8; DIGEST_LENGTH];
    BigEndian::write_u32_into(&state, &mut out);
    out
}

/// Append the 0x80 marker, zero fill up to 56 mod 64, then the
/// original length in bits as a big-endian u64.
fn pad(message: &[u8]) -> Vec<u8> {
    let bit_length = (message.len() as u64).wrapping_mul(8);

    let mut padded = Vec::with_capacity(message.len() + BLOCK_LENGTH + 8);
    padded.extend_from_slice(message);
    padded.push(0x80);
    while padded.len() % BLOCK_LENGTH != BLOCK_LENGTH - 8 {
        padded.push(0x00);
    }

    let tail = padded.len();
    padded.resize(tail + 8, 0);
    BigEndian::write_u64(&mut padded[tail..], bit_length);
    padded
}

/// Run the 80-round compression function over one 64-byte block.
fn compress(state: &mut [u32; 5], block: &[u8]) {
    let mut w = [0u32; 80];
    BigEndian::read_u32_into(block, &mut w[..16]);
    for j in 16..80 {
        w[j] = (w[j - 3] ^ w[j - 8] ^ w[j - 14] ^ w[j - 16]).rotate_left(1);
    }

    let [mut a, mut b, mut c, mut d, mut e] = *state;

    for (j, word) in w.iter().enumerate() {
        let f = match j {
            0..=19 => (b & c) | (!b & d),
            20..=39 => b ^ c ^ d,
            40..=59 => (b & c) | (b & d) | (c & d),
            _ => b ^ c ^ d,
        };
        let k = ROUND_CONSTANTS[j / 20];

        let temp = a
            .rotate_left(5)
            .wrapping_add(f)
            .wrapping_add(e)
            .wrapping_add(k)
            .wrapping_add(*word);
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = temp;
    }

    for (slot, value) in state.iter_mut().zip([a, b, c, d, e]) {
        *slot = slot.wrapping_add(value);
    }
}
