use lazy_static::lazy_static;

use super::consts::*;

lazy_static! {
    static ref CRYPTO_TABLE: [u32; 0x500] = generate_crypto_table();
}

fn generate_crypto_table() -> [u32; 0x500] {
    let mut crypto_table = [0u32; 0x500];
    let mut seed: u32 = 0x0010_0001;

    for i in 0..0x100 {
        for j in 0..5 {
            let index = i + j * 0x100;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let t1 = (seed & 0xFFFF) << 0x10;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let t2 = seed & 0xFFFF;

            crypto_table[index] = t1 | t2;
        }
    }

    crypto_table
}

pub(crate) fn hash_string(source: &[u8], hash_type: u32) -> u32 {
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for byte in source {
        let upper = u32::from(ASCII_UPPER_LOOKUP[*byte as usize]);

        seed1 = CRYPTO_TABLE[(hash_type + upper) as usize] ^ seed1.wrapping_add(seed2);
        seed2 = upper
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

/// The three hashes that identify a path inside an archive: the probe
/// start for the hash table, and the two verification hashes stored in
/// its entries.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub(crate) struct PathHash {
    pub(crate) hash_a: u32,
    pub(crate) hash_b: u32,
    pub(crate) index: u32,
}

impl PathHash {
    pub(crate) fn of(name: &str) -> PathHash {
        PathHash {
            hash_a: hash_string(name.as_bytes(), MPQ_HASH_NAME_A),
            hash_b: hash_string(name.as_bytes(), MPQ_HASH_NAME_B),
            index: hash_string(name.as_bytes(), MPQ_HASH_TABLE_INDEX),
        }
    }
}

// The cipher works on little-endian u32 words with a running secondary
// seed. Trailing bytes that do not fill a whole word are left as-is.
pub(crate) fn decrypt_mpq_block(data: &mut [u8], mut key: u32) {
    let mut key_secondary: u32 = 0xEEEE_EEEE;

    for chunk in data.chunks_exact_mut(4) {
        key_secondary = key_secondary
            .wrapping_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize]);

        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
            ^ key.wrapping_add(key_secondary);
        chunk.copy_from_slice(&word.to_le_bytes());

        key = ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B);
        key_secondary = word
            .wrapping_add(key_secondary)
            .wrapping_add(key_secondary << 5)
            .wrapping_add(3);
    }
}

// Same key schedule as decryption, but the secondary seed is advanced
// with the plaintext word rather than the output word.
pub(crate) fn encrypt_mpq_block(data: &mut [u8], mut key: u32) {
    let mut key_secondary: u32 = 0xEEEE_EEEE;

    for chunk in data.chunks_exact_mut(4) {
        key_secondary = key_secondary
            .wrapping_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize]);

        let plain = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let word = plain ^ key.wrapping_add(key_secondary);
        chunk.copy_from_slice(&word.to_le_bytes());

        key = ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B);
        key_secondary = plain
            .wrapping_add(key_secondary)
            .wrapping_add(key_secondary << 5)
            .wrapping_add(3);
    }
}

pub(crate) fn get_plain_name(input: &str) -> &[u8] {
    let bytes = input.as_bytes();
    let mut out = input.as_bytes();

    for i in 0..bytes.len() {
        if bytes[i] == b'\\' || bytes[i] == b'/' {
            out = &bytes[(i + 1)..];
        }
    }

    out
}

/// Derives the encryption key of a file from its plain name, i.e. the
/// part of its path after the last separator. An adjusted key is
/// additionally mixed with the file's position and size.
pub(crate) fn calculate_file_key(
    file_name: &str,
    file_offset: u32,
    file_size: u32,
    adjusted: bool,
) -> u32 {
    let plain_name = get_plain_name(file_name);
    let mut key = hash_string(plain_name, MPQ_HASH_FILE_KEY);

    if adjusted {
        key = key.wrapping_add(file_offset) ^ file_size
    }

    key
}
