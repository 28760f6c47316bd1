/// Magic signature of an archive header, `MPQ\x1A` in little-endian.
pub(crate) const HEADER_MPQ_MAGIC: u32 = 0x1A51_504D;
/// Magic signature of a user data header, `MPQ\x1B` in little-endian.
pub(crate) const HEADER_USER_MAGIC: u32 = 0x1B51_504D;

/// Archive headers may only start at multiples of this offset.
pub(crate) const HEADER_BOUNDARY: u64 = 512;
/// Size of the version 1 archive header, including the magic.
pub(crate) const HEADER_MPQ_SIZE: u64 = 32;
/// How far into a stream the header scan will look before giving up.
pub(crate) const MAX_HEADER_SCAN: u64 = 0x0010_0000;
/// Largest accepted sector size shift. 512 << 15 is a 16 MiB sector.
pub(crate) const MAX_SECTOR_SHIFT: u16 = 15;

pub(crate) const HASH_TABLE_ENTRY_SIZE: u32 = 16;
pub(crate) const BLOCK_TABLE_ENTRY_SIZE: u32 = 16;

/// Block index sentinel for a hash table slot that was never used.
/// Terminates probe chains.
pub(crate) const HASH_TABLE_EMPTY: u32 = 0xFFFF_FFFF;
/// Block index sentinel for a deleted hash table slot. Probe chains
/// continue past it.
pub(crate) const HASH_TABLE_DELETED: u32 = 0xFFFF_FFFE;

/// `hash_string(b"(hash table)", MPQ_HASH_FILE_KEY)`
pub(crate) const HASH_TABLE_KEY: u32 = 0xC3AF_3770;
/// `hash_string(b"(block table)", MPQ_HASH_FILE_KEY)`
pub(crate) const BLOCK_TABLE_KEY: u32 = 0xEC83_B3A3;

pub(crate) const MPQ_HASH_TABLE_INDEX: u32 = 0x000;
pub(crate) const MPQ_HASH_NAME_A: u32 = 0x100;
pub(crate) const MPQ_HASH_NAME_B: u32 = 0x200;
pub(crate) const MPQ_HASH_FILE_KEY: u32 = 0x300;
pub(crate) const MPQ_HASH_KEY2_MIX: u32 = 0x400;

pub(crate) const MPQ_FILE_IMPLODE: u32 = 0x0000_0100;
pub(crate) const MPQ_FILE_COMPRESS: u32 = 0x0000_0200;
pub(crate) const MPQ_FILE_ENCRYPTED: u32 = 0x0001_0000;
pub(crate) const MPQ_FILE_ADJUST_KEY: u32 = 0x0002_0000;
pub(crate) const MPQ_FILE_SINGLE_UNIT: u32 = 0x0100_0000;
pub(crate) const MPQ_FILE_EXISTS: u32 = 0x8000_0000;

pub(crate) const COMPRESSION_HUFFMAN: u8 = 0x01;
pub(crate) const COMPRESSION_ZLIB: u8 = 0x02;
pub(crate) const COMPRESSION_PKWARE: u8 = 0x08;
pub(crate) const COMPRESSION_BZIP2: u8 = 0x10;
pub(crate) const COMPRESSION_IMA_ADPCM_MONO: u8 = 0x40;
pub(crate) const COMPRESSION_IMA_ADPCM_STEREO: u8 = 0x80;

/// Name of the pseudo-file that enumerates the archive's contents.
pub(crate) const LISTFILE_NAME: &str = "(listfile)";
/// Pseudo-files probed for when an archive carries no listfile.
pub(crate) const KNOWN_PSEUDO_FILES: [&str; 2] = ["(attributes)", "(signature)"];

/// Byte normalization used by path hashing: ASCII characters are
/// uppercased, and forward slashes map to backslashes, which makes
/// hashing case- and separator-insensitive.
pub(crate) const ASCII_UPPER_LOOKUP: [u8; 256] = build_upper_lookup();

const fn build_upper_lookup() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let byte = i as u8;
        table[i] = if byte == b'/' {
            b'\\'
        } else if byte >= b'a' && byte <= b'z' {
            byte - 0x20
        } else {
            byte
        };
        i += 1;
    }
    table
}
