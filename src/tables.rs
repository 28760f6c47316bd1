use std::io::Error as IoError;
use std::io::{Read, Seek, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use super::consts::*;
use super::crypto::*;
use super::error::MpqError;
use super::seeker::MpqSeeker;
use super::util::sector_count_from_size;

/// Open-addressed file index.
///
/// Slots are probed with double hashing: the table-index hash picks the
/// start slot and an odd stride derived from the entry's second name
/// hash walks the rest. Since the capacity is a power of two, an odd
/// stride visits every slot before cycling, so a probe never loops
/// forever and never misses a free slot.
#[derive(Debug)]
pub(crate) struct HashTable {
    entries: Vec<HashTableEntry>,
}

impl HashTable {
    pub(crate) fn with_capacity(capacity: usize) -> HashTable {
        debug_assert!(capacity.is_power_of_two());

        HashTable {
            entries: vec![HashTableEntry::blank(); capacity],
        }
    }

    /// Smallest power-of-two capacity that keeps the table under 3/4
    /// full for `count` live entries.
    pub(crate) fn capacity_for(count: usize) -> usize {
        let mut capacity = 1;
        while 4 * count >= 3 * capacity {
            capacity *= 2;
        }

        capacity
    }

    pub(crate) fn from_seeker<R>(seeker: &mut MpqSeeker<R>) -> Result<HashTable, MpqError>
    where
        R: Read + Seek,
    {
        let info = seeker.info().hash_table_info;
        let mut raw_data = seeker.read(info.offset, info.size)?;
        decrypt_mpq_block(&mut raw_data, HASH_TABLE_KEY);

        let mut entries = Vec::with_capacity(info.entries as usize);
        let mut slice = &raw_data[..];
        for _ in 0..info.entries {
            entries.push(HashTableEntry::from_reader(&mut slice)?);
        }

        Ok(HashTable { entries })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[HashTableEntry] {
        &self.entries
    }

    pub(crate) fn insert(&mut self, hash: PathHash, block_index: u32) -> bool {
        let mask = self.entries.len() - 1;
        let stride = (hash.hash_b | 1) as usize;
        let mut index = (hash.index as usize) & mask;

        for _ in 0..self.entries.len() {
            if self.entries[index].is_free() {
                self.entries[index] = HashTableEntry::new(hash.hash_a, hash.hash_b, block_index);
                return true;
            }

            index = (index + stride) & mask;
        }

        false
    }

    pub(crate) fn find(&self, name: &str) -> Option<&HashTableEntry> {
        self.locate(PathHash::of(name))
            .map(|index| &self.entries[index])
    }

    /// Marks the slot for `name` as deleted, leaving a tombstone that
    /// later probes skip over. Returns whether an entry was found.
    pub(crate) fn delete(&mut self, name: &str) -> bool {
        match self.locate(PathHash::of(name)) {
            Some(index) => {
                self.entries[index] = HashTableEntry::deleted();
                true
            }
            None => false,
        }
    }

    fn locate(&self, hash: PathHash) -> Option<usize> {
        let mask = self.entries.len() - 1;
        let stride = (hash.hash_b | 1) as usize;
        let mut index = (hash.index as usize) & mask;

        for _ in 0..self.entries.len() {
            let inspected = &self.entries[index];

            if inspected.block_index == HASH_TABLE_EMPTY {
                return None;
            }

            // deleted slots keep the probe chain alive
            if inspected.block_index != HASH_TABLE_DELETED
                && inspected.hash_a == hash.hash_a
                && inspected.hash_b == hash.hash_b
                && inspected.locale == 0
            {
                return Some(index);
            }

            index = (index + stride) & mask;
        }

        None
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HashTableEntry {
    pub(crate) hash_a: u32,
    pub(crate) hash_b: u32,
    pub(crate) locale: u16,
    pub(crate) platform: u16,
    pub(crate) block_index: u32,
}

impl HashTableEntry {
    fn new(hash_a: u32, hash_b: u32, block_index: u32) -> HashTableEntry {
        HashTableEntry {
            hash_a,
            hash_b,
            locale: 0,
            platform: 0,
            block_index,
        }
    }

    fn blank() -> HashTableEntry {
        HashTableEntry {
            hash_a: 0xFFFF_FFFF,
            hash_b: 0xFFFF_FFFF,
            locale: 0xFFFF,
            platform: 0xFFFF,
            block_index: HASH_TABLE_EMPTY,
        }
    }

    fn deleted() -> HashTableEntry {
        HashTableEntry {
            hash_a: 0xFFFF_FFFF,
            hash_b: 0xFFFF_FFFF,
            locale: 0xFFFF,
            platform: 0xFFFF,
            block_index: HASH_TABLE_DELETED,
        }
    }

    fn is_free(&self) -> bool {
        self.block_index == HASH_TABLE_EMPTY || self.block_index == HASH_TABLE_DELETED
    }

    fn from_reader<R: Read>(mut reader: R) -> Result<HashTableEntry, MpqError> {
        let hash_a = reader.read_u32::<LE>()?;
        let hash_b = reader.read_u32::<LE>()?;
        let locale = reader.read_u16::<LE>()?;
        let platform = reader.read_u16::<LE>()?;
        let block_index = reader.read_u32::<LE>()?;

        Ok(HashTableEntry {
            hash_a,
            hash_b,
            locale,
            platform,
            block_index,
        })
    }

    pub(crate) fn write<W: Write>(&self, mut writer: W) -> Result<(), IoError> {
        writer.write_u32::<LE>(self.hash_a)?;
        writer.write_u32::<LE>(self.hash_b)?;
        writer.write_u16::<LE>(self.locale)?;
        writer.write_u16::<LE>(self.platform)?;
        writer.write_u32::<LE>(self.block_index)?;

        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct BlockTable {
    entries: Vec<BlockTableEntry>,
}

impl BlockTable {
    pub(crate) fn from_seeker<R>(seeker: &mut MpqSeeker<R>) -> Result<BlockTable, MpqError>
    where
        R: Read + Seek,
    {
        let info = seeker.info().block_table_info;
        let mut raw_data = seeker.read(info.offset, info.size)?;
        decrypt_mpq_block(&mut raw_data, BLOCK_TABLE_KEY);

        let mut entries = Vec::with_capacity(info.entries as usize);
        let mut slice = &raw_data[..];
        for _ in 0..info.entries {
            entries.push(BlockTableEntry::from_reader(&mut slice)?);
        }

        Ok(BlockTable { entries })
    }

    pub(crate) fn get(&self, index: usize) -> Option<&BlockTableEntry> {
        self.entries.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Metadata of one stored file. The offset is relative to the start of
/// the payload region, i.e. the byte right after the header.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockTableEntry {
    pub(crate) file_pos: u64,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) flags: u32,
}

impl BlockTableEntry {
    pub(crate) fn new(
        file_pos: u64,
        compressed_size: u64,
        uncompressed_size: u64,
        flags: u32,
    ) -> BlockTableEntry {
        BlockTableEntry {
            file_pos,
            compressed_size,
            uncompressed_size,
            flags,
        }
    }

    /// A zeroed row used to pad the block table up to a power of two.
    /// Its `EXISTS` flag is unset, so it never resolves to a file.
    pub(crate) fn empty() -> BlockTableEntry {
        BlockTableEntry {
            file_pos: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            flags: 0,
        }
    }

    fn from_reader<R: Read>(mut reader: R) -> Result<BlockTableEntry, MpqError> {
        let file_pos = u64::from(reader.read_u32::<LE>()?);
        let compressed_size = u64::from(reader.read_u32::<LE>()?);
        let uncompressed_size = u64::from(reader.read_u32::<LE>()?);
        let flags = reader.read_u32::<LE>()?;

        Ok(BlockTableEntry {
            file_pos,
            compressed_size,
            uncompressed_size,
            flags,
        })
    }

    pub(crate) fn write<W: Write>(&self, mut writer: W) -> Result<(), IoError> {
        writer.write_u32::<LE>(self.file_pos as u32)?;
        writer.write_u32::<LE>(self.compressed_size as u32)?;
        writer.write_u32::<LE>(self.uncompressed_size as u32)?;
        writer.write_u32::<LE>(self.flags)?;

        Ok(())
    }

    pub(crate) fn is_present(&self) -> bool {
        (self.flags & MPQ_FILE_EXISTS) != 0
    }

    pub(crate) fn is_imploded(&self) -> bool {
        (self.flags & MPQ_FILE_IMPLODE) != 0
    }

    pub(crate) fn is_compressed(&self) -> bool {
        (self.flags & MPQ_FILE_COMPRESS) != 0
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        (self.flags & MPQ_FILE_ENCRYPTED) != 0
    }

    pub(crate) fn is_key_adjusted(&self) -> bool {
        (self.flags & MPQ_FILE_ADJUST_KEY) != 0
    }

    pub(crate) fn is_single_unit(&self) -> bool {
        (self.flags & MPQ_FILE_SINGLE_UNIT) != 0
    }
}

/// The sector offset table of a compressed multi-sector file: one
/// offset per sector plus a terminal offset, all relative to the start
/// of the file's stored region.
#[derive(Debug)]
pub(crate) struct SectorOffsets {
    offsets: Vec<u32>,
}

impl SectorOffsets {
    pub(crate) fn from_seeker<R>(
        seeker: &mut MpqSeeker<R>,
        block_entry: &BlockTableEntry,
        encryption_key: Option<u32>,
    ) -> Result<SectorOffsets, MpqError>
    where
        R: Read + Seek,
    {
        let sector_count =
            sector_count_from_size(block_entry.uncompressed_size, seeker.info().sector_size);
        let table_size = (sector_count + 1) * 4;
        let mut raw_data = seeker.read_payload(block_entry.file_pos, table_size)?;

        if let Some(encryption_key) = encryption_key {
            decrypt_mpq_block(&mut raw_data, encryption_key);
        }

        let mut slice = &raw_data[..];
        let mut offsets = vec![0u32; (sector_count + 1) as usize];
        for offset in offsets.iter_mut() {
            *offset = slice.read_u32::<LE>()?;
        }

        if u64::from(offsets[0]) != table_size {
            return Err(MpqError::corrupted(
                "sector table does not start after itself",
            ));
        }
        for pair in offsets.windows(2) {
            if pair[1] <= pair[0] {
                return Err(MpqError::corrupted("sector table is not increasing"));
            }
        }
        if u64::from(offsets[offsets.len() - 1]) != block_entry.compressed_size {
            return Err(MpqError::corrupted(
                "sector table does not cover the stored region",
            ));
        }

        Ok(SectorOffsets { offsets })
    }

    /// Start offset and stored length of one sector.
    pub(crate) fn one(&self, index: usize) -> Option<(u32, u32)> {
        if index >= (self.offsets.len() - 1) {
            None
        } else {
            Some((
                self.offsets[index],
                self.offsets[index + 1] - self.offsets[index],
            ))
        }
    }

    /// Start offset and stored length of the whole sector region.
    pub(crate) fn all(&self) -> (u32, u32) {
        let len = self.offsets.len();

        (self.offsets[0], self.offsets[len - 1] - self.offsets[0])
    }

    pub(crate) fn count(&self) -> usize {
        self.offsets.len() - 1
    }
}
