use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use log::debug;

use super::codec::decode_mpq_block;
use super::consts::*;
use super::crypto::{calculate_file_key, decrypt_mpq_block};
use super::error::MpqError;
use super::seeker::MpqSeeker;
use super::tables::{BlockTable, BlockTableEntry, HashTable, SectorOffsets};

/// Implementation of a MoPaQ archive viewer.
///
/// Refer to top-level documentation to see which features are supported.
///
/// Will work on any reader that implements `Read + Seek`.
#[derive(Debug)]
pub struct MpqViewer<R: Read + Seek> {
    seeker: MpqSeeker<R>,
    hash_table: HashTable,
    block_table: BlockTable,
}

impl<R: Read + Seek> MpqViewer<R> {
    /// Try to open an MPQ archive from the specified `reader`.
    ///
    /// Immediately, this will perform the following:
    ///
    /// 1. Locate an MPQ header.
    /// 2. Locate and read the Hash Table.
    /// 3. Locate and read the Block Table.
    ///
    /// If any of these steps fail, the archive is deemed corrupted and
    /// an appropriate error is returned.
    ///
    /// No other operations will be performed.
    pub fn open(reader: R) -> Result<MpqViewer<R>, MpqError> {
        let mut seeker = MpqSeeker::new(reader)?;

        let hash_table = HashTable::from_seeker(&mut seeker)?;
        let block_table = BlockTable::from_seeker(&mut seeker)?;

        debug!(
            "opened archive: {} hash slots, {} block entries, sector size {}",
            hash_table.capacity(),
            block_table.len(),
            seeker.info().sector_size
        );

        Ok(MpqViewer {
            seeker,
            hash_table,
            block_table,
        })
    }

    /// Read a file's contents.
    ///
    /// Notably, the filename resolution algorithm
    /// is case-insensitive, and will treat backslashes (`\`) and forward slashes (`/`)
    /// as the same character.
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>, MpqError> {
        let block_entry = self.stored_block(name)?;

        self.read_block(name, &block_entry)
    }

    /// If the archive contains a `(listfile)`, this will parse it and
    /// return all known filenames, with separators normalized to `/`.
    ///
    /// Archives without a listfile fall back to probing for well-known
    /// names, since the hash table alone cannot recover them. The
    /// listfile itself is never part of the result.
    pub fn files(&mut self) -> Result<Vec<String>, MpqError> {
        let listfile = match self.read_file(LISTFILE_NAME) {
            Ok(listfile) => listfile,
            Err(MpqError::FileNotFound { .. }) => {
                let mut list = Vec::new();
                for &name in KNOWN_PSEUDO_FILES.iter() {
                    if self.stored_block(name).is_ok() {
                        list.push(name.to_string());
                    }
                }

                return Ok(list);
            }
            Err(other) => return Err(other),
        };

        let mut list = Vec::new();
        for line in listfile.split(|&byte| byte == b'\r' || byte == b'\n') {
            if line.is_empty() {
                continue;
            }

            if let Ok(line) = std::str::from_utf8(line) {
                if line.eq_ignore_ascii_case(LISTFILE_NAME) {
                    continue;
                }

                list.push(line.replace('\\', "/"));
            }
        }

        Ok(list)
    }

    /// Extracts every enumerable file into `target_dir`, recreating the
    /// archive's directory hierarchy underneath it.
    ///
    /// Archive paths are validated before use, so a crafted listfile
    /// cannot place files outside of `target_dir`.
    pub fn extract_to<P: AsRef<Path>>(&mut self, target_dir: P) -> Result<(), MpqError> {
        let target_dir = target_dir.as_ref();
        fs::create_dir_all(target_dir).map_err(|cause| MpqError::file_io(target_dir, cause))?;

        for file_name in self.files()? {
            let contents = self.read_file(&file_name)?;
            let target = target_dir.join(sanitized_relative_path(&file_name)?);

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|cause| MpqError::file_io(parent, cause))?;
            }
            fs::write(&target, contents).map_err(|cause| MpqError::file_io(&target, cause))?;
        }

        Ok(())
    }

    /// Resolves a name through the hash table to its block table entry.
    pub(crate) fn stored_block(&self, name: &str) -> Result<BlockTableEntry, MpqError> {
        let hash_entry = self.hash_table.find(name).ok_or_else(|| MpqError::FileNotFound {
            name: name.to_string(),
        })?;

        let block_entry = self
            .block_table
            .get(hash_entry.block_index as usize)
            .ok_or_else(|| MpqError::corrupted("hash entry points outside the block table"))?;

        if !block_entry.is_present() {
            return Err(MpqError::corrupted("hash entry points at a vacant block"));
        }

        Ok(*block_entry)
    }

    /// Reads a file's stored region verbatim: still compressed, still
    /// encrypted, sector offset table included.
    pub(crate) fn read_stored(&mut self, block_entry: &BlockTableEntry) -> Result<Vec<u8>, MpqError> {
        self.seeker
            .read_payload(block_entry.file_pos, block_entry.compressed_size)
    }

    pub(crate) fn sector_size(&self) -> u64 {
        self.seeker.info().sector_size
    }

    fn read_block(
        &mut self,
        name: &str,
        block_entry: &BlockTableEntry,
    ) -> Result<Vec<u8>, MpqError> {
        // calculate the file key
        let encryption_key = if block_entry.is_encrypted() {
            Some(calculate_file_key(
                name,
                block_entry.file_pos as u32,
                block_entry.uncompressed_size as u32,
                block_entry.is_key_adjusted(),
            ))
        } else {
            None
        };

        if block_entry.is_imploded() {
            return Err(MpqError::UnsupportedCompression {
                kind: "PKWare implode".to_string(),
            });
        }

        // single-unit files have no sector offset table
        if block_entry.is_single_unit() {
            let raw_data = self
                .seeker
                .read_payload(block_entry.file_pos, block_entry.compressed_size)?;

            return decode_mpq_block(&raw_data, block_entry.uncompressed_size, encryption_key);
        }

        if !block_entry.is_compressed() {
            if block_entry.compressed_size != block_entry.uncompressed_size {
                return Err(MpqError::corrupted(
                    "stored size mismatch on an uncompressed file",
                ));
            }

            let mut raw_data = self
                .seeker
                .read_payload(block_entry.file_pos, block_entry.compressed_size)?;

            if let Some(key) = encryption_key {
                let sector_size = self.seeker.info().sector_size as usize;
                for (i, sector) in raw_data.chunks_mut(sector_size).enumerate() {
                    decrypt_mpq_block(sector, key.wrapping_add(i as u32));
                }
            }

            return Ok(raw_data);
        }

        // read the sector offsets
        let sector_offsets = SectorOffsets::from_seeker(
            &mut self.seeker,
            block_entry,
            encryption_key.map(|k| k.wrapping_sub(1)),
        )?;

        // read out all the sectors in one go
        let sector_range = sector_offsets.all();
        let raw_data = self.seeker.read_payload(
            block_entry.file_pos + u64::from(sector_range.0),
            u64::from(sector_range.1),
        )?;

        let sector_size = self.seeker.info().sector_size;
        let mut result = Vec::with_capacity(block_entry.uncompressed_size as usize);

        let first_sector_offset = sector_range.0;
        for i in 0..sector_offsets.count() {
            let (sector_offset, sector_len) = match sector_offsets.one(i) {
                Some(pair) => pair,
                None => break,
            };
            let slice_start = (sector_offset - first_sector_offset) as usize;
            let slice_end = slice_start + sector_len as usize;

            // if this is the last sector, then its size will be less than
            // one archive sector size, so account for that
            let expected_size = if (i + 1) == sector_offsets.count() {
                let mut size = block_entry.uncompressed_size % sector_size;

                if size == 0 {
                    size = sector_size;
                }
                size
            } else {
                sector_size
            };

            // decode the block and append it to the final result buffer
            let decoded_sector = decode_mpq_block(
                &raw_data[slice_start..slice_end],
                expected_size,
                encryption_key.map(|k| k.wrapping_add(i as u32)),
            )?;

            result.extend_from_slice(&decoded_sector);
        }

        if result.len() as u64 != block_entry.uncompressed_size {
            return Err(MpqError::corrupted("file decoded to an unexpected size"));
        }

        Ok(result)
    }
}

/// Maps an archive path to a relative filesystem path, rejecting
/// components that would let a file land outside the extraction
/// directory.
fn sanitized_relative_path(name: &str) -> Result<PathBuf, MpqError> {
    let mut path = PathBuf::new();

    for component in name.split(|c| c == '/' || c == '\\') {
        match component {
            "" | "." => continue,
            ".." => {
                return Err(MpqError::corrupted(
                    "archive path escapes the extraction directory",
                ));
            }
            component => path.push(component),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(MpqError::corrupted("archive path has no usable components"));
    }

    Ok(path)
}
