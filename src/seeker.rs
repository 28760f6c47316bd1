use std::io::{Read, Seek, SeekFrom};

use byteorder::{ReadBytesExt, LE};

use super::consts::*;
use super::error::MpqError;
use super::header::*;

#[derive(Debug)]
pub(crate) struct MpqSeeker<R: Read + Seek> {
    reader: R,
    archive_info: ArchiveInfo,
}

impl<R: Read + Seek> MpqSeeker<R> {
    pub(crate) fn new(mut reader: R) -> Result<MpqSeeker<R>, MpqError> {
        let archive_info = find_headers(&mut reader)?;

        Ok(MpqSeeker {
            reader,
            archive_info,
        })
    }

    fn archive_offset(&self, offset: u64) -> u64 {
        offset + self.archive_info.header_offset
    }

    pub(crate) fn info(&self) -> &ArchiveInfo {
        &self.archive_info
    }

    /// Reads a region given by an archive-relative offset, as stored in
    /// the header's table offsets.
    pub(crate) fn read(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, MpqError> {
        if offset + size > self.archive_info.archive_size {
            return Err(MpqError::corrupted("read past the end of the archive"));
        }

        self.reader.seek(SeekFrom::Start(self.archive_offset(offset)))?;
        let mut buf = vec![0u8; size as usize];
        self.reader.read_exact(&mut buf)?;

        Ok(buf)
    }

    /// Reads a region given by a payload-relative offset, as stored in
    /// block table entries. The payload region begins right after the
    /// header.
    pub(crate) fn read_payload(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, MpqError> {
        self.read(offset + HEADER_MPQ_SIZE, size)
    }
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct TableInfo {
    pub(crate) entries: u64,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

#[derive(Debug)]
pub(crate) struct ArchiveInfo {
    pub(crate) hash_table_info: TableInfo,
    pub(crate) block_table_info: TableInfo,

    pub(crate) sector_size: u64,
    pub(crate) archive_size: u64,
    pub(crate) header_offset: u64,
}

impl ArchiveInfo {
    fn new(
        file_size: u64,
        header_offset: u64,
        header: &MpqFileHeader,
    ) -> Result<ArchiveInfo, MpqError> {
        if header.sector_size_shift > MAX_SECTOR_SHIFT {
            return Err(MpqError::corrupted("sector size shift is out of range"));
        }

        let archive_size = u64::from(header.archive_size);
        if header_offset + archive_size > file_size {
            return Err(MpqError::corrupted("archive extends past the end of the file"));
        }

        let hash_entries = u64::from(header.hash_table_entries);
        let block_entries = u64::from(header.block_table_entries);

        if !hash_entries.is_power_of_two() {
            return Err(MpqError::corrupted("hash table size is not a power of two"));
        }
        if !block_entries.is_power_of_two() {
            return Err(MpqError::corrupted("block table size is not a power of two"));
        }

        let hash_table_info = TableInfo {
            entries: hash_entries,
            offset: u64::from(header.hash_table_offset),
            size: hash_entries * u64::from(HASH_TABLE_ENTRY_SIZE),
        };

        let block_table_info = TableInfo {
            entries: block_entries,
            offset: u64::from(header.block_table_offset),
            size: block_entries * u64::from(BLOCK_TABLE_ENTRY_SIZE),
        };

        if hash_table_info.offset + hash_table_info.size > archive_size {
            return Err(MpqError::corrupted("hash table extends past the end of the archive"));
        }
        if block_table_info.offset + block_table_info.size > archive_size {
            return Err(MpqError::corrupted(
                "block table extends past the end of the archive",
            ));
        }

        let sector_size = 512 * 2u64.pow(u32::from(header.sector_size_shift));

        Ok(ArchiveInfo {
            hash_table_info,
            block_table_info,
            sector_size,
            archive_size,
            header_offset,
        })
    }
}

/// Scans 512-byte boundaries for an archive header, following a user
/// data header's indirection if one is found first. The scan is bounded
/// so that an arbitrarily large non-archive file fails fast.
fn find_headers<R: Read + Seek>(mut reader: R) -> Result<ArchiveInfo, MpqError> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let scan_end = file_size.min(MAX_HEADER_SCAN);

    let mut header: Option<MpqFileHeader> = None;
    let mut file_header_offset: u64 = 0;

    let mut boundary = 0;
    while boundary + 4 <= scan_end {
        reader.seek(SeekFrom::Start(boundary))?;

        let magic = reader.read_u32::<LE>()?;

        if magic == HEADER_USER_MAGIC {
            let user_header = MpqUserHeader::from_reader(&mut reader)?;
            file_header_offset = boundary + u64::from(user_header.file_header_offset);

            if file_header_offset + 4 > file_size {
                return Err(MpqError::corrupted("user header points outside the file"));
            }

            reader.seek(SeekFrom::Start(file_header_offset))?;
            let magic = reader.read_u32::<LE>()?;
            if magic != HEADER_MPQ_MAGIC {
                return Err(MpqError::corrupted(
                    "user header does not point at an archive header",
                ));
            }

            header = Some(MpqFileHeader::from_reader(&mut reader)?);
            break;
        } else if magic == HEADER_MPQ_MAGIC {
            file_header_offset = boundary;
            header = Some(MpqFileHeader::from_reader(&mut reader)?);
            break;
        }

        boundary += HEADER_BOUNDARY;
    }

    match header {
        Some(header) => ArchiveInfo::new(file_size, file_header_offset, &header),
        None => Err(MpqError::NoHeader),
    }
}
