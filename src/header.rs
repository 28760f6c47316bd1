use std::io::Error as IoError;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use super::consts::*;
use super::error::MpqError;

#[derive(Debug)]
pub(crate) struct MpqFileHeader {
    pub header_size: u32,
    pub archive_size: u32,
    pub format_version: u16,
    pub sector_size_shift: u16,
    pub hash_table_offset: u32,
    pub block_table_offset: u32,
    pub hash_table_entries: u32,
    pub block_table_entries: u32,
}

impl MpqFileHeader {
    pub fn new_v1(
        archive_size: u32,
        sector_size: u64,
        hash_table_offset: u32,
        block_table_offset: u32,
        hash_table_entries: u32,
        block_table_entries: u32,
    ) -> MpqFileHeader {
        // the sector size is carried as a power-of-two shift over 512
        let mut size = sector_size / 512;
        let mut shift = 0u16;
        while size > 1 {
            size /= 2;
            shift += 1;
        }

        MpqFileHeader {
            header_size: HEADER_MPQ_SIZE as u32,
            archive_size,
            format_version: 0,
            sector_size_shift: shift,
            hash_table_offset,
            block_table_offset,
            hash_table_entries,
            block_table_entries,
        }
    }

    /// Reads the header fields following the magic, which the caller is
    /// expected to have consumed already.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<MpqFileHeader, MpqError> {
        let header_size = reader.read_u32::<LE>()?;
        let archive_size = reader.read_u32::<LE>()?;
        let format_version = reader.read_u16::<LE>()?;
        let sector_size_shift = reader.read_u16::<LE>()?;
        let hash_table_offset = reader.read_u32::<LE>()?;
        let block_table_offset = reader.read_u32::<LE>()?;
        let hash_table_entries = reader.read_u32::<LE>()?;
        let block_table_entries = reader.read_u32::<LE>()?;

        if format_version != 0 {
            return Err(MpqError::UnsupportedVersion);
        }

        Ok(MpqFileHeader {
            header_size,
            archive_size,
            format_version,
            sector_size_shift,
            hash_table_offset,
            block_table_offset,
            hash_table_entries,
            block_table_entries,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), IoError> {
        writer.write_u32::<LE>(HEADER_MPQ_MAGIC)?;
        writer.write_u32::<LE>(self.header_size)?;
        writer.write_u32::<LE>(self.archive_size)?;
        writer.write_u16::<LE>(self.format_version)?;
        writer.write_u16::<LE>(self.sector_size_shift)?;
        writer.write_u32::<LE>(self.hash_table_offset)?;
        writer.write_u32::<LE>(self.block_table_offset)?;
        writer.write_u32::<LE>(self.hash_table_entries)?;
        writer.write_u32::<LE>(self.block_table_entries)?;

        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct MpqUserHeader {
    pub(crate) file_header_offset: u32,
}

impl MpqUserHeader {
    pub fn from_reader<R: Read>(mut reader: R) -> Result<MpqUserHeader, MpqError> {
        // the user data size precedes the offset but is not needed to
        // follow the indirection
        let _user_data_size = reader.read_u32::<LE>()?;
        let file_header_offset = reader.read_u32::<LE>()?;

        Ok(MpqUserHeader { file_header_offset })
    }
}
