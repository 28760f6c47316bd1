use std::borrow::Cow;
use std::fs;
use std::io::Error as IoError;
use std::io::ErrorKind;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use indexmap::IndexMap;
use log::{debug, trace};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::codec::{compress_mpq_block, decode_mpq_block, Compression};
use super::consts::*;
use super::crypto::*;
use super::error::MpqError;
use super::header::MpqFileHeader;
use super::tables::{BlockTableEntry, HashTable};
use super::util::sector_count_from_size;
use super::viewer::MpqViewer;

/// Per-file storage options.
#[derive(Debug, Clone, Copy)]
pub struct FileOptions {
    /// Encrypt the file with a key derived from its name.
    pub encrypt: bool,
    /// Compress each sector, falling back to storing raw whenever
    /// compression does not actually shrink it.
    pub compress: bool,
    /// Additionally mix the file's position and size into its
    /// encryption key. Only meaningful together with `encrypt`.
    pub adjust_key: bool,
    /// List the file in the archive's `(listfile)`.
    pub include_in_listfile: bool,
}

impl Default for FileOptions {
    fn default() -> FileOptions {
        FileOptions {
            encrypt: false,
            compress: true,
            adjust_key: false,
            include_in_listfile: true,
        }
    }
}

impl FileOptions {
    fn flags(self) -> u32 {
        let mut flags = MPQ_FILE_EXISTS;

        if self.encrypt {
            flags |= MPQ_FILE_ENCRYPTED;
        }

        if self.adjust_key {
            flags |= MPQ_FILE_ADJUST_KEY;
        }

        if self.compress {
            flags |= MPQ_FILE_COMPRESS;
        }

        flags
    }
}

#[derive(Debug)]
enum PendingSource {
    /// Contents staged in memory.
    Bytes(Vec<u8>),
    /// Contents read from disk at write time.
    Disk(PathBuf),
    /// An already-encoded stored region copied from another archive,
    /// written back verbatim under the given flags. The sector size it
    /// was encoded with is kept, since the copy is only valid while the
    /// builder still writes that size.
    Stored {
        data: Vec<u8>,
        file_size: u64,
        flags: u32,
        sector_size: u64,
    },
}

#[derive(Debug)]
struct PendingFile {
    file_name: String,
    source: PendingSource,
    options: FileOptions,
}

/// Implementation of a MoPaQ archive builder.
///
/// Files are staged with the `add_*` methods and nothing is written
/// until `write` or `write_to` is called. Re-adding a path replaces the
/// staged contents but keeps the original insertion position, so the
/// output layout stays stable under overrides.
///
/// A builder that has written an archive rejects further mutation, but
/// may write the same archive again.
#[derive(Debug)]
pub struct MpqBuilder {
    added_files: IndexMap<PathHash, PendingFile>,

    sector_size: u64,
    compression: Compression,
    finalized: bool,
}

impl Default for MpqBuilder {
    fn default() -> MpqBuilder {
        MpqBuilder {
            added_files: IndexMap::new(),
            sector_size: 0x10000,
            compression: Compression::default(),
            finalized: false,
        }
    }
}

impl MpqBuilder {
    pub fn new() -> MpqBuilder {
        MpqBuilder::default()
    }

    /// Stage a file with the given contents.
    ///
    /// Separators in `file_name` are normalized to backslashes, and
    /// name resolution is case-insensitive. Adding a name that is
    /// already staged replaces its contents and options.
    pub fn add_file<C>(
        &mut self,
        file_name: &str,
        contents: C,
        options: FileOptions,
    ) -> Result<(), MpqError>
    where
        C: Into<Vec<u8>>,
    {
        self.check_not_finalized()?;

        let file_name = canonical_name(file_name);
        let hash = PathHash::of(&file_name);

        self.added_files.insert(
            hash,
            PendingFile {
                file_name,
                source: PendingSource::Bytes(contents.into()),
                options,
            },
        );

        Ok(())
    }

    /// Stage a file whose contents live on disk at `path`.
    ///
    /// The path is checked to be a regular file right away, but its
    /// contents are only read when the archive is written.
    pub fn add_from_file<P>(
        &mut self,
        file_name: &str,
        path: P,
        options: FileOptions,
    ) -> Result<(), MpqError>
    where
        P: Into<PathBuf>,
    {
        self.check_not_finalized()?;

        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|cause| MpqError::file_io(&path, cause))?;
        if !metadata.is_file() {
            return Err(MpqError::file_io(
                &path,
                IoError::new(ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        let file_name = canonical_name(file_name);
        let hash = PathHash::of(&file_name);

        self.added_files.insert(
            hash,
            PendingFile {
                file_name,
                source: PendingSource::Disk(path),
                options,
            },
        );

        Ok(())
    }

    /// Stage every file under `dir`, using paths relative to `dir` as
    /// archive names. The walk order is deterministic, so repeated
    /// builds from the same tree produce the same archive.
    pub fn add_from_dir<P>(&mut self, dir: P, options: FileOptions) -> Result<(), MpqError>
    where
        P: AsRef<Path>,
    {
        self.check_not_finalized()?;

        let dir = dir.as_ref();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(walk_error)?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|err| IoError::new(ErrorKind::Other, err))?;
            let relative = relative.to_str().ok_or_else(|| {
                MpqError::file_io(
                    entry.path(),
                    IoError::new(ErrorKind::InvalidData, "file name is not valid UTF-8"),
                )
            })?;

            let file_name = canonical_name(relative);
            let hash = PathHash::of(&file_name);

            trace!("staging {} from {:?}", file_name, entry.path());

            self.added_files.insert(
                hash,
                PendingFile {
                    file_name,
                    source: PendingSource::Disk(entry.path().to_path_buf()),
                    options,
                },
            );
        }

        Ok(())
    }

    /// Stage every enumerable file of another archive.
    ///
    /// Stored regions are copied verbatim when this builder would
    /// encode them identically, which skips a decode/re-encode cycle.
    /// Anything else, encrypted sources in particular, is decoded and
    /// staged as plain contents under this builder's own options.
    pub fn add_from_archive<R>(
        &mut self,
        source: &mut MpqViewer<R>,
        options: FileOptions,
    ) -> Result<(), MpqError>
    where
        R: Read + Seek,
    {
        self.check_not_finalized()?;

        for source_name in source.files()? {
            let file_name = canonical_name(&source_name);
            let hash = PathHash::of(&file_name);

            let block_entry = source.stored_block(&file_name)?;

            let compatible = !block_entry.is_encrypted()
                && !block_entry.is_imploded()
                && !options.encrypt
                && block_entry.is_compressed() == options.compress
                && (block_entry.is_single_unit() || source.sector_size() == self.sector_size);

            let pending = if compatible {
                trace!("staging {} as a stored copy", file_name);

                let data = source.read_stored(&block_entry)?;
                PendingFile {
                    file_name,
                    source: PendingSource::Stored {
                        data,
                        file_size: block_entry.uncompressed_size,
                        flags: (block_entry.flags & (MPQ_FILE_COMPRESS | MPQ_FILE_SINGLE_UNIT))
                            | MPQ_FILE_EXISTS,
                        sector_size: source.sector_size(),
                    },
                    options,
                }
            } else {
                trace!("staging {} via decode", file_name);

                let contents = source.read_file(&file_name)?;
                PendingFile {
                    file_name,
                    source: PendingSource::Bytes(contents),
                    options,
                }
            };

            self.added_files.insert(hash, pending);
        }

        Ok(())
    }

    /// Sets the sector size used for all files written by this builder.
    ///
    /// Must be a power of two between 512 and `512 << 15`.
    pub fn sector_size(&mut self, sector_size: u64) -> Result<(), MpqError> {
        self.check_not_finalized()?;

        let max = HEADER_BOUNDARY << MAX_SECTOR_SHIFT;
        if !sector_size.is_power_of_two() || sector_size < HEADER_BOUNDARY || sector_size > max {
            return Err(MpqError::InvalidSectorSize { size: sector_size });
        }

        self.sector_size = sector_size;

        Ok(())
    }

    /// Sets the codec that sectors are compressed with.
    pub fn compression(&mut self, compression: Compression) -> Result<(), MpqError> {
        self.check_not_finalized()?;

        self.compression = compression;

        Ok(())
    }

    /// Writes out the entire archive to the specified writer.
    ///
    /// The archive start position is calculated as follows:
    /// `((current_pos + (HEADER_BOUNDARY - 1)) / HEADER_BOUNDARY) * HEADER_BOUNDARY`
    /// Where `current_pos` is the writer's current seek pos, and `HEADER_BOUNDARY` is 512.
    ///
    /// Will write the following:
    /// - MPQ Header
    /// - All files with their sector offset tables
    /// - A regenerated `(listfile)`
    /// - MPQ hash table
    /// - MPQ block table
    ///
    /// After the first successful write the builder can no longer be
    /// mutated, but writing again produces a byte-identical archive.
    pub fn write_to<W>(&mut self, mut writer: W) -> Result<(), MpqError>
    where
        W: Write + Seek,
    {
        let current_pos = writer.seek(SeekFrom::Current(0))?;
        // starting from the current pos, this will find the closest valid header position
        let archive_start =
            ((current_pos + (HEADER_BOUNDARY - 1)) / HEADER_BOUNDARY) * HEADER_BOUNDARY;
        writer.seek(SeekFrom::Start(archive_start))?;

        // skip writing the header for now
        writer.seek(SeekFrom::Current(HEADER_MPQ_SIZE as i64))?;

        let listfile_hash = PathHash::of(LISTFILE_NAME);
        let mut blocks: Vec<(PathHash, BlockTableEntry)> =
            Vec::with_capacity(self.added_files.len() + 1);

        // write out all the files back-to-back
        for (hash, file) in &self.added_files {
            // a staged (listfile) is superseded by the generated one
            if *hash == listfile_hash {
                continue;
            }

            let block_entry = match &file.source {
                PendingSource::Bytes(contents) => write_file_data(
                    &mut writer,
                    archive_start,
                    self.sector_size,
                    self.compression,
                    &file.file_name,
                    contents,
                    file.options,
                )?,
                PendingSource::Disk(path) => {
                    let contents =
                        fs::read(path).map_err(|cause| MpqError::file_io(path, cause))?;

                    write_file_data(
                        &mut writer,
                        archive_start,
                        self.sector_size,
                        self.compression,
                        &file.file_name,
                        &contents,
                        file.options,
                    )?
                }
                PendingSource::Stored {
                    data,
                    file_size,
                    flags,
                    sector_size,
                } => {
                    // a compressed multi-sector region has its sector
                    // table laid out for the sector size it was encoded
                    // with; if the builder's size changed since staging,
                    // decode it and write it out fresh
                    let needs_recode = (*flags & MPQ_FILE_COMPRESS) != 0
                        && (*flags & MPQ_FILE_SINGLE_UNIT) == 0
                        && *sector_size != self.sector_size;

                    if needs_recode {
                        trace!("re-encoding stored copy of {}", file.file_name);

                        let contents = decode_stored_region(data, *file_size, *sector_size)?;
                        write_file_data(
                            &mut writer,
                            archive_start,
                            self.sector_size,
                            self.compression,
                            &file.file_name,
                            &contents,
                            file.options,
                        )?
                    } else {
                        write_stored_data(&mut writer, archive_start, data, *file_size, *flags)?
                    }
                }
            };

            blocks.push((*hash, block_entry));
        }

        // regenerate the listfile on every write
        let listfile = self.render_listfile();
        let listfile_entry = write_file_data(
            &mut writer,
            archive_start,
            self.sector_size,
            self.compression,
            LISTFILE_NAME,
            listfile.as_bytes(),
            FileOptions {
                encrypt: true,
                compress: true,
                adjust_key: true,
                include_in_listfile: false,
            },
        )?;
        blocks.push((listfile_hash, listfile_entry));

        // write hash table and remember its position
        let hash_table_pos = writer.seek(SeekFrom::Current(0))?;
        let capacity = HashTable::capacity_for(blocks.len());
        let mut hash_table = HashTable::with_capacity(capacity);
        for (block_index, (hash, _)) in blocks.iter().enumerate() {
            // capacity keeps the table under 3/4 full, so a free slot exists
            let inserted = hash_table.insert(*hash, block_index as u32);
            debug_assert!(inserted);
        }

        let mut buf = vec![0u8; capacity * HASH_TABLE_ENTRY_SIZE as usize];
        {
            let mut cursor = buf.as_mut_slice();
            for entry in hash_table.entries() {
                entry.write(&mut cursor)?;
            }
        }
        encrypt_mpq_block(&mut buf, HASH_TABLE_KEY);
        writer.write_all(&buf)?;

        // write block table and remember its position, padding the
        // count up to a power of two with vacant rows
        let block_table_pos = writer.seek(SeekFrom::Current(0))?;
        let block_count = blocks.len().next_power_of_two();

        let mut buf = vec![0u8; block_count * BLOCK_TABLE_ENTRY_SIZE as usize];
        {
            let mut cursor = buf.as_mut_slice();
            for (_, block_entry) in &blocks {
                block_entry.write(&mut cursor)?;
            }
            for _ in blocks.len()..block_count {
                BlockTableEntry::empty().write(&mut cursor)?;
            }
        }
        encrypt_mpq_block(&mut buf, BLOCK_TABLE_KEY);
        writer.write_all(&buf)?;

        // write header
        let archive_end = writer.seek(SeekFrom::Current(0))?;
        let header = MpqFileHeader::new_v1(
            (archive_end - archive_start) as u32,
            self.sector_size,
            (hash_table_pos - archive_start) as u32,
            (block_table_pos - archive_start) as u32,
            capacity as u32,
            block_count as u32,
        );

        writer.seek(SeekFrom::Start(archive_start))?;
        header.write(&mut writer)?;
        writer.seek(SeekFrom::Start(archive_end))?;

        self.finalized = true;

        debug!(
            "wrote archive: {} files, {} hash slots, {} bytes",
            blocks.len(),
            capacity,
            archive_end - archive_start
        );

        Ok(())
    }

    /// Writes the archive to `path` atomically: the bytes go into a
    /// temporary file in the same directory, which is then renamed over
    /// `path`. A failed write leaves any previous file untouched.
    pub fn write<P: AsRef<Path>>(&mut self, path: P) -> Result<(), MpqError> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp =
            NamedTempFile::new_in(parent).map_err(|cause| MpqError::file_io(path, cause))?;
        self.write_to(temp.as_file_mut())?;
        temp.persist(path)
            .map_err(|err| MpqError::file_io(path, err.error))?;

        Ok(())
    }

    fn check_not_finalized(&self) -> Result<(), MpqError> {
        if self.finalized {
            return Err(MpqError::AlreadyFinalized);
        }

        Ok(())
    }

    fn render_listfile(&self) -> String {
        let listfile_hash = PathHash::of(LISTFILE_NAME);

        let mut listfile = String::new();
        for (hash, file) in &self.added_files {
            if !file.options.include_in_listfile || *hash == listfile_hash {
                continue;
            }

            listfile += &file.file_name;
            listfile += "\r\n";
        }

        listfile
    }
}

fn canonical_name(name: &str) -> String {
    name.replace('/', "\\")
}

fn walk_error(err: walkdir::Error) -> MpqError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    let cause = err
        .into_io_error()
        .unwrap_or_else(|| IoError::new(ErrorKind::Other, "directory walk failed"));

    MpqError::file_io(path, cause)
}

/// Writes out the specified file starting at the writer's current position.
/// Files no longer than one sector are written as a single unit without
/// a sector offset table (SOT).
/// If the file is marked for compression, a SOT will be written, and all sectors will attempt compression.
/// If the file is not marked for compression, no SOT will be written.
/// If the file is marked for encryption, it will also be encrypted after compression.
fn write_file_data<W>(
    mut writer: W,
    archive_start: u64,
    sector_size: u64,
    compression: Compression,
    file_name: &str,
    contents: &[u8],
    options: FileOptions,
) -> Result<BlockTableEntry, MpqError>
where
    W: Write + Seek,
{
    let mut flags = options.flags();
    let file_start = writer.seek(SeekFrom::Current(0))?;
    // block offsets are relative to the payload region, which starts
    // right after the header
    let file_pos = file_start - archive_start - HEADER_MPQ_SIZE;

    // calculate the encryption key if encryption was requested
    let encryption_key = if options.encrypt {
        Some(calculate_file_key(
            file_name,
            file_pos as u32,
            contents.len() as u32,
            options.adjust_key,
        ))
    } else {
        None
    };

    if contents.len() as u64 <= sector_size {
        flags |= MPQ_FILE_SINGLE_UNIT;

        let mut block = if options.compress {
            compress_mpq_block(contents, compression)
        } else {
            Cow::Borrowed(contents)
        };

        if let Some(key) = encryption_key {
            encrypt_mpq_block(block.to_mut(), key);
        }

        writer.write_all(&block)?;

        return Ok(BlockTableEntry::new(
            file_pos,
            block.len() as u64,
            contents.len() as u64,
            flags,
        ));
    }

    let sector_count = sector_count_from_size(contents.len() as u64, sector_size);

    if options.compress {
        let mut offsets: Vec<u32> = Vec::with_capacity(sector_count as usize + 1);

        // store the start of the first sector and prepare to write there
        let first_sector_start = ((sector_count + 1) * 4) as u32;
        writer.seek(SeekFrom::Current(i64::from(first_sector_start)))?;
        offsets.push(first_sector_start);

        // write each sector and the offset of its end
        for (i, sector) in contents.chunks(sector_size as usize).enumerate() {
            let mut block = compress_mpq_block(sector, compression);

            // encrypt the block if encryption was requested
            if let Some(key) = encryption_key.map(|k| k.wrapping_add(i as u32)) {
                encrypt_mpq_block(block.to_mut(), key);
            }

            writer.write_all(&block)?;

            // store the end of the current sector
            // which is also the start of the next sector if there is one
            let current_offset = writer.seek(SeekFrom::Current(0))?;
            offsets.push((current_offset - file_start) as u32);
        }

        let file_end = writer.seek(SeekFrom::Current(0))?;

        // write the sector offset table
        {
            let mut buf = vec![0u8; offsets.len() * 4];
            let mut cursor = buf.as_mut_slice();
            for offset in &offsets {
                cursor.write_u32::<LE>(*offset)?;
            }

            // encrypt the SOT if requested
            if let Some(key) = encryption_key.map(|k| k.wrapping_sub(1)) {
                encrypt_mpq_block(&mut buf, key);
            }

            writer.seek(SeekFrom::Start(file_start))?;
            writer.write_all(&buf)?;
        }

        // put the writer at the file end, so that we don't overwrite this file with subsequent writes
        writer.seek(SeekFrom::Start(file_end))?;

        Ok(BlockTableEntry::new(
            file_pos,
            file_end - file_start,
            contents.len() as u64,
            flags,
        ))
    } else {
        // write each sector
        for (i, sector) in contents.chunks(sector_size as usize).enumerate() {
            let mut block = Cow::Borrowed(sector);

            // encrypt the block if encryption was requested
            if let Some(key) = encryption_key.map(|k| k.wrapping_add(i as u32)) {
                encrypt_mpq_block(block.to_mut(), key);
            }

            writer.write_all(&block)?;
        }

        let file_end = writer.seek(SeekFrom::Current(0))?;

        Ok(BlockTableEntry::new(
            file_pos,
            file_end - file_start,
            contents.len() as u64,
            flags,
        ))
    }
}

/// Decodes a compressed multi-sector stored region copied from another
/// archive: the leading sector offset table followed by the sectors,
/// encoded at `sector_size`. Only unencrypted regions are ever staged
/// this way, so no key handling is needed.
fn decode_stored_region(
    data: &[u8],
    file_size: u64,
    sector_size: u64,
) -> Result<Vec<u8>, MpqError> {
    let sector_count = sector_count_from_size(file_size, sector_size) as usize;
    let table_len = (sector_count + 1) * 4;

    if data.len() < table_len {
        return Err(MpqError::corrupted(
            "stored region is shorter than its sector table",
        ));
    }

    let mut offsets = vec![0u32; sector_count + 1];
    let mut slice = &data[..table_len];
    for offset in offsets.iter_mut() {
        *offset = slice.read_u32::<LE>()?;
    }

    if offsets[0] as usize != table_len || offsets[sector_count] as usize != data.len() {
        return Err(MpqError::corrupted(
            "stored region's sector table does not cover it",
        ));
    }

    let mut result = Vec::with_capacity(file_size as usize);
    for i in 0..sector_count {
        let start = offsets[i] as usize;
        let end = offsets[i + 1] as usize;
        if end <= start || end > data.len() {
            return Err(MpqError::corrupted("stored region's sector table is not increasing"));
        }

        let expected_size = if i + 1 == sector_count {
            let mut size = file_size % sector_size;
            if size == 0 {
                size = sector_size;
            }
            size
        } else {
            sector_size
        };

        let decoded = decode_mpq_block(&data[start..end], expected_size, None)?;
        result.extend_from_slice(&decoded);
    }

    Ok(result)
}

/// Writes an already-encoded stored region back out verbatim.
fn write_stored_data<W>(
    mut writer: W,
    archive_start: u64,
    data: &[u8],
    file_size: u64,
    flags: u32,
) -> Result<BlockTableEntry, MpqError>
where
    W: Write + Seek,
{
    let file_start = writer.seek(SeekFrom::Current(0))?;
    let file_pos = file_start - archive_start - HEADER_MPQ_SIZE;

    writer.write_all(data)?;

    Ok(BlockTableEntry::new(
        file_pos,
        data.len() as u64,
        file_size,
        flags,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("war3map.j"), "war3map.j");
        assert_eq!(canonical_name("abilities/human.txt"), "abilities\\human.txt");
        assert_eq!(canonical_name("a\\b/c"), "a\\b\\c");
    }

    #[test]
    fn test_options_flags() {
        assert_eq!(
            FileOptions::default().flags(),
            MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS
        );

        let all = FileOptions {
            encrypt: true,
            compress: true,
            adjust_key: true,
            include_in_listfile: true,
        };
        assert_eq!(
            all.flags(),
            MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS | MPQ_FILE_ENCRYPTED | MPQ_FILE_ADJUST_KEY
        );

        let stored = FileOptions {
            encrypt: false,
            compress: false,
            adjust_key: false,
            include_in_listfile: false,
        };
        assert_eq!(stored.flags(), MPQ_FILE_EXISTS);
    }

    #[test]
    fn test_listfile_rendering() {
        let mut builder = MpqBuilder::new();
        builder
            .add_file("b.txt", "b", FileOptions::default())
            .unwrap();
        builder
            .add_file("dir/a.txt", "a", FileOptions::default())
            .unwrap();
        builder
            .add_file(
                "hidden.txt",
                "h",
                FileOptions {
                    include_in_listfile: false,
                    ..FileOptions::default()
                },
            )
            .unwrap();

        assert_eq!(builder.render_listfile(), "b.txt\r\ndir\\a.txt\r\n");
    }

    #[test]
    fn test_staged_listfile_is_not_listed() {
        let mut builder = MpqBuilder::new();
        builder
            .add_file("(listfile)", "fake", FileOptions::default())
            .unwrap();
        builder
            .add_file("a.txt", "a", FileOptions::default())
            .unwrap();

        assert_eq!(builder.render_listfile(), "a.txt\r\n");
    }

    #[test]
    fn test_duplicate_add_keeps_position() {
        let mut builder = MpqBuilder::new();
        builder
            .add_file("a.txt", "first", FileOptions::default())
            .unwrap();
        builder
            .add_file("b.txt", "b", FileOptions::default())
            .unwrap();
        builder
            .add_file("A.TXT", "second", FileOptions::default())
            .unwrap();

        assert_eq!(builder.added_files.len(), 2);
        assert_eq!(builder.render_listfile(), "A.TXT\r\nb.txt\r\n");

        let (_, replaced) = builder.added_files.get_index(0).unwrap();
        match &replaced.source {
            PendingSource::Bytes(bytes) => assert_eq!(bytes, b"second"),
            other => panic!("expected staged bytes, got {:?}", other),
        }
    }

    #[test]
    fn test_sector_size_validation() {
        let mut builder = MpqBuilder::new();

        builder.sector_size(512).unwrap();
        builder.sector_size(0x10000).unwrap();
        builder.sector_size(512 << 15).unwrap();

        for &bad in &[0u64, 256, 1000, (512 << 15) + 1, 512 << 16] {
            match builder.sector_size(bad) {
                Err(MpqError::InvalidSectorSize { size }) => assert_eq!(size, bad),
                other => panic!("expected InvalidSectorSize, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_finalize_locks_the_builder() {
        let mut builder = MpqBuilder::new();
        builder
            .add_file("a.txt", "a", FileOptions::default())
            .unwrap();

        let mut cursor = Cursor::new(Vec::new());
        builder.write_to(&mut cursor).unwrap();

        match builder.add_file("b.txt", "b", FileOptions::default()) {
            Err(MpqError::AlreadyFinalized) => {}
            other => panic!("expected AlreadyFinalized, got {:?}", other),
        }
        match builder.sector_size(1024) {
            Err(MpqError::AlreadyFinalized) => {}
            other => panic!("expected AlreadyFinalized, got {:?}", other),
        }
        match builder.compression(Compression::Bzip2) {
            Err(MpqError::AlreadyFinalized) => {}
            other => panic!("expected AlreadyFinalized, got {:?}", other),
        }
    }
}
