//! A library for reading and writing the MoPaQ archive dialect used by
//! Warcraft III map tooling.
//!
//! `warpack-mpq` targets Version 1 archives only, as this is the version
//! of the format actively encountered in custom maps. No effort was made
//! to support features found in newer versions of the format.
//!
//! Archives are produced with an [`MpqBuilder`](struct.MpqBuilder.html):
//! files are staged with the `add_*` methods and written out in one go by
//! `write` (atomic, to a path) or `write_to` (to any `Write + Seek`).
//! Existing archives are opened with an [`MpqViewer`](struct.MpqViewer.html),
//! which reads stored files on demand and can enumerate or extract them
//! when the archive carries a `(listfile)`.
//!
//! # Supported features
//!
//! Not the whole range of MPQ features is supported. Notably, for reading:
//!
//! * IMA ADPCM compression is unsupported. This is usually present on `.wav` files.
//! * Huffman coding compression is unsupported. This is usually present on `.wav` files.
//! * PKWare DCL compression is unsupported. However, I haven't seen any WC3 maps that use it.
//! * Checksums and file attributes are not checked or read.
//!
//! For writing, sectors are compressed with DEFLATE by default; bzip2 can
//! be selected via [`MpqBuilder::compression`](struct.MpqBuilder.html#method.compression).
//!
//! # Protected MPQs
//!
//! In Warcraft III, it is not uncommon to encounter so-called "protected maps" which use various
//! obfuscations and hacks that are designed in such a manner that they can be read by WC3's
//! built-in MPQ implementation, but will trip up other implementations.
//!
//! **No effort is made to work around those "protections" in `warpack-mpq`**. In particular,
//! reading is likely to fail on a protected map which has explicitly subverted the archive
//! structure in some manner.
//!
//! # Example
//!
//! ```
//! # use warpack_mpq::MpqBuilder;
//! # use warpack_mpq::MpqViewer;
//! # use warpack_mpq::FileOptions;
//! # use std::io::{Cursor, Seek, SeekFrom};
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let buf: Vec<u8> = Vec::new();
//! let mut cursor = Cursor::new(buf);
//!
//! // creating an archive
//! let mut builder = MpqBuilder::new();
//! builder.add_file("hello.txt", "hello world!", FileOptions::default())?;
//! builder.write_to(&mut cursor)?;
//!
//! cursor.seek(SeekFrom::Start(0))?;
//!
//! // reading an archive
//! let mut viewer = MpqViewer::open(&mut cursor)?;
//! let file = viewer.read_file("hello.txt")?;
//!
//! assert_eq!(file.as_slice(), b"hello world!");
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub(crate) mod consts;
pub(crate) mod crypto;
pub(crate) mod header;
pub(crate) mod seeker;
pub(crate) mod tables;
pub(crate) mod util;

pub mod builder;
pub mod codec;
pub mod error;
pub mod viewer;

pub use builder::FileOptions;
pub use builder::MpqBuilder;
pub use codec::Compression;
pub use error::MpqError;
pub use viewer::MpqViewer;

/// Creates an empty archive builder with default settings.
pub fn create() -> MpqBuilder {
    MpqBuilder::new()
}

/// Opens an archive on disk for reading.
pub fn open<P: AsRef<Path>>(path: P) -> Result<MpqViewer<BufReader<File>>, MpqError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|cause| MpqError::file_io(path, cause))?;

    MpqViewer::open(BufReader::new(file))
}
