use std::fs;
use std::io::{Cursor, Seek, SeekFrom};

use warpack_mpq::{Compression, FileOptions, MpqBuilder, MpqError, MpqViewer};

/// Deterministic noise that neither deflate nor bzip2 can shrink much,
/// used to exercise the store fallback and multi-sector reads.
fn noise(len: usize) -> Vec<u8> {
    let mut seed = 0x2545_F491u32;
    (0..len)
        .map(|_| {
            seed = seed.wrapping_mul(0x0019_660D).wrapping_add(0x3C6E_F35F);
            (seed >> 24) as u8
        })
        .collect()
}

fn build_archive(files: &[(&str, &[u8], FileOptions)]) -> Vec<u8> {
    let mut builder = MpqBuilder::new();
    for (name, contents, options) in files {
        builder.add_file(name, contents.to_vec(), *options).unwrap();
    }

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    cursor.into_inner()
}

fn open_archive(bytes: Vec<u8>) -> MpqViewer<Cursor<Vec<u8>>> {
    MpqViewer::open(Cursor::new(bytes)).unwrap()
}

#[test]
fn test_build_open_read_roundtrip() {
    let big = noise(300_000);
    let compressible = vec![b'j'; 200_000];

    let bytes = build_archive(&[
        ("war3map.j", b"function main takes nothing returns nothing\nendfunction\n", FileOptions::default()),
        ("empty.txt", b"", FileOptions::default()),
        ("assets\\big.bin", &big, FileOptions::default()),
        ("assets\\script.j", &compressible, FileOptions::default()),
        (
            "stored.bin",
            &noise(5000),
            FileOptions {
                compress: false,
                ..FileOptions::default()
            },
        ),
    ]);

    let mut viewer = open_archive(bytes);
    assert_eq!(
        viewer.read_file("war3map.j").unwrap(),
        b"function main takes nothing returns nothing\nendfunction\n"
    );
    assert_eq!(viewer.read_file("empty.txt").unwrap(), b"");
    assert_eq!(viewer.read_file("assets\\big.bin").unwrap(), big);
    assert_eq!(viewer.read_file("assets\\script.j").unwrap(), compressible);
    assert_eq!(viewer.read_file("stored.bin").unwrap(), noise(5000));

    // name resolution is case- and separator-insensitive
    assert_eq!(viewer.read_file("ASSETS/BIG.BIN").unwrap(), big);

    match viewer.read_file("missing.txt") {
        Err(MpqError::FileNotFound { name }) => assert_eq!(name, "missing.txt"),
        other => panic!("expected FileNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_encrypted_files_roundtrip() {
    let big = noise(150_000);

    let encrypted = FileOptions {
        encrypt: true,
        ..FileOptions::default()
    };
    let adjusted = FileOptions {
        encrypt: true,
        adjust_key: true,
        ..FileOptions::default()
    };
    let encrypted_raw = FileOptions {
        encrypt: true,
        compress: false,
        ..FileOptions::default()
    };

    let bytes = build_archive(&[
        ("secret.txt", b"hidden payload", encrypted),
        ("secret2.txt", b"key-adjusted payload", adjusted),
        ("big.bin", &big, encrypted),
        ("raw.bin", &noise(100_000), encrypted_raw),
    ]);

    let mut viewer = open_archive(bytes);
    assert_eq!(viewer.read_file("secret.txt").unwrap(), b"hidden payload");
    assert_eq!(viewer.read_file("secret2.txt").unwrap(), b"key-adjusted payload");
    assert_eq!(viewer.read_file("big.bin").unwrap(), big);
    assert_eq!(viewer.read_file("raw.bin").unwrap(), noise(100_000));
}

#[test]
fn test_bzip2_compression_roundtrip() {
    let contents = vec![b'z'; 200_000];

    let mut builder = MpqBuilder::new();
    builder.compression(Compression::Bzip2).unwrap();
    builder
        .add_file("big.txt", contents.clone(), FileOptions::default())
        .unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    let stored = cursor.get_ref().len();
    assert!(stored < contents.len(), "bzip2 did not shrink the archive");

    let mut viewer = open_archive(cursor.into_inner());
    assert_eq!(viewer.read_file("big.txt").unwrap(), contents);
}

#[test]
fn test_listfile_enumeration() {
    let bytes = build_archive(&[
        ("a.txt", b"hello", FileOptions::default()),
        ("dir/b.txt", b"world", FileOptions::default()),
    ]);

    let mut viewer = open_archive(bytes);
    let files = viewer.files().unwrap();

    // the listfile never lists itself, and separators come back as `/`
    assert_eq!(files, vec!["a.txt".to_string(), "dir/b.txt".to_string()]);

    // but it is still a readable entry
    assert!(viewer.read_file("(listfile)").is_ok());
}

#[test]
fn test_sector_table_layout() {
    // 10,000 bytes at a 1,024-byte sector size: 9 full sectors, 1 partial,
    // so the sector offset table holds 11 offsets and spans 44 bytes.
    let contents = noise(10_000);

    let mut builder = MpqBuilder::new();
    builder.sector_size(1024).unwrap();
    builder
        .add_file("big.bin", contents.clone(), FileOptions::default())
        .unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    let bytes = cursor.into_inner();

    // the first file sits at the start of the payload region, right
    // after the 32-byte header; its first sector offset is the table's
    // own length
    let first_offset = u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);
    assert_eq!(first_offset, 44);

    let mut viewer = open_archive(bytes);
    assert_eq!(viewer.read_file("big.bin").unwrap(), contents);
}

#[test]
fn test_merge_precedence_both_orders() {
    let archive_a = build_archive(&[
        ("x.txt", b"from a", FileOptions::default()),
        ("only_a.txt", b"a", FileOptions::default()),
    ]);
    let archive_b = build_archive(&[
        ("x.txt", b"from b", FileOptions::default()),
        ("only_b.txt", b"b", FileOptions::default()),
    ]);

    // A then B: B wins at the overlapping path
    let mut builder = MpqBuilder::new();
    builder
        .add_from_archive(&mut open_archive(archive_a.clone()), FileOptions::default())
        .unwrap();
    builder
        .add_from_archive(&mut open_archive(archive_b.clone()), FileOptions::default())
        .unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    let mut merged = open_archive(cursor.into_inner());

    assert_eq!(merged.read_file("x.txt").unwrap(), b"from b");
    assert_eq!(merged.read_file("only_a.txt").unwrap(), b"a");
    assert_eq!(merged.read_file("only_b.txt").unwrap(), b"b");

    // B then A: A wins
    let mut builder = MpqBuilder::new();
    builder
        .add_from_archive(&mut open_archive(archive_b), FileOptions::default())
        .unwrap();
    builder
        .add_from_archive(&mut open_archive(archive_a), FileOptions::default())
        .unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    let mut merged = open_archive(cursor.into_inner());

    assert_eq!(merged.read_file("x.txt").unwrap(), b"from a");
}

#[test]
fn test_merge_decrypts_encrypted_sources() {
    let big = noise(100_000);
    let encrypted = FileOptions {
        encrypt: true,
        ..FileOptions::default()
    };

    let source = build_archive(&[
        ("secret.txt", b"decrypt me", encrypted),
        ("big.bin", &big, encrypted),
    ]);

    // the target requests plain storage, so the merge must decode the
    // sources rather than copy their ciphertext
    let mut builder = MpqBuilder::new();
    builder
        .add_from_archive(&mut open_archive(source), FileOptions::default())
        .unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    let mut merged = open_archive(cursor.into_inner());

    assert_eq!(merged.read_file("secret.txt").unwrap(), b"decrypt me");
    assert_eq!(merged.read_file("big.bin").unwrap(), big);
}

#[test]
fn test_merge_copies_compatible_entries_verbatim() {
    let big = noise(100_000);
    let source = build_archive(&[("big.bin", &big, FileOptions::default())]);

    let mut builder = MpqBuilder::new();
    builder
        .add_from_archive(&mut open_archive(source), FileOptions::default())
        .unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    let mut merged = open_archive(cursor.into_inner());

    assert_eq!(merged.read_file("big.bin").unwrap(), big);
}

#[test]
fn test_sector_size_change_after_merge() {
    // a merged multi-sector file is staged as a verbatim stored copy
    // laid out for the source's sector size; changing the builder's
    // sector size afterwards must not leave that stale layout in the
    // written archive
    let big = noise(300_000);
    let source = build_archive(&[("big.bin", &big, FileOptions::default())]);

    let mut builder = MpqBuilder::new();
    builder
        .add_from_archive(&mut open_archive(source), FileOptions::default())
        .unwrap();
    builder.sector_size(1024).unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();

    let mut merged = open_archive(cursor.into_inner());
    assert_eq!(merged.read_file("big.bin").unwrap(), big);
}

#[test]
fn test_deterministic_double_write() {
    let mut builder = MpqBuilder::new();
    builder
        .add_file("a.txt", "alpha", FileOptions::default())
        .unwrap();
    builder
        .add_file("b.bin", noise(50_000), FileOptions::default())
        .unwrap();

    let mut first = Cursor::new(Vec::new());
    builder.write_to(&mut first).unwrap();

    let mut second = Cursor::new(Vec::new());
    builder.write_to(&mut second).unwrap();

    assert_eq!(
        first.into_inner(),
        second.into_inner(),
        "two writes of the same builder state must be byte-identical"
    );
}

#[test]
fn test_add_after_write_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.mpq");

    let mut builder = MpqBuilder::new();
    builder
        .add_file("a.txt", "alpha", FileOptions::default())
        .unwrap();
    builder.write(&target).unwrap();

    match builder.add_file("b.txt", "beta", FileOptions::default()) {
        Err(MpqError::AlreadyFinalized) => {}
        other => panic!("expected AlreadyFinalized, got {:?}", other),
    }

    // the archive on disk is intact and readable
    let mut viewer = warpack_mpq::open(&target).unwrap();
    assert_eq!(viewer.read_file("a.txt").unwrap(), b"alpha");
}

#[test]
fn test_failed_write_leaves_previous_archive() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.mpq");

    let mut builder = warpack_mpq::create();
    builder
        .add_file("a.txt", "original", FileOptions::default())
        .unwrap();
    builder.write(&target).unwrap();

    // stage a disk source, then pull it out from under the builder so
    // that finalize fails mid-write
    let doomed = dir.path().join("doomed.txt");
    fs::write(&doomed, "gone").unwrap();

    let mut builder = warpack_mpq::create();
    builder
        .add_file("a.txt", "replacement", FileOptions::default())
        .unwrap();
    builder
        .add_from_file("b.txt", &doomed, FileOptions::default())
        .unwrap();
    fs::remove_file(&doomed).unwrap();

    match builder.write(&target) {
        Err(MpqError::FileIoError { path, .. }) => assert_eq!(path, doomed),
        other => panic!("expected FileIoError, got {:?}", other),
    }

    // the previous archive must be untouched
    let mut viewer = warpack_mpq::open(&target).unwrap();
    assert_eq!(viewer.read_file("a.txt").unwrap(), b"original");
}

#[test]
fn test_add_from_file_and_dir() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("tree");
    fs::create_dir_all(root.join("units")).unwrap();
    fs::write(root.join("war3map.j"), "call main()").unwrap();
    fs::write(root.join("units").join("custom.txt"), "footman").unwrap();

    let loose = dir.path().join("loose.txt");
    fs::write(&loose, "loose contents").unwrap();

    let mut builder = warpack_mpq::create();
    builder.add_from_dir(&root, FileOptions::default()).unwrap();
    builder
        .add_from_file("extra\\loose.txt", &loose, FileOptions::default())
        .unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    let mut viewer = open_archive(cursor.into_inner());

    assert_eq!(viewer.read_file("war3map.j").unwrap(), b"call main()");
    assert_eq!(viewer.read_file("units\\custom.txt").unwrap(), b"footman");
    assert_eq!(viewer.read_file("extra\\loose.txt").unwrap(), b"loose contents");

    let mut files = viewer.files().unwrap();
    files.sort();
    assert_eq!(files, vec!["extra/loose.txt", "units/custom.txt", "war3map.j"]);
}

#[test]
fn test_add_from_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.txt");

    let mut builder = warpack_mpq::create();
    match builder.add_from_file("a.txt", &missing, FileOptions::default()) {
        Err(MpqError::FileIoError { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected FileIoError, got {:?}", other),
    }
}

#[test]
fn test_extract_to_recreates_hierarchy() {
    let bytes = build_archive(&[
        ("war3map.j", b"script", FileOptions::default()),
        ("units\\custom.txt", b"footman", FileOptions::default()),
        ("abilities\\human\\heal.txt", b"heal", FileOptions::default()),
    ]);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("extracted");

    let mut viewer = open_archive(bytes);
    viewer.extract_to(&out).unwrap();

    assert_eq!(fs::read(out.join("war3map.j")).unwrap(), b"script");
    assert_eq!(
        fs::read(out.join("units").join("custom.txt")).unwrap(),
        b"footman"
    );
    assert_eq!(
        fs::read(out.join("abilities").join("human").join("heal.txt")).unwrap(),
        b"heal"
    );
}

#[test]
fn test_open_rejects_garbage() {
    match MpqViewer::open(Cursor::new(vec![0u8; 4096])) {
        Err(MpqError::NoHeader) => {}
        other => panic!("expected NoHeader, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_archive_after_prefix_data() {
    // archives are commonly appended to other data, e.g. a w3m header;
    // the builder aligns to the next 512-byte boundary and the viewer
    // scans for it
    let mut cursor = Cursor::new(vec![0xABu8; 100]);
    cursor.seek(SeekFrom::End(0)).unwrap();

    let mut builder = warpack_mpq::create();
    builder
        .add_file("a.txt", "prefixed", FileOptions::default())
        .unwrap();
    builder.write_to(&mut cursor).unwrap();

    let mut viewer = open_archive(cursor.into_inner());
    assert_eq!(viewer.read_file("a.txt").unwrap(), b"prefixed");
}
