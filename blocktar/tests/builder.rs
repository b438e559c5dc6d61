use std::io;

use blocktar::{ArchiveReader, ArchiveWriter, Entry, EntryKind, Error, Mode};
use blocktar_core::header::{CHECKSUM, MAGIC, NAME, PREFIX, SIZE, UID};
use blocktar_core::{Header, BLOCK_SIZE};

fn eprint_field(label: &str, field: &[u8]) {
    eprintln!("{:>10}: {:?} ({:02x?})", label, String::from_utf8_lossy(field), field);
}

// Dump the interesting fields of the first header to stderr
fn format_print_header(archive: &[u8]) {
    let block = &archive[..BLOCK_SIZE];
    eprintln!("Header");
    eprint_field("Name", &block[NAME.range()]);
    eprint_field("Uid", &block[UID.range()]);
    eprint_field("Size", &block[SIZE.range()]);
    eprint_field("Checksum", &block[CHECKSUM.range()]);
    eprint_field("Magic", &block[MAGIC.range()]);
    eprint_field("Prefix", &block[PREFIX.range()]);
}

const SOME_FILE_PATH: &str = "some/file";
const SOME_FILE_MODE: Mode = Mode::from_bits_truncate(0o640);
const SOME_FILE_CONTENTS: &[u8; 18] = b"some file contents";

fn some_file() -> Entry {
    Entry {
        path: SOME_FILE_PATH.as_bytes().to_vec(),
        kind: EntryKind::File,
        mode: SOME_FILE_MODE,
        uid: 1000,
        gid: 1000,
        size: SOME_FILE_CONTENTS.len() as u64,
        mtime: 1_500_000_000,
        link_target: Vec::new(),
        uname: b"user".to_vec(),
        gname: b"users".to_vec(),
    }
}

fn write_archive(entries: &[(Entry, &[u8])], strict: bool) -> Result<Vec<u8>, Error> {
    let mut writer = ArchiveWriter::new(Vec::new(), strict);
    for (entry, content) in entries {
        writer.append_entry(entry, *content)?;
    }
    let (archive, report) = writer.finish()?;
    assert!(report.skipped.is_empty(), "{:?}", report.skipped);
    Ok(archive)
}

#[test]
fn writer_layout() -> Result<(), Error> {
    let archive = write_archive(&[(some_file(), &SOME_FILE_CONTENTS[..])], true)?;
    format_print_header(&archive);

    assert_eq!(archive.len(), 4 * BLOCK_SIZE);
    assert_eq!(&archive[..SOME_FILE_PATH.len()], SOME_FILE_PATH.as_bytes());
    assert_eq!(&archive[SIZE.range()], b"00000000022\0");
    assert_eq!(&archive[MAGIC.range()], b"ustar\0");
    assert_eq!(
        &archive[BLOCK_SIZE..BLOCK_SIZE + SOME_FILE_CONTENTS.len()],
        SOME_FILE_CONTENTS
    );
    assert!(archive[BLOCK_SIZE + SOME_FILE_CONTENTS.len()..]
        .iter()
        .all(|&b| b == 0));
    Ok(())
}

#[test]
fn writer_reader_roundtrip() -> Result<(), Error> {
    let mut dir = some_file();
    dir.path = b"some/".to_vec();
    dir.kind = EntryKind::Directory;
    dir.size = 0;
    dir.mode = Mode::from_bits_truncate(0o755);

    let mut link = some_file();
    link.path = b"some/link".to_vec();
    link.kind = EntryKind::Symlink;
    link.size = 0;
    link.link_target = b"file".to_vec();

    let archive = write_archive(
        &[
            (dir.clone(), &[][..]),
            (some_file(), &SOME_FILE_CONTENTS[..]),
            (link.clone(), &[][..]),
        ],
        true,
    )?;

    let mut reader = ArchiveReader::new(&archive[..], true);
    assert_eq!(reader.next_entry()?.map(|found| found.entry), Some(dir));

    let file = reader.next_entry()?.expect("file entry");
    assert_eq!(file.entry, some_file());
    assert_eq!(file.offset, 2 * BLOCK_SIZE as u64);
    let mut contents = Vec::new();
    reader.read_content(&mut contents)?;
    assert_eq!(contents, SOME_FILE_CONTENTS);

    assert_eq!(reader.next_entry()?.map(|found| found.entry), Some(link));
    assert_eq!(reader.next_entry()?, None);
    Ok(())
}

#[test]
fn long_path_split() -> Result<(), Error> {
    let mut path = vec![b'p'; 150];
    path.push(b'/');
    path.extend_from_slice(&[b'n'; 49]);
    assert_eq!(path.len(), 200);

    let mut entry = some_file();
    entry.path = path.clone();
    let archive = write_archive(&[(entry, &SOME_FILE_CONTENTS[..])], true)?;
    format_print_header(&archive);

    let header = Header::from_bytes(&archive[..BLOCK_SIZE])?;
    assert_eq!(header.text(NAME), &path[151..]);
    assert_eq!(header.text(PREFIX), &path[..150]);

    let mut reader = ArchiveReader::new(&archive[..], true);
    assert_eq!(reader.next_entry()?.expect("long entry").entry.path, path);
    Ok(())
}

#[test]
fn numeric_overflow() -> Result<(), Error> {
    let mut entry = some_file();
    entry.uid = 0o7777777 + 1;

    // Strict writers leave the entry out
    let mut writer = ArchiveWriter::new(Vec::new(), true);
    writer.append_entry(&entry, &SOME_FILE_CONTENTS[..])?;
    let (archive, report) = writer.finish()?;
    assert_eq!(report.entries, 0);
    assert_eq!(archive, vec![0; 2 * BLOCK_SIZE]);
    match report.skipped.as_slice() {
        [Error::Entry { source, .. }] => {
            assert!(matches!(source, blocktar_core::Error::OutOfRange { .. }))
        }
        other => panic!("unexpected report {:?}", other),
    }

    // Others use the base-256 extension
    let archive = write_archive(&[(entry.clone(), &SOME_FILE_CONTENTS[..])], false)?;
    format_print_header(&archive);
    assert_eq!(archive[UID.offset], 0x80);
    assert_eq!(&archive[UID.end() - 4..UID.end()], &(0o7777777u32 + 1).to_be_bytes());

    let mut reader = ArchiveReader::new(&archive[..], false);
    assert_eq!(reader.next_entry()?.expect("entry").entry, entry);
    Ok(())
}

#[test]
fn checksum_sensitivity() -> Result<(), Error> {
    let archive = write_archive(&[(some_file(), &SOME_FILE_CONTENTS[..])], true)?;

    for index in (0..BLOCK_SIZE).step_by(7) {
        if CHECKSUM.range().contains(&index) {
            continue;
        }
        let mut damaged = archive.clone();
        damaged[index] ^= 0x01;

        let mut reader = ArchiveReader::new(&damaged[..], false);
        match reader.next_entry() {
            Err(Error::Corrupt { offset: 0, .. }) => (),
            other => panic!("byte {} flipped: {:?}", index, other),
        }
    }
    Ok(())
}

#[test]
fn end_of_archive() -> Result<(), Error> {
    let stop = vec![0; 2 * BLOCK_SIZE];
    let mut reader = ArchiveReader::new(&stop[..], true);
    assert_eq!(reader.next_entry()?, None);

    let mut archive = write_archive(&[(some_file(), &SOME_FILE_CONTENTS[..])], true)?;
    let last = archive.len() - 1;
    archive[last] = 1;

    let mut reader = ArchiveReader::new(&archive[..], true);
    assert!(reader.next_entry()?.is_some());
    assert!(matches!(
        reader.next_entry(),
        Err(Error::BadEndOfArchive(offset)) if offset == 2 * BLOCK_SIZE as u64
    ));
    assert_eq!(reader.next_entry()?, None);
    Ok(())
}

#[test]
fn truncated_archive() -> Result<(), Error> {
    let archive = write_archive(&[(some_file(), &SOME_FILE_CONTENTS[..])], true)?;
    let truncated = &archive[..BLOCK_SIZE + 10];

    let mut reader = ArchiveReader::new(truncated, true);
    reader.next_entry()?.expect("entry");
    assert!(matches!(
        reader.read_content(io::sink()),
        Err(Error::UnexpectedEof(_))
    ));
    Ok(())
}
