use std::io::Read;

use blocktar_core::Entry;
use chrono::{Local, TimeZone};

use crate::ext::EntryExt;
use crate::{ArchiveReader, Error};

/// Iterator over the rendered listing of an archive. Content is never read,
/// only skipped.
pub struct Lister<'a, R, P> {
    reader: &'a mut ArchiveReader<R>,
    filters: &'a [P],
    verbose: bool,
}

impl<'a, R: Read, P: AsRef<[u8]>> Lister<'a, R, P> {
    /// Entries not starting with one of `filters` are left out. An empty
    /// filter list lists everything.
    pub fn new(reader: &'a mut ArchiveReader<R>, filters: &'a [P], verbose: bool) -> Self {
        Lister {
            reader,
            filters,
            verbose,
        }
    }
}

impl<R: Read, P: AsRef<[u8]>> Iterator for Lister<'_, R, P> {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let found = match self.reader.next_entry() {
                Ok(Some(found)) => found,
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            };
            if let Err(err) = self.reader.skip_content() {
                return Some(Err(err));
            }
            if found.entry.matches_any(self.filters) {
                return Some(Ok(render_line(&found.entry, self.verbose)));
            }
        }
    }
}

/// One listing line: the path, or with `verbose` the long form
/// `perms owner size mtime path`
pub fn render_line(entry: &Entry, verbose: bool) -> String {
    let path = entry.path().display();
    if !verbose {
        return path.to_string();
    }
    format!(
        "{:10} {:<17.17} {:>8} {:16} {}",
        permissions(entry),
        entry.owner(),
        entry.size,
        format_mtime(entry.mtime),
        path
    )
}

/// Type character followed by the `rwx` triplets, like `drwxr-xr-x`
pub fn permissions(entry: &Entry) -> String {
    let mut perms = String::with_capacity(10);
    perms.push(entry.kind.type_char());
    perms.extend(entry.mode.rwx());
    perms
}

/// Local time as `YYYY-MM-DD HH:MM`
pub fn format_mtime(mtime: u64) -> String {
    let local = i64::try_from(mtime)
        .ok()
        .and_then(|secs| Local.timestamp_opt(secs, 0).single());
    match local {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => mtime.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use blocktar_core::{Entry, EntryKind, Mode};

    use super::*;
    use crate::ArchiveWriter;

    fn entry(path: &str, kind: EntryKind) -> Entry {
        Entry {
            path: path.as_bytes().to_vec(),
            kind,
            mode: Mode::from_bits_truncate(0o750),
            uid: 501,
            gid: 20,
            size: 0,
            mtime: 0,
            link_target: Vec::new(),
            uname: Vec::new(),
            gname: Vec::new(),
        }
    }

    #[test]
    fn permission_string() {
        assert_eq!(permissions(&entry("d/", EntryKind::Directory)), "drwxr-x---");
        assert_eq!(permissions(&entry("f", EntryKind::File)), "-rwxr-x---");
        assert_eq!(permissions(&entry("l", EntryKind::Symlink)), "lrwxr-x---");
    }

    #[test]
    fn verbose_columns() {
        let mut file = entry("some/file", EntryKind::File);
        file.size = 1234;
        let line = render_line(&file, true);
        let expected_owner = format!("{:<17}", "501/20");
        assert!(line.starts_with(&format!("-rwxr-x--- {} {:>8} ", expected_owner, 1234)));
        assert!(line.ends_with(" some/file"));
        assert_eq!(render_line(&file, false), "some/file");

        file.uname = b"a-rather-long-user-name".to_vec();
        file.gname = b"group".to_vec();
        let line = render_line(&file, true);
        assert!(line.contains(" a-rather-long-use "));
    }

    #[test]
    fn mtime_format() {
        let formatted = format_mtime(1_700_000_000);
        assert_eq!(formatted.len(), 16);
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[13..14], ":");
    }

    #[test]
    fn filtered_listing() {
        let mut writer = ArchiveWriter::new(Vec::new(), true);
        for path in ["dir/", "dir/sub/", "dir/subway", "other"] {
            let kind = if path.ends_with('/') {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            writer.append_entry(&entry(path, kind), std::io::empty()).unwrap();
        }
        let (archive, _) = writer.finish().unwrap();

        let mut reader = ArchiveReader::new(Cursor::new(archive), true);
        let lines = Lister::new(&mut reader, &["dir/sub"], false)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(lines, ["dir/sub/", "dir/subway"]);
    }
}
