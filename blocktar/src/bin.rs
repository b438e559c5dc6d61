//! Entry points used by the `blocktar` binary, one per mode
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use log::{debug, info};

use crate::{wrap_io_err, ArchiveReader, ArchiveWriter, CreateReport, Error, Lister, Transaction};

/// Archive `roots` into a new file at `archive_path`. Per-entry problems are
/// logged and returned in the report; the archive is still complete and
/// readable in that case.
pub fn create(
    archive_path: impl AsRef<Path>,
    roots: &[impl AsRef<Path>],
    verbose: bool,
    strict: bool,
) -> Result<CreateReport, Error> {
    let archive_path = archive_path.as_ref();
    let archive_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(archive_path)
        .map_err(wrap_io_err!(archive_path, "Opening archive"))?;
    let metadata = archive_file
        .metadata()
        .map_err(wrap_io_err!(archive_path, "Reading metadata"))?;

    let mut writer = ArchiveWriter::new(BufWriter::new(archive_file), strict)
        .verbose(verbose)
        .exclude(metadata.dev(), metadata.ino());
    for root in roots {
        debug!("archiving {}", root.as_ref().display());
        writer.append_path(root)?;
    }

    let (archive_file, report) = writer.finish()?;
    archive_file
        .into_inner()
        .map_err(|err| wrap_io_err!(archive_path, "Writing archive")(err.into_error()))?
        .sync_all()
        .map_err(wrap_io_err!(archive_path, "Writing archive"))?;

    info!(
        "{}: {} entries, {} skipped",
        archive_path.display(),
        report.entries,
        report.skipped.len()
    );
    Ok(report)
}

/// Print the listing of the archive at `archive_path` to stdout
pub fn list(
    archive_path: impl AsRef<Path>,
    filters: &[impl AsRef<[u8]>],
    verbose: bool,
    strict: bool,
) -> Result<(), Error> {
    let mut reader = open_archive(archive_path.as_ref(), strict)?;

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    for line in Lister::new(&mut reader, filters, verbose) {
        writeln!(stdout, "{}", line?).map_err(wrap_io_err!("Writing listing"))?;
    }
    Ok(())
}

/// Extract the archive at `archive_path` below `base_dir`, then restore the
/// archived modification times. Returns the number of extracted entries.
pub fn extract(
    archive_path: impl AsRef<Path>,
    base_dir: impl AsRef<Path>,
    filters: &[impl AsRef<[u8]>],
    verbose: bool,
    strict: bool,
) -> Result<usize, Error> {
    let mut reader = open_archive(archive_path.as_ref(), strict)?;

    let mut transaction = Transaction::new(base_dir).verbose(verbose);
    let count = transaction.extract(&mut reader, filters)?;
    transaction.commit()?;
    info!("{}: {} entries extracted", archive_path.as_ref().display(), count);
    Ok(count)
}

fn open_archive(archive_path: &Path, strict: bool) -> Result<ArchiveReader<BufReader<File>>, Error> {
    let archive_file =
        File::open(archive_path).map_err(wrap_io_err!(archive_path, "Opening archive"))?;
    Ok(ArchiveReader::new(BufReader::new(archive_file), strict))
}
