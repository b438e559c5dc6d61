//TODO: update clap to remove the need for this
#![allow(dangerous_implicit_autorefs)]

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::process;

use anyhow::{bail, Context};
use clap::{crate_authors, crate_description, crate_name, crate_version, App, Arg};
use log::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Create,
    List,
    Extract,
}

/// The bundled first argument, like `cvf` or `tvSf`
#[derive(Debug, PartialEq, Eq)]
struct Bundle {
    operation: Operation,
    verbose: bool,
    strict: bool,
}

fn parse_bundle(bundle: &str) -> Result<Bundle, String> {
    let mut chars = bundle.chars();
    let operation = match chars.next() {
        Some('c') => Operation::Create,
        Some('t') => Operation::List,
        Some('x') => Operation::Extract,
        Some(other) => return Err(format!("unknown mode '{}', expected c, t or x", other)),
        None => return Err("missing mode, expected c, t or x".to_string()),
    };

    let (mut verbose, mut strict, mut file) = (false, false, false);
    for modifier in chars {
        let seen = match modifier {
            'v' => &mut verbose,
            'S' => &mut strict,
            'f' => &mut file,
            other => return Err(format!("unknown modifier '{}'", other)),
        };
        if *seen {
            return Err(format!("modifier '{}' given more than once", modifier));
        }
        *seen = true;
    }
    if !file {
        return Err("missing 'f', the archive has to be named".to_string());
    }

    Ok(Bundle {
        operation,
        verbose,
        strict,
    })
}

fn run() -> anyhow::Result<()> {
    let matches = App::new(crate_name!())
        .author(crate_authors!(", "))
        .about(crate_description!())
        .version(crate_version!())
        .arg(
            Arg::with_name("mode")
                .help("c (create), t (list) or x (extract), then v (verbose), S (strict) and f")
                .required(true)
                .value_name("MODE")
                .validator(|bundle| parse_bundle(&bundle).map(|_| ())),
        )
        .arg(
            Arg::with_name("archive")
                .help("Archive file")
                .required(true)
                .value_name("ARCHIVE"),
        )
        .arg(
            Arg::with_name("paths")
                .help("Paths to archive, or path prefixes to list or extract")
                .multiple(true)
                .value_name("PATH"),
        )
        .arg(
            Arg::with_name("directory")
                .help("Directory to extract to")
                .short("C")
                .long("directory")
                .takes_value(true)
                .value_name("DIR")
                .default_value("."),
        )
        .get_matches();

    let bundle = parse_bundle(matches.value_of("mode").context("missing mode")?)
        .map_err(anyhow::Error::msg)?;
    let archive = matches
        .value_of_os("archive")
        .map(Path::new)
        .context("missing archive")?;
    let paths: Vec<&OsStr> = matches
        .values_of_os("paths")
        .map(Iterator::collect)
        .unwrap_or_default();

    match bundle.operation {
        Operation::Create => {
            if paths.is_empty() {
                bail!("refusing to create an empty archive");
            }
            let report = blocktar::create(archive, &paths, bundle.verbose, bundle.strict)
                .with_context(|| format!("creating {}", archive.display()))?;
            if !report.skipped.is_empty() {
                warn!("{} paths were not archived completely", report.skipped.len());
            }
        }
        Operation::List => {
            let filters: Vec<&[u8]> = paths.iter().map(|path| path.as_bytes()).collect();
            blocktar::list(archive, &filters, bundle.verbose, bundle.strict)
                .with_context(|| format!("listing {}", archive.display()))?;
        }
        Operation::Extract => {
            let filters: Vec<&[u8]> = paths.iter().map(|path| path.as_bytes()).collect();
            let base_dir = matches.value_of_os("directory").unwrap_or(OsStr::new("."));
            blocktar::extract(archive, base_dir, &filters, bundle.verbose, bundle.strict)
                .with_context(|| format!("extracting {}", archive.display()))?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run() {
        eprintln!("{}: {:#}", crate_name!(), err);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_bundle, Bundle, Operation};

    #[test]
    fn bundles() {
        assert_eq!(
            parse_bundle("cvf"),
            Ok(Bundle {
                operation: Operation::Create,
                verbose: true,
                strict: false,
            })
        );
        assert_eq!(
            parse_bundle("xSf"),
            Ok(Bundle {
                operation: Operation::Extract,
                verbose: false,
                strict: true,
            })
        );
        assert_eq!(parse_bundle("tf").map(|bundle| bundle.operation), Ok(Operation::List));
    }

    #[test]
    fn bad_bundles() {
        assert!(parse_bundle("").is_err());
        assert!(parse_bundle("rf").is_err());
        assert!(parse_bundle("cv").is_err());
        assert!(parse_bundle("cvvf").is_err());
        assert!(parse_bundle("czf").is_err());
    }
}
