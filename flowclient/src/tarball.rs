use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::{Error, Result};

/// True when the source name signals gzip compression.
fn is_compressed(source: &str) -> bool {
    source.ends_with(".gz") || source.ends_with(".tgz")
}

/// Extract a tar stream from a local path or an HTTP(S) URL into a
/// directory. Only regular-file entries are materialized; directory,
/// symlink and other entries are skipped.
pub async fn extract(source: &str, destination: &Path) -> Result<()> {
    let reader: Box<dyn Read> = if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source).await?;
        if !response.status().is_success() {
            return Err(Error::Download {
                url: source.to_string(),
                status: response.status().as_u16(),
            });
        }
        Box::new(Cursor::new(response.bytes().await?))
    } else {
        let file = File::open(source).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                Error::FileNotFound(Path::new(source).to_path_buf())
            } else {
                Error::Io(err)
            }
        })?;
        Box::new(file)
    };

    let reader: Box<dyn Read> = if is_compressed(source) {
        Box::new(GzDecoder::new(reader))
    } else {
        reader
    };

    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            debug!("skipping non-file tar entry {:?}", entry.path());
            continue;
        }
        let path = destination.join(entry.path()?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&path)?;
        io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// Write every regular file under `source_dir` into a tar stream at
/// `output`, each entry named by its path relative to `source_dir`,
/// optionally gzip-compressed.
pub fn save(source_dir: &Path, output: &Path, compress: bool) -> Result<()> {
    let file = File::create(output)?;
    if compress {
        let encoder = write_dir_tar(source_dir, GzEncoder::new(file, Compression::default()))?;
        encoder.finish()?;
    } else {
        write_dir_tar(source_dir, file)?;
    }
    Ok(())
}

fn write_dir_tar<W: Write>(source_dir: &Path, writer: W) -> Result<W> {
    let mut builder = tar::Builder::new(writer);
    append_dir(&mut builder, source_dir, source_dir)?;
    Ok(builder.into_inner()?)
}

fn append_dir<W: Write>(
    builder: &mut tar::Builder<W>,
    dir: &Path,
    root: &Path,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            append_dir(builder, &path, root)?;
            continue;
        }
        if !metadata.is_file() {
            continue;
        }
        // strip_prefix cannot fail: path descends from root
        let relative = path.strip_prefix(root).unwrap().to_path_buf();
        let mut header = tar::Header::new_gnu();
        header.set_size(metadata.len());
        header.set_mode(file_mode(&metadata));
        header.set_cksum();
        builder.append_data(&mut header, &relative, File::open(&path)?)?;
    }
    Ok(())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}
