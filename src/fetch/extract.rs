// src/fetch/extract.rs

//! Source archive detection and extraction
//!
//! Archives are unpacked in-process. A tarball that holds a single
//! top-level directory (the usual `name-version/` layout) has that
//! directory reported as the source root.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::{debug, info};
use xz2::read::XzDecoder;

/// Archive container and compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    TarXz,
    TarZst,
    Tar,
    Zip,
}

impl ArchiveKind {
    /// Detect the archive kind from file name, falling back to magic bytes
    pub fn detect(filename: &str, bytes: &[u8]) -> Result<Self> {
        if let Some(kind) = Self::from_filename(filename) {
            return Ok(kind);
        }

        Self::from_magic(bytes).ok_or_else(|| {
            Error::UnsupportedArchive(format!(
                "Unable to detect archive format for: {}",
                filename
            ))
        })
    }

    fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();

        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::TarXz)
        } else if lower.ends_with(".tar.zst") {
            Some(Self::TarZst)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    fn from_magic(bytes: &[u8]) -> Option<Self> {
        // gzip: 0x1F 0x8B
        if bytes.starts_with(&[0x1F, 0x8B]) {
            return Some(Self::TarGz);
        }

        // xz: 0xFD '7zXZ' 0x00
        if bytes.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
            return Some(Self::TarXz);
        }

        // zstd: 0x28 0xB5 0x2F 0xFD
        if bytes.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
            return Some(Self::TarZst);
        }

        // zip local file header: 'PK' 0x03 0x04
        if bytes.starts_with(b"PK\x03\x04") {
            return Some(Self::Zip);
        }

        // ustar magic at offset 257
        if bytes.len() > 262 && &bytes[257..262] == b"ustar" {
            return Some(Self::Tar);
        }

        None
    }
}

/// An extracted source tree, removed when dropped
#[derive(Debug)]
pub struct ExtractedSource {
    _dir: TempDir,
    root: PathBuf,
}

impl ExtractedSource {
    /// Directory the install steps run from
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Extract an archive into a fresh temporary directory
pub fn extract(bytes: &[u8], kind: ArchiveKind) -> Result<ExtractedSource> {
    let dir = TempDir::new()?;
    let root = extract_into(bytes, kind, dir.path())?;
    Ok(ExtractedSource { _dir: dir, root })
}

/// Extract an archive into `dest` and return the source root
pub fn extract_into(bytes: &[u8], kind: ArchiveKind, dest: &Path) -> Result<PathBuf> {
    info!("Extracting {:?} archive ({} bytes)", kind, bytes.len());

    fs::create_dir_all(dest)?;

    match kind {
        ArchiveKind::TarGz => unpack_tar(GzDecoder::new(bytes), dest)?,
        ArchiveKind::TarXz => unpack_tar(XzDecoder::new(bytes), dest)?,
        ArchiveKind::TarZst => {
            let decoder = zstd::Decoder::new(bytes)
                .map_err(|e| Error::ExtractFailed(format!("Failed to create zstd decoder: {}", e)))?;
            unpack_tar(decoder, dest)?
        }
        ArchiveKind::Tar => unpack_tar(bytes, dest)?,
        ArchiveKind::Zip => {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
                .map_err(|e| Error::ExtractFailed(format!("Failed to read zip archive: {}", e)))?;
            archive
                .extract(dest)
                .map_err(|e| Error::ExtractFailed(format!("Failed to extract zip archive: {}", e)))?;
        }
    }

    source_root(dest)
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest)
        .map_err(|e| Error::ExtractFailed(format!("Failed to unpack tarball: {}", e)))
}

/// Collapse a single top-level directory into the source root
fn source_root(dest: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(dest)?.filter_map(|e| e.ok()).collect();

    if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
        let root = entries[0].path();
        debug!("Source directory: {}", root.display());
        return Ok(root);
    }

    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_detect_from_extension() {
        assert_eq!(ArchiveKind::detect("grub-2.02.tar.xz", &[]).unwrap(), ArchiveKind::TarXz);
        assert_eq!(ArchiveKind::detect("objconv.zip", &[]).unwrap(), ArchiveKind::Zip);
        assert_eq!(ArchiveKind::detect("x-1.0.tgz", &[]).unwrap(), ArchiveKind::TarGz);
        assert_eq!(ArchiveKind::detect("x-1.0.tar.zst", &[]).unwrap(), ArchiveKind::TarZst);
        assert_eq!(ArchiveKind::detect("x-1.0.tar", &[]).unwrap(), ArchiveKind::Tar);
    }

    #[test]
    fn test_detect_from_magic_bytes() {
        assert_eq!(
            ArchiveKind::detect("download", &[0x1F, 0x8B, 0x08, 0x00]).unwrap(),
            ArchiveKind::TarGz
        );
        assert_eq!(
            ArchiveKind::detect("download", b"PK\x03\x04rest").unwrap(),
            ArchiveKind::Zip
        );
        assert_eq!(
            ArchiveKind::detect("download", &tarball(&[("a", b"a")])).unwrap(),
            ArchiveKind::Tar
        );
    }

    #[test]
    fn test_detect_unsupported() {
        let result = ArchiveKind::detect("source.tar.bz2", b"BZh91AY&SY");
        assert!(matches!(result, Err(Error::UnsupportedArchive(_))));

        let result = ArchiveKind::detect("source.rar", &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(Error::UnsupportedArchive(_))));
    }

    #[test]
    fn test_extract_tar_gz_collapses_top_level_dir() {
        let bytes = gzip(&tarball(&[
            ("hello-1.0/configure", b"#!/bin/sh\n"),
            ("hello-1.0/src/main.c", b"int main(void) { return 0; }\n"),
        ]));

        let source = extract(&bytes, ArchiveKind::TarGz).unwrap();
        assert!(source.root().ends_with("hello-1.0"));
        assert!(source.root().join("configure").is_file());
        assert!(source.root().join("src/main.c").is_file());
    }

    #[test]
    fn test_extract_flat_zip_keeps_dest_as_root() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        writer.start_file("source.zip", options).unwrap();
        writer.write_all(b"inner").unwrap();
        writer.start_file("objconv.txt", options).unwrap();
        writer.write_all(b"docs").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let dest = tempfile::tempdir().unwrap();
        let root = extract_into(&bytes, ArchiveKind::Zip, dest.path()).unwrap();
        assert_eq!(root, dest.path());
        assert_eq!(fs::read(root.join("source.zip")).unwrap(), b"inner");
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let result = extract(b"definitely not gzip", ArchiveKind::TarGz);
        assert!(matches!(result, Err(Error::ExtractFailed(_))));
    }
}
