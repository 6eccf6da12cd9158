//! import::payload
//!
//! In-process extraction of a source RPM payload: a cpio archive in the
//! newc format, optionally compressed with gzip, xz or zstd.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use tracing::debug;

const NEWC_MAGIC: &[u8] = b"070701";
const NEWC_CRC_MAGIC: &[u8] = b"070702";
const HEADER_LEN: usize = 110;
const TRAILER: &str = "TRAILER!!!";

const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;

/// Payload compression, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Compression {
    None,
    Gzip,
    Xz,
    Zstd,
    Bzip2,
}

impl Compression {
    pub(super) fn detect(data: &[u8]) -> Self {
        match data {
            [0x1f, 0x8b, ..] => Self::Gzip,
            [0xfd, b'7', b'z', b'X', b'Z', 0x00, ..] => Self::Xz,
            [0x28, 0xb5, 0x2f, 0xfd, ..] => Self::Zstd,
            [b'B', b'Z', b'h', ..] => Self::Bzip2,
            _ => Self::None,
        }
    }

    fn decoder<'a>(self, data: &'a [u8]) -> io::Result<Box<dyn Read + 'a>> {
        let reader: Box<dyn Read + 'a> = match self {
            Self::None => Box::new(data),
            Self::Gzip => Box::new(flate2::read::GzDecoder::new(data)),
            Self::Xz => Box::new(xz2::read::XzDecoder::new(data)),
            Self::Zstd => Box::new(zstd::Decoder::new(data)?),
            Self::Bzip2 => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "bzip2 compressed payloads are not supported",
                ))
            }
        };
        Ok(reader)
    }
}

struct Entry {
    name: String,
    mode: u32,
    data: Vec<u8>,
}

/// Sequential reader over newc entries.
struct CpioReader<R> {
    inner: R,
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

impl<R: Read> CpioReader<R> {
    /// The next entry, or `None` at the trailer.
    fn next_entry(&mut self) -> io::Result<Option<Entry>> {
        let mut header = [0u8; HEADER_LEN];
        self.inner.read_exact(&mut header)?;
        if &header[..6] != NEWC_MAGIC && &header[..6] != NEWC_CRC_MAGIC {
            return Err(invalid("payload is not a newc cpio archive"));
        }

        // thirteen 8-digit hex fields follow the magic
        let field = |index: usize| -> io::Result<usize> {
            let start = 6 + index * 8;
            std::str::from_utf8(&header[start..start + 8])
                .ok()
                .and_then(|text| usize::from_str_radix(text, 16).ok())
                .ok_or_else(|| invalid("malformed cpio header field"))
        };
        let mode = field(1)? as u32;
        let size = field(6)?;
        let name_len = field(11)?;

        let mut name = vec![0u8; name_len];
        self.inner.read_exact(&mut name)?;
        self.skip_padding(HEADER_LEN + name_len)?;
        if name.last() == Some(&0) {
            name.pop();
        }
        let name = String::from_utf8_lossy(&name).into_owned();
        if name == TRAILER {
            return Ok(None);
        }

        let mut data = vec![0u8; size];
        self.inner.read_exact(&mut data)?;
        self.skip_padding(size)?;
        Ok(Some(Entry { name, mode, data }))
    }

    /// Entries and their data are aligned to four bytes.
    fn skip_padding(&mut self, consumed: usize) -> io::Result<()> {
        let mut pad = [0u8; 3];
        self.inner.read_exact(&mut pad[..(4 - consumed % 4) % 4])
    }
}

/// Write every regular file of `payload` into `dir` under its base name.
///
/// Returns each file name with its permission bits, in archive order.
pub(super) fn unpack(payload: &[u8], dir: &Path) -> io::Result<Vec<(String, u32)>> {
    fs::create_dir_all(dir)?;
    let compression = Compression::detect(payload);
    debug!(?compression, bytes = payload.len(), "unpacking payload");

    let mut archive = CpioReader {
        inner: compression.decoder(payload)?,
    };
    let mut files = Vec::new();
    while let Some(entry) = archive.next_entry()? {
        if entry.mode & S_IFMT != S_IFREG {
            continue;
        }
        let Some(name) = Path::new(&entry.name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };
        fs::write(dir.join(&name), &entry.data)?;
        files.push((name, entry.mode & 0o7777));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn push_entry(archive: &mut Vec<u8>, name: &str, mode: u32, data: &[u8]) {
        let name_len = name.len() + 1;
        let fields = [0, mode, 0, 0, 1, 0, data.len() as u32, 0, 0, 0, 0, name_len as u32, 0];
        archive.extend_from_slice(NEWC_MAGIC);
        for value in fields {
            archive.extend_from_slice(format!("{value:08x}").as_bytes());
        }
        archive.extend_from_slice(name.as_bytes());
        archive.push(0);
        archive.resize(archive.len() + (4 - (HEADER_LEN + name_len) % 4) % 4, 0);
        archive.extend_from_slice(data);
        archive.resize(archive.len() + (4 - data.len() % 4) % 4, 0);
    }

    /// A source RPM style archive: flat names, one directory entry.
    fn srpm_archive() -> Vec<u8> {
        let mut archive = Vec::new();
        push_entry(&mut archive, "httpd.spec", S_IFREG | 0o644, b"Name: httpd\n");
        push_entry(&mut archive, ".", 0o040755, b"");
        push_entry(&mut archive, "./apachectl.sh", S_IFREG | 0o755, b"#!/bin/sh\n");
        push_entry(&mut archive, "httpd-2.4.37.tar.bz2", S_IFREG | 0o644, b"BZh91AY");
        push_entry(&mut archive, TRAILER, 0, b"");
        archive
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn detects_compression_from_magic() {
        assert_eq!(Compression::detect(&gzip(b"x")), Compression::Gzip);
        assert_eq!(Compression::detect(&xz(b"x")), Compression::Xz);
        assert_eq!(
            Compression::detect(&zstd::encode_all(&b"x"[..], 3).unwrap()),
            Compression::Zstd
        );
        assert_eq!(Compression::detect(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(Compression::detect(b"070701"), Compression::None);
    }

    #[test]
    fn unpacks_regular_files_with_modes() {
        let archive = srpm_archive();
        let compressed = [
            archive.clone(),
            gzip(&archive),
            xz(&archive),
            zstd::encode_all(&archive[..], 3).unwrap(),
        ];

        for payload in compressed {
            let dir = TempDir::new().unwrap();
            let files = unpack(&payload, dir.path()).unwrap();
            assert_eq!(
                files,
                vec![
                    ("httpd.spec".to_string(), 0o644),
                    ("apachectl.sh".to_string(), 0o755),
                    ("httpd-2.4.37.tar.bz2".to_string(), 0o644),
                ]
            );
            assert_eq!(
                fs::read(dir.path().join("apachectl.sh")).unwrap(),
                b"#!/bin/sh\n"
            );
            assert_eq!(
                fs::read(dir.path().join("httpd-2.4.37.tar.bz2")).unwrap(),
                b"BZh91AY"
            );
        }
    }

    #[test]
    fn truncated_archive_is_an_error() {
        let archive = srpm_archive();
        let dir = TempDir::new().unwrap();
        assert!(unpack(&archive[..archive.len() - 130], dir.path()).is_err());
    }

    #[test]
    fn foreign_data_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = unpack(&[b'x'; 200], dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = unpack(b"BZh91AY&SY", dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
