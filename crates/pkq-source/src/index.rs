//! # Index File — Memory-Mapped Control Data
//!
//! The dpkg status file and the apt `Packages` lists are plain deb822 text,
//! often tens of megabytes. A plain file is mapped read-only into memory and
//! handed to a [`StanzaCursor`]; the page cache does the buffering and we
//! never copy it onto the heap.
//!
//! apt may keep its lists compressed (`Acquire::GzipIndexes`,
//! `Acquire::CompressionTypes`). Those are decoded into memory once, by
//! file extension:
//!
//! | Extension | Codec   |
//! |-----------|---------|
//! | `.gz`     | gzip    |
//! | `.bz2`    | bzip2   |
//! | `.xz`     | xz      |
//! | `.zst`    | zstd    |
//! | `.lz4`    | lz4 frame |

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use lz4_flex::frame::FrameDecoder;
use memmap2::Mmap;
use xz2::read::XzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::cursor::StanzaCursor;

/// How an index file is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Plain,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    Lz4,
}

impl Codec {
    /// Codec for a compressed file extension, or `None` if `ext` is not one.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "gz" => Some(Self::Gzip),
            "bz2" => Some(Self::Bzip2),
            "xz" => Some(Self::Xz),
            "zst" => Some(Self::Zstd),
            "lz4" => Some(Self::Lz4),
            _ => None,
        }
    }

    /// Anything without a known compressed extension is read as plain text.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(Self::Plain)
    }
}

enum Contents {
    /// `None` for an empty file (a zero-length mapping is not portable).
    Mapped {
        mmap: Option<Mmap>,
        /// Kept open for the lifetime of the mapping.
        _file: File,
    },
    Decoded(Vec<u8>),
}

/// The bytes of one deb822 file, mapped or decompressed.
pub struct IndexFile {
    path: PathBuf,
    codec: Codec,
    contents: Contents,
}

impl IndexFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let codec = Codec::from_path(path);

        let contents = match codec {
            Codec::Plain => {
                let len = file.metadata()?.len();
                let mmap = if len == 0 {
                    None
                } else {
                    // SAFETY: the mapping is read-only. dpkg and apt replace
                    // these files by writing a new file and renaming it over
                    // the old one, so the inode we mapped is never truncated
                    // underneath us.
                    Some(unsafe { Mmap::map(&file)? })
                };
                Contents::Mapped { mmap, _file: file }
            }
            codec => Contents::Decoded(decode(codec, file)?),
        };

        Ok(Self {
            path: path.to_path_buf(),
            codec,
            contents,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn codec(&self) -> Codec {
        self.codec
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        match &self.contents {
            Contents::Mapped { mmap, .. } => mmap.as_deref().unwrap_or(&[]),
            Contents::Decoded(buf) => buf,
        }
    }

    /// Size of the (decompressed) text in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh cursor positioned at the first stanza.
    pub fn stanzas(&self) -> StanzaCursor<'_> {
        StanzaCursor::new(self.bytes())
    }
}

fn decode(codec: Codec, file: File) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(file);
    let mut out = Vec::new();
    match codec {
        Codec::Plain => {
            reader.read_to_end(&mut out)?;
        }
        Codec::Gzip => {
            GzDecoder::new(reader).read_to_end(&mut out)?;
        }
        Codec::Bzip2 => {
            BzDecoder::new(reader).read_to_end(&mut out)?;
        }
        Codec::Xz => {
            XzDecoder::new(reader).read_to_end(&mut out)?;
        }
        Codec::Zstd => {
            ZstdDecoder::new(reader)?.read_to_end(&mut out)?;
        }
        Codec::Lz4 => {
            FrameDecoder::new(reader).read_to_end(&mut out)?;
        }
    }
    Ok(out)
}
