use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const XZ_MAGIC: [u8; 6] = [0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// A line stream over one log file.
///
/// Compression is detected from the leading magic bytes, not the file
/// name: log servers sometimes serve pre-decompressed content under a
/// `.gz` name, and that content must be read raw. Lines are decoded by
/// dropping every non-ASCII byte, and trailing `\r`/`\n` are stripped.
pub struct LogLines {
    reader: Box<dyn BufRead>,
    buf: Vec<u8>,
}

impl std::fmt::Debug for LogLines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLines").finish_non_exhaustive()
    }
}

impl LogLines {
    /// Open `path` for line iteration.
    ///
    /// Returns `Ok(None)` for empty files, including compressed files
    /// whose payload decompresses to nothing (a bare gzip header).
    ///
    /// # Errors
    ///
    /// `UnreadableFile` when the file cannot be opened or its first
    /// compressed block is corrupt.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        let unreadable = |source| Error::UnreadableFile {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(unreadable)?;
        let mut head = BufReader::new(file);
        let magic = head.fill_buf().map_err(unreadable)?.to_vec();
        if magic.is_empty() {
            return Ok(None);
        }

        let mut reader: Box<dyn BufRead> = if magic.starts_with(&GZIP_MAGIC) {
            Box::new(BufReader::new(GzDecoder::new(head)))
        } else if magic.starts_with(&XZ_MAGIC) {
            Box::new(BufReader::new(XzDecoder::new(head)))
        } else {
            Box::new(head)
        };

        // A decompressor over a header-only payload yields zero bytes.
        if reader.fill_buf().map_err(unreadable)?.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            reader,
            buf: Vec::with_capacity(256),
        }))
    }

    /// Open a plain byte stream (already decompressed), mainly for tests
    /// and in-memory sources.
    pub fn from_reader(reader: impl Read + 'static) -> Self {
        Self {
            reader: Box::new(BufReader::new(reader)),
            buf: Vec::with_capacity(256),
        }
    }
}

impl Iterator for LogLines {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                while self.buf.last() == Some(&b'\n') || self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
                self.buf.retain(u8::is_ascii);
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
