use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use flate2::read::GzDecoder;
use lode_types::Oid;

use crate::error::{StoreError, StoreResult};

/// Leading magic bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A stream of an object's decompressed bytes.
///
/// Owns both underlying resources — the decompressor and the file it reads
/// from — as a single handle: dropping the reader releases the decompressor
/// first and the file second, so neither can leak if the caller discards
/// the stream mid-read.
///
/// Corruption detectable when the object is opened (a non-gzip file at the
/// object path, a truncated container) is reported as a typed
/// [`StoreError`]; corruption discovered mid-stream surfaces as an
/// [`io::Error`] from [`read`](Read::read), the only channel the `Read`
/// contract offers.
pub struct ObjectReader {
    decoder: GzDecoder<File>,
}

impl ObjectReader {
    /// Wrap an open object file, validate its container, and position the
    /// stream `from_byte` decompressed bytes in.
    pub(crate) fn open(oid: &Oid, mut file: File, from_byte: u64) -> StoreResult<Self> {
        let mut magic = [0u8; 2];
        file.read_exact(&mut magic).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => corrupt(oid, "truncated gzip container"),
            _ => StoreError::Io(e),
        })?;
        if magic != GZIP_MAGIC {
            return Err(corrupt(oid, "not a gzip stream"));
        }
        file.seek(SeekFrom::Start(0))?;

        let mut reader = Self {
            decoder: GzDecoder::new(file),
        };
        if from_byte > 0 {
            reader.discard(oid, from_byte)?;
        }
        Ok(reader)
    }

    /// Decompress and throw away the first `count` bytes of the stream.
    fn discard(&mut self, oid: &Oid, count: u64) -> StoreResult<()> {
        let skipped = io::copy(&mut self.decoder.by_ref().take(count), &mut io::sink())
            .map_err(|e| match e.kind() {
                io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                    corrupt(oid, &e.to_string())
                }
                _ => StoreError::Io(e),
            })?;
        if skipped < count {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "object {} ends at byte {skipped}, before offset {count}",
                    oid.short()
                ),
            )));
        }
        Ok(())
    }
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

fn corrupt(oid: &Oid, reason: &str) -> StoreError {
    StoreError::CorruptObject {
        oid: oid.clone(),
        reason: reason.to_string(),
    }
}
