/**
 * Content comparison for duplicate detection
 *
 * xxh3 digests narrow down candidates; identity is always decided by
 * comparing the bytes.
 */

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use xxhash_rust::xxh3;

pub struct ContentHasher {
    chunk_size: usize,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            chunk_size: 65536, // 64KB chunks
        }
    }

    /// Calculate the 128-bit xxh3 digest of file content, streaming
    pub fn calculate_file_hash(&self, file_path: &Path) -> Result<u128> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open file for hashing: {}", file_path.display()))?;

        let mut reader = BufReader::new(file);
        let mut buffer = vec![0u8; self.chunk_size];
        let mut hasher = xxh3::Xxh3::default();

        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .with_context(|| format!("Failed to read file for hashing: {}", file_path.display()))?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.digest128())
    }

    /// Same size and same bytes, compared chunk by chunk
    pub fn files_identical(&self, a: &Path, b: &Path) -> Result<bool> {
        let size_a = std::fs::metadata(a)
            .with_context(|| format!("Failed to read file metadata: {}", a.display()))?
            .len();
        let size_b = std::fs::metadata(b)
            .with_context(|| format!("Failed to read file metadata: {}", b.display()))?
            .len();

        if size_a != size_b {
            return Ok(false);
        }

        let open = |path: &Path| {
            File::open(path)
                .map(BufReader::new)
                .with_context(|| format!("Failed to open file for comparison: {}", path.display()))
        };
        let mut reader_a = open(a)?;
        let mut reader_b = open(b)?;
        let mut buffer_a = vec![0u8; self.chunk_size];
        let mut buffer_b = vec![0u8; self.chunk_size];

        loop {
            let read_a = fill_chunk(&mut reader_a, &mut buffer_a)
                .with_context(|| format!("Failed to read file for comparison: {}", a.display()))?;
            let read_b = fill_chunk(&mut reader_b, &mut buffer_b)
                .with_context(|| format!("Failed to read file for comparison: {}", b.display()))?;

            if read_a != read_b || buffer_a[..read_a] != buffer_b[..read_b] {
                return Ok(false);
            }
            if read_a == 0 {
                return Ok(true);
            }
        }
    }
}

/// Read until `buffer` is full or the input ends
fn fill_chunk(reader: &mut impl Read, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}
