use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

/// File or stdin input read in fixed-size chunks.
pub struct InputReader {
    reader: Box<dyn Read>,
    length: Option<u64>,
}

impl InputReader {
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path = input_path.as_ref();

        if path.as_os_str() == "-" {
            return Ok(Self {
                reader: Box::new(io::stdin().lock()),
                length: None,
            });
        }

        let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
        let length = file.metadata().ok().map(|metadata| metadata.len());

        Ok(Self {
            reader: Box::new(BufReader::new(file)),
            length,
        })
    }

    /// File size; `None` for pipes.
    pub fn size(&self) -> Option<u64> {
        self.length
    }

    /// Feeds chunks of at most `chunk_size` bytes to `callback` until EOF or
    /// until it returns `Ok(false)`.
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = match self.reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };

            if !callback(&buffer[..bytes_read])? {
                break;
            }
        }

        Ok(())
    }
}
