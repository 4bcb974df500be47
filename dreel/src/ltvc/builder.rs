use std::io::Write;

use serde::Serialize;

use dcore::hash::Checksum;

use crate::ltvc::raw::LtvcError;
use crate::ltvc::MAX_CHUNK_SIZE;

pub struct LtvcBuilder<W: Write> {
    inner: W,
}

// This is the high level writer interface
impl<W: Write> LtvcBuilder<W> {
    pub fn new(writer: W) -> Self {
        LtvcBuilder { inner: writer }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write(&mut self, chunk_type: &[u8; 4], data: &[u8]) -> Result<usize, LtvcError> {
        if data.len() > MAX_CHUNK_SIZE {
            return Err(LtvcError::MaxLength);
        }

        let data_len = (data.len() as u32).to_le_bytes();
        let header_hash = {
            let mut hash = Checksum::new();
            hash.update(&data_len);
            hash.update(chunk_type);
            hash.finalize() as u16
        };
        let trailing_hash = {
            let mut hash = Checksum::new();
            hash.update(data);
            hash.finalize()
        };

        self.inner.write_all(&data_len)?;
        self.inner.write_all(chunk_type)?;
        self.inner.write_all(&header_hash.to_le_bytes())?;
        self.inner.write_all(data)?;
        self.inner.write_all(&trailing_hash.to_le_bytes())?;

        Ok(4 + 4 + 2 + data.len() + 4)
    }

    /// Bincode encode `value` into a single chunk.
    pub fn write_entry<T: Serialize>(&mut self, chunk_type: &[u8; 4], value: &T) -> Result<usize, LtvcError> {
        let data = bincode::serialize(value)?;
        self.write(chunk_type, &data)
    }

    pub fn write_ahdr(&mut self, version: u8) -> Result<usize, LtvcError> {
        self.write(b"AHDR", &[version])
    }

    pub fn write_aend(&mut self, count: u32) -> Result<usize, LtvcError> {
        self.write(b"AEND", &count.to_le_bytes())
    }

    /// Write the `AEND` and flush the underlaying writer.
    pub fn finish(mut self, count: u32) -> Result<W, LtvcError> {
        self.write_aend(count)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}
