use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::de::DeserializeOwned;
use thiserror::Error;

use dcore::buf::fill_buf;
use dcore::hash::Checksum;

use crate::ltvc::MAX_CHUNK_SIZE;

#[derive(Error, Debug)]
pub enum LtvcError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("permitted max chunk size exceeded")]
    MaxLength,
    #[error("checksum failed")]
    DataChecksum,
    #[error("header checksum failed")]
    HeaderChecksum,
    #[error("expected a {expected} chunk, found {found}")]
    Unexpected { expected: String, found: String },
    #[error("unsupported version {0:#04x}")]
    Version(u8),
    #[error("chunk value codec failure: {0}")]
    Codec(#[from] bincode::Error),
}

pub struct LtvcReaderRaw<R: Read> {
    inner: R,
}

// This only returns valid entry, invalid will be an Error string
#[derive(Debug, PartialEq, Eq)]
pub struct LtvcEntryRaw {
    pub typ: [u8; 4],
    pub data: Vec<u8>,
}

impl LtvcEntryRaw {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, LtvcError> {
        Ok(bincode::deserialize(&self.data)?)
    }

    pub fn as_u32(&self) -> Result<u32, LtvcError> {
        let mut data = &self.data[..];
        Ok(data.read_u32::<LittleEndian>()?)
    }
}

fn typ_name(typ: &[u8; 4]) -> String {
    String::from_utf8_lossy(typ).into_owned()
}

impl<R: Read> LtvcReaderRaw<R> {
    pub fn new(reader: R) -> Self {
        LtvcReaderRaw { inner: reader }
    }

    // A clean end of stream is only allowed between chunks
    fn read_entry(&mut self) -> Result<Option<LtvcEntryRaw>, LtvcError> {
        let len = {
            let mut len = [0u8; 4];
            match fill_buf(&mut self.inner, &mut len)? {
                (true, 0) => return Ok(None),
                (true, _) => return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into()),
                (false, _) => u32::from_le_bytes(len),
            }
        };
        let typ = {
            let mut typ: [u8; 4] = [0; 4];
            self.inner.read_exact(&mut typ)?;
            typ
        };
        let header_hash = self.inner.read_u16::<LittleEndian>()?;

        let mut hash = Checksum::new();
        hash.update(&len.to_le_bytes());
        hash.update(&typ);

        // Validate the header
        if (hash.finalize() as u16) != header_hash {
            return Err(LtvcError::HeaderChecksum);
        }

        let len = len as usize;
        if len > MAX_CHUNK_SIZE {
            return Err(LtvcError::MaxLength);
        }

        let data = {
            let mut data = vec![0; len];
            self.inner.read_exact(&mut data[..])?;
            data
        };
        let entry_hash = self.inner.read_u32::<LittleEndian>()?;

        let mut hash = Checksum::new();
        hash.update(&data[..]);

        if hash.finalize() == entry_hash {
            Ok(Some(LtvcEntryRaw { typ, data }))
        } else {
            Err(LtvcError::DataChecksum)
        }
    }

    /// Read the next chunk and insist on its type.
    pub fn expect(&mut self, typ: &[u8; 4]) -> Result<LtvcEntryRaw, LtvcError> {
        match self.read_entry()? {
            Some(entry) if &entry.typ == typ => Ok(entry),
            Some(entry) => Err(LtvcError::Unexpected {
                expected: typ_name(typ),
                found: typ_name(&entry.typ),
            }),
            None => Err(LtvcError::Unexpected {
                expected: typ_name(typ),
                found: "end of stream".to_string(),
            }),
        }
    }

    /// Read the `AHDR` and check the version.
    pub fn expect_ahdr(&mut self, version: u8) -> Result<(), LtvcError> {
        let entry = self.expect(b"AHDR")?;
        match entry.data.first() {
            Some(v) if *v == version && entry.data.len() == 1 => Ok(()),
            Some(v) => Err(LtvcError::Version(*v)),
            None => Err(LtvcError::Version(0)),
        }
    }
}

impl<R: Read> Iterator for LtvcReaderRaw<R> {
    type Item = Result<LtvcEntryRaw, LtvcError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry().transpose()
    }
}
