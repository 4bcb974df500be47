//! Length-Tag-Value-Checksum file format
//!
//! Small self checking container used for everything the reel writer puts
//! into a package that is not essence: text assets (subtitles and closed
//! captions with their fonts) and the reel manifest.
//!
//! A file is a collection of chunks (see: [`raw::LtvcEntryRaw`]). With the
//! following on disk format. Unless other wise noted everything is stored
//! in Little Endian format.
//!
//! | Type    | Name     | Description |
//! | ------: | -------- | ----------- |
//! | u32     | length   | The length of the value section of a chunk, is allowed to be 0 bytes |
//! | [u8; 4] | type     | The type of the chunk, usually ASCII such as `AHDR` but is not required |
//! | u16     | header checksum | The checksum of <code>length \|\| type</code> concated together |
//! | [u8; N] | value    | The content of the chunk, interpret according to the chunk type |
//! | u32     | checksum | The checksum of `value` |
//!
//! # Chunk Types
//!
//! | Chunk Type | Name            | Description |
//! | :--------: | --------------- | ----------- |
//! | AHDR       | Archive Header  | The first chunk, holds the format version |
//! | MHDR       | Manifest Header | Manifest wide metadata, see [`crate::manifest`] |
//! | REEL       | Reel            | One composed reel, see [`crate::reel::Reel`] |
//! | THDR       | Text Header     | Text asset metadata, see [`crate::asset::text`] |
//! | FONT       | Font            | One embedded font of a text asset |
//! | TEXT       | Text            | One subtitle or caption entry |
//! | AEND       | Archive Ending  | Terminates the file begun by a `AHDR` |
//!
//! ## AHDR
//!
//! | Type | Name    | Description |
//! | ---: | ------- | ----------- |
//! | u8   | version | The format version, currently `0x01` |
//!
//! ## AEND
//!
//! | Type | Name  | Description |
//! | ---: | ----- | ----------- |
//! | u32  | count | Number of `REEL` or `TEXT` chunks written before it |
//!
//! All other chunk values are bincode encoded structs.
pub mod builder;
pub mod raw;

pub use builder::LtvcBuilder;
pub use raw::{LtvcEntryRaw, LtvcError, LtvcReaderRaw};

pub const VERSION: u8 = 0x01;

// Fonts end up in a single chunk so this has to be generous
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;
