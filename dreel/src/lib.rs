pub mod asset;
pub mod error;
pub mod film;
pub mod frame_index;
pub mod job;
pub mod ltvc;
pub mod manifest;
pub mod promote;
pub mod reel;
pub mod reel_writer;
pub mod resume;

pub use error::ReelError;
pub use frame_index::{Eyes, FrameIndex, FrameInfo, RECORD_SIZE};
pub use reel_writer::{ReelWriter, ReelWriterOptions};
pub use resume::{check_existing_picture, VerifyMode};
