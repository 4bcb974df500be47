pub mod buf;
pub mod hash;
pub mod time;
