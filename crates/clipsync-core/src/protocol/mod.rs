//! Network protocol: constants, binary codec, and async frame I/O.

pub mod codec;
pub mod messages;
pub mod stream;

pub use codec::{decode_frame, encode_snapshot, FrameLimits, FramingError};
pub use stream::{read_frame, write_frame};
