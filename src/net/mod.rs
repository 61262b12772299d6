//! C6 framing codec and the wire message shapes it carries.

pub mod framing;
pub mod protocol;

pub use framing::{read_frame, read_frame_bytes, write_frame, FramingError};
pub use protocol::{ClientMessage, JoinedInfo, ScoreRow, ServerMessage};
