//! Client for the OpenAI-compatible text endpoint and its sibling
//! image endpoints.
mod core;
pub mod stream;

pub use self::core::*;
pub use stream::{StreamDecoder, decode_chunk};
