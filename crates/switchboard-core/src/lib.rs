//! Primitives shared by every switchboard crate

mod error;
pub mod headers;

pub use error::{ErrorEnvelope, HttpError};
pub use headers::ResponseMetadata;
