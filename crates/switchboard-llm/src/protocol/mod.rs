//! Wire format types for client and upstream protocols
//!
//! Pure serde structs matching each API's JSON format. They are only used at
//! the boundary; everything in between works on the canonical types.

pub mod anthropic;
pub mod gemini;
pub mod openai;
