//! Timestamp extraction from the two unreliable sources: raw metadata tag
//! values (`parse`) and filename digit patterns (`filename`), with calendar
//! validity checking and day/month disambiguation (`validate`).

pub mod filename;
pub mod parse;
pub mod validate;
