//! Pipeline stages for image bundling.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the orchestration in [`crate::bundle`] stays a thin loop.
//!
//! ## Data Flow
//!
//! ```text
//! matcher ──▶ classify ──▶ fetch ──▶ encode
//! (spans)     (URL/path)   (bytes)   (data URI)
//! ```
//!
//! 1. [`matcher`]:  find `<image href>` values and their byte spans
//! 2. [`classify`]: remote URL, local path, or leave-alone
//! 3. [`fetch`]:    capped HTTP GET or file read; the only stage with I/O
//! 4. [`encode`]:   media type detection and base64 wrapping

pub mod classify;
pub mod encode;
pub mod fetch;
pub mod matcher;
