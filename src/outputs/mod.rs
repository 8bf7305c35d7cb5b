//! Output generation for the assembled digest.
//!
//! # Submodules
//!
//! - [`json`]: Writes [`Digest`](crate::models::Digest) data to JSON files for the page renderer
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! ├── 2026-02-21/
//! │   ├── morning.json
//! │   ├── afternoon.json
//! │   └── evening.json
//! ```

pub mod json;
