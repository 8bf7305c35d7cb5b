//! # Tech River Clusters
//!
//! The clustering core behind a three-column tech news "river": it takes a
//! batch of headlines already fetched from Taiwanese, Japanese/Korean and
//! international feeds, groups the ones describing the same story, and ranks
//! the groups for display.
//!
//! ## Pipeline
//!
//! 1. **Intake** ([`intake`]): canonicalize links, dedup, parse timestamps, clean titles
//! 2. **Grouping**, one of two strategies selected in [`settings::Strategy`]:
//!    - [`cluster`]: greedy single pass over time-sorted headlines scored by
//!      [`similarity`], with an LLM oracle ([`oracle`]) consulted only for
//!      borderline pairs
//!    - [`entity`]: batched LLM tagging of the main company per headline, then a
//!      global merge by company name
//! 3. **Ranking** ([`rank`]): priority clusters first, then newest first
//! 4. **Assembly** ([`digest`]): one ranked column per region plus source statistics
//!
//! The oracle fails closed: a timeout, transport error, or unparseable reply
//! always reads as "not the same event" / "no entity".

pub mod cluster;
pub mod digest;
pub mod entity;
pub mod intake;
pub mod models;
pub mod normalize;
pub mod oracle;
pub mod outputs;
pub mod prompts;
pub mod rank;
pub mod settings;
pub mod similarity;
pub mod utils;
