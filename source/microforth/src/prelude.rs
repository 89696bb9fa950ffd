//! Forth source for the standard words.
//!
//! The engine only ships primitives. Hosts evaluate [`CORE`] after
//! bootstrapping to get the usual vocabulary, or bake it into an image.

/// `emit . tell ! @ , # c! c@ c, [ ] postpone 1+ 1- over negate +! inc dec
/// < > <= >= =0 not != cr br .. here allot var const begin again until if
/// else fi then unless i j do loop ."`
pub const CORE: &str = include_str!("../forth/core.fs");
