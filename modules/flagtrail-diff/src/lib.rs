//! Structural diffs between JSON documents and their human-readable
//! rendering.
//!
//! Used to reconstruct "what changed" for an audit event by comparing its
//! before/after payloads. Everything here is a pure transform: no
//! persistence, no ordering guarantee beyond the input's order, idempotent
//! and side-effect-free.

pub mod change;
pub mod render;

pub use change::{diff, Change, PathSegment};
pub use render::{render, render_payload};
