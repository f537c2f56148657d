//! Pipeline stages for blog export.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! adapter ──▶ normalize ──▶ assemble ──┬──▶ images ──▶ render   (illustrated)
//! (fetch)     (dom rules)   (order)    └──▶ strip  ──▶ render   (text-only)
//! ```
//!
//! 1. [`fetch`]     — the only stage with network I/O; paced, sequential,
//!    429-aware, cancellable
//! 2. [`dom`]       — owned HTML fragments and the tree edits rules are made of
//! 3. [`normalize`] — per-source chrome removal and anchor cleanup
//! 4. [`assemble`]  — filter, order, derive metadata, build both variants
//! 5. [`images`]    — content-addressed image cache and `<img>` rewriting;
//!    transcoding runs in `spawn_blocking`
//! 6. [`render`]    — the [`render::Renderer`] seam and the built-in HTML book

pub mod assemble;
pub mod dom;
pub mod fetch;
pub mod images;
pub mod normalize;
pub mod render;
