//! # Scan Resolver
//!
//! The scan identification and confidence resolution engine: takes a noisy,
//! user- or OCR-supplied description of a collectible ("Amazing Spider-Man
//! #129", a raw vision-model text blob, a partial title) and resolves it to a
//! specific catalogued item with an explicit, auditable confidence score, a
//! human-in-the-loop fallback when confidence is insufficient, and a
//! persistent correction memory so the same ambiguous input is never
//! mis-resolved twice.
//!
//! ## Pipeline
//!
//! ```text
//! raw input ──▶ Normalizer ──▶ Correction Memory ──▶ Catalog Adapter
//!                                (hit: done)             │
//!                                                        ▼
//!            Classifier ◀── Bias Filter ◀── Scoring Engine
//!                │
//!                ├─ AutoResolved
//!                ├─ NeedsConfirmation ──(human pick)──▶ Correction write
//!                └─ NoMatch
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Input parsing and cache-key normalization |
//! | [`catalog`] | External catalog lookups (issue-first / volume-first) |
//! | [`score`] | Weighted multi-factor scoring |
//! | [`bias`] | Publisher re-ranking filter |
//! | [`classify`] | Confidence classifier state machine |
//! | [`corrections`] | Correction memory store |
//! | [`resolve`] | Pipeline orchestration |
//! | [`diagnostics`] | Read-only candidate export |
//! | [`server`] | JSON HTTP API |
//! | [`db`], [`migrate`] | SQLite connection and schema |

pub mod bias;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod corrections;
pub mod db;
pub mod diagnostics;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod resolve;
pub mod score;
pub mod server;
