//! Bundled [`crate::model::Model`] implementations.
//!
//! The core never depends on anything in here directly; each adapter is an
//! ordinary consumer of the `Model` trait, kept in its own module so its wire
//! format stays private.

pub mod openai_compat;
