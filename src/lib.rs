//! Merchant onboarding service for an AI shopping assistant.
//!
//! Takes a merchant's uploaded files (product/category exports, free-form
//! documents), transforms them into curated and search-corpus artifacts,
//! provisions the search datastores, and writes the configuration the
//! runtime assistant reads. Progress is tracked twice: a durable per-step
//! ledger in the merchant registry, and an in-memory live view for
//! polling clients.

pub mod api;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod search;
pub mod storage;
pub mod transform;

pub use error::{Error, Result};
