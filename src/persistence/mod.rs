//! # Persistence Module
//!
//! ## Why This Module Exists
//! The bridge keeps no state of its own across restarts. The only stored data
//! it consults is the adapter configuration collection: a shared table of
//! per-adapter settings, queried once at startup by the adapter's fixed
//! name, which may override the topic root.
//!
//! ## Error Handling Strategy
//! Lookups never stop the bridge. Any failure, a missing row or a row without
//! a topic root degrades to the configured default, so the bridge stays usable
//! when the collection is unavailable.

pub mod adapter_config;
