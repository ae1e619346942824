//! Data model for Transparency in Coverage processing
//!
//! Wire types mirror the CMS machine-readable file schemas leniently (the
//! published files deviate from the schema in practice); canonical types are
//! the normalized relational model this engine emits.

mod canonical;
mod common;
mod in_network;
mod toc;

pub use canonical::*;
pub use common::*;
pub use in_network::*;
pub use toc::*;
