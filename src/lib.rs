//! Track resolution engine: finds replacement files for playlist tracks whose
//! paths no longer resolve, and repairs the playlists that reference them.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod fixer;
pub mod index;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod resolver;
pub mod safety;
pub mod scan;
pub mod scoring;
pub mod snapshot;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use resolver::Resolver;
