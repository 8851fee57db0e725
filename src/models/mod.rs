//! Data transfer objects shared by adapters, the session and the HTTP surface.
//!
//! - `entry`: Entry, EntryType, Link for normalized directory listings
//! - `location`: Provider, Location, Source and remote URL parsing

pub mod entry;
pub mod location;

pub use entry::*;
pub use location::*;
