//! Configuration loader and schema types.
//!
//! Settings come from an optional TOML file, then the environment, then
//! struct defaults. See [`Settings::load`].

mod load;
mod schema;

pub use load::{default_config_path, resolve_config_path};
pub use schema::*;

#[cfg(test)]
mod tests;
