//! Settings file and model-definition catalog.
//!
//! Both files share the `key: "value"` line format handled by [`kv`].

pub mod catalog;
pub mod kv;
pub mod settings;

pub use catalog::Catalog;
pub use settings::Settings;
