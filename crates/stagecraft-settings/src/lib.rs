//! Stagecraft Settings Store
//!
//! Hierarchical, JSON-shaped configuration tree consumed by every stagecraft
//! component.
//!
//! # Core Concepts
//!
//! - [`Settings`]: a settings node (object at the root, any value below)
//! - [`Settings::validate_and_assign_defaults`]: recursive merge of a defaults
//!   tree, failing on incompatible value kinds
//! - [`Settings::validate_strict`]: same merge, also rejecting unknown keys
//! - [`Settings::migrate_key`]: explicit rename of deprecated keys
//!
//! # Example
//!
//! ```rust
//! use stagecraft_settings::Settings;
//!
//! let mut settings = Settings::from_json_str(r#"{"echo_level": 1}"#).unwrap();
//! let defaults = Settings::from_json_str(r#"{"echo_level": 0, "name": "default"}"#).unwrap();
//!
//! settings.validate_and_assign_defaults(&defaults).unwrap();
//! assert_eq!(settings.get_int("echo_level").unwrap(), 1);
//! assert_eq!(settings.get_string("name").unwrap(), "default");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod parse;
mod settings;
mod validation;

pub use error::{SettingsError, SettingsResult};
pub use settings::Settings;
pub use validation::ValueKind;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
