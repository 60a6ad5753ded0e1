//! Platform-native integration artifacts.
//!
//! Every artifact is a pure rendering function over the configuration and the
//! resolved paths. The platform implementations decide where the results are
//! written.

pub mod desktop;
pub mod file_ops;
pub mod launcher;
pub mod registry;
pub mod template;
pub mod uninstall;
pub mod unit;
