//! Command handlers grouped by area.

pub(crate) mod billing;
pub(crate) mod generate;
pub(crate) mod license;
pub(crate) mod settings;
