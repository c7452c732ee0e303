//! API modules for the `plume` namespace

pub mod host;
