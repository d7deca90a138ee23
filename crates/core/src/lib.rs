//! Cadenza core: profile, signal-path and numeric-mapping engine for the
//! Cadenza audio post-processing control surface.

pub mod domain;
