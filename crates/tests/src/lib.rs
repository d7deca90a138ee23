//! Cross-crate integration tests for Cadenza.

#[cfg(test)]
mod session_integration;
