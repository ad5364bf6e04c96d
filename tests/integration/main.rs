//! Integration tests for terminus
//!
//! These drive a whole shell session against scripted model backends,
//! exercise the Gemini HTTP client against a mock server, and check
//! configuration loading.

// Test utilities and common setup
mod common;

mod config_tests;
mod shell_tests;

// Re-export common utilities for use by test modules
pub use common::*;
