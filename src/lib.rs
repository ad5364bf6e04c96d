// Library exports for terminus
// This allows the modules to be imported in tests and external code

pub mod config;
pub mod content;
pub mod llm;
pub mod output;
pub mod shell;
pub mod storage;
pub mod tui;
