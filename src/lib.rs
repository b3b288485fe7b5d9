//! Portfolio assistant: a chat service backed by Gemini with inline image
//! generation, plus an embeddable chat widget.

pub mod ai;
pub mod config;
pub mod image;
pub mod intent;
pub mod orchestrator;
pub mod render;
#[cfg(not(target_arch = "wasm32"))]
pub mod server;
pub mod store;
pub mod tools;
pub mod types;

#[cfg(feature = "widget")]
pub mod widget;
