//! LLM backend infrastructure.

pub mod client;

pub use client::AzureChatClient;
