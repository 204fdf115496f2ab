pub mod answer;
pub mod completion;
pub mod config;
pub mod context;
pub mod fragments;
pub mod guardrails;
pub mod llm;
pub mod retrieve;
