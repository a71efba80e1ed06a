//! Shohayok — a tactical AI assistant driven from the terminal.
//!
//! The [`turn::TurnController`] runs one conversational turn at a time:
//! user text (typed or captured by [`voice`]) goes to a [`llm`] backend, the
//! reply lands in the transcript, is persisted through [`store`] and may be
//! spoken aloud.  [`console`] is the terminal render sink used by the binary.

pub mod config;
pub mod console;
pub mod conversation;
pub mod llm;
pub mod store;
pub mod turn;
pub mod voice;
