//! Echo Nest API integration
//!
//! The music-intelligence service the pipeline resolves songs and audio
//! features against.

mod adapter;
mod client;
pub mod dto;

pub use adapter::{check_status, to_remote_track, to_songs};
pub use client::EchoNestClient;
