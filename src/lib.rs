//! HTTP relay that searches YouTube and streams audio through an external
//! extraction tool (`yt-dlp`), or hands out resolved direct media URLs.

pub mod config;
pub mod detect;
pub mod error;
pub mod provision;
pub mod relay;
pub mod resolve;
pub mod search;
pub mod server;
pub mod video;
