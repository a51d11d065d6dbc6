// Relay plumbing around the extraction tool subprocess.

pub mod command;
pub mod process;
pub mod stats;
pub mod stderr;
pub mod tool;
