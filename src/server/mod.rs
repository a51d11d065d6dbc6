// HTTP front door.

pub mod handler;
pub mod state;
