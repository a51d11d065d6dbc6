// Direct URL resolution: third-party APIs first, the local tool last.

pub mod chain;
pub mod piped;
pub mod traits;
pub mod ytdlp;
