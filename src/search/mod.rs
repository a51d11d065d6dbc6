// Search backends: results-page scraping or the extraction tool's ytsearch.

pub mod traits;
pub mod web;
pub mod ytdlp;
