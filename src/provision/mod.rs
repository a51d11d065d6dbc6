// Startup provisioning of the extraction tool and its cookie file.

pub mod binary;
pub mod cookies;
