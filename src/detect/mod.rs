// Format sniffing for relayed audio.

pub mod container;
