/// Audio container of the relayed bytes, as far as the first chunk tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,  // m4a
    WebM, // Matroska/EBML
    Ogg,
    Mp3,
    Flac,
    Unknown,
}

impl ContainerFormat {
    /// Content type sent to the client. Unknown streams are labelled MPEG audio.
    pub fn mime_type(self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "audio/mp4",
            ContainerFormat::WebM => "audio/webm",
            ContainerFormat::Ogg => "audio/ogg",
            ContainerFormat::Flac => "audio/flac",
            ContainerFormat::Mp3 | ContainerFormat::Unknown => "audio/mpeg",
        }
    }

    /// Map a yt-dlp `ext` field to a container.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "m4a" | "mp4" | "m4b" => ContainerFormat::Mp4,
            "webm" | "weba" | "mka" => ContainerFormat::WebM,
            "ogg" | "opus" | "oga" => ContainerFormat::Ogg,
            "mp3" => ContainerFormat::Mp3,
            "flac" => ContainerFormat::Flac,
            _ => ContainerFormat::Unknown,
        }
    }
}

/// Detect container format from the first bytes written by the tool.
pub fn detect_container(header: &[u8]) -> ContainerFormat {
    // MP4/M4A: bytes 4..8 == "ftyp"
    if header.len() >= 8 && &header[4..8] == b"ftyp" {
        return ContainerFormat::Mp4;
    }

    // WebM: EBML magic bytes at offset 0
    if header.len() >= 4 && header[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return ContainerFormat::WebM;
    }

    if header.starts_with(b"OggS") {
        return ContainerFormat::Ogg;
    }

    if header.starts_with(b"fLaC") {
        return ContainerFormat::Flac;
    }

    // MP3: ID3v2 tag, or a bare MPEG frame sync (11 set bits).
    if header.starts_with(b"ID3") {
        return ContainerFormat::Mp3;
    }
    if header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0 {
        return ContainerFormat::Mp3;
    }

    ContainerFormat::Unknown
}
