use std::fmt;

use reqwest::Url;

use crate::error::RelayError;

const ID_LEN: usize = 11;

/// A validated 11-character YouTube video id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Accept a bare id or any of the common YouTube URL shapes.
    pub fn parse(input: &str) -> Result<Self, RelayError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RelayError::MissingParam("url"));
        }
        if is_valid_id(input) {
            return Ok(Self(input.to_string()));
        }

        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };
        let invalid = || RelayError::InvalidVideo(input.to_string());
        let url = Url::parse(&with_scheme).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(host.as_str());

        let candidate = match host {
            "youtu.be" => url
                .path_segments()
                .and_then(|mut segs| segs.next())
                .map(str::to_string),
            "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
                let from_query = url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned());
                from_query.or_else(|| {
                    let mut segs = url.path_segments()?;
                    match segs.next()? {
                        "shorts" | "embed" | "live" | "v" => segs.next().map(str::to_string),
                        _ => None,
                    }
                })
            }
            _ => None,
        };

        match candidate {
            Some(id) if is_valid_id(&id) => Ok(Self(id)),
            _ => Err(invalid()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_id(s: &str) -> bool {
    s.len() == ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
