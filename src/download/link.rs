use url::Url;

use super::DownloadError;

/// Substring every candidate link must contain.
pub const INSTAGRAM_DOMAIN: &str = "instagram.com";

const CONTENT_KINDS: &[&str] = &["p", "reel", "reels", "tv"];

/// A link that points at a single Instagram post, reel or IGTV video.
#[derive(Debug, Clone, PartialEq)]
pub struct PostLink {
    pub url: Url,
    pub shortcode: String,
}

impl PostLink {
    /// Picks the first token of `text` that mentions Instagram and parses it.
    ///
    /// Accepted paths are `/<kind>/<code>` and `/<username>/<kind>/<code>`,
    /// where kind is one of `p`, `reel`, `reels`, `tv`. Query and fragment
    /// are ignored.
    pub fn parse(text: &str) -> Result<PostLink, DownloadError> {
        let candidate = text
            .split_whitespace()
            .find(|token| token.to_lowercase().contains(INSTAGRAM_DOMAIN))
            .ok_or_else(|| DownloadError::InvalidLink(text.trim().to_string()))?;

        let invalid = || DownloadError::InvalidLink(candidate.to_string());

        let url = if candidate.contains("://") {
            Url::parse(candidate)
        } else {
            Url::parse(&format!("https://{}", candidate))
        }
        .map_err(|_| invalid())?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(invalid());
        }

        let host = url.host_str().ok_or_else(invalid)?.to_lowercase();
        if host != INSTAGRAM_DOMAIN && !host.ends_with(".instagram.com") {
            return Err(invalid());
        }

        let shortcode = extract_shortcode(&url).ok_or_else(invalid)?;
        log::debug!("Extracted shortcode {:?} from {}", shortcode, url);

        Ok(PostLink { url, shortcode })
    }
}

fn extract_shortcode(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    let code = match segments.as_slice() {
        [kind, code, ..] if CONTENT_KINDS.contains(kind) => code,
        [_, kind, code, ..] if CONTENT_KINDS.contains(kind) => code,
        _ => return None,
    };

    let valid = code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Some(code.to_string())
    } else {
        None
    }
}
