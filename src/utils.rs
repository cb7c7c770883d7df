//! Small shared helpers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kuchiki::traits::TendrilSink;

use crate::error::Error;

/// Strip markup from an HTML fragment and return its text content. With
/// `collapse`, runs of whitespace are folded into single spaces.
#[must_use]
pub fn extract_text_from_html(html: &str, collapse: bool) -> String {
    let document = kuchiki::parse_html().one(html);
    let text = document.text_contents();
    if collapse {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        text
    }
}

/// Decode a base64 payload (screenshots, PDF data).
///
/// # Errors
///
/// Returns `Error::InvalidResponse` when the payload is not valid base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, Error> {
    STANDARD
        .decode(data)
        .map_err(|e| Error::InvalidResponse(format!("invalid base64 payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_across_nested_tags() {
        let html = "<div><p>Hello <b>world</b></p><span>again</span></div>";
        assert_eq!(extract_text_from_html(html, true), "Hello world again");
    }

    #[test]
    fn collapse_folds_whitespace() {
        let html = "<p>  spaced\n\n   out  </p>";
        assert_eq!(extract_text_from_html(html, true), "spaced out");
    }

    #[test]
    fn decode_base64_roundtrip() {
        let bytes = decode_base64("aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn decode_base64_rejects_garbage() {
        assert!(decode_base64("%%%").is_err());
    }
}
