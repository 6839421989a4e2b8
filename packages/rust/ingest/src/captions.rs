//! Caption track discovery from a video watch page.
//!
//! The watch page embeds the player response JSON in a `<script>` element;
//! the `captionTracks` array inside it lists every available caption track
//! with its download URL and language.

use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

use profitgraph_shared::{ProfitGraphError, Result};

/// A single caption track from the player response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    /// Track download URL (language/format selected via query params).
    pub base_url: String,
    /// BCP-47 language code (e.g. `en`, `en-US`).
    pub language_code: String,
    /// `"asr"` marks an auto-generated track; manual tracks omit the field.
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    /// Whether this track is auto-generated speech recognition output.
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    /// The track URL with the WebVTT format selected.
    pub fn vtt_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProfitGraphError::parse(format!("invalid caption URL: {e}")))?;
        url.query_pairs_mut().append_pair("fmt", "vtt");
        Ok(url)
    }
}

/// Extract the caption track list from watch page HTML.
///
/// Returns an empty list when the player response carries no captions
/// section (the caller decides whether that is an error).
pub fn extract_caption_tracks(html: &str) -> Result<Vec<CaptionTrack>> {
    let doc = Html::parse_document(html);
    let script_sel = Selector::parse("script").expect("valid selector");

    for script in doc.select(&script_sel) {
        let text: String = script.text().collect();
        if !text.contains("\"captionTracks\"") {
            continue;
        }

        let Some(array) = find_json_array(&text, "captionTracks") else {
            continue;
        };

        return serde_json::from_str(array).map_err(|e| {
            ProfitGraphError::parse(format!("malformed captionTracks JSON: {e}"))
        });
    }

    Ok(Vec::new())
}

/// Pick the best track for the configured language preferences.
///
/// Per language, a manually created track wins over an auto-generated one;
/// languages are tried in order.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    languages: &[String],
) -> Option<&'a CaptionTrack> {
    for lang in languages {
        let matches_lang =
            |t: &&CaptionTrack| t.language_code == *lang || t.language_code.starts_with(&format!("{lang}-"));

        if let Some(manual) = tracks
            .iter()
            .filter(|t| !t.is_auto_generated())
            .find(matches_lang)
        {
            return Some(manual);
        }
        if let Some(auto) = tracks
            .iter()
            .filter(|t| t.is_auto_generated())
            .find(matches_lang)
        {
            return Some(auto);
        }
    }
    None
}

/// Locate the balanced `[...]` value for `"key":` inside a JSON blob.
///
/// The player response is megabytes of JSON; slicing the one array we need
/// avoids deserializing the whole document.
fn find_json_array<'a>(source: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{key}\":");
    let key_pos = source.find(&needle)?;
    let rest = &source[key_pos + needle.len()..];
    let open = rest.find('[')?;

    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[open..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
