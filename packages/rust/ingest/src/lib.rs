//! Transcript ingestion: watch page → caption track → cleaned transcript.
//!
//! The [`Ingestor`] fetches a video's watch page, picks the best caption
//! track (manual English before auto-generated), downloads it as WebVTT,
//! and reduces it to a [`TranscriptDoc`] ready for the agent pass.

pub mod captions;
pub mod vtt;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use url::Url;

use profitgraph_shared::{
    CURRENT_SCHEMA_VERSION, ProfitGraphError, Result, TranscriptDoc, VideoId,
};

use crate::captions::{extract_caption_tracks, select_track};

/// User-Agent string for ingestion requests.
const USER_AGENT: &str = concat!("ProfitGraph/", env!("CARGO_PKG_VERSION"));

/// Default watch page origin.
const WATCH_ORIGIN: &str = "https://www.youtube.com";

/// Fetches and cleans caption tracks for videos.
pub struct Ingestor {
    client: Client,
    languages: Vec<String>,
    watch_origin: Url,
}

impl Ingestor {
    /// Create a new ingestor with the given caption language preferences.
    pub fn new(languages: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProfitGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            languages,
            watch_origin: Url::parse(WATCH_ORIGIN).expect("static origin parses"),
        })
    }

    /// Point the ingestor at a different watch page origin (for integration
    /// tests with mock servers).
    #[cfg(test)]
    fn with_watch_origin(mut self, origin: &str) -> Self {
        self.watch_origin = Url::parse(origin).expect("test origin parses");
        self
    }

    /// Fetch and clean the transcript for a video.
    #[instrument(skip_all, fields(video_id = %video_id))]
    pub async fn fetch_transcript(&self, video_id: &VideoId) -> Result<TranscriptDoc> {
        let watch_url = self.watch_url(video_id);
        debug!(%watch_url, "fetching watch page");

        let html = self.get_text(&watch_url).await?;
        let tracks = extract_caption_tracks(&html)?;

        if tracks.is_empty() {
            return Err(ProfitGraphError::validation(format!(
                "no caption tracks available for video {video_id}"
            )));
        }

        let track = select_track(&tracks, &self.languages).ok_or_else(|| {
            ProfitGraphError::validation(format!(
                "no caption track matches languages {:?} for video {video_id}",
                self.languages
            ))
        })?;

        let vtt_url = track.vtt_url()?;
        debug!(language = %track.language_code, auto = track.is_auto_generated(), "fetching caption track");

        let raw_vtt = self.get_text(&vtt_url).await?;
        let transcript_text = vtt::clean_vtt(&raw_vtt);

        if transcript_text.is_empty() {
            return Err(ProfitGraphError::validation(format!(
                "caption track for video {video_id} produced no text"
            )));
        }

        let source_engine = if track.is_auto_generated() {
            format!("captions/{} (auto)", track.language_code)
        } else {
            format!("captions/{}", track.language_code)
        };

        info!(
            chars = transcript_text.len(),
            source = %source_engine,
            "transcript fetched"
        );

        Ok(TranscriptDoc {
            schema_version: CURRENT_SCHEMA_VERSION,
            video_id: video_id.clone(),
            transcript_text,
            source_engine,
            ingested_at: Utc::now(),
        })
    }

    fn watch_url(&self, video_id: &VideoId) -> Url {
        let mut url = self.watch_origin.clone();
        url.set_path("/watch");
        url.query_pairs_mut().append_pair("v", video_id.as_str());
        url
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ProfitGraphError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfitGraphError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| ProfitGraphError::Network(format!("{url}: body read failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Transcript persistence
// ---------------------------------------------------------------------------

/// Write a transcript document to `<dir>/<video_id>_transcript.json`.
pub fn save_transcript(doc: &TranscriptDoc, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| ProfitGraphError::io(dir, e))?;

    let path = dir.join(doc.video_id.transcript_filename());
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| ProfitGraphError::parse(format!("transcript serialization: {e}")))?;

    std::fs::write(&path, json).map_err(|e| ProfitGraphError::io(&path, e))?;
    info!(path = %path.display(), "transcript saved");

    Ok(path)
}

/// Load a transcript document from disk.
pub fn load_transcript(path: &Path) -> Result<TranscriptDoc> {
    let content = std::fs::read_to_string(path).map_err(|e| ProfitGraphError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ProfitGraphError::validation(format!("invalid transcript at {}: {e}", path.display()))
    })
}

/// Read a batch queue file: one URL or video ID per line, blanks skipped.
pub fn read_batch_queue(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| ProfitGraphError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// SHA-256 hash of transcript text, hex-encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn content_hash_is_sha256_hex() {
        let hash = content_hash("hello world");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn transcript_roundtrip_on_disk() {
        let dir = std::env::temp_dir().join(format!("pg-ingest-test-{}", Uuid::now_v7()));
        let doc = TranscriptDoc {
            schema_version: CURRENT_SCHEMA_VERSION,
            video_id: VideoId::parse("dQw4w9WgXcQ").unwrap(),
            transcript_text: "cleaned speech".into(),
            source_engine: "captions/en (auto)".into(),
            ingested_at: Utc::now(),
        };

        let path = save_transcript(&doc, &dir).expect("save");
        assert!(path.ends_with("dQw4w9WgXcQ_transcript.json"));

        let loaded = load_transcript(&path).expect("load");
        assert_eq!(loaded.transcript_text, "cleaned speech");
        assert_eq!(loaded.video_id, doc.video_id);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_transcript_rejects_garbage() {
        let dir = std::env::temp_dir().join(format!("pg-ingest-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken_transcript.json");
        std::fs::write(&path, "not json").unwrap();

        let result = load_transcript(&path);
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn batch_queue_skips_blank_lines() {
        let dir = std::env::temp_dir().join(format!("pg-ingest-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("queue.txt");
        std::fs::write(
            &path,
            "https://youtu.be/dQw4w9WgXcQ\n\n  \nhttps://youtu.be/aaaaaaaaaaa\n",
        )
        .unwrap();

        let queue = read_batch_queue(&path).expect("read queue");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0], "https://youtu.be/dQw4w9WgXcQ");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn fetch_transcript_end_to_end_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        let caption_url = format!("{}/api/timedtext?v=dQw4w9WgXcQ&lang=en", server.uri());
        let watch_html = format!(
            r#"<html><head><script>var ytInitialPlayerResponse = {{"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"{caption_url}","languageCode":"en","kind":"asr"}}]}}}}}};</script></head><body></body></html>"#
        );

        let vtt_body = "WEBVTT\nKind: captions\nLanguage: en\n\n00:00:00.000 --> 00:00:02.000\nhello <c>world</c>\n\n00:00:02.000 --> 00:00:04.000\nhello world\nfrom captions\n";

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/watch"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(watch_html))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/api/timedtext"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(vtt_body))
            .mount(&server)
            .await;

        let ingestor = Ingestor::new(vec!["en".into()])
            .unwrap()
            .with_watch_origin(&server.uri());

        let video_id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let doc = ingestor.fetch_transcript(&video_id).await.expect("fetch");

        assert_eq!(doc.transcript_text, "hello world from captions");
        assert_eq!(doc.source_engine, "captions/en (auto)");
    }

    #[tokio::test]
    async fn fetch_transcript_errors_without_captions() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/watch"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><head><script>var x = 1;</script></head></html>"),
            )
            .mount(&server)
            .await;

        let ingestor = Ingestor::new(vec!["en".into()])
            .unwrap()
            .with_watch_origin(&server.uri());

        let video_id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let result = ingestor.fetch_transcript(&video_id).await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("no caption tracks")
        );
    }
}
