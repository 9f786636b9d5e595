use regex::Regex;

use crate::text;

pub const TRUNCATION_MARKER: &str = "\n[...transcript truncated...]";
pub const DEFAULT_VIDEO_TITLE: &str = "YouTube Video";

const VIDEO_URL_PATTERN: &str = r"(?:https?://)?(?:www\.)?(?:youtube\.com/(?:[^/\n\s]+/\S+/|(?:v|e(?:mbed)?)/|\S*?[?&]v=)|youtu\.be/)([a-zA-Z0-9_-]{11})";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptOptions {
	/// Preferred caption languages in priority order. Empty means any language.
	pub languages: &'static [&'static str],
	pub with_metadata: bool,
}

/// Option combinations tried in order until one yields a non-empty transcript.
pub const TRANSCRIPT_LADDER: [TranscriptOptions; 4] = [
	TranscriptOptions { languages: &["en", "en-US"], with_metadata: true },
	TranscriptOptions { languages: &["hi", "hi-IN"], with_metadata: true },
	TranscriptOptions { languages: &["hi", "hi-IN", "es", "fr"], with_metadata: false },
	TranscriptOptions { languages: &[], with_metadata: false },
];

pub fn extract_video_id(text: &str) -> Option<String> {
	let re = Regex::new(VIDEO_URL_PATTERN).ok()?;

	re.captures(text).and_then(|caps| caps.get(1)).map(|id| id.as_str().to_string())
}

pub fn canonical_url(video_id: &str) -> String {
	format!("https://www.youtube.com/watch?v={video_id}")
}

/// Cuts a transcript to `max_chars` characters, appending [`TRUNCATION_MARKER`] when cut.
pub fn truncate_transcript(transcript: &str, max_chars: usize) -> String {
	let (kept, truncated) = text::truncate_chars(transcript, max_chars);

	if truncated { format!("{kept}{TRUNCATION_MARKER}") } else { kept.to_string() }
}

pub fn transcript_context(title: &str, transcript: &str) -> String {
	format!("RAW TRANSCRIPT ({title}):\n{transcript}")
}

pub fn analysis_prompt(title: &str, query: &str) -> String {
	format!("Analyze the following video transcript for '{title}'. Summarize key points and answer: {query}")
}
