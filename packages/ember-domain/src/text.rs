use regex::Regex;

/// Splits text into fragments of at most `chunk_chars` characters without breaking code points.
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
	let chunk_chars = chunk_chars.max(1);
	let mut chunks = Vec::with_capacity(text.len() / chunk_chars + 1);
	let mut current = String::new();
	let mut count = 0;

	for ch in text.chars() {
		current.push(ch);
		count += 1;

		if count == chunk_chars {
			chunks.push(std::mem::take(&mut current));
			count = 0;
		}
	}

	if !current.is_empty() {
		chunks.push(current);
	}

	chunks
}

/// Returns the first `max_chars` characters and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
	match text.char_indices().nth(max_chars) {
		Some((byte_index, _)) => (&text[..byte_index], true),
		None => (text, false),
	}
}

/// Pulls the first JSON string array out of free-form model output.
pub fn parse_suggestions(raw: &str) -> Option<Vec<String>> {
	let re = Regex::new(r"(?s)\[.*\]").ok()?;
	let found = re.find(raw)?;
	let parsed: Vec<String> = serde_json::from_str(found.as_str()).ok()?;
	let cleaned: Vec<String> = parsed
		.into_iter()
		.map(|item| item.trim().to_string())
		.filter(|item| !item.is_empty())
		.collect();

	if cleaned.is_empty() { None } else { Some(cleaned) }
}
