pub const IDENTITY_TRIGGERS: [&str; 10] = [
	"who are you",
	"who made you",
	"who created you",
	"who owns you",
	"who developed you",
	"what are you",
	"your developer",
	"core model",
	"maintaining you",
	"responsible for you",
];

pub const IDENTITY_CONTEXT: &str = "CONTEXT: The user is asking about your identity. Do NOT search \
                                    the web. Answer directly based on your system instructions.";

pub fn is_identity_query(query: &str) -> bool {
	let lowered = query.to_lowercase();

	IDENTITY_TRIGGERS.iter().any(|trigger| lowered.contains(trigger))
}
