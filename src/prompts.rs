//! Filler prompts for silence during a call
//!
//! Picks a follow-up question matched to what the user last talked about.

/// Prompt used when the user has not said anything yet
pub const OPENING_PROMPT: &str =
    "Are you still there? I'm happy to help with anything you'd like to know.";

/// Prompt used when the last utterance matches no topic
pub const GENERIC_PROMPT: &str = "Is there anything else you'd like to know about that?";

struct TopicRule {
    keywords: &'static [&'static str],
    prompt: &'static str,
}

// Checked in order; the first rule with a matching keyword wins. Keywords match
// whole words (a trailing plural "s" or "es" is allowed) and multi-word keywords
// match as a phrase.
const TOPIC_RULES: &[TopicRule] = &[
    TopicRule {
        keywords: &[
            "project",
            "develop",
            "development",
            "build",
            "building",
            "app",
            "website",
            "software",
        ],
        prompt: "Would you like to hear how we usually run a project like that from start to finish?",
    },
    TopicRule {
        keywords: &["contact", "email", "phone", "reach", "get in touch"],
        prompt: "Would you like me to share the best way to get in touch with the team?",
    },
    TopicRule {
        keywords: &["service", "offer", "offering", "help with", "specialize", "what do you do"],
        prompt: "Is there a particular service you'd like to hear more about?",
    },
    TopicRule {
        keywords: &["where", "location", "located", "office", "address"],
        prompt: "Would you like directions, or details about meeting in person?",
    },
    TopicRule {
        keywords: &["price", "pricing", "cost", "budget", "quote", "how much"],
        prompt: "Would it help if I walked you through how pricing usually works?",
    },
];

/// Suggest a follow-up based on the most recent user utterance.
///
/// Pure and deterministic for a given input.
pub fn contextual_prompt(last_user_utterance: Option<&str>) -> &'static str {
    let Some(utterance) = last_user_utterance else {
        return OPENING_PROMPT;
    };

    let lowered = utterance.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    TOPIC_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| mentions(&words, k)))
        .map_or(GENERIC_PROMPT, |rule| rule.prompt)
}

fn mentions(words: &[&str], keyword: &str) -> bool {
    let phrase: Vec<&str> = keyword.split_whitespace().collect();
    if phrase.is_empty() {
        return false;
    }
    words.windows(phrase.len()).any(|window| {
        window
            .iter()
            .zip(&phrase)
            .all(|(word, expected)| same_word(word, expected))
    })
}

fn same_word(word: &str, keyword: &str) -> bool {
    word == keyword
        || word.strip_suffix('s') == Some(keyword)
        || word.strip_suffix("es") == Some(keyword)
}
