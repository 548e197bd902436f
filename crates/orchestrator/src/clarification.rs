//! Clarifying replies for ambiguous personal questions.
//!
//! Retrieved memories are grouped by domain, the most relevant memory of
//! each populated domain yields a short example phrase, and the reply asks
//! which of those domains the user means. No provider call is made.

use twin_memory::RetrievedMemory;

use crate::topics::{mentions, mentions_any, Domain};

/// At most this many example phrases appear in a clarification.
pub const MAX_EXAMPLES: usize = 3;

const GENERIC_EXAMPLE_WORDS: usize = 6;

const MUSIC_GENRES: &[&str] = &[
    "jazz", "rock", "hip hop", "classical", "techno", "house", "indie", "folk", "blues",
    "metal", "punk", "soul", "funk", "pop", "electronic", "r&b", "country",
];

const TECH_TERMS: &[(&str, &str)] = &[
    ("rust", "Rust"),
    ("python", "Python"),
    ("javascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("go", "Go"),
    ("ai", "AI"),
    ("machine learning", "machine learning"),
    ("web", "web development"),
    ("game", "game development"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Clarification {
    pub response: String,
    pub examples: Vec<String>,
    pub domains: Vec<Domain>,
}

/// Whether a memory belongs to `domain`, by tag or by content keyword.
fn memory_in_domain(memory: &RetrievedMemory, domain: Domain) -> bool {
    let keywords = domain.keywords();
    memory
        .tags
        .iter()
        .any(|t| t == domain.as_str() || keywords.contains(&t.as_str()))
        || mentions_any(&memory.content.to_lowercase(), keywords)
}

fn music_example(content: &str) -> Option<String> {
    let lower = content.to_lowercase();
    MUSIC_GENRES
        .iter()
        .find(|g| mentions(&lower, g))
        .map(|g| format!("{g} music"))
}

fn tech_example(content: &str) -> Option<String> {
    let lower = content.to_lowercase();
    TECH_TERMS
        .iter()
        .find(|(term, _)| mentions(&lower, term))
        .map(|(_, label)| format!("building things with {label}"))
}

/// First clause of the memory, shortened to a few words.
fn generic_example(content: &str) -> String {
    let clause = content
        .split(['.', '!', '?', ';', ','])
        .map(str::trim)
        .find(|c| !c.is_empty())
        .unwrap_or(content.trim());
    let words: Vec<&str> = clause.split_whitespace().collect();
    let mut phrase = words
        .iter()
        .take(GENERIC_EXAMPLE_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > GENERIC_EXAMPLE_WORDS {
        phrase.push_str("...");
    }
    if phrase.starts_with("I ") {
        return phrase;
    }
    let mut chars = phrase.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn example_phrase(domain: Domain, content: &str) -> String {
    let specific = match domain {
        Domain::Music => music_example(content),
        Domain::Technology => tech_example(content),
        _ => None,
    };
    specific.unwrap_or_else(|| generic_example(content))
}

fn domain_label(domain: Domain) -> &'static str {
    match domain {
        Domain::Technology => "tech",
        Domain::Activities => "hobbies",
        Domain::Movies => "movies and shows",
        other => other.as_str(),
    }
}

/// "a", "a and b", "a, b, and c"
fn join_list(items: &[String], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} {conjunction} {b}"),
        [rest @ .., last] => format!("{}, {conjunction} {last}", rest.join(", ")),
    }
}

/// Build a clarification from memories retrieved for an ambiguous question.
pub fn build_clarification(memories: &[RetrievedMemory]) -> Clarification {
    let mut picks: Vec<(Domain, &RetrievedMemory)> = Domain::ALL
        .into_iter()
        .filter_map(|domain| {
            memories
                .iter()
                .filter(|m| memory_in_domain(m, domain))
                .max_by(|a, b| {
                    a.relevance_score
                        .partial_cmp(&b.relevance_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|m| (domain, m))
        })
        .collect();

    picks.sort_by(|a, b| {
        b.1.relevance_score
            .partial_cmp(&a.1.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    picks.truncate(MAX_EXAMPLES);

    let domains: Vec<Domain> = picks.iter().map(|(d, _)| *d).collect();
    let mut examples: Vec<String> = Vec::with_capacity(picks.len());
    for (domain, memory) in &picks {
        let phrase = example_phrase(*domain, &memory.content);
        if !examples.contains(&phrase) {
            examples.push(phrase);
        }
    }

    let response = if examples.is_empty() {
        "I like quite a few things! Could you narrow it down a bit? \
         You could ask me about music, food, books, or travel."
            .to_string()
    } else {
        let labels: Vec<String> = domains.iter().map(|d| domain_label(*d).to_string()).collect();
        let question = if labels.len() == 1 {
            format!("Did you want to hear more about {}?", labels[0])
        } else {
            format!("Which are you curious about: {}?", join_list(&labels, "or"))
        };
        let list = join_list(&examples, "and");
        let stop = if list.ends_with("...") { "" } else { "." };
        format!("I like quite a few things! I'm into {list}{stop} {question}")
    };

    Clarification {
        response,
        examples,
        domains,
    }
}
