//! Knowledge domains and keyword matching shared by the classifier,
//! ambiguity detection and learning.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Music,
    Technology,
    Food,
    Movies,
    Activities,
    Books,
    Work,
    Travel,
}

impl Domain {
    pub const ALL: [Domain; 8] = [
        Domain::Music,
        Domain::Technology,
        Domain::Food,
        Domain::Movies,
        Domain::Activities,
        Domain::Books,
        Domain::Work,
        Domain::Travel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Music => "music",
            Domain::Technology => "technology",
            Domain::Food => "food",
            Domain::Movies => "movies",
            Domain::Activities => "activities",
            Domain::Books => "books",
            Domain::Work => "work",
            Domain::Travel => "travel",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Domain::Music => &[
                "music", "song", "songs", "band", "bands", "album", "albums", "artist",
                "artists", "concert", "concerts", "genre", "playlist", "jazz", "rock", "hip hop",
                "guitar", "piano", "listen", "listening",
            ],
            Domain::Technology => &[
                "technology", "tech", "programming", "code", "coding", "software", "computer",
                "computers", "app", "apps", "language", "languages", "framework", "rust",
                "python", "javascript", "ai",
            ],
            Domain::Food => &[
                "food", "eat", "eating", "cook", "cooking", "cuisine", "restaurant",
                "restaurants", "dish", "dishes", "meal", "recipe", "recipes", "coffee", "ramen",
                "pizza",
            ],
            Domain::Movies => &[
                "movie", "movies", "film", "films", "show", "shows", "series", "tv", "watch",
                "watching", "cinema", "netflix",
            ],
            Domain::Activities => &[
                "hobby", "hobbies", "sport", "sports", "hiking", "running", "gym", "game",
                "games", "gaming", "weekend", "weekends", "outdoors", "climbing", "photography",
            ],
            Domain::Books => &[
                "book", "books", "read", "reading", "novel", "novels", "author", "authors",
                "fiction",
            ],
            Domain::Work => &[
                "work", "job", "career", "office", "project", "projects", "team", "colleague",
                "colleagues", "company",
            ],
            Domain::Travel => &[
                "travel", "traveling", "travelling", "trip", "trips", "vacation", "country",
                "countries", "city", "cities", "visit", "visited", "abroad",
            ],
        }
    }

    /// Whether any of this domain's keywords appear in `text`.
    pub fn mentioned_in(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        mentions_any(&lower, self.keywords())
    }
}

/// Whole-word (or whole-phrase) match of `needle` in already-lowercased
/// `haystack`. "hey" does not match inside "they".
pub fn mentions(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '\'';
    for (start, _) in haystack.match_indices(needle) {
        let end = start + needle.len();
        let before_ok = haystack[..start].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return true;
        }
    }
    false
}

pub fn mentions_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| mentions(haystack, n))
}

/// Domains whose keywords appear in `text`, in table order.
pub fn domains_in(text: &str) -> Vec<Domain> {
    let lower = text.to_lowercase();
    Domain::ALL
        .into_iter()
        .filter(|d| mentions_any(&lower, d.keywords()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_respects_word_boundaries() {
        assert!(mentions("hey what's up", "hey"));
        assert!(!mentions("they went home", "hey"));
        assert!(mentions("i love hip hop.", "hip hop"));
        assert!(!mentions("cookbook", "book"));
        assert!(mentions("what's up?", "what's up"));
        assert!(!mentions("anything", ""));
    }

    #[test]
    fn finds_domains() {
        assert_eq!(domains_in("What music do you like?"), vec![Domain::Music]);
        assert_eq!(
            domains_in("any good books for a trip"),
            vec![Domain::Books, Domain::Travel]
        );
        assert!(domains_in("what do you like").is_empty());
    }

    #[test]
    fn domain_labels_are_lowercase_and_unique() {
        let mut labels: Vec<_> = Domain::ALL.iter().map(|d| d.as_str()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), Domain::ALL.len());
        assert!(Domain::Food.mentioned_in("I had RAMEN yesterday"));
    }
}
