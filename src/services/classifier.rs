//! Rule-based query classification.
//!
//! [`plan`] looks at a (context-resolved) question and returns the ordered
//! list of retrieval strategies to try. The list is never empty and always
//! contains a semantic attempt.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{PersonRole, Source};

/// One retrieval attempt, with the text it runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Fuzzy title search in the corpus
    Keyword { title: String },
    /// Nearest neighbours of the question's embedding
    Semantic { text: String },
    /// Movies credited to people matching `name`
    Person { role: PersonRole, name: String },
    /// Live lookup at the metadata provider, written through to the corpus
    Api { title: String },
}

impl Strategy {
    pub fn source(&self) -> Source {
        match self {
            Strategy::Keyword { .. } => Source::Keyword,
            Strategy::Semantic { .. } => Source::Semantic,
            Strategy::Person { role, .. } => Source::from(*role),
            Strategy::Api { .. } => Source::Api,
        }
    }
}

/// Bare phrases up to this many words are treated as a title guess
const MAX_BARE_TITLE_WORDS: usize = 6;

static PERSON_NAME_PATTERNS: Lazy<Vec<(Regex, PersonRole)>> = Lazy::new(|| {
    [
        (
            r"(?i)\bwhat\s+(?:movies|films)\s+(?:has|did|have)\s+(?P<name>.+?)\s+direct(?:ed)?\b",
            PersonRole::Director,
        ),
        (
            r"(?i)\bwhat\s+(?:movies|films)\s+(?:has|did|have)\s+(?P<name>.+?)\s+(?:starred|star|acted|act|appeared|appear|been)\s+in\b",
            PersonRole::Actor,
        ),
        (r"(?i)\b(?:directed|made)\s+by\s+(?P<name>.+)", PersonRole::Director),
        (r"(?i)\b(?:movies|films)\s+by\s+(?P<name>.+)", PersonRole::Director),
        (
            r"(?i)\b(?:movies|films)\s+(?:starring|with|featuring)\s+(?P<name>.+)",
            PersonRole::Actor,
        ),
        (r"(?i)\b(?:starring|featuring)\s+(?P<name>.+)", PersonRole::Actor),
    ]
    .into_iter()
    .map(|(pattern, role)| (Regex::new(pattern).expect("valid person pattern"), role))
    .collect()
});

static ROLE_OF_TITLE_PATTERNS: Lazy<Vec<(Regex, PersonRole)>> = Lazy::new(|| {
    [
        (r"(?i)\bwho\s+(?:directed|made)\s+(?P<title>.+)", PersonRole::Director),
        (
            r"(?i)\bwho\s+(?:is|was)\s+the\s+director\s+of\s+(?P<title>.+)",
            PersonRole::Director,
        ),
        (r"(?i)\bdirector\s+of\s+(?P<title>.+)", PersonRole::Director),
        (
            r"(?i)\bwho\s+(?:starred|stars|acted|played|was|is)\s+in\s+(?P<title>.+)",
            PersonRole::Actor,
        ),
        (r"(?i)\bcast\s+of\s+(?P<title>.+)", PersonRole::Actor),
    ]
    .into_iter()
    .map(|(pattern, role)| (Regex::new(pattern).expect("valid role pattern"), role))
    .collect()
});

static QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?P<a>[^"]+)"|“(?P<b>[^”]+)”|(?:^|\s)'(?P<c>[^']{2,})'(?:\s|$|[?.!,])"#)
        .expect("valid quote regex")
});

static TELL_ME_ABOUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:tell\s+me\s+(?:more\s+)?about|info(?:rmation)?\s+(?:on|about))\s+(?P<title>.+)")
        .expect("valid about regex")
});

/// Words that start a question and are capitalized only by position
const LEADING_WORDS: &[&str] = &[
    "who", "what", "which", "when", "where", "why", "how", "is", "are", "was", "were", "did",
    "do", "does", "can", "could", "would", "should", "tell", "show", "give", "find", "list",
    "recommend", "suggest", "i", "any", "some", "movies", "films", "movie", "film", "please",
];

/// Lowercase words allowed inside a capitalized title run
const TITLE_CONNECTORS: &[&str] = &["of", "the", "and", "a", "an", "in", "on", "to", "for", "at", "&"];

/// Words that signal a question rather than a bare title
const QUESTION_WORDS: &[&str] = &[
    "who", "what", "which", "when", "where", "why", "how", "recommend", "suggest", "best",
    "good", "movies", "films", "something",
];

fn clean_span(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| matches!(c, '?' | '.' | '!' | ',' | ';'))
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”'))
        .trim()
        .to_string()
}

fn strip_punct(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, '?' | '.' | '!' | ',' | ';' | '"' | '(' | ')'))
}

fn is_capitalized(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

/// Longest run of capitalized words, allowing lowercase connectors inside it
fn capitalized_span(question: &str) -> Option<String> {
    let tokens: Vec<&str> = question.split_whitespace().map(strip_punct).collect();
    let mut best: Option<(usize, usize)> = None;
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        let leading = i == 0 && LEADING_WORDS.contains(&token.to_lowercase().as_str());
        if token.is_empty() || !is_capitalized(token) || leading || token == "I" {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i + 1;
        while end < tokens.len() {
            let next = tokens[end];
            if is_capitalized(next) && next != "I" {
                end += 1;
                continue;
            }
            let mut j = end;
            while tokens.get(j).is_some_and(|t| TITLE_CONNECTORS.contains(t)) {
                j += 1;
            }
            if j > end && tokens.get(j).is_some_and(|t| is_capitalized(t) && *t != "I") {
                end = j + 1;
            } else {
                break;
            }
        }

        let longer = best.map_or(true, |(s, e)| end - start > e - s);
        if longer {
            best = Some((start, end));
        }
        i = end;
    }

    best.map(|(s, e)| tokens[s..e].join(" "))
        .filter(|span| !span.is_empty())
}

fn bare_title(question: &str) -> Option<String> {
    let cleaned = clean_span(question);
    let words: Vec<String> = cleaned
        .split_whitespace()
        .map(|w| strip_punct(w).to_lowercase())
        .collect();
    if words.is_empty()
        || words.len() > MAX_BARE_TITLE_WORDS
        || words.iter().any(|w| QUESTION_WORDS.contains(&w.as_str()))
    {
        return None;
    }
    Some(cleaned)
}

fn person_name(question: &str) -> Option<(PersonRole, String)> {
    PERSON_NAME_PATTERNS.iter().find_map(|(pattern, role)| {
        let name = clean_span(pattern.captures(question)?.name("name")?.as_str());
        (!name.is_empty()).then_some((*role, name))
    })
}

fn role_of_title(question: &str) -> Option<(PersonRole, String)> {
    ROLE_OF_TITLE_PATTERNS.iter().find_map(|(pattern, role)| {
        let title = clean_span(pattern.captures(question)?.name("title")?.as_str());
        (!title.is_empty()).then_some((*role, title))
    })
}

/// Extracts the title-like span of a question, if there is one
pub fn title_span(question: &str) -> Option<String> {
    if let Some(caps) = QUOTED.captures(question) {
        let quoted = caps
            .name("a")
            .or_else(|| caps.name("b"))
            .or_else(|| caps.name("c"))
            .map(|m| clean_span(m.as_str()))
            .filter(|s| !s.is_empty());
        if quoted.is_some() {
            return quoted;
        }
    }
    if let Some((_, title)) = role_of_title(question) {
        return Some(title);
    }
    if let Some(caps) = TELL_ME_ABOUT.captures(question) {
        let title = clean_span(&caps["title"]);
        if !title.is_empty() {
            return Some(title);
        }
    }
    capitalized_span(question).or_else(|| bare_title(question))
}

/// Orders the strategies to try for a question
pub fn plan(question: &str) -> Vec<Strategy> {
    let semantic = Strategy::Semantic {
        text: question.trim().to_string(),
    };

    if let Some((role, name)) = person_name(question) {
        tracing::debug!(role = ?role, name = %name, "Classified as person query");
        return vec![Strategy::Person { role, name }, semantic];
    }

    if let Some((role, title)) = role_of_title(question) {
        tracing::debug!(role = ?role, title = %title, "Classified as role-of-title query");
        return vec![
            Strategy::Keyword { title: title.clone() },
            semantic,
            Strategy::Person { role, name: title.clone() },
            Strategy::Api { title },
        ];
    }

    match title_span(question) {
        Some(title) => {
            tracing::debug!(title = %title, "Classified as title query");
            vec![
                Strategy::Keyword { title: title.clone() },
                semantic,
                Strategy::Person {
                    role: PersonRole::Director,
                    name: title.clone(),
                },
                Strategy::Person {
                    role: PersonRole::Actor,
                    name: title.clone(),
                },
                Strategy::Api { title },
            ]
        }
        None => {
            tracing::debug!("No title or person span, semantic only");
            vec![semantic]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(plan: &[Strategy]) -> Vec<Source> {
        plan.iter().map(Strategy::source).collect()
    }

    #[test]
    fn test_person_name_query_starts_with_person_search() {
        let strategies = plan("Movies directed by Christopher Nolan?");
        assert_eq!(
            strategies[0],
            Strategy::Person {
                role: PersonRole::Director,
                name: "Christopher Nolan".to_string()
            }
        );
        assert_eq!(sources(&strategies), vec![Source::DirectorSearch, Source::Semantic]);
    }

    #[test]
    fn test_starring_query_is_actor_search() {
        let strategies = plan("films starring Tom Hanks");
        assert_eq!(
            strategies[0],
            Strategy::Person {
                role: PersonRole::Actor,
                name: "Tom Hanks".to_string()
            }
        );
    }

    #[test]
    fn test_what_movies_has_x_directed() {
        let strategies = plan("what movies has Greta Gerwig directed?");
        assert_eq!(
            strategies[0],
            Strategy::Person {
                role: PersonRole::Director,
                name: "Greta Gerwig".to_string()
            }
        );
    }

    #[test]
    fn test_who_directed_title_searches_title_first() {
        let strategies = plan("Who directed Inception?");
        assert_eq!(
            strategies[0],
            Strategy::Keyword {
                title: "Inception".to_string()
            }
        );
        assert_eq!(
            sources(&strategies),
            vec![Source::Keyword, Source::Semantic, Source::DirectorSearch, Source::Api]
        );
    }

    #[test]
    fn test_quoted_title_wins() {
        let strategies = plan(r#"is "the thing" any good?"#);
        assert_eq!(
            strategies[0],
            Strategy::Keyword {
                title: "the thing".to_string()
            }
        );
        assert_eq!(strategies.last().unwrap().source(), Source::Api);
    }

    #[test]
    fn test_capitalized_span_with_connectors() {
        assert_eq!(
            title_span("What is Lord of the Rings about?"),
            Some("Lord of the Rings".to_string())
        );
        assert_eq!(
            title_span("Tell me the plot of Blade Runner 2049"),
            Some("Blade Runner 2049".to_string())
        );
    }

    #[test]
    fn test_possessive_apostrophes_are_not_quotes() {
        assert_eq!(
            title_span("what's Schindler's List about?"),
            Some("Schindler's List".to_string())
        );
    }

    #[test]
    fn test_leading_question_word_is_not_a_title() {
        assert_eq!(capitalized_span("What should I watch tonight?"), None);
    }

    #[test]
    fn test_tell_me_about_lowercase_title() {
        assert_eq!(title_span("tell me about interstellar"), Some("interstellar".to_string()));
    }

    #[test]
    fn test_short_bare_phrase_is_a_title_guess() {
        assert_eq!(title_span("the dark knight"), Some("the dark knight".to_string()));
        assert_eq!(title_span("recommend something scary"), None);
    }

    #[test]
    fn test_open_question_falls_back_to_semantic_only() {
        let strategies = plan("can you recommend a movie about dreams inside dreams?");
        assert_eq!(
            strategies,
            vec![Strategy::Semantic {
                text: "can you recommend a movie about dreams inside dreams?".to_string()
            }]
        );
    }

    #[test]
    fn test_plan_is_never_empty_and_always_has_semantic() {
        for question in ["", "?", "Inception", "movies by Nolan", "who starred in Heat"] {
            let strategies = plan(question);
            assert!(!strategies.is_empty());
            assert!(strategies.iter().any(|s| s.source() == Source::Semantic));
        }
    }
}
