//! Resolves references to earlier turns ("who directed it?") into a
//! self-contained question before classification.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::models::{recent_turns, ChatTurn, Role};
use crate::services::classifier::title_span;

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?P<possessive>its)\b|\b(?:that|this|the\s+same)\s+(?:movie|film|one)\b|\bit\b")
        .expect("valid reference regex")
});

static REFERENCE_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:it|its|that|this|that movie|that film|this movie|this film|the movie|the film)$")
        .expect("valid reference-only regex")
});

/// Most recent title mentioned in the window, user turns before assistant turns
fn antecedent(history: &[ChatTurn]) -> Option<String> {
    let window = recent_turns(history);
    let from = |role: Role| {
        window
            .iter()
            .rev()
            .filter(move |t| t.role == role)
            .filter_map(|t| title_span(&t.content))
            .find(|span| !REFERENCE_ONLY.is_match(span))
    };
    from(Role::User).or_else(|| from(Role::Assistant))
}

/// Replaces pronouns referring to a previously mentioned movie with its title.
///
/// Returns the question unchanged when it has no reference or the history
/// names no title.
pub fn rewrite_question(question: &str, history: &[ChatTurn]) -> String {
    if !REFERENCE.is_match(question) {
        return question.to_string();
    }
    let Some(title) = antecedent(history) else {
        return question.to_string();
    };

    let rewritten = REFERENCE
        .replace_all(question, |caps: &Captures| {
            if caps.name("possessive").is_some() {
                format!("{}'s", title)
            } else {
                title.clone()
            }
        })
        .into_owned();

    tracing::debug!(original = %question, rewritten = %rewritten, "Resolved conversation reference");
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pronoun_resolves_to_last_user_title() {
        let history = vec![
            ChatTurn::user("Tell me about Inception"),
            ChatTurn::assistant("Inception (2010) is a heist film set inside dreams."),
        ];
        assert_eq!(
            rewrite_question("who directed it?", &history),
            "who directed Inception?"
        );
    }

    #[test]
    fn test_possessive_and_demonstrative_references() {
        let history = vec![ChatTurn::user("what is \"Heat\" about")];
        assert_eq!(rewrite_question("what about its sequel", &history), "what about Heat's sequel");
        assert_eq!(rewrite_question("who starred in that movie", &history), "who starred in Heat");
    }

    #[test]
    fn test_skips_turns_whose_span_is_itself_a_reference() {
        let history = vec![
            ChatTurn::user("Tell me about The Matrix"),
            ChatTurn::assistant("The Matrix (1999) follows Neo."),
            ChatTurn::user("who directed it"),
        ];
        assert_eq!(rewrite_question("who starred in it", &history), "who starred in The Matrix");
    }

    #[test]
    fn test_turns_outside_window_are_ignored() {
        let mut history = vec![ChatTurn::user("Tell me about Alien")];
        for _ in 0..10 {
            history.push(ChatTurn::user("what should i watch tonight?"));
        }
        assert_eq!(rewrite_question("who directed it", &history), "who directed it");
    }

    #[test]
    fn test_question_without_reference_is_untouched() {
        let history = vec![ChatTurn::user("Tell me about Alien")];
        assert_eq!(rewrite_question("movies by Ridley Scott", &history), "movies by Ridley Scott");
    }
}
