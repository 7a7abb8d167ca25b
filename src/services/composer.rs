use std::collections::HashMap;
use std::fmt::Write;

use crate::{
    error::AppResult,
    models::{Movie, PersonCredit, RetrievalResult},
};

/// Movies described per answer
pub const COMPOSED_MOVIES: usize = 3;

/// Billed cast members named per movie
const COMPOSED_CAST: usize = 5;

/// Turns a retrieval result into prose for the caller
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AnswerComposer: Send + Sync {
    /// `credits` is keyed by `tmdb_id` and covers the first
    /// [`COMPOSED_MOVIES`] candidates
    async fn compose(
        &self,
        question: &str,
        result: &RetrievalResult,
        credits: &HashMap<i64, Vec<PersonCredit>>,
    ) -> AppResult<String>;
}

/// Composer that renders candidates into a fixed template
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateComposer;

fn describe(movie: &Movie, credits: &[PersonCredit]) -> String {
    let mut text = movie.title.clone();
    if let Some(year) = movie.year {
        let _ = write!(text, " ({})", year);
    }

    let genres = movie.display_genres();
    if !genres.is_empty() {
        let _ = write!(text, " is a {} film", genres);
    }
    if movie.vote_average > 0.0 {
        let _ = write!(text, " rated {:.1}/10", movie.vote_average);
    }
    text.push('.');

    let directors: Vec<&str> = credits
        .iter()
        .filter(|c| c.credit.is_director())
        .map(|c| c.person.name.as_str())
        .collect();
    if !directors.is_empty() {
        let _ = write!(text, " Directed by {}.", directors.join(", "));
    }

    let mut cast: Vec<&PersonCredit> = credits.iter().filter(|c| c.credit.is_cast()).collect();
    cast.sort_by_key(|c| c.credit.cast_order.unwrap_or(i32::MAX));
    if !cast.is_empty() {
        let names: Vec<&str> = cast
            .iter()
            .take(COMPOSED_CAST)
            .map(|c| c.person.name.as_str())
            .collect();
        let _ = write!(text, " Starring {}.", names.join(", "));
    }

    if let Some(overview) = movie.overview.as_deref().filter(|o| !o.trim().is_empty()) {
        let _ = write!(text, " {}", overview.trim());
    }
    text
}

#[async_trait::async_trait]
impl AnswerComposer for TemplateComposer {
    async fn compose(
        &self,
        question: &str,
        result: &RetrievalResult,
        credits: &HashMap<i64, Vec<PersonCredit>>,
    ) -> AppResult<String> {
        if result.is_empty() {
            return Ok(format!(
                "I couldn't find any information about \"{}\" in the movie database.",
                question.trim()
            ));
        }

        let paragraphs: Vec<String> = result
            .movies
            .iter()
            .take(COMPOSED_MOVIES)
            .map(|scored| {
                let movie_credits = credits
                    .get(&scored.movie.tmdb_id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                describe(&scored.movie, movie_credits)
            })
            .collect();

        Ok(paragraphs.join("\n\n"))
    }
}
