use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Movie;
use crate::services::text::{contains_words, normalize};

/// Tolerance, in minutes, of an `exact` duration filter
pub const EXACT_DURATION_TOLERANCE: i32 = 2;

/// Upper bound on how many matches a filter query asks the store for
pub const DEFAULT_FILTER_LIMIT: usize = 20;

static YEAR_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<title>.*?)\s*\((?P<year>\d{4})\)\s*$").expect("valid year suffix regex")
});

/// Mood words mapped to the canonical genres that satisfy them
const MOOD_GENRES: &[(&str, &[&str])] = &[
    ("scary", &["Horror", "Thriller"]),
    ("creepy", &["Horror"]),
    ("dark", &["Thriller", "Crime", "Horror"]),
    ("funny", &["Comedy"]),
    ("happy", &["Comedy", "Family", "Animation"]),
    ("lighthearted", &["Comedy", "Family"]),
    ("romantic", &["Romance"]),
    ("sad", &["Drama"]),
    ("emotional", &["Drama", "Romance"]),
    ("tense", &["Thriller", "Mystery"]),
    ("suspenseful", &["Thriller", "Mystery"]),
    ("exciting", &["Action", "Adventure"]),
    ("epic", &["Adventure", "War", "History"]),
    ("mysterious", &["Mystery"]),
    ("inspiring", &["Drama", "History"]),
    ("magical", &["Fantasy", "Animation"]),
    ("futuristic", &["Science Fiction"]),
];

/// Wire format of a recommendation request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub mood: Vec<String>,
    #[serde(default)]
    pub theme: Vec<String>,
    #[serde(default)]
    pub storyline: Vec<String>,
    #[serde(default)]
    pub year: Vec<String>,
    #[serde(default)]
    pub duration: Vec<String>,
    #[serde(default)]
    pub duration_comparison: DurationComparison,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationComparison {
    Over,
    Less,
    #[default]
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationFilter {
    pub minutes: i32,
    pub comparison: DurationComparison,
}

impl DurationFilter {
    /// Inclusive runtime bounds the filter accepts
    pub fn bounds(&self) -> (Option<i32>, Option<i32>) {
        match self.comparison {
            DurationComparison::Over => (Some(self.minutes), None),
            DurationComparison::Less => (None, Some(self.minutes)),
            DurationComparison::Exact => (
                Some(self.minutes - EXACT_DURATION_TOLERANCE),
                Some(self.minutes + EXACT_DURATION_TOLERANCE),
            ),
        }
    }

    pub fn accepts(&self, runtime: Option<i32>) -> bool {
        let Some(runtime) = runtime else {
            return false;
        };
        let (low, high) = self.bounds();
        low.map_or(true, |l| runtime >= l) && high.map_or(true, |h| runtime <= h)
    }
}

/// An already-shown title. A year pins the exclusion to one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedTitle {
    pub title: String,
    pub year: Option<i32>,
}

impl ExcludedTitle {
    /// Parses `"Title"` or `"Title (1999)"`
    pub fn parse(raw: &str) -> Option<Self> {
        let (title, year) = match YEAR_SUFFIX.captures(raw) {
            Some(caps) => (
                caps["title"].to_string(),
                caps["year"].parse::<i32>().ok(),
            ),
            None => (raw.to_string(), None),
        };
        let title = normalize(&title);
        if title.is_empty() {
            return None;
        }
        Some(Self { title, year })
    }

    pub fn excludes(&self, movie: &Movie) -> bool {
        normalize(&movie.title) == self.title && self.year.map_or(true, |y| movie.year == Some(y))
    }
}

/// Normalized recommendation filters.
///
/// Rebuilt from the request on every call; nothing about a previous call is
/// remembered.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationQuery {
    pub genres: Vec<String>,
    pub moods: Vec<String>,
    pub themes: Vec<String>,
    pub storylines: Vec<String>,
    pub years: Vec<i32>,
    pub duration: Option<DurationFilter>,
    pub exclude: Vec<ExcludedTitle>,
    pub limit: usize,
}

impl Default for RecommendationQuery {
    fn default() -> Self {
        Self {
            genres: Vec::new(),
            moods: Vec::new(),
            themes: Vec::new(),
            storylines: Vec::new(),
            years: Vec::new(),
            duration: None,
            exclude: Vec::new(),
            limit: DEFAULT_FILTER_LIMIT,
        }
    }
}

fn clean_tokens(tokens: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = tokens
        .iter()
        .map(|t| normalize(t))
        .filter(|t| !t.is_empty())
        .collect();
    cleaned.dedup();
    cleaned
}

impl From<RecommendationRequest> for RecommendationQuery {
    fn from(request: RecommendationRequest) -> Self {
        let years: Vec<i32> = request
            .year
            .iter()
            .filter_map(|y| match y.trim().parse::<i32>() {
                Ok(year) => Some(year),
                Err(_) => {
                    tracing::debug!(token = %y, "Dropping malformed year filter");
                    None
                }
            })
            .collect();

        // First numeric token wins; the rest are ignored
        let duration = request
            .duration
            .iter()
            .find_map(|d| d.trim().parse::<i32>().ok().filter(|m| *m > 0))
            .map(|minutes| DurationFilter {
                minutes,
                comparison: request.duration_comparison,
            });
        if duration.is_none() && !request.duration.is_empty() {
            tracing::debug!(tokens = ?request.duration, "Dropping malformed duration filter");
        }

        Self {
            genres: clean_tokens(&request.genres),
            moods: clean_tokens(&request.mood),
            themes: clean_tokens(&request.theme),
            storylines: clean_tokens(&request.storyline),
            years,
            duration,
            exclude: request
                .exclude
                .iter()
                .filter_map(|t| ExcludedTitle::parse(t))
                .collect(),
            limit: DEFAULT_FILTER_LIMIT,
        }
    }
}

/// Genres a descriptive token stands for, if it is a known mood word
pub fn mood_genres(token: &str) -> &'static [&'static str] {
    MOOD_GENRES
        .iter()
        .find(|(mood, _)| *mood == token)
        .map(|(_, genres)| *genres)
        .unwrap_or(&[])
}

fn genre_matches(movie: &Movie, token: &str) -> bool {
    movie
        .genre_names()
        .any(|g| contains_words(&normalize(g), token))
}

fn descriptor_matches(movie: &Movie, token: &str) -> bool {
    let text = normalize(&format!(
        "{} {}",
        movie.title,
        movie.overview.as_deref().unwrap_or_default()
    ));
    contains_words(&text, token)
        || mood_genres(token)
            .iter()
            .any(|genre| movie.genre_names().any(|g| g.eq_ignore_ascii_case(genre)))
}

impl RecommendationQuery {
    pub fn is_excluded(&self, movie: &Movie) -> bool {
        self.exclude.iter().any(|e| e.excludes(movie))
    }

    /// Evaluates the filters against one movie.
    ///
    /// Tokens within a category are alternatives; categories must all hold.
    pub fn matches(&self, movie: &Movie) -> bool {
        fn any_or_empty(tokens: &[String], pred: impl Fn(&str) -> bool) -> bool {
            tokens.is_empty() || tokens.iter().any(|t| pred(t))
        }

        movie.vote_average > 0.0
            && any_or_empty(&self.genres, |t| genre_matches(movie, t))
            && any_or_empty(&self.moods, |t| descriptor_matches(movie, t))
            && any_or_empty(&self.themes, |t| descriptor_matches(movie, t))
            && any_or_empty(&self.storylines, |t| descriptor_matches(movie, t))
            && (self.years.is_empty() || movie.year.map_or(false, |y| self.years.contains(&y)))
            && self.duration.map_or(true, |d| d.accepts(movie.runtime))
            && !self.is_excluded(movie)
    }
}

/// The single movie returned by a recommendation call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResponse {
    pub tmdb_id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub genre: String,
    /// Runtime in minutes, 0 when unknown
    pub duration: i32,
    pub cast: Vec<String>,
    pub rating: f64,
    pub region: String,
    pub overview: Option<String>,
}

impl RecommendationResponse {
    pub fn new(movie: &Movie, cast: Vec<String>) -> Self {
        let genre = movie.display_genres();
        Self {
            tmdb_id: movie.tmdb_id,
            title: movie.title.clone(),
            year: movie.year,
            genre: if genre.is_empty() { "N/A".to_string() } else { genre },
            duration: movie.runtime.unwrap_or(0),
            cast,
            rating: movie.vote_average,
            region: movie
                .origin_country
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            overview: movie.overview.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Genre;

    fn horror_1999() -> Movie {
        let mut movie = Movie::new(2667, "The Blair Witch Project");
        movie.year = Some(1999);
        movie.runtime = Some(81);
        movie.vote_average = 6.3;
        movie.overview = Some("Three film students vanish in the woods".to_string());
        movie.genres_json = vec![Genre { id: 27, name: "Horror".to_string() }];
        movie
    }

    #[test]
    fn test_malformed_year_and_duration_are_dropped() {
        let request = RecommendationRequest {
            year: vec!["1999".to_string(), "nineties".to_string()],
            duration: vec!["long".to_string()],
            ..Default::default()
        };
        let query = RecommendationQuery::from(request);
        assert_eq!(query.years, vec![1999]);
        assert_eq!(query.duration, None);
    }

    #[test]
    fn test_duration_comparison_deserializes() {
        let request: RecommendationRequest =
            serde_json::from_str(r#"{"duration":["120"],"durationComparison":"over"}"#).unwrap();
        let query = RecommendationQuery::from(request);
        assert_eq!(
            query.duration,
            Some(DurationFilter {
                minutes: 120,
                comparison: DurationComparison::Over
            })
        );
    }

    #[test]
    fn test_exact_duration_has_two_minute_tolerance() {
        let filter = DurationFilter {
            minutes: 120,
            comparison: DurationComparison::Exact,
        };
        assert!(filter.accepts(Some(118)));
        assert!(filter.accepts(Some(122)));
        assert!(!filter.accepts(Some(123)));
        assert!(!filter.accepts(None));
    }

    #[test]
    fn test_over_and_less_are_inclusive() {
        let over = DurationFilter {
            minutes: 120,
            comparison: DurationComparison::Over,
        };
        let less = DurationFilter {
            minutes: 120,
            comparison: DurationComparison::Less,
        };
        assert!(over.accepts(Some(120)));
        assert!(!over.accepts(Some(119)));
        assert!(less.accepts(Some(120)));
        assert!(!less.accepts(Some(121)));
    }

    #[test]
    fn test_excluded_title_with_year_suffix() {
        let excluded = ExcludedTitle::parse("The Blair Witch Project (1999)").unwrap();
        assert_eq!(excluded.title, "the blair witch project");
        assert_eq!(excluded.year, Some(1999));
        assert!(excluded.excludes(&horror_1999()));

        let other_year = ExcludedTitle::parse("The Blair Witch Project (2016)").unwrap();
        assert!(!other_year.excludes(&horror_1999()));
    }

    #[test]
    fn test_genre_tokens_are_disjunctive() {
        let query = RecommendationQuery {
            genres: vec!["comedy".to_string(), "horror".to_string()],
            ..Default::default()
        };
        assert!(query.matches(&horror_1999()));
    }

    #[test]
    fn test_categories_are_conjunctive() {
        let query = RecommendationQuery {
            genres: vec!["horror".to_string()],
            years: vec![2005],
            ..Default::default()
        };
        assert!(!query.matches(&horror_1999()));
    }

    #[test]
    fn test_mood_matches_through_lexicon_or_overview() {
        let scary = RecommendationQuery {
            moods: vec!["scary".to_string()],
            ..Default::default()
        };
        assert!(scary.matches(&horror_1999()));

        let woods = RecommendationQuery {
            themes: vec!["woods".to_string()],
            ..Default::default()
        };
        assert!(woods.matches(&horror_1999()));
    }

    #[test]
    fn test_unrated_movies_are_never_recommended() {
        let mut movie = horror_1999();
        movie.vote_average = 0.0;
        assert!(!RecommendationQuery::default().matches(&movie));
    }

    #[test]
    fn test_response_uses_placeholders_for_missing_fields() {
        let movie = Movie::new(1, "Untitled");
        let response = RecommendationResponse::new(&movie, Vec::new());
        assert_eq!(response.genre, "N/A");
        assert_eq!(response.duration, 0);
        assert_eq!(response.region, "Unknown");
    }
}
