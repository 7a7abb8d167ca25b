use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Provenance tag for rows fetched from TMDb
pub const TMDB_SOURCE: &str = "tmdb";

/// A genre as stored in `movies.genres_json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// A movie row from the corpus.
///
/// `tmdb_id` is the only identifier that leaves the service; the table's
/// surrogate key is never selected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Movie {
    pub tmdb_id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub overview: Option<String>,
    /// Canonical genre list, used for filtering
    #[sqlx(json)]
    #[serde(rename = "genres")]
    pub genres_json: Vec<Genre>,
    /// Display-only genre string
    pub genres_csv: Option<String>,
    /// Runtime in minutes
    pub runtime: Option<i32>,
    pub origin_country: Option<String>,
    pub popularity: f64,
    pub vote_average: f64,
    pub vote_count: i32,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub box_office_worldwide: Option<f64>,
    pub box_office_domestic: Option<f64>,
    pub box_office_foreign: Option<f64>,
    pub data_source: String,
    pub fetched_at: DateTime<Utc>,
}

impl Movie {
    /// Creates a movie with only the identifying fields set
    pub fn new(tmdb_id: i64, title: impl Into<String>) -> Self {
        Self {
            tmdb_id,
            title: title.into(),
            original_title: None,
            release_date: None,
            year: None,
            overview: None,
            genres_json: Vec::new(),
            genres_csv: None,
            runtime: None,
            origin_country: None,
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            poster_path: None,
            backdrop_path: None,
            box_office_worldwide: None,
            box_office_domestic: None,
            box_office_foreign: None,
            data_source: TMDB_SOURCE.to_string(),
            fetched_at: Utc::now(),
        }
    }

    pub fn genre_names(&self) -> impl Iterator<Item = &str> {
        self.genres_json.iter().map(|g| g.name.as_str())
    }

    /// Genre string for display. The CSV column is a legacy field, so it is
    /// only used when the canonical list is empty.
    pub fn display_genres(&self) -> String {
        if !self.genres_json.is_empty() {
            return self.genre_names().collect::<Vec<_>>().join(", ");
        }
        self.genres_csv.clone().unwrap_or_default()
    }

    /// Text embedded into the semantic index for this movie
    pub fn index_text(&self) -> String {
        format!(
            "{}. {}. Genres: {}",
            self.title,
            self.overview.as_deref().unwrap_or_default(),
            self.display_genres()
        )
    }
}

/// A person row from the corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Person {
    pub tmdb_person_id: i64,
    pub name: String,
    pub gender: Option<i16>,
    pub known_for_department: Option<String>,
    pub profile_path: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl Person {
    pub fn new(tmdb_person_id: i64, name: impl Into<String>) -> Self {
        Self {
            tmdb_person_id,
            name: name.into(),
            gender: None,
            known_for_department: None,
            profile_path: None,
            fetched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CreditType {
    Cast,
    Crew,
}

impl CreditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditType::Cast => "cast",
            CreditType::Crew => "crew",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cast" => Some(CreditType::Cast),
            "crew" => Some(CreditType::Crew),
            _ => None,
        }
    }
}

impl Display for CreditType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Link between one movie and one person
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credit {
    pub movie_tmdb_id: i64,
    pub person_tmdb_person_id: i64,
    pub credit_type: CreditType,
    pub character_name: Option<String>,
    /// Billing position for cast credits, lower is more prominent
    pub cast_order: Option<i32>,
    pub department: Option<String>,
    pub job: Option<String>,
}

impl Credit {
    pub fn cast(movie: i64, person: i64, character: Option<String>, order: i32) -> Self {
        Self {
            movie_tmdb_id: movie,
            person_tmdb_person_id: person,
            credit_type: CreditType::Cast,
            character_name: character,
            cast_order: Some(order),
            department: None,
            job: None,
        }
    }

    pub fn director(movie: i64, person: i64) -> Self {
        Self {
            movie_tmdb_id: movie,
            person_tmdb_person_id: person,
            credit_type: CreditType::Crew,
            character_name: None,
            cast_order: None,
            department: Some("Directing".to_string()),
            job: Some(DIRECTOR_JOB.to_string()),
        }
    }

    pub fn is_director(&self) -> bool {
        self.credit_type == CreditType::Crew && self.job.as_deref() == Some(DIRECTOR_JOB)
    }

    pub fn is_cast(&self) -> bool {
        self.credit_type == CreditType::Cast
    }
}

pub const DIRECTOR_JOB: &str = "Director";

/// A credit joined with the person it names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonCredit {
    pub person: Person,
    pub credit: Credit,
}

/// Everything the write-through cache persists for one fetched movie
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    pub movie: Movie,
    pub people: Vec<Person>,
    pub credits: Vec<Credit>,
}

/// Which credits to follow when listing a person's movies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Director,
    Actor,
}

impl PersonRole {
    pub fn matches(&self, credit: &Credit) -> bool {
        match self {
            PersonRole::Director => credit.is_director(),
            PersonRole::Actor => credit.is_cast(),
        }
    }
}
