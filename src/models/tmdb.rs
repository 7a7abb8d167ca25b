// ============================================================================
// TMDb API Types
// ============================================================================

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Credit, Genre, Movie, MovieRecord, Person, DIRECTOR_JOB};

/// Cast members persisted per fetched movie
pub const MAX_PERSISTED_CAST: usize = 20;

/// Response from GET /search/movie
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub results: Vec<TmdbSearchHit>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TmdbSearchHit {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub popularity: f64,
}

/// Response from GET /movie/{id}?append_to_response=credits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbMovieDetails {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i32,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub production_countries: Vec<TmdbCountry>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbCountry {
    pub iso_3166_1: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
    #[serde(default)]
    pub crew: Vec<TmdbCrewMember>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbCastMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub gender: Option<i16>,
    #[serde(default)]
    pub known_for_department: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbCrewMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub gender: Option<i16>,
    #[serde(default)]
    pub known_for_department: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub job: Option<String>,
}

fn parse_release_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

impl TmdbMovieDetails {
    /// Converts a details payload into the rows the corpus stores, tagging
    /// provenance with `data_source`.
    ///
    /// Keeps the top-billed cast and every director.
    pub fn into_record(self, data_source: &str) -> MovieRecord {
        let release_date = parse_release_date(self.release_date.as_deref());
        let genres: Vec<Genre> = self
            .genres
            .into_iter()
            .map(|g| Genre { id: g.id, name: g.name })
            .collect();
        let genres_csv = genres
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let movie = Movie {
            tmdb_id: self.id,
            title: self.title,
            original_title: self.original_title,
            release_date,
            year: release_date.map(|d| d.year()),
            overview: self.overview.filter(|o| !o.is_empty()),
            genres_json: genres,
            genres_csv: Some(genres_csv).filter(|c| !c.is_empty()),
            runtime: self.runtime.filter(|r| *r > 0),
            origin_country: self.production_countries.first().map(|c| c.name.clone()),
            popularity: self.popularity,
            vote_average: self.vote_average,
            vote_count: self.vote_count,
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            box_office_worldwide: self.revenue.filter(|r| *r > 0.0),
            box_office_domestic: None,
            box_office_foreign: None,
            data_source: data_source.to_string(),
            fetched_at: Utc::now(),
        };

        let mut people = Vec::new();
        let mut credits = Vec::new();
        let tmdb_credits = self.credits.unwrap_or_default();

        let mut cast = tmdb_credits.cast;
        cast.sort_by_key(|c| c.order.unwrap_or(i32::MAX));
        for (position, member) in cast.into_iter().take(MAX_PERSISTED_CAST).enumerate() {
            credits.push(Credit::cast(
                movie.tmdb_id,
                member.id,
                member.character.filter(|c| !c.is_empty()),
                member.order.unwrap_or(position as i32),
            ));
            people.push(Person {
                gender: member.gender,
                known_for_department: member.known_for_department,
                profile_path: member.profile_path,
                ..Person::new(member.id, member.name)
            });
        }

        for member in tmdb_credits
            .crew
            .into_iter()
            .filter(|c| c.job.as_deref() == Some(DIRECTOR_JOB))
        {
            credits.push(Credit::director(movie.tmdb_id, member.id));
            if !people.iter().any(|p| p.tmdb_person_id == member.id) {
                people.push(Person {
                    gender: member.gender,
                    known_for_department: member.known_for_department,
                    profile_path: member.profile_path,
                    ..Person::new(member.id, member.name)
                });
            }
        }

        MovieRecord {
            movie,
            people,
            credits,
        }
    }
}
