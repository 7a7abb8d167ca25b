use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::{rank_people_matches, rank_title_matches, CorpusStats, CorpusStore, RankMetric};
use crate::{
    error::{AppError, AppResult},
    models::{
        Credit, CreditType, Movie, MovieRecord, Person, PersonCredit, PersonRole,
        RecommendationQuery, ScoredMovie,
    },
    models::recommendation::mood_genres,
    services::text::normalize,
};

const MOVIE_COLUMNS: &str = "tmdb_id, title, original_title, release_date, year, overview, \
     genres_json, genres_csv, runtime, origin_country, popularity, vote_average, vote_count, \
     poster_path, backdrop_path, box_office_worldwide, box_office_domestic, box_office_foreign, \
     data_source, fetched_at";

const PERSON_COLUMNS: &str =
    "tmdb_person_id, name, gender, known_for_department, profile_path, fetched_at";

/// Candidates pulled from SQL before in-process similarity ranking
const TITLE_PREFILTER_LIMIT: i64 = 200;

/// Folds text the same way `normalize` does for ASCII-compatible input
const NORMALIZED_TITLE_SQL: &str =
    "btrim(regexp_replace(unaccent(lower(title)), '[^[:alnum:]]+', ' ', 'g'))";

/// SQL counterpart of `normalize` applied to an arbitrary text expression.
/// Tokens are bound already normalized, so haystacks must be folded alike.
fn folded(expr: &str) -> String {
    format!("btrim(regexp_replace(unaccent(lower({expr})), '[^[:alnum:]]+', ' ', 'g'))")
}

#[derive(sqlx::FromRow)]
struct CreditRow {
    tmdb_person_id: i64,
    name: String,
    gender: Option<i16>,
    known_for_department: Option<String>,
    profile_path: Option<String>,
    fetched_at: DateTime<Utc>,
    movie_tmdb_id: i64,
    credit_type: String,
    character_name: Option<String>,
    cast_order: Option<i32>,
    department: Option<String>,
    job: Option<String>,
}

impl TryFrom<CreditRow> for PersonCredit {
    type Error = AppError;

    fn try_from(row: CreditRow) -> AppResult<Self> {
        let credit_type = CreditType::parse(&row.credit_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown credit type '{}'", row.credit_type))
        })?;

        Ok(PersonCredit {
            credit: Credit {
                movie_tmdb_id: row.movie_tmdb_id,
                person_tmdb_person_id: row.tmdb_person_id,
                credit_type,
                character_name: row.character_name,
                cast_order: row.cast_order,
                department: row.department,
                job: row.job,
            },
            person: Person {
                tmdb_person_id: row.tmdb_person_id,
                name: row.name,
                gender: row.gender,
                known_for_department: row.known_for_department,
                profile_path: row.profile_path,
                fetched_at: row.fetched_at,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct CountsRow {
    movies: i64,
    people: i64,
    credits: i64,
}

/// Corpus store backed by PostgreSQL
#[derive(Clone)]
pub struct PgCorpusStore {
    pool: PgPool,
}

impl PgCorpusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_people_and_credits(
        tx: &mut Transaction<'_, Postgres>,
        record: &MovieRecord,
    ) -> AppResult<()> {
        for person in lock_order(&record.people) {
            sqlx::query(
                "INSERT INTO people (tmdb_person_id, name, gender, known_for_department, profile_path, fetched_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (tmdb_person_id) DO NOTHING",
            )
            .bind(person.tmdb_person_id)
            .bind(&person.name)
            .bind(person.gender)
            .bind(&person.known_for_department)
            .bind(&person.profile_path)
            .bind(person.fetched_at)
            .execute(&mut **tx)
            .await?;
        }

        for credit in &record.credits {
            sqlx::query(
                "INSERT INTO credits (movie_tmdb_id, person_tmdb_person_id, credit_type, character_name, cast_order, department, job) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(credit.movie_tmdb_id)
            .bind(credit.person_tmdb_person_id)
            .bind(credit.credit_type.as_str())
            .bind(&credit.character_name)
            .bind(credit.cast_order)
            .bind(&credit.department)
            .bind(&credit.job)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

/// People in ascending id order, duplicates dropped. Concurrent write-throughs
/// sharing cast members must take row locks in the same order or they deadlock.
fn lock_order(people: &[Person]) -> Vec<&Person> {
    let mut ordered: Vec<&Person> = people.iter().collect();
    ordered.sort_by_key(|p| p.tmdb_person_id);
    ordered.dedup_by_key(|p| p.tmdb_person_id);
    ordered
}

/// Appends `AND <descriptor matches>` for one mood/theme/storyline category
fn push_descriptor_category(builder: &mut QueryBuilder<'_, Postgres>, tokens: &[String]) {
    if tokens.is_empty() {
        return;
    }

    builder.push(" AND (");
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push(format!(
            "{} ~* ('\\m' || ",
            folded("title || ' ' || coalesce(overview, '')")
        ));
        builder.push_bind(token.clone());
        builder.push(" || '\\M')");

        let genres: Vec<String> = mood_genres(token).iter().map(|g| g.to_string()).collect();
        if !genres.is_empty() {
            builder.push(
                " OR EXISTS (SELECT 1 FROM jsonb_array_elements(genres_json) g WHERE g->>'name' = ANY(",
            );
            builder.push_bind(genres);
            builder.push("))");
        }
    }
    builder.push(")");
}

/// Appends `AND <any genre name contains a token>`
fn push_genre_category(builder: &mut QueryBuilder<'_, Postgres>, tokens: &[String]) {
    if tokens.is_empty() {
        return;
    }

    builder.push(" AND (");
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push(format!(
            "EXISTS (SELECT 1 FROM jsonb_array_elements(genres_json) g WHERE {} ~* ('\\m' || ",
            folded("g->>'name'")
        ));
        builder.push_bind(token.clone());
        builder.push(" || '\\M'))");
    }
    builder.push(")");
}

#[async_trait::async_trait]
impl CorpusStore for PgCorpusStore {
    async fn find_by_title(&self, text: &str, limit: usize) -> AppResult<Vec<ScoredMovie>> {
        let needle = normalize(text);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {MOVIE_COLUMNS} FROM movies \
             WHERE {NORMALIZED_TITLE_SQL} LIKE '%' || $1 || '%' \
                OR similarity(unaccent(lower(title)), $1) > 0.2 \
             ORDER BY similarity(unaccent(lower(title)), $1) DESC, popularity DESC \
             LIMIT $2"
        );
        let candidates: Vec<Movie> = sqlx::query_as(&sql)
            .bind(&needle)
            .bind(TITLE_PREFILTER_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        Ok(rank_title_matches(text, candidates, limit))
    }

    async fn find_by_id(&self, tmdb_id: i64) -> AppResult<Option<Movie>> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE tmdb_id = $1");
        let movie = sqlx::query_as(&sql)
            .bind(tmdb_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(movie)
    }

    async fn find_by_ids(&self, tmdb_ids: &[i64]) -> AppResult<Vec<Movie>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE tmdb_id = ANY($1)");
        let movies = sqlx::query_as(&sql)
            .bind(tmdb_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(movies)
    }

    async fn search_people_by_name(&self, text: &str, limit: usize) -> AppResult<Vec<Person>> {
        let needle = normalize(text);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM people \
             WHERE btrim(regexp_replace(unaccent(lower(name)), '[^[:alnum:]]+', ' ', 'g')) LIKE '%' || $1 || '%' \
             LIMIT $2"
        );
        let candidates: Vec<Person> = sqlx::query_as(&sql)
            .bind(&needle)
            .bind(TITLE_PREFILTER_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        Ok(rank_people_matches(text, candidates, limit))
    }

    async fn credits_for(&self, tmdb_id: i64) -> AppResult<Vec<PersonCredit>> {
        let rows: Vec<CreditRow> = sqlx::query_as(
            "SELECT p.tmdb_person_id, p.name, p.gender, p.known_for_department, p.profile_path, p.fetched_at, \
                    c.movie_tmdb_id, c.credit_type, c.character_name, c.cast_order, c.department, c.job \
             FROM credits c \
             JOIN people p ON p.tmdb_person_id = c.person_tmdb_person_id \
             WHERE c.movie_tmdb_id = $1 \
             ORDER BY c.credit_type, c.cast_order NULLS LAST, p.name",
        )
        .bind(tmdb_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PersonCredit::try_from).collect()
    }

    async fn movies_directed_or_acted_by(
        &self,
        tmdb_person_id: i64,
        role: Option<PersonRole>,
        limit: usize,
    ) -> AppResult<Vec<Movie>> {
        let role_condition = match role {
            Some(PersonRole::Director) => "c.credit_type = 'crew' AND c.job = 'Director'",
            Some(PersonRole::Actor) => "c.credit_type = 'cast'",
            None => "(c.credit_type = 'cast' OR (c.credit_type = 'crew' AND c.job = 'Director'))",
        };

        let sql = format!(
            "SELECT {MOVIE_COLUMNS} FROM movies m \
             WHERE EXISTS ( \
                 SELECT 1 FROM credits c \
                 WHERE c.movie_tmdb_id = m.tmdb_id \
                   AND c.person_tmdb_person_id = $1 \
                   AND {role_condition}) \
             ORDER BY popularity DESC \
             LIMIT $2"
        );
        let movies = sqlx::query_as(&sql)
            .bind(tmdb_person_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(movies)
    }

    async fn query_by_filters(&self, query: &RecommendationQuery) -> AppResult<Vec<Movie>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE vote_average > 0"
        ));

        push_genre_category(&mut builder, &query.genres);
        push_descriptor_category(&mut builder, &query.moods);
        push_descriptor_category(&mut builder, &query.themes);
        push_descriptor_category(&mut builder, &query.storylines);

        if !query.years.is_empty() {
            builder.push(" AND year = ANY(");
            builder.push_bind(query.years.clone());
            builder.push(")");
        }

        if let Some(duration) = query.duration {
            let (low, high) = duration.bounds();
            builder.push(" AND runtime IS NOT NULL");
            if let Some(low) = low {
                builder.push(" AND runtime >= ");
                builder.push_bind(low);
            }
            if let Some(high) = high {
                builder.push(" AND runtime <= ");
                builder.push_bind(high);
            }
        }

        for excluded in &query.exclude {
            builder.push(format!(" AND NOT ({NORMALIZED_TITLE_SQL} = "));
            builder.push_bind(excluded.title.clone());
            if let Some(year) = excluded.year {
                builder.push(" AND year IS NOT DISTINCT FROM ");
                builder.push_bind(year);
            }
            builder.push(")");
        }

        builder.push(" ORDER BY popularity DESC, vote_average DESC LIMIT ");
        builder.push_bind(query.limit as i64);

        let movies = builder
            .build_query_as::<Movie>()
            .fetch_all(&self.pool)
            .await?;

        // SQL folding only approximates `normalize` for non-Latin scripts
        Ok(movies.into_iter().filter(|m| !query.is_excluded(m)).collect())
    }

    async fn insert_movie_if_absent(&self, record: MovieRecord) -> AppResult<Movie> {
        let movie = &record.movie;
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO movies ({MOVIE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
             ON CONFLICT (tmdb_id) DO NOTHING \
             RETURNING {MOVIE_COLUMNS}"
        );
        let inserted: Option<Movie> = sqlx::query_as(&sql)
            .bind(movie.tmdb_id)
            .bind(&movie.title)
            .bind(&movie.original_title)
            .bind(movie.release_date)
            .bind(movie.year)
            .bind(&movie.overview)
            .bind(sqlx::types::Json(&movie.genres_json))
            .bind(&movie.genres_csv)
            .bind(movie.runtime)
            .bind(&movie.origin_country)
            .bind(movie.popularity)
            .bind(movie.vote_average)
            .bind(movie.vote_count)
            .bind(&movie.poster_path)
            .bind(&movie.backdrop_path)
            .bind(movie.box_office_worldwide)
            .bind(movie.box_office_domestic)
            .bind(movie.box_office_foreign)
            .bind(&movie.data_source)
            .bind(movie.fetched_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(inserted) = inserted else {
            tx.rollback().await?;
            tracing::debug!(tmdb_id = movie.tmdb_id, "Movie already stored, keeping existing row");
            return self.find_by_id(movie.tmdb_id).await?.ok_or_else(|| {
                AppError::Internal(format!("Movie {} vanished after conflict", movie.tmdb_id))
            });
        };

        Self::insert_people_and_credits(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            tmdb_id = inserted.tmdb_id,
            title = %inserted.title,
            people = record.people.len(),
            credits = record.credits.len(),
            "Persisted fetched movie"
        );
        Ok(inserted)
    }

    async fn top_movies(&self, metric: RankMetric, limit: usize) -> AppResult<Vec<Movie>> {
        let order = match metric {
            RankMetric::Popularity => "WHERE TRUE ORDER BY popularity DESC",
            RankMetric::BoxOffice => {
                "WHERE box_office_worldwide IS NOT NULL ORDER BY box_office_worldwide DESC"
            }
        };
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies {order} LIMIT $1");
        let movies = sqlx::query_as(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(movies)
    }

    async fn all_movies(&self) -> AppResult<Vec<Movie>> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies ORDER BY tmdb_id");
        let movies = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(movies)
    }

    async fn stats(&self) -> AppResult<CorpusStats> {
        let counts: CountsRow = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM movies) AS movies, \
                    (SELECT COUNT(*) FROM people) AS people, \
                    (SELECT COUNT(*) FROM credits) AS credits",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CorpusStats {
            movies: counts.movies,
            people: counts.people,
            credits: counts.credits,
        })
    }
}
