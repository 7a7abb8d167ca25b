pub mod conversation;
pub mod movie;
pub mod qa;
pub mod recommendation;
pub mod retrieval;
pub mod tmdb;

pub use conversation::{recent_turns, ChatTurn, Role, MAX_HISTORY_TURNS};
pub use movie::{
    Credit, CreditType, Genre, Movie, MovieRecord, Person, PersonCredit, PersonRole,
    DIRECTOR_JOB, TMDB_SOURCE,
};
pub use qa::{
    CastMember, MovieDetailResponse, MovieSummary, QaResponse, QuestionRequest, SearchParams,
    SearchResponse, StatsResponse, TopParams,
};
pub use recommendation::{
    DurationComparison, DurationFilter, ExcludedTitle, RecommendationQuery,
    RecommendationRequest, RecommendationResponse,
};
pub use retrieval::{RetrievalResult, ScoredMovie, Source};
pub use tmdb::{TmdbMovieDetails, TmdbSearchHit, TmdbSearchResponse};
