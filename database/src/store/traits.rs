use async_trait::async_trait;
use types::{Match, Person, PersonId, PlayerSummary, Tournament, TournamentId};

use crate::{CommitRecord, DatabaseError};

/// Everything the tournament engine needs from storage.
///
/// Writes that touch match players also refresh the affected people's
/// tournament summaries, so summaries always reflect stored matches.
#[async_trait]
pub trait TournamentStore: Send + Sync {
    async fn save_person(&self, person: &Person) -> Result<(), DatabaseError>;
    async fn get_person(&self, id: PersonId) -> Result<Person, DatabaseError>;
    /// A random enabled person who is not in `exclude`.
    async fn random_person(&self, exclude: &[PersonId]) -> Result<Option<Person>, DatabaseError>;

    async fn create_tournament(&self, tournament: &Tournament) -> Result<(), DatabaseError>;
    async fn save_tournament(&self, tournament: &Tournament) -> Result<(), DatabaseError>;
    async fn get_tournament(&self, id: TournamentId) -> Result<Tournament, DatabaseError>;

    async fn add_player_summary(&self, summary: &PlayerSummary) -> Result<(), DatabaseError>;
    async fn remove_player_summary(
        &self,
        tournament: TournamentId,
        person: PersonId,
    ) -> Result<(), DatabaseError>;
    async fn player_summary(
        &self,
        tournament: TournamentId,
        person: PersonId,
    ) -> Result<PlayerSummary, DatabaseError>;
    /// The roster in joining order.
    async fn player_summaries(
        &self,
        tournament: TournamentId,
    ) -> Result<Vec<PlayerSummary>, DatabaseError>;
    /// Roster members not seated in an unfinished match, in runnerup order.
    async fn runnerups(
        &self,
        tournament: TournamentId,
        limit: Option<usize>,
    ) -> Result<Vec<PlayerSummary>, DatabaseError>;
    /// The best `limit` players by skill score.
    async fn playoff_players(
        &self,
        tournament: TournamentId,
        limit: usize,
    ) -> Result<Vec<PlayerSummary>, DatabaseError>;

    /// Appends a match; its index must equal the current match count.
    async fn create_match(&self, m: &Match) -> Result<(), DatabaseError>;
    async fn save_match(&self, m: &Match) -> Result<(), DatabaseError>;
    async fn add_player_to_match(&self, m: &Match, slot: usize) -> Result<(), DatabaseError>;
    async fn update_player(&self, m: &Match, slot: usize) -> Result<(), DatabaseError>;
    async fn get_match(&self, tournament: TournamentId, index: usize)
        -> Result<Match, DatabaseError>;
    async fn matches(&self, tournament: TournamentId) -> Result<Vec<Match>, DatabaseError>;
    /// The first match that is started but not ended.
    async fn current_match(&self, tournament: TournamentId) -> Result<Option<Match>, DatabaseError>;
    /// The first match that has not ended.
    async fn next_match(&self, tournament: TournamentId) -> Result<Option<Match>, DatabaseError>;
    async fn unfinished_qualifying(&self, tournament: TournamentId) -> Result<usize, DatabaseError>;

    async fn insert_commit(&self, commit: &CommitRecord) -> Result<(), DatabaseError>;
    async fn commits(
        &self,
        tournament: TournamentId,
        match_index: usize,
    ) -> Result<Vec<CommitRecord>, DatabaseError>;
}
