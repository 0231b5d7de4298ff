use std::collections::HashMap;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::thread_rng;
use tokio::sync::Mutex;
use types::{
    Match, MatchKind, Person, PersonId, PlayerSummary, SummaryOrder, Tournament, TournamentId,
};

use super::TournamentStore;
use crate::{CommitRecord, DatabaseError};

#[derive(Default)]
struct State {
    people: HashMap<PersonId, Person>,
    tournaments: HashMap<TournamentId, Tournament>,
    summaries: HashMap<TournamentId, Vec<PlayerSummary>>,
    matches: HashMap<TournamentId, Vec<Match>>,
    commits: Vec<CommitRecord>,
}

impl State {
    fn stored_match(&mut self, tournament: TournamentId, index: usize) -> Result<&mut Match, DatabaseError> {
        self.matches
            .get_mut(&tournament)
            .and_then(|ms| ms.get_mut(index))
            .ok_or(DatabaseError::MatchNotFound { tournament, index })
    }

    /// Rebuilds summaries from every started match the people appear in.
    fn refresh_summaries(&mut self, tournament: TournamentId, people: &[PersonId]) {
        let matches = self.matches.get(&tournament);
        let Some(summaries) = self.summaries.get_mut(&tournament) else {
            return;
        };
        for summary in summaries.iter_mut().filter(|s| people.contains(&s.person_id)) {
            let person = summary.person_id;
            let appearances = matches
                .into_iter()
                .flatten()
                .filter(|m| m.is_started())
                .flat_map(|m| m.players.iter())
                .filter(|p| p.person_id == person);
            summary.recompute(appearances);
        }
    }
}

/// Keeps everything in process memory. Used by tests and the demo binary.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentStore for MemoryStore {
    async fn save_person(&self, person: &Person) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        state.people.insert(person.id, person.clone());
        Ok(())
    }

    async fn get_person(&self, id: PersonId) -> Result<Person, DatabaseError> {
        let state = self.state.lock().await;
        state
            .people
            .get(&id)
            .cloned()
            .ok_or(DatabaseError::PersonNotFound(id))
    }

    async fn random_person(&self, exclude: &[PersonId]) -> Result<Option<Person>, DatabaseError> {
        let state = self.state.lock().await;
        let candidates: Vec<&Person> = state
            .people
            .values()
            .filter(|p| !p.disabled && !exclude.contains(&p.id))
            .collect();
        Ok(candidates.choose(&mut thread_rng()).map(|p| (*p).clone()))
    }

    async fn create_tournament(&self, tournament: &Tournament) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        state.tournaments.insert(tournament.id, tournament.clone());
        state.summaries.entry(tournament.id).or_default();
        state.matches.entry(tournament.id).or_default();
        Ok(())
    }

    async fn save_tournament(&self, tournament: &Tournament) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        let stored = state
            .tournaments
            .get_mut(&tournament.id)
            .ok_or(DatabaseError::TournamentNotFound(tournament.id))?;
        *stored = tournament.clone();
        Ok(())
    }

    async fn get_tournament(&self, id: TournamentId) -> Result<Tournament, DatabaseError> {
        let state = self.state.lock().await;
        state
            .tournaments
            .get(&id)
            .cloned()
            .ok_or(DatabaseError::TournamentNotFound(id))
    }

    async fn add_player_summary(&self, summary: &PlayerSummary) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        let roster = state.summaries.entry(summary.tournament_id).or_default();
        match roster.iter_mut().find(|s| s.person_id == summary.person_id) {
            Some(existing) => *existing = summary.clone(),
            None => roster.push(summary.clone()),
        }
        Ok(())
    }

    async fn remove_player_summary(
        &self,
        tournament: TournamentId,
        person: PersonId,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        if let Some(roster) = state.summaries.get_mut(&tournament) {
            roster.retain(|s| s.person_id != person);
        }
        Ok(())
    }

    async fn player_summary(
        &self,
        tournament: TournamentId,
        person: PersonId,
    ) -> Result<PlayerSummary, DatabaseError> {
        let state = self.state.lock().await;
        state
            .summaries
            .get(&tournament)
            .and_then(|roster| roster.iter().find(|s| s.person_id == person))
            .cloned()
            .ok_or(DatabaseError::SummaryNotFound { tournament, person })
    }

    async fn player_summaries(
        &self,
        tournament: TournamentId,
    ) -> Result<Vec<PlayerSummary>, DatabaseError> {
        let state = self.state.lock().await;
        let mut roster = state.summaries.get(&tournament).cloned().unwrap_or_default();
        roster.sort_by_key(|s| s.seat);
        Ok(roster)
    }

    async fn runnerups(
        &self,
        tournament: TournamentId,
        limit: Option<usize>,
    ) -> Result<Vec<PlayerSummary>, DatabaseError> {
        let state = self.state.lock().await;
        let booked: Vec<PersonId> = state
            .matches
            .get(&tournament)
            .into_iter()
            .flatten()
            .filter(|m| !m.is_ended())
            .flat_map(|m| m.players.iter().map(|p| p.person_id))
            .collect();
        let mut free: Vec<PlayerSummary> = state
            .summaries
            .get(&tournament)
            .into_iter()
            .flatten()
            .filter(|s| !booked.contains(&s.person_id))
            .cloned()
            .collect();
        SummaryOrder::Runnerup.sort(&mut free);
        if let Some(limit) = limit {
            free.truncate(limit);
        }
        Ok(free)
    }

    async fn playoff_players(
        &self,
        tournament: TournamentId,
        limit: usize,
    ) -> Result<Vec<PlayerSummary>, DatabaseError> {
        let state = self.state.lock().await;
        let mut roster = state.summaries.get(&tournament).cloned().unwrap_or_default();
        SummaryOrder::Skill.sort(&mut roster);
        roster.truncate(limit);
        Ok(roster)
    }

    async fn create_match(&self, m: &Match) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        let matches = state.matches.entry(m.tournament_id).or_default();
        if m.index != matches.len() {
            return Err(DatabaseError::OutOfSequence {
                index: m.index,
                expected: matches.len(),
            });
        }
        matches.push(m.clone());
        Ok(())
    }

    async fn save_match(&self, m: &Match) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        *state.stored_match(m.tournament_id, m.index)? = m.clone();
        let people: Vec<PersonId> = m.players.iter().map(|p| p.person_id).collect();
        state.refresh_summaries(m.tournament_id, &people);
        Ok(())
    }

    async fn add_player_to_match(&self, m: &Match, slot: usize) -> Result<(), DatabaseError> {
        let player = m
            .players
            .get(slot)
            .ok_or_else(|| DatabaseError::Query(format!("no player in slot {slot}")))?
            .clone();
        let mut state = self.state.lock().await;
        let stored = state.stored_match(m.tournament_id, m.index)?;
        if slot == stored.players.len() {
            stored.players.push(player);
        } else if slot < stored.players.len() {
            stored.players[slot] = player;
        } else {
            return Err(DatabaseError::Query(format!(
                "slot {slot} skips ahead of {} stored players",
                stored.players.len()
            )));
        }
        Ok(())
    }

    async fn update_player(&self, m: &Match, slot: usize) -> Result<(), DatabaseError> {
        let player = m
            .players
            .get(slot)
            .ok_or_else(|| DatabaseError::Query(format!("no player in slot {slot}")))?
            .clone();
        let person = player.person_id;
        let mut state = self.state.lock().await;
        let stored = state.stored_match(m.tournament_id, m.index)?;
        let target = stored
            .players
            .get_mut(slot)
            .ok_or_else(|| DatabaseError::Query(format!("no stored player in slot {slot}")))?;
        *target = player;
        state.refresh_summaries(m.tournament_id, &[person]);
        Ok(())
    }

    async fn get_match(&self, tournament: TournamentId, index: usize) -> Result<Match, DatabaseError> {
        let mut state = self.state.lock().await;
        Ok(state.stored_match(tournament, index)?.clone())
    }

    async fn matches(&self, tournament: TournamentId) -> Result<Vec<Match>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.matches.get(&tournament).cloned().unwrap_or_default())
    }

    async fn current_match(&self, tournament: TournamentId) -> Result<Option<Match>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state
            .matches
            .get(&tournament)
            .and_then(|ms| ms.iter().find(|m| m.is_running()))
            .cloned())
    }

    async fn next_match(&self, tournament: TournamentId) -> Result<Option<Match>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state
            .matches
            .get(&tournament)
            .and_then(|ms| ms.iter().find(|m| !m.is_ended()))
            .cloned())
    }

    async fn unfinished_qualifying(&self, tournament: TournamentId) -> Result<usize, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state
            .matches
            .get(&tournament)
            .into_iter()
            .flatten()
            .filter(|m| m.kind == MatchKind::Qualifying && !m.is_ended())
            .count())
    }

    async fn insert_commit(&self, commit: &CommitRecord) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        let mut record = commit.clone();
        record.id = Some(state.commits.len() as i64 + 1);
        state.commits.push(record);
        Ok(())
    }

    async fn commits(
        &self,
        tournament: TournamentId,
        match_index: usize,
    ) -> Result<Vec<CommitRecord>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state
            .commits
            .iter()
            .filter(|c| c.tournament_id == tournament && c.match_index == match_index)
            .cloned()
            .collect())
    }
}
