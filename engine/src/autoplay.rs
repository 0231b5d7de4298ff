//! Plays matches without a game attached, by committing synthesized rounds.
//! Goes through the same operations a judge would use, so every rule of a
//! live match still holds.

use chrono::Utc;
use types::{Match, MatchError, RoundStrategy, Tournament};

use crate::{EngineError, Orchestrator};

impl Orchestrator {
    pub async fn autoplay_match(
        &self,
        index: usize,
        strategy: &mut dyn RoundStrategy,
    ) -> Result<Match, EngineError> {
        let mut current = self.match_at(index).await?;
        if current.is_ended() {
            return Err(MatchError::AlreadyEnded.into());
        }
        if !current.is_started() {
            current = self.start_match(index).await?;
        }

        let limit = self.config().autoplay_round_limit;
        let mut rounds = 0;
        while !current.can_end() {
            if rounds >= limit {
                return Err(EngineError::Stalled { index, rounds });
            }
            let round = strategy.next_round(&current);
            current = self.commit_round(index, round).await?;
            rounds += 1;
        }
        log::debug!("Autoplayed {current} in {rounds} rounds");
        self.end_match(index).await
    }

    /// Plays every unfinished match of the kind that is up next. Matches
    /// spawned while doing so are left for later.
    pub async fn autoplay_section(
        &self,
        strategy: &mut dyn RoundStrategy,
    ) -> Result<Vec<Match>, EngineError> {
        let Some(next) = self.next_match().await? else {
            return Ok(Vec::new());
        };
        let pending: Vec<usize> = self
            .snapshot()
            .await
            .matches
            .iter()
            .filter(|m| m.kind == next.kind && !m.is_ended())
            .map(|m| m.index)
            .collect();

        log::info!("Autoplaying {} {} matches", pending.len(), next.kind);
        let mut played = Vec::with_capacity(pending.len());
        for index in pending {
            played.push(self.autoplay_match(index, strategy).await?);
        }
        Ok(played)
    }

    /// Closes qualifying and plays everything left, with broadcasting
    /// switched off for the duration.
    pub async fn autoplay_tournament(
        &self,
        strategy: &mut dyn RoundStrategy,
    ) -> Result<Tournament, EngineError> {
        let broadcasting = self.notifier().is_enabled();
        self.set_broadcasting(false);
        let result = self.play_out(strategy).await;
        self.set_broadcasting(broadcasting);
        result
    }

    async fn play_out(&self, strategy: &mut dyn RoundStrategy) -> Result<Tournament, EngineError> {
        let tournament = self.tournament().await;
        if !tournament.is_started() {
            return Err(EngineError::NotStarted);
        }
        if tournament.qualifying_open(Utc::now()) {
            self.end_qualifying(Utc::now()).await?;
        }
        while let Some(next) = self.next_match().await? {
            self.autoplay_match(next.index, strategy).await?;
        }
        Ok(self.tournament().await)
    }
}
