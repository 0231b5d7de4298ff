use std::sync::Arc;

use chrono::{DateTime, Utc};
use database::{CommitRecord, TournamentStore};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use types::messages::{ArrowsPayload, StatePayload};
use types::{
    ChangeNotification, GameEvent, GameMatchMessage, Match, MatchEndSummary, MatchError, MatchKind,
    NotificationKind, PersonId, Player, PlayerStateUpdate, PlayerSummary, Round, Tournament,
    TournamentId, SLOTS,
};

use crate::bracket::{self, EndgamePlan, StartPlan, SEMIFINALS};
use crate::dispatch::{Notifier, Outbox, Publisher};
use crate::{resolver, EngineConfig, EngineError, PublishError};

/// Everything known about a tournament at one point in time.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tournament: Tournament,
    pub matches: Vec<Match>,
}

/// The aggregate root. Owns the tournament header and its append-only match
/// list, and is the only way the outside world changes either.
///
/// Locks are always taken tournament first, then matches in ascending
/// index. Live round events only ever take their own match lock, so
/// different matches never wait on each other.
pub struct Orchestrator {
    id: TournamentId,
    store: Arc<dyn TournamentStore>,
    config: EngineConfig,
    tournament: Mutex<Tournament>,
    matches: RwLock<Vec<Arc<Mutex<Match>>>>,
    notifier: Notifier,
    outbox: Outbox,
}

impl Orchestrator {
    fn assemble(
        store: Arc<dyn TournamentStore>,
        config: EngineConfig,
        publisher: Arc<dyn Publisher>,
        tournament: Tournament,
        matches: Vec<Match>,
    ) -> Self {
        let notifier = Notifier::new(config.notification_capacity, config.broadcasting);
        let outbox = Outbox::spawn(publisher, config.outbox_capacity);
        Self {
            id: tournament.id,
            store,
            config,
            tournament: Mutex::new(tournament),
            matches: RwLock::new(
                matches
                    .into_iter()
                    .map(|m| Arc::new(Mutex::new(m)))
                    .collect(),
            ),
            notifier,
            outbox,
        }
    }

    pub async fn create(
        store: Arc<dyn TournamentStore>,
        config: EngineConfig,
        publisher: Arc<dyn Publisher>,
        name: &str,
        slug: &str,
        scheduled: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let mut tournament = Tournament::new(name, slug, scheduled);
        config.apply(&mut tournament);
        store.create_tournament(&tournament).await?;
        log::info!("Created {tournament}");

        let orchestrator = Self::assemble(store, config, publisher, tournament.clone(), Vec::new());
        orchestrator
            .notifier
            .notify(NotificationKind::Tournament, &tournament);
        Ok(orchestrator)
    }

    /// Rebuilds the aggregate from what the store has, e.g. after a restart.
    pub async fn load(
        store: Arc<dyn TournamentStore>,
        config: EngineConfig,
        publisher: Arc<dyn Publisher>,
        id: TournamentId,
    ) -> Result<Self, EngineError> {
        let tournament = store.get_tournament(id).await?;
        let matches = store.matches(id).await?;
        log::info!("Loaded {tournament} with {} matches", matches.len());
        Ok(Self::assemble(store, config, publisher, tournament, matches))
    }

    pub fn id(&self) -> TournamentId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TournamentStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.notifier.subscribe()
    }

    pub fn set_broadcasting(&self, enabled: bool) {
        self.notifier.set_enabled(enabled);
    }

    pub fn set_connected(&self, connected: bool) {
        self.outbox.set_connected(connected);
    }

    pub async fn tournament(&self) -> Tournament {
        self.tournament.lock().await.clone()
    }

    pub async fn match_at(&self, index: usize) -> Result<Match, EngineError> {
        let handle = self.match_handle(index).await?;
        let m = handle.lock().await;
        Ok(m.clone())
    }

    pub async fn snapshot(&self) -> Snapshot {
        let tournament = self.tournament().await;
        Snapshot {
            tournament,
            matches: self.all_matches().await,
        }
    }

    /// First match that has not ended, as persisted.
    pub async fn next_match(&self) -> Result<Option<Match>, EngineError> {
        Ok(self.store.next_match(self.id).await?)
    }

    /// The running match, as persisted.
    pub async fn current_match(&self) -> Result<Option<Match>, EngineError> {
        Ok(self.store.current_match(self.id).await?)
    }

    pub async fn runnerups(&self) -> Result<Vec<PlayerSummary>, EngineError> {
        Ok(self.store.runnerups(self.id, None).await?)
    }

    pub async fn player_summaries(&self) -> Result<Vec<PlayerSummary>, EngineError> {
        Ok(self.store.player_summaries(self.id).await?)
    }

    pub async fn add_player(&self, person_id: PersonId) -> Result<PlayerSummary, EngineError> {
        let mut tournament = self.tournament.lock().await;
        self.register(&mut tournament, person_id).await
    }

    /// Withdraws a player before the tournament starts.
    pub async fn remove_player(&self, person_id: PersonId) -> Result<(), EngineError> {
        let tournament = self.tournament.lock().await;
        self.unregister(&tournament, person_id).await
    }

    /// Joins the player, or withdraws them if already joined. Returns
    /// whether the player is registered afterwards.
    pub async fn toggle_player(&self, person_id: PersonId) -> Result<bool, EngineError> {
        let mut tournament = self.tournament.lock().await;
        if self.is_registered(person_id).await? {
            self.unregister(&tournament, person_id).await?;
            Ok(false)
        } else {
            self.register(&mut tournament, person_id).await?;
            Ok(true)
        }
    }

    /// Tops the roster up to `target` with random people from the store.
    pub async fn usurp(&self, target: usize) -> Result<usize, EngineError> {
        let mut tournament = self.tournament.lock().await;
        if tournament.is_started() {
            return Err(EngineError::AlreadyStarted);
        }
        let mut taken: Vec<PersonId> = self
            .store
            .player_summaries(self.id)
            .await?
            .iter()
            .map(|s| s.person_id)
            .collect();

        let mut added = 0;
        while taken.len() < target {
            let Some(person) = self.store.random_person(&taken).await? else {
                log::warn!("Ran out of people with {} of {target} registered", taken.len());
                break;
            };
            taken.push(person.id);
            self.register(&mut tournament, person.id).await?;
            added += 1;
        }
        Ok(added)
    }

    pub async fn set_casters(&self, casters: Vec<PersonId>) -> Result<Tournament, EngineError> {
        let mut tournament = self.tournament.lock().await;
        let mut updated = tournament.clone();
        updated.casters = casters;
        self.store.save_tournament(&updated).await?;
        *tournament = updated.clone();
        self.notifier.notify(NotificationKind::Tournament, &updated);
        Ok(updated)
    }

    async fn is_registered(&self, person_id: PersonId) -> Result<bool, EngineError> {
        Ok(self
            .store
            .player_summaries(self.id)
            .await?
            .iter()
            .any(|s| s.person_id == person_id))
    }

    async fn register(
        &self,
        tournament: &mut Tournament,
        person_id: PersonId,
    ) -> Result<PlayerSummary, EngineError> {
        if tournament.is_ended() {
            return Err(EngineError::AlreadyEnded);
        }
        let roster = self.store.player_summaries(self.id).await?;
        if roster.iter().any(|s| s.person_id == person_id) {
            return Err(EngineError::AlreadyRegistered(person_id));
        }
        let person = self.store.get_person(person_id).await?;
        let seat = roster.iter().map(|s| s.seat + 1).max().unwrap_or(0);
        let summary = PlayerSummary::new(self.id, &person, seat);

        if tournament.is_started() {
            // Late joiners queue up with the runnerups.
            self.store.add_player_summary(&summary).await?;
            let mut updated = tournament.clone();
            updated.runnerups = self.runnerup_ids().await?;
            self.store.save_tournament(&updated).await?;
            *tournament = updated;
            log::info!("{person} joined running {tournament} as a runnerup");
            self.notify_runnerups().await;
        } else {
            self.store.add_player_summary(&summary).await?;
            log::info!("{person} joined {tournament}");
        }
        self.notify_summaries().await;
        Ok(summary)
    }

    async fn unregister(&self, tournament: &Tournament, person_id: PersonId) -> Result<(), EngineError> {
        if tournament.is_started() {
            return Err(EngineError::AlreadyStarted);
        }
        if !self.is_registered(person_id).await? {
            return Err(EngineError::NotRegistered(person_id));
        }
        self.store.remove_player_summary(self.id, person_id).await?;
        log::info!("{person_id} left {tournament}");
        self.notify_summaries().await;
        Ok(())
    }

    /// Seeds the opening matches, schedules the first one for right now and
    /// asks the game to load it.
    pub async fn start(&self) -> Result<Tournament, EngineError> {
        let started = {
            let mut tournament = self.tournament.lock().await;
            if tournament.is_started() {
                return Err(EngineError::AlreadyStarted);
            }
            let roster = self.store.player_summaries(self.id).await?;
            let plan = bracket::plan_start(roster.len(), self.config.min_players)?;
            let now = Utc::now();

            let mut updated = tournament.clone();
            updated.started = Some(now);
            let people = |positions: &[usize]| -> Vec<PersonId> {
                positions.iter().map(|&p| roster[p].person_id).collect()
            };
            match plan {
                StartPlan::DirectSemis { semis } => {
                    for seeds in &semis {
                        self.create_match(&updated, MatchKind::Semi, people(seeds), None)
                            .await?;
                    }
                    self.create_match(&updated, MatchKind::Final, Vec::new(), None)
                        .await?;
                }
                StartPlan::Qualifying { matches, waiting } => {
                    for seeds in &matches {
                        self.create_match(&updated, MatchKind::Qualifying, people(seeds), None)
                            .await?;
                    }
                    log::info!("{} players wait as runnerups", waiting.len());
                }
            }

            self.update_match(0, |m| {
                m.set_time(now, 0);
                Ok(())
            })
            .await?;
            updated.current = 0;
            updated.runnerups = self.runnerup_ids().await?;
            self.store.save_tournament(&updated).await?;
            *tournament = updated.clone();
            log::info!("Started {updated} with {} players", roster.len());
            updated
        };

        self.notifier.notify(NotificationKind::Tournament, &started);
        self.notify_runnerups().await;
        self.publish_quietly(&started.slug).await;
        Ok(started)
    }

    /// Sets the qualifying cutoff. Once it has passed, ended qualifying
    /// matches stop spawning new ones and the endgame is seeded as soon as
    /// the last of them is over.
    pub async fn end_qualifying(&self, at: DateTime<Utc>) -> Result<Tournament, EngineError> {
        let mut tournament = self.tournament.lock().await;
        if tournament.is_ended() {
            return Err(EngineError::AlreadyEnded);
        }
        let mut updated = tournament.clone();
        updated.qualifying_end = Some(at);

        let now = Utc::now();
        if updated.is_started() && !updated.qualifying_open(now) && self.seed_endgame(&updated).await? {
            self.schedule_next(&mut updated, now).await?;
        }
        self.store.save_tournament(&updated).await?;
        *tournament = updated.clone();
        log::info!("Qualifying for {updated} closes at {at}");
        self.notifier.notify(NotificationKind::Tournament, &updated);
        Ok(updated)
    }

    /// Asks the game to load the next match.
    pub async fn publish_next(&self) -> Result<(), EngineError> {
        let slug = self.tournament.lock().await.slug.clone();
        self.publish_with(&slug).await
    }

    async fn publish_with(&self, slug: &str) -> Result<(), EngineError> {
        let next = self
            .store
            .next_match(self.id)
            .await?
            .ok_or(EngineError::NoMatchAvailable)?;
        let message = GameMatchMessage::from_match(&next, slug)
            .ok_or(PublishError::IncompleteMatch(next.index))?;
        self.outbox.submit(message)?;
        log::debug!("Published match {} on {}", next.index, next.level);
        Ok(())
    }

    async fn publish_quietly(&self, slug: &str) {
        match self.publish_with(slug).await {
            Ok(()) => {}
            Err(e) if e.is_quiet_publish_failure() => log::info!("Next match not published: {e}"),
            Err(e) => log::warn!("Failed to publish next match: {e}"),
        }
    }

    /// Seats a registered person in an existing match. Filling the fourth
    /// seat settles color conflicts, and the seat is only written once that
    /// has worked.
    pub async fn add_player_to_match(&self, index: usize, person_id: PersonId) -> Result<Match, EngineError> {
        let person = self.store.get_person(person_id).await?;
        if !self.is_registered(person_id).await? {
            return Err(EngineError::NotRegistered(person_id));
        }
        if let Some(other) = self
            .all_matches()
            .await
            .iter()
            .find(|m| m.index != index && !m.is_ended() && m.contains(person_id))
        {
            return Err(EngineError::AlreadySeated {
                person: person_id,
                index: other.index,
            });
        }

        let handle = self.match_handle(index).await?;
        let mut current = handle.lock().await;
        let mut updated = current.clone();
        let slot = updated.add_player(Player::from_person(&person))?;
        let recolored = if updated.is_full() {
            resolver::resolve_colors(self.store.as_ref(), &mut updated).await?
        } else {
            Vec::new()
        };

        if recolored.is_empty() {
            self.store.add_player_to_match(&updated, slot).await?;
        } else {
            self.store.save_match(&updated).await?;
        }
        *current = updated.clone();
        log::info!("{person} seated in slot {slot} of {updated}");
        self.notifier.notify(NotificationKind::Match, &updated);
        Ok(updated)
    }

    pub async fn start_match(&self, index: usize) -> Result<Match, EngineError> {
        let casters = {
            let tournament = self.tournament.lock().await;
            if !tournament.is_started() {
                return Err(EngineError::NotStarted);
            }
            if tournament.is_ended() {
                return Err(EngineError::AlreadyEnded);
            }
            tournament.casters.clone()
        };
        if let Some(running) = self.store.current_match(self.id).await? {
            if running.index != index {
                return Err(EngineError::MatchRunning(running.index));
            }
        }

        let started = self
            .update_match(index, |m| Ok(m.start(Utc::now(), &casters)?))
            .await?;
        self.set_current(index).await?;
        self.notifier.notify(NotificationKind::Match, &started);
        Ok(started)
    }

    /// Ends a match, moves players on through the bracket and asks the game
    /// for the next match. Publication trouble never fails the end.
    ///
    /// The ended match is stored first and only marked settled once the
    /// bracket has moved on, so a failed advancement is finished by calling
    /// this again.
    pub async fn end_match(&self, index: usize) -> Result<Match, EngineError> {
        let (ended, tournament) = {
            let mut tournament = self.tournament.lock().await;
            if tournament.is_ended() {
                return Err(EngineError::AlreadyEnded);
            }
            let now = Utc::now();
            let current = self.match_at(index).await?;
            let ended = if current.is_ended() {
                if current.settled {
                    return Err(MatchError::AlreadyEnded.into());
                }
                log::warn!("Resuming advancement after {current}");
                current
            } else {
                self.update_match(index, |m| {
                    let multiplier = bracket::multiplier(m);
                    m.end(now, multiplier)?;
                    Ok(())
                })
                .await?
            };

            let mut updated = tournament.clone();
            self.advance(&mut updated, &ended, now).await?;
            self.store.save_tournament(&updated).await?;
            *tournament = updated.clone();
            let settled = self
                .update_match(index, |m| {
                    m.settled = true;
                    Ok(())
                })
                .await?;
            (settled, updated)
        };

        self.announce_match_end(&ended, &tournament).await;
        if !tournament.is_ended() {
            self.publish_quietly(&tournament.slug).await;
        }
        Ok(ended)
    }

    /// Zeroes a match that has not ended so it can be replayed.
    pub async fn reset_match(&self, index: usize) -> Result<Match, EngineError> {
        let reset = self.update_match(index, |m| Ok(m.reset()?)).await?;
        self.notifier.notify(NotificationKind::Match, &reset);
        Ok(reset)
    }

    /// Reschedules a match `minutes` from now.
    pub async fn set_time(&self, index: usize, minutes: i64) -> Result<Match, EngineError> {
        let now = Utc::now();
        let updated = self
            .update_match(index, |m| {
                m.set_time(now, minutes);
                Ok(())
            })
            .await?;
        self.notifier.notify(NotificationKind::Match, &updated);
        Ok(updated)
    }

    /// Applies a whole round at once, as a judge would.
    pub async fn commit_round(&self, index: usize, round: Round) -> Result<Match, EngineError> {
        let committed = self
            .update_match_with_round(index, |m| Ok(m.commit(round, Utc::now())?))
            .await?;
        self.notifier.notify(NotificationKind::Match, &committed);
        Ok(committed)
    }

    pub async fn award_shot(&self, index: usize, slot: usize) -> Result<Match, EngineError> {
        let updated = self.update_match(index, |m| Ok(m.award_shot(slot)?)).await?;
        self.notifier.notify(NotificationKind::Match, &updated);
        Ok(updated)
    }

    /// Folds one live telemetry event into match `index`.
    pub async fn handle_event(&self, index: usize, event: GameEvent) -> Result<(), EngineError> {
        log::debug!("Match {index}: {event}");
        match event {
            GameEvent::MatchStart => {
                self.start_match(index).await?;
            }
            GameEvent::MatchEnd => {
                self.end_match(index).await?;
            }
            GameEvent::RoundStart(payload) => {
                let m = self
                    .update_match(index, |m| Ok(m.start_round(&payload.arrows)?))
                    .await?;
                self.notifier.notify(NotificationKind::Match, &m);
            }
            GameEvent::RoundEnd => {
                let m = self
                    .update_match_with_round(index, |m| Ok(m.end_round(Utc::now())?.appended))
                    .await?;
                self.notifier.notify(NotificationKind::Match, &m);
            }
            GameEvent::Kill(payload) => {
                let killer = payload.killer()?;
                let victim = payload.player;
                let m = self.update_match(index, |m| Ok(m.kill(victim, killer)?)).await?;
                self.notify_player(&m, victim);
            }
            GameEvent::Shot(ArrowsPayload { player, arrows })
            | GameEvent::Pickup(ArrowsPayload { player, arrows }) => {
                let (m, _) = self
                    .update_player_state(index, player, |m| Ok(m.set_arrows(player, arrows)?))
                    .await?;
                self.notify_player(&m, player);
            }
            GameEvent::Shield(StatePayload { player, state }) => {
                let (m, notify) = self
                    .update_player_state(index, player, |m| Ok(m.set_shield(player, state)?))
                    .await?;
                if notify {
                    self.notify_player(&m, player);
                }
            }
            GameEvent::Wings(StatePayload { player, state }) => {
                let (m, notify) = self
                    .update_player_state(index, player, |m| Ok(m.set_wings(player, state)?))
                    .await?;
                if notify {
                    self.notify_player(&m, player);
                }
            }
            GameEvent::LavaOrb(StatePayload { player, state }) => {
                let (m, notify) = self
                    .update_player_state(index, player, |m| Ok(m.set_lava(player, state)?))
                    .await?;
                if notify {
                    self.notify_player(&m, player);
                }
            }
        }
        Ok(())
    }

    async fn advance(
        &self,
        tournament: &mut Tournament,
        ended: &Match,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        match ended.kind {
            MatchKind::Qualifying => {
                if tournament.qualifying_open(now) {
                    self.spawn_qualifying(tournament, ended.index).await?;
                } else {
                    self.seed_endgame(tournament).await?;
                }
            }
            MatchKind::Playoff | MatchKind::Semi => {
                let matches = self.all_matches().await;
                for (slot, destination) in bracket::advancement(&matches, ended) {
                    let person_id = ended.player(slot)?.person_id;
                    if matches[destination].contains(person_id) {
                        continue;
                    }
                    self.add_player_to_match(destination, person_id).await?;
                }
            }
            MatchKind::Final => {
                tournament.winners = bracket::winners(ended);
                tournament.ended = Some(now);
                log::info!("{tournament} is over");
            }
        }

        if !tournament.is_ended() {
            self.schedule_next(tournament, now).await?;
        }
        tournament.runnerups = self.runnerup_ids().await?;
        Ok(())
    }

    /// Lets the next four runnerups play, once per ended qualifying match.
    async fn spawn_qualifying(&self, tournament: &Tournament, origin: usize) -> Result<(), EngineError> {
        if self
            .all_matches()
            .await
            .iter()
            .any(|m| m.spawned_from == Some(origin))
        {
            return Ok(());
        }
        let waiting = self.store.runnerups(self.id, Some(SLOTS)).await?;
        if waiting.len() < SLOTS {
            log::info!("Only {} runnerups waiting, no new qualifying match", waiting.len());
            return Ok(());
        }
        let people = waiting.iter().map(|s| s.person_id).collect();
        self.create_match(tournament, MatchKind::Qualifying, people, Some(origin))
            .await?;
        Ok(())
    }

    /// Seeds playoffs or semifinals once every qualifying match is over.
    /// Matches of the endgame that already exist are kept, so a seeding
    /// cut short by a failed write picks up where it stopped. Returns
    /// whether anything was scheduled.
    async fn seed_endgame(&self, tournament: &Tournament) -> Result<bool, EngineError> {
        if self.store.unfinished_qualifying(self.id).await? > 0 {
            return Ok(false);
        }
        let existing = self.all_matches().await;
        let have = |kind| bracket::indices_of(&existing, kind).len();
        if have(MatchKind::Final) > 0 {
            return Ok(false);
        }

        let registered = self.store.player_summaries(self.id).await?.len();
        let plan = bracket::plan_endgame(registered, self.config.playoff_players);
        let needed = plan.players_needed();
        let ranked = self.store.playoff_players(self.id, needed).await?;
        if ranked.len() < needed {
            return Err(EngineError::InsufficientPlayoffPlayers {
                actual: ranked.len(),
                required: needed,
            });
        }
        let people = |positions: &[usize]| -> Vec<PersonId> {
            positions.iter().map(|&p| ranked[p].person_id).collect()
        };

        match plan {
            EndgamePlan::Playoffs { playoffs } => {
                log::info!("Seeding {} playoffs for {tournament}", playoffs.len());
                for seeds in playoffs.iter().skip(have(MatchKind::Playoff)) {
                    self.create_match(tournament, MatchKind::Playoff, people(seeds), None)
                        .await?;
                }
                for _ in have(MatchKind::Semi)..SEMIFINALS {
                    self.create_match(tournament, MatchKind::Semi, Vec::new(), None)
                        .await?;
                }
            }
            EndgamePlan::DirectSemis { semis } => {
                log::info!("Seeding semifinals straight from qualifying for {tournament}");
                for seeds in semis.iter().skip(have(MatchKind::Semi)) {
                    self.create_match(tournament, MatchKind::Semi, people(seeds), None)
                        .await?;
                }
            }
        }
        self.create_match(tournament, MatchKind::Final, Vec::new(), None)
            .await?;
        Ok(true)
    }

    async fn schedule_next(&self, tournament: &mut Tournament, now: DateTime<Utc>) -> Result<(), EngineError> {
        let Some(next) = self.store.next_match(self.id).await? else {
            return Ok(());
        };
        let pause = tournament.pause_minutes;
        self.update_match(next.index, |m| {
            m.set_time(now, pause);
            Ok(())
        })
        .await?;
        tournament.current = next.index;
        Ok(())
    }

    /// Appends a match to the bracket, with whoever is already known to play in it.
    async fn create_match(
        &self,
        tournament: &Tournament,
        kind: MatchKind,
        people: Vec<PersonId>,
        origin: Option<usize>,
    ) -> Result<Match, EngineError> {
        let mut matches = self.matches.write().await;
        let mut ordinal = 0;
        for handle in matches.iter() {
            if handle.lock().await.kind == kind {
                ordinal += 1;
            }
        }

        let level = tournament.levels.level_for(kind, ordinal);
        let mut m = Match::new(self.id, matches.len(), kind, tournament.length_for(kind))
            .with_level(&level)
            .with_ruleset(&tournament.ruleset)
            .with_pause(tournament.pause_minutes)
            .with_origin(origin);
        for person_id in people {
            let person = self.store.get_person(person_id).await?;
            m.add_player(Player::from_person(&person))?;
        }
        if m.is_full() {
            resolver::resolve_colors(self.store.as_ref(), &mut m).await?;
        }

        self.store.create_match(&m).await?;
        log::info!("Scheduled {m} on {level}");
        matches.push(Arc::new(Mutex::new(m.clone())));
        self.notifier.notify(NotificationKind::Match, &m);
        Ok(m)
    }

    async fn set_current(&self, index: usize) -> Result<(), EngineError> {
        let mut tournament = self.tournament.lock().await;
        if tournament.current == index {
            return Ok(());
        }
        let mut updated = tournament.clone();
        updated.current = index;
        self.store.save_tournament(&updated).await?;
        *tournament = updated;
        self.notifier.notify(NotificationKind::Tournament, &*tournament);
        Ok(())
    }

    async fn match_handle(&self, index: usize) -> Result<Arc<Mutex<Match>>, EngineError> {
        self.matches
            .read()
            .await
            .get(index)
            .cloned()
            .ok_or(EngineError::MatchNotFound(index))
    }

    async fn all_matches(&self) -> Vec<Match> {
        let handles: Vec<_> = self.matches.read().await.clone();
        let mut matches = Vec::with_capacity(handles.len());
        for handle in handles {
            matches.push(handle.lock().await.clone());
        }
        matches
    }

    /// Applies `change` to a copy of the match, saves the copy and only then
    /// replaces the in-memory match with it.
    async fn update_match<F>(&self, index: usize, change: F) -> Result<Match, EngineError>
    where
        F: FnOnce(&mut Match) -> Result<(), EngineError>,
    {
        let handle = self.match_handle(index).await?;
        let mut current = handle.lock().await;
        let mut updated = current.clone();
        change(&mut updated)?;
        self.store.save_match(&updated).await?;
        *current = updated.clone();
        Ok(updated)
    }

    /// Like [`Self::update_match`] for changes that may append a round, which
    /// also goes to the commit log.
    async fn update_match_with_round<F>(&self, index: usize, change: F) -> Result<Match, EngineError>
    where
        F: FnOnce(&mut Match) -> Result<bool, EngineError>,
    {
        let handle = self.match_handle(index).await?;
        let mut current = handle.lock().await;
        let mut updated = current.clone();
        let appended = change(&mut updated)?;
        self.store.save_match(&updated).await?;
        if appended {
            if let Some(record) = CommitRecord::latest(&updated) {
                self.store.insert_commit(&record).await?;
            }
        }
        *current = updated.clone();
        Ok(updated)
    }

    /// Like [`Self::update_match`] for changes to a single player.
    async fn update_player_state<F, R>(&self, index: usize, slot: usize, change: F) -> Result<(Match, R), EngineError>
    where
        F: FnOnce(&mut Match) -> Result<R, EngineError>,
    {
        let handle = self.match_handle(index).await?;
        let mut current = handle.lock().await;
        let mut updated = current.clone();
        let result = change(&mut updated)?;
        self.store.update_player(&updated, slot).await?;
        *current = updated.clone();
        Ok((updated, result))
    }

    async fn runnerup_ids(&self) -> Result<Vec<PersonId>, EngineError> {
        Ok(self
            .store
            .runnerups(self.id, None)
            .await?
            .iter()
            .map(|s| s.person_id)
            .collect())
    }

    fn notify_player(&self, m: &Match, slot: usize) {
        if let Ok(player) = m.player(slot) {
            let update = PlayerStateUpdate {
                tournament: self.id,
                match_index: m.index,
                player: slot,
                state: player.state.clone(),
            };
            self.notifier.notify(NotificationKind::Player, &update);
        }
    }

    async fn notify_summaries(&self) {
        if !self.notifier.is_enabled() {
            return;
        }
        match self.store.player_summaries(self.id).await {
            Ok(summaries) => self
                .notifier
                .notify(NotificationKind::PlayerSummaries, &summaries),
            Err(e) => log::warn!("Could not load summaries to broadcast: {e}"),
        }
    }

    async fn notify_runnerups(&self) {
        if !self.notifier.is_enabled() {
            return;
        }
        match self.store.runnerups(self.id, None).await {
            Ok(runnerups) => self.notifier.notify(NotificationKind::Runnerups, &runnerups),
            Err(e) => log::warn!("Could not load runnerups to broadcast: {e}"),
        }
    }

    async fn announce_match_end(&self, ended: &Match, tournament: &Tournament) {
        if !self.notifier.is_enabled() {
            return;
        }
        let summaries = match self.store.player_summaries(self.id).await {
            Ok(summaries) => summaries,
            Err(e) => {
                log::warn!("Could not load summaries for end of {ended}: {e}");
                return;
            }
        };
        let summary = MatchEndSummary {
            tournament: self.id,
            match_index: ended.index,
            kill_order: ended
                .kill_order
                .iter()
                .filter_map(|&slot| ended.players.get(slot).map(|p| p.person_id))
                .collect(),
            runnerups: tournament.runnerups.clone(),
            summaries,
        };
        self.notifier.notify(NotificationKind::MatchEnd, &summary);
        self.notifier
            .notify(NotificationKind::PlayerSummaries, &summary.summaries);
        self.notifier.notify(NotificationKind::Match, ended);
        self.notifier.notify(NotificationKind::Tournament, tournament);
        self.notify_runnerups().await;
    }
}
