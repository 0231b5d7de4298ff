use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ranking::make_kill_order, scoring, Color, Killer, PersonId, Player, Round, TournamentId,
    SLOTS,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Qualifying,
    Playoff,
    Semi,
    Final,
}

impl Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Qualifying => write!(f, "qualifying"),
            MatchKind::Playoff => write!(f, "playoff"),
            MatchKind::Semi => write!(f, "semi"),
            MatchKind::Final => write!(f, "final"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Fewer than four players.
    Scheduled,
    /// Four players, waiting to start.
    Open,
    Running,
    Ended,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("cannot add fifth player")]
    MatchFull,

    #[error("person {0} is already in this match")]
    AlreadyInMatch(PersonId),

    #[error("match already started")]
    AlreadyStarted,

    #[error("match already ended")]
    AlreadyEnded,

    #[error("match has not been started")]
    NotStarted,

    #[error("match needs four players, has {0}")]
    IncompletePlayers(usize),

    #[error("no player in slot {0}")]
    SlotOutOfRange(usize),
}

/// Which slots were touched by closing a round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    pub appended: bool,
    pub shots: Vec<usize>,
}

/// One four-player contest and everything that happened in it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub tournament_id: TournamentId,
    pub index: usize,
    pub kind: MatchKind,
    /// Kills needed to win.
    pub length: u32,
    pub pause_minutes: i64,
    pub level: String,
    pub ruleset: String,
    pub scheduled: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub players: Vec<Player>,
    pub casters: Vec<PersonId>,
    pub rounds: Vec<Round>,
    pub current_round: Round,
    /// Final placement by slot, filled when the match ends.
    pub kill_order: Vec<usize>,
    /// The ended qualifying match whose runnerups seeded this one.
    #[serde(default)]
    pub spawned_from: Option<usize>,
    /// Whether the bracket has moved on from this match after it ended.
    #[serde(default)]
    pub settled: bool,
}

impl Match {
    pub fn new(tournament_id: TournamentId, index: usize, kind: MatchKind, length: u32) -> Self {
        Self {
            tournament_id,
            index,
            kind,
            length,
            pause_minutes: 0,
            level: String::new(),
            ruleset: String::new(),
            scheduled: None,
            started: None,
            ended: None,
            players: Vec::with_capacity(SLOTS),
            casters: Vec::new(),
            rounds: Vec::new(),
            current_round: Round::new(),
            kill_order: Vec::new(),
            spawned_from: None,
            settled: false,
        }
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_ruleset(mut self, ruleset: &str) -> Self {
        self.ruleset = ruleset.to_string();
        self
    }

    pub fn with_pause(mut self, minutes: i64) -> Self {
        self.pause_minutes = minutes;
        self
    }

    pub fn with_origin(mut self, origin: Option<usize>) -> Self {
        self.spawned_from = origin;
        self
    }

    pub fn status(&self) -> MatchStatus {
        if self.ended.is_some() {
            MatchStatus::Ended
        } else if self.started.is_some() {
            MatchStatus::Running
        } else if self.is_full() {
            MatchStatus::Open
        } else {
            MatchStatus::Scheduled
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() == SLOTS
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.status() == MatchStatus::Running
    }

    pub fn contains(&self, person_id: PersonId) -> bool {
        self.players.iter().any(|p| p.person_id == person_id)
    }

    pub fn player(&self, slot: usize) -> Result<&Player, MatchError> {
        self.players.get(slot).ok_or(MatchError::SlotOutOfRange(slot))
    }

    pub fn player_mut(&mut self, slot: usize) -> Result<&mut Player, MatchError> {
        self.players
            .get_mut(slot)
            .ok_or(MatchError::SlotOutOfRange(slot))
    }

    /// Seats a player in the next free slot and returns that slot.
    pub fn add_player(&mut self, mut player: Player) -> Result<usize, MatchError> {
        if self.is_full() {
            return Err(MatchError::MatchFull);
        }
        if self.contains(player.person_id) {
            return Err(MatchError::AlreadyInMatch(player.person_id));
        }
        player.reset();
        player.color = player.preferred_color;
        self.players.push(player);
        Ok(self.players.len() - 1)
    }

    /// Slots grouped by color, for every color held by more than one player.
    pub fn color_conflicts(&self) -> Vec<(Color, Vec<usize>)> {
        let mut by_color: BTreeMap<Color, Vec<usize>> = BTreeMap::new();
        for (slot, player) in self.players.iter().enumerate() {
            by_color.entry(player.color).or_default().push(slot);
        }
        by_color
            .into_iter()
            .filter(|(_, slots)| slots.len() > 1)
            .collect()
    }

    pub fn colors_in_use(&self) -> Vec<Color> {
        self.players.iter().map(|p| p.color).collect()
    }

    pub fn set_color(&mut self, slot: usize, color: Color) -> Result<(), MatchError> {
        self.player_mut(slot)?.color = color;
        Ok(())
    }

    pub fn set_time(&mut self, now: DateTime<Utc>, minutes: i64) {
        self.scheduled = Some(now + Duration::minutes(minutes));
    }

    pub fn start(&mut self, now: DateTime<Utc>, casters: &[PersonId]) -> Result<(), MatchError> {
        if self.is_started() {
            return Err(MatchError::AlreadyStarted);
        }
        if !self.is_full() {
            return Err(MatchError::IncompletePlayers(self.players.len()));
        }
        for player in self.players.iter_mut() {
            player.reset();
        }
        self.rounds.clear();
        self.current_round = Round::new();
        self.casters = casters.to_vec();
        self.started = Some(now);
        log::info!("Starting {self}");
        Ok(())
    }

    /// Closes the match: placement points scaled by `multiplier`, and the
    /// winner drinks. Returns the kill order.
    pub fn end(&mut self, now: DateTime<Utc>, multiplier: f64) -> Result<Vec<usize>, MatchError> {
        if self.is_ended() {
            return Err(MatchError::AlreadyEnded);
        }
        if !self.is_started() {
            return Err(MatchError::NotStarted);
        }
        if !self.is_full() {
            return Err(MatchError::IncompletePlayers(self.players.len()));
        }

        let order = make_kill_order(&self.players);
        for (position, &slot) in order.iter().enumerate() {
            self.players[slot].match_score = scoring::placement_score(position, multiplier);
        }
        self.players[order[0]].tally.add_shot();

        self.kill_order = order.clone();
        self.ended = Some(now);
        log::info!("Ended {self}");
        Ok(order)
    }

    /// Running, and somebody has reached the kill target.
    pub fn can_end(&self) -> bool {
        self.is_running() && self.players.iter().any(|p| p.tally.kills >= self.length)
    }

    /// Zeroes every tally so the match can be replayed from the start.
    pub fn reset(&mut self) -> Result<(), MatchError> {
        if self.is_ended() {
            return Err(MatchError::AlreadyEnded);
        }
        for player in self.players.iter_mut() {
            player.reset();
        }
        self.rounds.clear();
        self.current_round = Round::new();
        self.kill_order.clear();
        self.started = None;
        log::info!("Reset {self}");
        Ok(())
    }

    /// Applies a whole round decided by a judge (or synthesized).
    ///
    /// Shot-only rounds only hand out shots and are not kept in the history.
    pub fn commit(&mut self, mut round: Round, now: DateTime<Utc>) -> Result<bool, MatchError> {
        self.require_running()?;

        if round.is_shot_only() {
            for (slot, result) in round.slots.iter().enumerate() {
                if result.shot {
                    self.player_mut(slot)?.tally.add_shot();
                }
            }
            log::debug!("Shot update in {self}: {round}");
            return Ok(false);
        }

        for (slot, result) in round.slots.iter().enumerate() {
            let player = self.player_mut(slot)?;
            player.tally.add_kills(result.kills);
            for _ in 0..result.self_kills {
                player.tally.add_self();
            }
            if result.self_kills > 0 || result.kills >= scoring::SWEEP_KILLS || result.shot {
                player.tally.add_shot();
            }
        }

        round.committed = Some(now);
        log::debug!("Committed round {} in {self}: {round}", self.rounds.len() + 1);
        self.rounds.push(round);
        Ok(true)
    }

    pub fn start_round(&mut self, arrows: &[Vec<i32>]) -> Result<(), MatchError> {
        self.require_running()?;
        for (slot, player) in self.players.iter_mut().enumerate() {
            let loadout = arrows.get(slot).cloned().unwrap_or_default();
            player.state.respawn(loadout);
        }
        self.current_round = Round::new();
        self.current_round.started = true;
        Ok(())
    }

    /// Marks `victim` dead. Suicides and environment deaths count as self kills.
    pub fn kill(&mut self, victim: usize, killer: Killer) -> Result<(), MatchError> {
        self.require_running()?;
        self.player(victim)?;
        if let Killer::Player(k) = killer {
            self.player(k)?;
        }

        let state = &mut self.players[victim].state;
        state.alive = false;
        state.killer = Some(killer);

        match killer {
            Killer::Player(k) if k != victim => {
                self.players[k].tally.add_kill();
                self.current_round.add_kill(k);
            }
            _ => {
                self.players[victim].tally.add_self();
                self.current_round.add_self(victim);
            }
        }
        Ok(())
    }

    pub fn set_arrows(&mut self, slot: usize, arrows: Vec<i32>) -> Result<(), MatchError> {
        self.player_mut(slot)?.state.arrows = arrows;
        Ok(())
    }

    /// The returned flag says whether spectators should hear about it.
    pub fn set_shield(&mut self, slot: usize, state: bool) -> Result<bool, MatchError> {
        self.player_mut(slot)?.state.shield = state;
        Ok(self.current_round.started)
    }

    pub fn set_wings(&mut self, slot: usize, state: bool) -> Result<bool, MatchError> {
        self.player_mut(slot)?.state.wings = state;
        Ok(self.current_round.started)
    }

    pub fn set_lava(&mut self, slot: usize, state: bool) -> Result<bool, MatchError> {
        self.player_mut(slot)?.state.lava = state;
        Ok(self.current_round.started)
    }

    pub fn award_shot(&mut self, slot: usize) -> Result<(), MatchError> {
        self.player(slot)?;
        self.current_round.award_shot(slot);
        Ok(())
    }

    /// Closes the live round: at most one shot per slot for a sweep, a
    /// self kill or a flagged shot.
    pub fn end_round(&mut self, now: DateTime<Utc>) -> Result<RoundOutcome, MatchError> {
        self.require_running()?;
        let mut round = std::mem::take(&mut self.current_round);
        let mut outcome = RoundOutcome::default();

        for (slot, result) in round.slots.iter().enumerate() {
            let Some(player) = self.players.get_mut(slot) else {
                continue;
            };
            let sweep = result.kills >= scoring::SWEEP_KILLS;
            if sweep {
                player.tally.add_sweep();
            }
            if sweep || result.self_kills > 0 || result.shot {
                player.tally.add_shot();
                outcome.shots.push(slot);
            }
        }

        if !round.is_shot_only() {
            round.started = false;
            round.committed = Some(now);
            self.rounds.push(round);
            outcome.appended = true;
        }
        Ok(outcome)
    }

    fn require_running(&self) -> Result<(), MatchError> {
        match self.status() {
            MatchStatus::Running => Ok(()),
            MatchStatus::Ended => Err(MatchError::AlreadyEnded),
            _ => Err(MatchError::NotStarted),
        }
    }
}

impl Display for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "match {} ({}) [{}]",
            self.index,
            self.kind,
            self.players.iter().map(|p| format!("{} {}", p.nick, p.tally.kills)).join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Person;
    use uuid::Uuid;

    fn player(nick: &str, color: Color) -> Player {
        Player::from_person(&Person::new(nick, nick).with_color(color))
    }

    fn full_match() -> Match {
        let mut m = Match::new(Uuid::new_v4(), 0, MatchKind::Qualifying, 10);
        for (nick, color) in [
            ("a", Color::Green),
            ("b", Color::Blue),
            ("c", Color::Pink),
            ("d", Color::Orange),
        ] {
            m.add_player(player(nick, color)).expect("room for player");
        }
        m
    }

    fn running_match() -> Match {
        let mut m = full_match();
        m.start(Utc::now(), &[]).expect("start");
        m
    }

    #[test]
    fn fifth_player_is_rejected() {
        let mut m = full_match();
        assert_eq!(m.status(), MatchStatus::Open);
        let err = m.add_player(player("e", Color::Red)).unwrap_err();
        assert_eq!(err, MatchError::MatchFull);
        assert_eq!(m.players.len(), 4);
    }

    #[test]
    fn conflicts_group_slots_by_color() {
        let mut m = Match::new(Uuid::new_v4(), 0, MatchKind::Qualifying, 10);
        for nick in ["a", "b", "c"] {
            m.add_player(player(nick, Color::Red)).unwrap();
        }
        m.add_player(player("d", Color::Green)).unwrap();
        assert_eq!(m.color_conflicts(), vec![(Color::Red, vec![0, 1, 2])]);
    }

    #[test]
    fn start_twice_fails() {
        let mut m = running_match();
        assert_eq!(m.start(Utc::now(), &[]), Err(MatchError::AlreadyStarted));
    }

    #[test]
    fn start_needs_four_players() {
        let mut m = Match::new(Uuid::new_v4(), 0, MatchKind::Qualifying, 10);
        m.add_player(player("a", Color::Red)).unwrap();
        assert_eq!(m.start(Utc::now(), &[]), Err(MatchError::IncompletePlayers(1)));
    }

    #[test]
    fn sweep_commit_gives_one_sweep_and_one_shot() {
        let mut m = running_match();
        let appended = m
            .commit(Round::from_parts([3, 0, 0, 0], [0; 4], [false; 4]), Utc::now())
            .unwrap();
        assert!(appended);
        assert_eq!(m.rounds.len(), 1);
        let p = &m.players[0];
        assert_eq!((p.tally.kills, p.tally.sweeps, p.tally.shots), (3, 1, 1));
    }

    #[test]
    fn shot_only_commit_is_not_kept() {
        let mut m = running_match();
        let appended = m
            .commit(Round::from_parts([0; 4], [0; 4], [false, true, false, false]), Utc::now())
            .unwrap();
        assert!(!appended);
        assert!(m.rounds.is_empty());
        assert_eq!(m.players[1].tally.shots, 1);
    }

    #[test]
    fn self_kill_with_a_flagged_shot_is_a_real_round() {
        let mut m = running_match();
        m.commit(Round::from_parts([2, 0, 0, 0], [0; 4], [false; 4]), Utc::now())
            .unwrap();
        let appended = m
            .commit(Round::from_parts([0; 4], [1, 0, 0, 0], [false, true, false, false]), Utc::now())
            .unwrap();
        assert!(appended);
        assert_eq!(m.rounds.len(), 2);
        let p = &m.players[0];
        assert_eq!((p.tally.kills, p.tally.self_kills, p.tally.shots), (1, 1, 1));
        assert_eq!(m.players[1].tally.shots, 1);
    }

    #[test]
    fn environment_death_round_is_kept_next_to_a_shot() {
        let mut m = running_match();
        m.start_round(&[]).unwrap();
        m.kill(2, Killer::Environment).unwrap();
        m.award_shot(1).unwrap();
        let outcome = m.end_round(Utc::now()).unwrap();
        assert!(outcome.appended);
        assert_eq!(outcome.shots, vec![1, 2]);
        assert_eq!(m.rounds.len(), 1);
        assert_eq!(m.players[2].tally.self_kills, 1);
    }

    #[test]
    fn commit_self_kill_costs_a_kill_and_gives_a_shot() {
        let mut m = running_match();
        m.commit(Round::from_parts([2, 1, 0, 0], [0; 4], [false; 4]), Utc::now())
            .unwrap();
        m.commit(Round::from_parts([0, 1, 0, 0], [1, 0, 0, 0], [false; 4]), Utc::now())
            .unwrap();
        let p = &m.players[0];
        assert_eq!((p.tally.kills, p.tally.self_kills, p.tally.shots), (1, 1, 1));
    }

    #[test]
    fn environment_and_own_kills_give_exactly_one_shot() {
        let mut m = running_match();
        m.start_round(&[vec![0, 0], vec![0], vec![], vec![]]).unwrap();
        m.kill(1, Killer::Player(0)).unwrap();
        m.kill(0, Killer::Environment).unwrap();
        m.kill(2, Killer::Player(2)).unwrap();
        m.kill(2, Killer::Environment).unwrap();
        let outcome = m.end_round(Utc::now()).unwrap();

        assert_eq!(outcome.shots, vec![0, 2]);
        assert!(outcome.appended);
        assert_eq!(m.players[0].tally.kills, 0);
        assert_eq!(m.players[0].tally.self_kills, 1);
        assert_eq!(m.players[0].tally.shots, 1);
        assert_eq!(m.players[2].tally.self_kills, 2);
        assert_eq!(m.players[2].tally.shots, 1);
        assert!(!m.players[1].state.alive);
        assert_eq!(m.players[0].state.killer, Some(Killer::Environment));
        assert_eq!(m.rounds[0].slots[0].kills, 1);
        assert_eq!(m.rounds[0].slots[2].self_kills, 2);
    }

    #[test]
    fn live_sweep_is_credited_at_round_end() {
        let mut m = running_match();
        m.start_round(&[]).unwrap();
        for victim in 1..4 {
            m.kill(victim, Killer::Player(0)).unwrap();
        }
        let outcome = m.end_round(Utc::now()).unwrap();
        assert_eq!(outcome.shots, vec![0]);
        let p = &m.players[0];
        assert_eq!((p.tally.kills, p.tally.sweeps, p.tally.shots), (3, 1, 1));
    }

    #[test]
    fn flagged_shot_round_is_not_appended() {
        let mut m = running_match();
        m.start_round(&[]).unwrap();
        m.award_shot(3).unwrap();
        let outcome = m.end_round(Utc::now()).unwrap();
        assert!(!outcome.appended);
        assert_eq!(outcome.shots, vec![3]);
        assert!(m.rounds.is_empty());
        assert!(!m.current_round.started);
    }

    #[test]
    fn toggles_only_notify_in_started_rounds() {
        let mut m = running_match();
        assert_eq!(m.set_shield(0, true), Ok(false));
        m.start_round(&[]).unwrap();
        assert_eq!(m.set_wings(1, true), Ok(true));
        assert_eq!(m.set_lava(2, true), Ok(true));
        assert!(m.players[0].state.shield);
        assert_eq!(m.set_shield(7, true), Err(MatchError::SlotOutOfRange(7)));
    }

    #[test]
    fn bad_kill_slot_changes_nothing() {
        let mut m = running_match();
        m.start_round(&[]).unwrap();
        assert_eq!(m.kill(0, Killer::Player(9)), Err(MatchError::SlotOutOfRange(9)));
        assert!(m.players[0].state.alive);
    }

    #[test]
    fn can_end_needs_the_kill_target() {
        let mut m = full_match();
        assert!(!m.can_end());
        m.start(Utc::now(), &[]).unwrap();
        assert!(!m.can_end());
        m.players[2].tally.kills = 10;
        assert!(m.can_end());
    }

    #[test]
    fn end_assigns_placements_and_winner_shot() {
        let mut m = running_match();
        for (slot, kills) in [1, 4, 5, 10].into_iter().enumerate() {
            m.players[slot].tally.kills = kills;
        }
        let order = m.end(Utc::now(), 1.0).unwrap();
        assert_eq!(order, vec![3, 2, 1, 0]);
        assert_eq!(m.players[3].match_score, 2450);
        assert_eq!(m.players[2].match_score, 1050);
        assert_eq!(m.players[1].match_score, 490);
        assert_eq!(m.players[0].match_score, 210);
        assert_eq!(m.players[3].tally.shots, 1);
        assert_eq!(m.status(), MatchStatus::Ended);
        assert_eq!(m.end(Utc::now(), 1.0), Err(MatchError::AlreadyEnded));
    }

    #[test]
    fn reset_zeroes_tallies() {
        let mut m = running_match();
        m.commit(Round::from_parts([1, 2, 0, 0], [0; 4], [false; 4]), Utc::now())
            .unwrap();
        m.reset().unwrap();
        assert!(m.rounds.is_empty());
        assert!(m.players.iter().all(|p| p.tally.kills == 0));
        assert_eq!(m.status(), MatchStatus::Open);
    }
}
