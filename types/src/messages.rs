//! Messages exchanged with the game and with spectators.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Killer, Match, MatchKind, PersonId, PlayerState, PlayerSummary, TournamentId, SLOTS};

/// Killer value the game sends for deaths by traps, lava and the like.
pub const ENVIRONMENT_KILL: i64 = -1;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("unknown event type {0:?}")]
    UnknownType(String),

    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid killer {0}")]
    InvalidKiller(i64),
}

/// Raw inbound envelope: `{"type": ..., "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TelemetryMessage {
    pub fn new<T: Serialize>(kind: &str, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.to_string(),
            data: serde_json::to_value(data)?,
            timestamp: Some(Utc::now()),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KillPayload {
    pub player: usize,
    pub killer: i64,
    #[serde(default, alias = "cause")]
    pub reason: serde_json::Value,
}

impl KillPayload {
    pub fn killer(&self) -> Result<Killer, ProtocolError> {
        match self.killer {
            ENVIRONMENT_KILL => Ok(Killer::Environment),
            k if k >= 0 => Ok(Killer::Player(k as usize)),
            k => Err(ProtocolError::InvalidKiller(k)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrowsPayload {
    pub player: usize,
    pub arrows: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub player: usize,
    pub state: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundStartPayload {
    #[serde(default)]
    pub arrows: Vec<Vec<i32>>,
}

/// A decoded telemetry event.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    MatchStart,
    MatchEnd,
    RoundStart(RoundStartPayload),
    RoundEnd,
    Kill(KillPayload),
    Shot(ArrowsPayload),
    Pickup(ArrowsPayload),
    Shield(StatePayload),
    Wings(StatePayload),
    LavaOrb(StatePayload),
}

fn payload<T: DeserializeOwned>(msg: &TelemetryMessage) -> Result<T, ProtocolError> {
    serde_json::from_value(msg.data.clone()).map_err(|source| ProtocolError::Payload {
        kind: msg.kind.clone(),
        source,
    })
}

impl GameEvent {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let msg: TelemetryMessage = serde_json::from_str(text).map_err(ProtocolError::Envelope)?;
        Self::parse(&msg)
    }

    pub fn parse(msg: &TelemetryMessage) -> Result<Self, ProtocolError> {
        let event = match msg.kind.as_str() {
            "match_start" => GameEvent::MatchStart,
            "match_end" => GameEvent::MatchEnd,
            "round_start" => GameEvent::RoundStart(if msg.data.is_null() {
                RoundStartPayload::default()
            } else {
                payload(msg)?
            }),
            "round_end" => GameEvent::RoundEnd,
            "kill" => {
                let kill: KillPayload = payload(msg)?;
                kill.killer()?;
                GameEvent::Kill(kill)
            }
            "shot" | "arrow_shot" => GameEvent::Shot(payload(msg)?),
            "pickup" | "arrows_collected" => GameEvent::Pickup(payload(msg)?),
            "shield" | "shield_state" => GameEvent::Shield(payload(msg)?),
            "wings" | "wings_state" => GameEvent::Wings(payload(msg)?),
            "lava_orb" | "lava_orb_state" => GameEvent::LavaOrb(payload(msg)?),
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::MatchStart => "match_start",
            GameEvent::MatchEnd => "match_end",
            GameEvent::RoundStart(_) => "round_start",
            GameEvent::RoundEnd => "round_end",
            GameEvent::Kill(_) => "kill",
            GameEvent::Shot(_) => "shot",
            GameEvent::Pickup(_) => "pickup",
            GameEvent::Shield(_) => "shield",
            GameEvent::Wings(_) => "wings",
            GameEvent::LavaOrb(_) => "lava_orb",
        }
    }

    pub fn to_message(&self) -> Result<TelemetryMessage, serde_json::Error> {
        match self {
            GameEvent::MatchStart | GameEvent::MatchEnd | GameEvent::RoundEnd => {
                TelemetryMessage::new(self.name(), &serde_json::Value::Null)
            }
            GameEvent::RoundStart(p) => TelemetryMessage::new(self.name(), p),
            GameEvent::Kill(p) => TelemetryMessage::new(self.name(), p),
            GameEvent::Shot(p) | GameEvent::Pickup(p) => TelemetryMessage::new(self.name(), p),
            GameEvent::Shield(p) | GameEvent::Wings(p) | GameEvent::LavaOrb(p) => {
                TelemetryMessage::new(self.name(), p)
            }
        }
    }
}

impl Display for GameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameEvent::Kill(k) => write!(f, "kill {} by {}", k.player, k.killer),
            GameEvent::Shot(a) | GameEvent::Pickup(a) => {
                write!(f, "{} {} -> {:?}", self.name(), a.player, a.arrows)
            }
            GameEvent::Shield(s) | GameEvent::Wings(s) | GameEvent::LavaOrb(s) => {
                write!(f, "{} {} -> {}", self.name(), s.player, s.state)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// One archer as the game needs to set it up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePlayer {
    pub top_name: String,
    pub bottom_name: String,
    pub color: u8,
    pub archer_type: u8,
}

/// Tells the game what to load next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMatchMessage {
    pub tournament: String,
    pub level: String,
    pub round_length: u32,
    pub ruleset: String,
    pub kind: MatchKind,
    pub players: Vec<GamePlayer>,
}

impl GameMatchMessage {
    /// `None` unless the match has all four players.
    pub fn from_match(m: &Match, tournament_slug: &str) -> Option<Self> {
        if m.players.len() != SLOTS {
            return None;
        }
        Some(Self {
            tournament: tournament_slug.to_string(),
            level: m.level.clone(),
            round_length: m.length,
            ruleset: m.ruleset.clone(),
            kind: m.kind,
            players: m
                .players
                .iter()
                .map(|p| GamePlayer {
                    top_name: p.display_names[0].clone(),
                    bottom_name: p.display_names[1].clone(),
                    color: p.color.numeric(),
                    archer_type: p.archer_type.numeric(),
                })
                .collect(),
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Tournament,
    Match,
    Player,
    MatchEnd,
    PlayerSummaries,
    Runnerups,
}

/// Fan-out message for spectators: `{"type": ..., "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub data: serde_json::Value,
}

impl ChangeNotification {
    pub fn new<T: Serialize>(kind: NotificationKind, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind,
            data: serde_json::to_value(data)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerStateUpdate {
    pub tournament: TournamentId,
    pub match_index: usize,
    pub player: usize,
    pub state: PlayerState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchEndSummary {
    pub tournament: TournamentId,
    pub match_index: usize,
    pub kill_order: Vec<PersonId>,
    pub runnerups: Vec<PersonId>,
    pub summaries: Vec<PlayerSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, Person, Player};
    use uuid::Uuid;

    #[test]
    fn kill_accepts_legacy_cause_field() {
        let event =
            GameEvent::from_json(r#"{"type":"kill","data":{"player":2,"killer":-1,"cause":4}}"#)
                .unwrap();
        match event {
            GameEvent::Kill(k) => {
                assert_eq!(k.player, 2);
                assert_eq!(k.killer().unwrap(), Killer::Environment);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn legacy_type_names_are_aliases() {
        let event = GameEvent::from_json(
            r#"{"type":"arrows_collected","data":{"player":1,"arrows":[0,1]}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            GameEvent::Pickup(ArrowsPayload { player: 1, arrows: vec![0, 1] })
        );
    }

    #[test]
    fn unknown_type_and_bad_payload_are_distinguished() {
        assert!(matches!(
            GameEvent::from_json(r#"{"type":"dance","data":{}}"#),
            Err(ProtocolError::UnknownType(t)) if t == "dance"
        ));
        assert!(matches!(
            GameEvent::from_json(r#"{"type":"shield","data":{"player":"x"}}"#),
            Err(ProtocolError::Payload { .. })
        ));
        assert!(matches!(
            GameEvent::from_json(r#"{"type":"kill","data":{"player":0,"killer":-5}}"#),
            Err(ProtocolError::InvalidKiller(-5))
        ));
        assert!(matches!(
            GameEvent::from_json("not json"),
            Err(ProtocolError::Envelope(_))
        ));
    }

    #[test]
    fn round_start_without_data_is_empty() {
        let event = GameEvent::from_json(r#"{"type":"round_start"}"#).unwrap();
        assert_eq!(event, GameEvent::RoundStart(RoundStartPayload::default()));
    }

    #[test]
    fn events_survive_the_envelope() {
        let event = GameEvent::Wings(StatePayload { player: 3, state: true });
        let msg = event.to_message().unwrap();
        assert_eq!(msg.kind, "wings");
        assert_eq!(GameEvent::parse(&msg).unwrap(), event);
    }

    #[test]
    fn next_match_message_needs_four_players() {
        let mut m = Match::new(Uuid::new_v4(), 0, MatchKind::Semi, 10).with_level("sunken");
        let colors = [Color::Green, Color::Blue, Color::Pink, Color::Red];
        for (i, color) in colors.into_iter().enumerate() {
            assert!(GameMatchMessage::from_match(&m, "df").is_none());
            let person = Person::new(&format!("p{i}"), &format!("p{i}")).with_color(color);
            m.add_player(Player::from_person(&person)).unwrap();
        }
        let msg = GameMatchMessage::from_match(&m, "df").unwrap();
        assert_eq!(msg.level, "sunken");
        assert_eq!(msg.round_length, 10);
        assert_eq!(msg.players[3].color, 8);
        assert_eq!(msg.players[0].top_name, "P0");

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "semi");
    }
}
