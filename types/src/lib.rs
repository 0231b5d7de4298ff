pub mod color;
pub mod match_state;
pub mod messages;
pub mod person;
pub mod player;
pub mod ranking;
pub mod round;
pub mod scoring;
pub mod summary;
pub mod tournament;

pub use color::{ArcherType, Color};
pub use match_state::{Match, MatchError, MatchKind, MatchStatus, RoundOutcome};
pub use messages::{
    ChangeNotification, GameEvent, GameMatchMessage, GamePlayer, MatchEndSummary,
    NotificationKind, PlayerStateUpdate, ProtocolError, TelemetryMessage,
};
pub use person::{Person, PersonId, SettingsUpdate};
pub use player::{Killer, Player, PlayerState};
pub use ranking::{make_kill_order, PlayerOrder, SummaryOrder};
pub use round::{Round, RoundSlot, RoundStrategy, SLOTS};
pub use scoring::Tally;
pub use summary::PlayerSummary;
pub use tournament::{Levels, Tournament, TournamentId};
