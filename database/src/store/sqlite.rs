use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use types::{
    scoring, Match, MatchKind, Person, PersonId, PlayerSummary, Tally, Tournament, TournamentId,
    SLOTS,
};
use uuid::Uuid;

use super::TournamentStore;
use crate::{CommitRecord, DatabaseError};

const SCHEMA: &str = include_str!("../../schema.sql");

const SUMMARY_COLUMNS: &str = "tournament_id, person_id, nick, seat, shots, sweeps, kills, \
                               self_kills, matches, total_score, skill_score";

/// Tournament storage on a sqlite pool.
///
/// Matches are stored whole as JSON; their players are mirrored into
/// `players` rows so summaries and runnerups can be computed in SQL.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates missing tables.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Tournament schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_match(&self, sql: &str, tournament: TournamentId) -> Result<Option<Match>, DatabaseError> {
        let row = sqlx::query(sql)
            .bind(tournament.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| match_from_row(&r)).transpose()
    }
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, DatabaseError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(DatabaseError::UuidParsing)
}

fn match_from_row(row: &SqliteRow) -> Result<Match, DatabaseError> {
    let data: String = row.try_get("data")?;
    Ok(serde_json::from_str(&data)?)
}

fn summary_from_row(row: &SqliteRow) -> Result<PlayerSummary, DatabaseError> {
    let count = |column: &str| -> Result<u32, DatabaseError> {
        Ok(row.try_get::<i64, _>(column)? as u32)
    };
    Ok(PlayerSummary {
        tournament_id: parse_uuid(row, "tournament_id")?,
        person_id: parse_uuid(row, "person_id")?,
        nick: row.try_get("nick")?,
        seat: row.try_get::<i64, _>("seat")? as usize,
        tally: Tally {
            shots: count("shots")?,
            sweeps: count("sweeps")?,
            kills: count("kills")?,
            self_kills: count("self_kills")?,
        },
        matches: count("matches")?,
        total_score: row.try_get::<i64, _>("total_score")? as i32,
        skill_score: row.try_get::<i64, _>("skill_score")? as i32,
    })
}

fn commit_from_row(row: &SqliteRow) -> Result<CommitRecord, DatabaseError> {
    let mut kills = [0u32; SLOTS];
    let mut self_kills = [0u32; SLOTS];
    let mut shots = [false; SLOTS];
    for slot in 0..SLOTS {
        kills[slot] = row.try_get::<i64, _>(format!("kills_{slot}").as_str())? as u32;
        self_kills[slot] = row.try_get::<i64, _>(format!("self_{slot}").as_str())? as u32;
        shots[slot] = row.try_get(format!("shot_{slot}").as_str())?;
    }
    Ok(CommitRecord {
        id: Some(row.try_get("id")?),
        tournament_id: parse_uuid(row, "tournament_id")?,
        match_index: row.try_get::<i64, _>("match_idx")? as usize,
        round: row.try_get::<i64, _>("round")? as usize,
        kills,
        self_kills,
        shots,
        committed_at: row.try_get::<DateTime<Utc>, _>("committed_at")?,
    })
}

async fn write_match_row(conn: &mut SqliteConnection, m: &Match) -> Result<(), DatabaseError> {
    let data = serde_json::to_string(m)?;
    sqlx::query(
        "INSERT OR REPLACE INTO matches (tournament_id, idx, kind, started, ended, data) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(m.tournament_id.to_string())
    .bind(m.index as i64)
    .bind(m.kind.to_string())
    .bind(m.is_started())
    .bind(m.is_ended())
    .bind(data)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_player_row(
    conn: &mut SqliteConnection,
    m: &Match,
    slot: usize,
) -> Result<PersonId, DatabaseError> {
    let player = m
        .players
        .get(slot)
        .ok_or_else(|| DatabaseError::Query(format!("no player in slot {slot}")))?;
    sqlx::query(
        "INSERT OR REPLACE INTO players (tournament_id, match_idx, slot, person_id, shots, sweeps, kills, self_kills, match_score, total_score) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(m.tournament_id.to_string())
    .bind(m.index as i64)
    .bind(slot as i64)
    .bind(player.person_id.to_string())
    .bind(player.tally.shots as i64)
    .bind(player.tally.sweeps as i64)
    .bind(player.tally.kills as i64)
    .bind(player.tally.self_kills as i64)
    .bind(player.match_score as i64)
    .bind(player.total_score() as i64)
    .execute(&mut *conn)
    .await?;
    Ok(player.person_id)
}

/// Re-aggregates one person's summary from their rows in started matches.
async fn refresh_summary(
    conn: &mut SqliteConnection,
    tournament: TournamentId,
    person: PersonId,
) -> Result<(), DatabaseError> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(p.shots), 0) AS shots,
                COALESCE(SUM(p.sweeps), 0) AS sweeps,
                COALESCE(SUM(p.kills), 0) AS kills,
                COALESCE(SUM(p.self_kills), 0) AS self_kills,
                COUNT(*) AS matches,
                COALESCE(SUM(p.total_score), 0) AS total_score
         FROM players p
         JOIN matches m ON m.tournament_id = p.tournament_id AND m.idx = p.match_idx
         WHERE p.tournament_id = ? AND p.person_id = ? AND m.started = 1",
    )
    .bind(tournament.to_string())
    .bind(person.to_string())
    .fetch_one(&mut *conn)
    .await?;

    let matches: i64 = row.try_get("matches")?;
    let total_score: i64 = row.try_get("total_score")?;
    let skill = scoring::skill_score(total_score as i32, matches as u32);

    sqlx::query(
        "UPDATE player_summaries SET shots = ?, sweeps = ?, kills = ?, self_kills = ?, matches = ?, total_score = ?, skill_score = ? WHERE tournament_id = ? AND person_id = ?",
    )
    .bind(row.try_get::<i64, _>("shots")?)
    .bind(row.try_get::<i64, _>("sweeps")?)
    .bind(row.try_get::<i64, _>("kills")?)
    .bind(row.try_get::<i64, _>("self_kills")?)
    .bind(matches)
    .bind(total_score)
    .bind(skill as i64)
    .bind(tournament.to_string())
    .bind(person.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl TournamentStore for SqliteStore {
    async fn save_person(&self, person: &Person) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(person)?;
        sqlx::query("INSERT OR REPLACE INTO people (id, disabled, data) VALUES (?, ?, ?)")
            .bind(person.id.to_string())
            .bind(person.disabled)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn get_person(&self, id: PersonId) -> Result<Person, DatabaseError> {
        let row = sqlx::query("SELECT data FROM people WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::PersonNotFound(id))?;
        let data: String = row.try_get("data")?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn random_person(&self, exclude: &[PersonId]) -> Result<Option<Person>, DatabaseError> {
        let excluded: Vec<String> = exclude.iter().map(|id| id.to_string()).collect();
        let row = sqlx::query(
            "SELECT data FROM people WHERE disabled = 0 AND id NOT IN (SELECT value FROM json_each(?)) ORDER BY RANDOM() LIMIT 1",
        )
        .bind(serde_json::to_string(&excluded)?)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => {
                let data: String = r.try_get("data")?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn create_tournament(&self, tournament: &Tournament) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO tournaments (id, slug, data) VALUES (?, ?, ?)")
            .bind(tournament.id.to_string())
            .bind(&tournament.slug)
            .bind(serde_json::to_string(tournament)?)
            .execute(&self.pool)
            .await?;
        tracing::debug!("Created tournament {}", tournament.slug);
        Ok(())
    }

    async fn save_tournament(&self, tournament: &Tournament) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE tournaments SET slug = ?, data = ? WHERE id = ?")
            .bind(&tournament.slug)
            .bind(serde_json::to_string(tournament)?)
            .bind(tournament.id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::TournamentNotFound(tournament.id));
        }
        Ok(())
    }

    async fn get_tournament(&self, id: TournamentId) -> Result<Tournament, DatabaseError> {
        let row = sqlx::query("SELECT data FROM tournaments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::TournamentNotFound(id))?;
        let data: String = row.try_get("data")?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn add_player_summary(&self, summary: &PlayerSummary) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO player_summaries ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            SUMMARY_COLUMNS
        ))
        .bind(summary.tournament_id.to_string())
        .bind(summary.person_id.to_string())
        .bind(&summary.nick)
        .bind(summary.seat as i64)
        .bind(summary.tally.shots as i64)
        .bind(summary.tally.sweeps as i64)
        .bind(summary.tally.kills as i64)
        .bind(summary.tally.self_kills as i64)
        .bind(summary.matches as i64)
        .bind(summary.total_score as i64)
        .bind(summary.skill_score as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_player_summary(
        &self,
        tournament: TournamentId,
        person: PersonId,
    ) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM player_summaries WHERE tournament_id = ? AND person_id = ?")
            .bind(tournament.to_string())
            .bind(person.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn player_summary(
        &self,
        tournament: TournamentId,
        person: PersonId,
    ) -> Result<PlayerSummary, DatabaseError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM player_summaries WHERE tournament_id = ? AND person_id = ?",
            SUMMARY_COLUMNS
        ))
        .bind(tournament.to_string())
        .bind(person.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DatabaseError::SummaryNotFound { tournament, person })?;
        summary_from_row(&row)
    }

    async fn player_summaries(
        &self,
        tournament: TournamentId,
    ) -> Result<Vec<PlayerSummary>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM player_summaries WHERE tournament_id = ? ORDER BY seat",
            SUMMARY_COLUMNS
        ))
        .bind(tournament.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(summary_from_row).collect()
    }

    async fn runnerups(
        &self,
        tournament: TournamentId,
        limit: Option<usize>,
    ) -> Result<Vec<PlayerSummary>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM player_summaries
             WHERE tournament_id = ?1 AND person_id NOT IN (
                 SELECT p.person_id FROM players p
                 JOIN matches m ON m.tournament_id = p.tournament_id AND m.idx = p.match_idx
                 WHERE p.tournament_id = ?1 AND m.ended = 0)
             ORDER BY matches ASC, skill_score DESC, seat ASC
             LIMIT ?2",
            SUMMARY_COLUMNS
        ))
        .bind(tournament.to_string())
        .bind(limit.map_or(-1, |l| l as i64))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(summary_from_row).collect()
    }

    async fn playoff_players(
        &self,
        tournament: TournamentId,
        limit: usize,
    ) -> Result<Vec<PlayerSummary>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM player_summaries WHERE tournament_id = ?
             ORDER BY skill_score DESC, seat ASC LIMIT ?",
            SUMMARY_COLUMNS
        ))
        .bind(tournament.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(summary_from_row).collect()
    }

    async fn create_match(&self, m: &Match) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches WHERE tournament_id = ?")
            .bind(m.tournament_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        if m.index as i64 != count {
            return Err(DatabaseError::OutOfSequence {
                index: m.index,
                expected: count as usize,
            });
        }

        write_match_row(&mut tx, m).await?;
        for slot in 0..m.players.len() {
            write_player_row(&mut tx, m, slot).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        tracing::debug!("Created {m}");
        Ok(())
    }

    async fn save_match(&self, m: &Match) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matches WHERE tournament_id = ? AND idx = ?",
        )
        .bind(m.tournament_id.to_string())
        .bind(m.index as i64)
        .fetch_one(&mut *tx)
        .await?;
        if exists == 0 {
            return Err(DatabaseError::MatchNotFound {
                tournament: m.tournament_id,
                index: m.index,
            });
        }

        write_match_row(&mut tx, m).await?;
        sqlx::query("DELETE FROM players WHERE tournament_id = ? AND match_idx = ?")
            .bind(m.tournament_id.to_string())
            .bind(m.index as i64)
            .execute(&mut *tx)
            .await?;
        for slot in 0..m.players.len() {
            let person = write_player_row(&mut tx, m, slot).await?;
            refresh_summary(&mut tx, m.tournament_id, person).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        tracing::debug!("Saved {m}");
        Ok(())
    }

    async fn add_player_to_match(&self, m: &Match, slot: usize) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        write_match_row(&mut tx, m).await?;
        write_player_row(&mut tx, m, slot).await?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn update_player(&self, m: &Match, slot: usize) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        write_match_row(&mut tx, m).await?;
        let person = write_player_row(&mut tx, m, slot).await?;
        refresh_summary(&mut tx, m.tournament_id, person).await?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn get_match(&self, tournament: TournamentId, index: usize) -> Result<Match, DatabaseError> {
        let row = sqlx::query("SELECT data FROM matches WHERE tournament_id = ? AND idx = ?")
            .bind(tournament.to_string())
            .bind(index as i64)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::MatchNotFound { tournament, index })?;
        match_from_row(&row)
    }

    async fn matches(&self, tournament: TournamentId) -> Result<Vec<Match>, DatabaseError> {
        let rows = sqlx::query("SELECT data FROM matches WHERE tournament_id = ? ORDER BY idx")
            .bind(tournament.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(match_from_row).collect()
    }

    async fn current_match(&self, tournament: TournamentId) -> Result<Option<Match>, DatabaseError> {
        self.fetch_match(
            "SELECT data FROM matches WHERE tournament_id = ? AND started = 1 AND ended = 0 ORDER BY idx LIMIT 1",
            tournament,
        )
        .await
    }

    async fn next_match(&self, tournament: TournamentId) -> Result<Option<Match>, DatabaseError> {
        self.fetch_match(
            "SELECT data FROM matches WHERE tournament_id = ? AND ended = 0 ORDER BY idx LIMIT 1",
            tournament,
        )
        .await
    }

    async fn unfinished_qualifying(&self, tournament: TournamentId) -> Result<usize, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matches WHERE tournament_id = ? AND kind = ? AND ended = 0",
        )
        .bind(tournament.to_string())
        .bind(MatchKind::Qualifying.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn insert_commit(&self, commit: &CommitRecord) -> Result<(), DatabaseError> {
        let mut query = sqlx::query(
            "INSERT INTO commits (tournament_id, match_idx, round, kills_0, kills_1, kills_2, kills_3, self_0, self_1, self_2, self_3, shot_0, shot_1, shot_2, shot_3, committed_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(commit.tournament_id.to_string())
        .bind(commit.match_index as i64)
        .bind(commit.round as i64);
        for kills in commit.kills {
            query = query.bind(kills as i64);
        }
        for self_kills in commit.self_kills {
            query = query.bind(self_kills as i64);
        }
        for shot in commit.shots {
            query = query.bind(shot);
        }
        query
            .bind(commit.committed_at)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn commits(
        &self,
        tournament: TournamentId,
        match_index: usize,
    ) -> Result<Vec<CommitRecord>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT * FROM commits WHERE tournament_id = ? AND match_idx = ? ORDER BY round, id",
        )
        .bind(tournament.to_string())
        .bind(match_index as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(commit_from_row).collect()
    }
}
