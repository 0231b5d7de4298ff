use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub const SHOT_POINTS: i32 = 3;
pub const SWEEP_POINTS: i32 = 5;
pub const KILL_POINTS: i32 = 2;
pub const SELF_POINTS: i32 = 1;

/// Kills within one round that count as a sweep.
pub const SWEEP_KILLS: u32 = 3;

/// Points for finishing 1st through 4th in a match.
pub const PLACEMENT_POINTS: [i32; 4] = [350 * 7, 150 * 7, 70 * 7, 30 * 7];

const FINAL_MULTIPLIER: f64 = 2.5;
const FINAL_EXPONENTIAL: f64 = 1.05;
const FINAL_FREE_MATCHES: usize = 16;

pub fn score(shots: u32, sweeps: u32, kills: u32, self_kills: u32) -> i32 {
    SHOT_POINTS * shots as i32
        + SWEEP_POINTS * sweeps as i32
        + KILL_POINTS * kills as i32
        + SELF_POINTS * self_kills as i32
}

/// Multiplier applied to placement points in the final.
///
/// Tournaments with more than 16 matches before the final pay out
/// `2.5 * 1.05^(matches - 16)`; shorter ones use the flat 2.5.
pub fn final_multiplier(matches_played: usize) -> f64 {
    match matches_played.checked_sub(FINAL_FREE_MATCHES) {
        None | Some(0) => FINAL_MULTIPLIER,
        Some(extra) => FINAL_MULTIPLIER * FINAL_EXPONENTIAL.powi(extra as i32),
    }
}

pub fn placement_score(position: usize, multiplier: f64) -> i32 {
    PLACEMENT_POINTS
        .get(position)
        .map_or(0, |&points| (points as f64 * multiplier) as i32)
}

pub fn skill_score(total_score: i32, matches: u32) -> i32 {
    if matches == 0 {
        0
    } else {
        total_score / matches as i32
    }
}

/// Running counters shared by in-match players and tournament summaries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub shots: u32,
    pub sweeps: u32,
    pub kills: u32,
    pub self_kills: u32,
}

impl Tally {
    pub fn score(&self) -> i32 {
        score(self.shots, self.sweeps, self.kills, self.self_kills)
    }

    pub fn add_shot(&mut self) {
        self.shots += 1;
    }

    pub fn remove_shot(&mut self) {
        self.shots = self.shots.saturating_sub(1);
    }

    pub fn add_sweep(&mut self) {
        self.sweeps += 1;
    }

    /// Adds kills gained in one round; a full round's worth is a sweep.
    pub fn add_kills(&mut self, kills: u32) {
        self.kills += kills;
        if kills >= SWEEP_KILLS {
            self.add_sweep();
        }
    }

    pub fn add_kill(&mut self) {
        self.kills += 1;
    }

    pub fn remove_kill(&mut self) {
        self.kills = self.kills.saturating_sub(1);
    }

    /// Suicides cost a kill, floored at zero.
    pub fn add_self(&mut self) {
        self.self_kills += 1;
        self.remove_kill();
    }

    pub fn merge(&mut self, other: &Tally) {
        self.shots += other.shots;
        self.sweeps += other.sweeps;
        self.kills += other.kills;
        self.self_kills += other.self_kills;
    }
}

impl Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}k {}s {}sw {}sh",
            self.kills, self.self_kills, self.sweeps, self.shots
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(t: &Tally) {
        assert_eq!(
            t.score(),
            3 * t.shots as i32 + 5 * t.sweeps as i32 + 2 * t.kills as i32 + t.self_kills as i32
        );
    }

    #[test]
    fn score_tracks_every_mutation() {
        let mut t = Tally::default();
        check(&t);
        t.add_kill();
        check(&t);
        t.add_kills(3);
        check(&t);
        assert_eq!(t.sweeps, 1);
        t.add_shot();
        check(&t);
        t.add_self();
        check(&t);
        t.remove_shot();
        check(&t);
        assert_eq!(t, Tally { shots: 0, sweeps: 1, kills: 3, self_kills: 1 });
    }

    #[test]
    fn self_kill_never_goes_below_zero_kills() {
        let mut t = Tally::default();
        t.add_self();
        t.add_self();
        assert_eq!(t.kills, 0);
        assert_eq!(t.self_kills, 2);
    }

    #[test]
    fn final_multiplier_is_flat_until_sixteen_matches() {
        assert_eq!(final_multiplier(0), 2.5);
        assert_eq!(final_multiplier(16), 2.5);
        assert!((final_multiplier(17) - 2.625).abs() < 1e-9);
        assert!((final_multiplier(20) - 2.5 * 1.05f64.powi(4)).abs() < 1e-9);
    }

    #[test]
    fn placement_points_scale_and_truncate() {
        assert_eq!(placement_score(0, 1.0), 2450);
        assert_eq!(placement_score(3, 1.0), 210);
        assert_eq!(placement_score(0, 2.5), 6125);
        assert_eq!(placement_score(1, 2.625), 2756);
        assert_eq!(placement_score(4, 1.0), 0);
    }

    #[test]
    fn skill_score_is_average_total() {
        assert_eq!(skill_score(0, 0), 0);
        assert_eq!(skill_score(301, 2), 150);
    }
}
