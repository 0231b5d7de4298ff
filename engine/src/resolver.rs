use database::TournamentStore;
use rand::seq::SliceRandom;
use rand::Rng;
use types::ranking::{self, ConflictCandidate};
use types::{Color, Match};

use crate::EngineError;

/// Loads what decides each contested color and hands out replacements.
///
/// Returns the slots whose color changed. The match is only modified once
/// every contender has been loaded, so a failed lookup leaves it as it was.
pub async fn resolve_colors(
    store: &dyn TournamentStore,
    m: &mut Match,
) -> Result<Vec<usize>, EngineError> {
    let mut groups = Vec::new();
    for (color, slots) in m.color_conflicts() {
        let mut candidates = Vec::with_capacity(slots.len());
        for slot in slots {
            let person_id = m.player(slot)?.person_id;
            let person = store.get_person(person_id).await?;
            let summary = store.player_summary(m.tournament_id, person_id).await?;
            candidates.push(ConflictCandidate {
                slot,
                userlevel: person.userlevel,
                score: summary.skill_score,
            });
        }
        groups.push((color, candidates));
    }

    let mut rng = rand::thread_rng();
    Ok(assign_colors(m, &groups, &mut rng))
}

/// The best ranked contender keeps the color, everybody else draws one
/// that nobody in the match is wearing.
pub fn assign_colors<R: Rng + ?Sized>(
    m: &mut Match,
    groups: &[(Color, Vec<ConflictCandidate>)],
    rng: &mut R,
) -> Vec<usize> {
    let mut changed = Vec::new();
    for (color, candidates) in groups {
        let order = ranking::rank(candidates, ranking::by_color_conflict);
        for &position in order.iter().skip(1) {
            let slot = candidates[position].slot;
            let free = Color::available(&m.colors_in_use());
            let Some(&replacement) = free.choose(rng) else {
                log::warn!("No free color left for slot {slot} in {m}");
                break;
            };
            if m.set_color(slot, replacement).is_ok() {
                log::info!("Slot {slot} in match {} moved from {color} to {replacement}", m.index);
                changed.push(slot);
            }
        }
    }
    changed
}
