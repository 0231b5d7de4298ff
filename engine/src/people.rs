use database::TournamentStore;
use types::{Person, PersonId, SettingsUpdate};

use crate::EngineError;

pub async fn register_person(
    store: &dyn TournamentStore,
    name: &str,
    nick: &str,
) -> Result<Person, EngineError> {
    let person = Person::new(name, nick);
    store.save_person(&person).await?;
    log::info!("Registered {person}");
    Ok(person)
}

pub async fn update_settings(
    store: &dyn TournamentStore,
    id: PersonId,
    update: SettingsUpdate,
) -> Result<Person, EngineError> {
    let mut person = store.get_person(id).await?;
    person.apply_settings(update);
    store.save_person(&person).await?;
    log::debug!("Updated settings for {person}");
    Ok(person)
}

/// Disabled people are never picked at random to fill a roster.
pub async fn set_disabled(
    store: &dyn TournamentStore,
    id: PersonId,
    disabled: bool,
) -> Result<Person, EngineError> {
    let mut person = store.get_person(id).await?;
    if disabled {
        person.disable();
    } else {
        person.enable();
    }
    store.save_person(&person).await?;
    log::info!("{person} is {}", if disabled { "disabled" } else { "enabled" });
    Ok(person)
}
