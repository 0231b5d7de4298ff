use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ArcherType, Color};

pub type PersonId = Uuid;

pub const PERMISSION_PRODUCER: i32 = 100;
pub const PERMISSION_COMMENTATOR: i32 = 50;
pub const PERMISSION_JUDGE: i32 = 30;
pub const PERMISSION_PLAYER: i32 = 10;

/// A durable identity. People are never deleted, only disabled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub nick: String,
    pub preferred_color: Option<Color>,
    pub archer_type: ArcherType,
    pub userlevel: i32,
    pub disabled: bool,
    /// Top and bottom line shown on the in-game archer banner.
    pub display_names: [String; 2],
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub name: Option<String>,
    pub nick: Option<String>,
    pub preferred_color: Option<Color>,
    pub archer_type: Option<ArcherType>,
    pub display_names: Option<[String; 2]>,
}

impl Person {
    pub fn new(name: &str, nick: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            nick: nick.to_string(),
            preferred_color: None,
            archer_type: ArcherType::Normal,
            userlevel: PERMISSION_PLAYER,
            disabled: false,
            display_names: [nick.to_uppercase(), String::new()],
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.preferred_color = Some(color);
        self
    }

    pub fn with_userlevel(mut self, userlevel: i32) -> Self {
        self.userlevel = userlevel;
        self
    }

    pub fn apply_settings(&mut self, update: SettingsUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(nick) = update.nick {
            self.nick = nick;
        }
        if let Some(color) = update.preferred_color {
            self.preferred_color = Some(color);
        }
        if let Some(archer_type) = update.archer_type {
            self.archer_type = archer_type;
        }
        if let Some(names) = update.display_names {
            self.display_names = names;
        }
        self.correct();
    }

    /// Fills in display names for people that never set any.
    pub fn correct(&mut self) {
        if self.display_names[0].is_empty() {
            self.display_names[0] = self.nick.to_uppercase();
        }
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn enable(&mut self) {
        self.disabled = false;
    }

    pub fn is_judge(&self) -> bool {
        self.userlevel >= PERMISSION_JUDGE
    }
}

impl Display for Person {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.nick, self.name)
    }
}
