// src/jutsu_registry.rs
//
// Named hand-sign sequences. The built-in set is fixed; configuration
// can add new jutsus or replace a built-in one by name.

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JutsuDefinition {
    pub name: String,
    pub sequence: Vec<String>,
    #[serde(default)]
    pub display_text: String,
    #[serde(default)]
    pub effect: Option<String>,
}

impl JutsuDefinition {
    fn builtin(name: &str, sequence: &[&str], display_text: &str, effect: &str) -> Self {
        Self {
            name: name.to_string(),
            sequence: sequence.iter().map(|s| s.to_string()).collect(),
            display_text: display_text.to_string(),
            effect: Some(effect.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JutsuRegistry {
    jutsus: Vec<JutsuDefinition>,
}

impl JutsuRegistry {
    pub fn builtin() -> Self {
        let jutsus = vec![
            JutsuDefinition::builtin(
                "Fireball",
                &["horse", "snake", "ram", "monkey", "boar", "horse", "tiger"],
                "KATON: GOUKAKYUU NO JUTSU!!",
                "fire",
            ),
            JutsuDefinition::builtin(
                "Chidori",
                &["ox", "hare", "monkey"],
                "CHIDORI: KAZUSA NO JUTSU!",
                "lightning",
            ),
            JutsuDefinition::builtin(
                "Water Dragon",
                &[
                    "ox", "monkey", "hare", "rat", "boar", "bird", "ox", "horse", "bird",
                ],
                "Water Dragon Bullet!",
                "water",
            ),
            JutsuDefinition::builtin(
                "Shadow Clone",
                &["ram", "snake", "tiger"],
                "Kage Bunshin no Jutsu!",
                "clone",
            ),
            JutsuDefinition::builtin(
                "Phoenix Flower",
                &["rat", "tiger", "dog", "ox", "hare", "tiger"],
                "Phoenix Sage Fire!",
                "fire",
            ),
            JutsuDefinition::builtin(
                "Sharingan",
                &["snake", "ram", "monkey", "boar", "horse", "tiger"],
                "SHARINGAN!",
                "eye",
            ),
            JutsuDefinition::builtin("Rasengan", &["ram"], "RASENGAN!", "rasengan"),
        ];
        Self { jutsus }
    }

    /// Built-ins with `extra` merged in; same name (any case) replaces
    pub fn with_overrides(extra: &[JutsuDefinition]) -> Self {
        let mut registry = Self::builtin();
        for def in extra {
            match registry
                .jutsus
                .iter_mut()
                .find(|j| j.name.eq_ignore_ascii_case(&def.name))
            {
                Some(existing) => {
                    info!("Jutsu '{}' overridden by configuration", def.name);
                    *existing = def.clone();
                }
                None => {
                    info!("Jutsu '{}' added by configuration", def.name);
                    registry.jutsus.push(def.clone());
                }
            }
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&JutsuDefinition> {
        self.jutsus
            .iter()
            .find(|j| j.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.jutsus.iter().map(|j| j.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.jutsus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jutsus.is_empty()
    }

    /// Jutsu after `name`, wrapping around
    pub fn next(&self, name: &str) -> Option<&JutsuDefinition> {
        self.cycle(name, 1)
    }

    /// Jutsu before `name`, wrapping around
    pub fn previous(&self, name: &str) -> Option<&JutsuDefinition> {
        self.cycle(name, self.jutsus.len().saturating_sub(1))
    }

    fn cycle(&self, name: &str, step: usize) -> Option<&JutsuDefinition> {
        let idx = self
            .jutsus
            .iter()
            .position(|j| j.name.eq_ignore_ascii_case(name))?;
        self.jutsus.get((idx + step) % self.jutsus.len())
    }
}

impl Default for JutsuRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
