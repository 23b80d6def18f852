//! Règles d'activation par prière et par jour de semaine.
//!
//! Une règle vaut `Off`, `On` ou un masque de jours (dimanche = 0 … samedi = 6).
//! Le son implique la notification : toute mise à jour passe par les fonctions
//! de réconciliation ci-dessous, jamais par mutation directe.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::Prayer;

/// Masque de 7 booléens indépendants, bit `n` = jour `n` (dimanche = 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdayMask(u8);

impl WeekdayMask {
    pub const EMPTY: WeekdayMask = WeekdayMask(0);
    pub const FULL: WeekdayMask = WeekdayMask(0b0111_1111);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::FULL.0)
    }

    pub fn from_days<I: IntoIterator<Item = Weekday>>(days: I) -> Self {
        days.into_iter()
            .fold(Self::EMPTY, |mask, day| mask.with(day, true))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn with(self, day: Weekday, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | Self::bit(day))
        } else {
            Self(self.0 & !Self::bit(day))
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_full(&self) -> bool {
        self.0 == Self::FULL.0
    }

    /// Parse `"sun,mon,fri"` ou `"0,1,5"`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(parse_weekday)
            .try_fold(Self::EMPTY, |mask, day| day.map(|d| mask.with(d, true)))
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_sunday()
    }
}

fn parse_weekday(raw: &str) -> Result<Weekday, String> {
    if let Ok(idx) = raw.parse::<u8>() {
        return match idx {
            0 => Ok(Weekday::Sun),
            1 => Ok(Weekday::Mon),
            2 => Ok(Weekday::Tue),
            3 => Ok(Weekday::Wed),
            4 => Ok(Weekday::Thu),
            5 => Ok(Weekday::Fri),
            6 => Ok(Weekday::Sat),
            _ => Err(format!("weekday index out of range: {idx}")),
        };
    }
    raw.parse::<Weekday>()
        .map_err(|_| format!("invalid weekday: {raw}"))
}

/// Activation d'une prière pour un type d'alarme (notification ou son).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnablementRule {
    #[default]
    Off,
    On,
    Masked(WeekdayMask),
}

impl EnablementRule {
    pub fn permits(&self, day: Weekday) -> bool {
        match self {
            EnablementRule::Off => false,
            EnablementRule::On => true,
            EnablementRule::Masked(mask) => mask.contains(day),
        }
    }

    /// Vrai si au moins un jour est autorisé.
    pub fn is_enabled(&self) -> bool {
        !self.as_mask().is_empty()
    }

    pub fn as_mask(&self) -> WeekdayMask {
        match self {
            EnablementRule::Off => WeekdayMask::EMPTY,
            EnablementRule::On => WeekdayMask::FULL,
            EnablementRule::Masked(mask) => *mask,
        }
    }

    /// Masque vide ⇒ `Off`, masque complet ⇒ `On`.
    pub fn normalized(self) -> Self {
        Self::from_mask(self.as_mask())
    }

    pub fn from_mask(mask: WeekdayMask) -> Self {
        if mask.is_empty() {
            EnablementRule::Off
        } else if mask.is_full() {
            EnablementRule::On
        } else {
            EnablementRule::Masked(mask)
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self::from_mask(self.as_mask().union(other.as_mask()))
    }

    pub fn intersection(self, other: Self) -> Self {
        Self::from_mask(self.as_mask().intersection(other.as_mask()))
    }

    /// `"on"`, `"off"` ou une liste de jours.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "all" => Ok(EnablementRule::On),
            "off" | "false" | "none" => Ok(EnablementRule::Off),
            days => WeekdayMask::parse(days).map(Self::from_mask),
        }
    }
}

/// Paire notification + son pour une prière.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerAlarmRule {
    #[serde(default)]
    pub notify: EnablementRule,
    #[serde(default)]
    pub sound: EnablementRule,
}

impl PrayerAlarmRule {
    /// Le son étend la notification aux mêmes jours.
    pub fn with_sound(self, sound: EnablementRule) -> Self {
        let sound = sound.normalized();
        Self {
            notify: self.notify.union(sound),
            sound,
        }
    }

    /// La notification restreint le son aux jours qu'elle garde.
    pub fn with_notify(self, notify: EnablementRule) -> Self {
        let notify = notify.normalized();
        Self {
            notify,
            sound: self.sound.intersection(notify),
        }
    }

    /// Rétablit `sound ⊆ notify` en élargissant la notification.
    pub fn reconciled(self) -> Self {
        self.with_sound(self.sound)
    }
}

/// Règles de toutes les prières, absentes = `Off`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnablementRules {
    rules: BTreeMap<Prayer, PrayerAlarmRule>,
}

impl EnablementRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(&self, prayer: Prayer) -> PrayerAlarmRule {
        self.rules.get(&prayer).copied().unwrap_or_default()
    }

    pub fn notify_permits(&self, prayer: Prayer, day: Weekday) -> bool {
        self.rule(prayer).notify.permits(day)
    }

    pub fn sound_permits(&self, prayer: Prayer, day: Weekday) -> bool {
        self.rule(prayer).sound.permits(day)
    }

    pub fn set_notify(&mut self, prayer: Prayer, notify: EnablementRule) {
        let updated = self.rule(prayer).with_notify(notify);
        self.store(prayer, updated);
    }

    pub fn set_sound(&mut self, prayer: Prayer, sound: EnablementRule) {
        let updated = self.rule(prayer).with_sound(sound);
        self.store(prayer, updated);
    }

    pub fn any_notification_enabled(&self) -> bool {
        self.rules.values().any(|r| r.notify.is_enabled())
    }

    /// Réconcilie toutes les règles (après un chargement par exemple).
    pub fn reconcile(&mut self) {
        let prayers: Vec<Prayer> = self.rules.keys().copied().collect();
        for prayer in prayers {
            let updated = self.rule(prayer).reconciled();
            self.store(prayer, updated);
        }
    }

    fn store(&mut self, prayer: Prayer, rule: PrayerAlarmRule) {
        if rule == PrayerAlarmRule::default() {
            self.rules.remove(&prayer);
        } else {
            self.rules.insert(prayer, rule);
        }
    }
}
