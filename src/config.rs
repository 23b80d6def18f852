//! Instantané de configuration consommé par le cœur.
//!
//! Les écrans de réglages (hors périmètre) produisent un [`Settings`] ; le
//! cœur ne fait que le lire, à l'exception de la liste des rappels « une fois »
//! désactivés après planification.

use anyhow::Context;
use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::model::{sort_reminders, Prayer, Reminder, SoundSelection};
use crate::rules::EnablementRules;

/// Latitude au-delà de laquelle la méthode `Turkey` est plafonnée.
const TURKEY_MAX_LATITUDE: f64 = 62.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.long.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.long)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighLatitudeRule {
    MiddleOfTheNight,
    SeventhOfTheNight,
    TwilightAngle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Madhab {
    #[default]
    Shafi,
    Hanafi,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shafaq {
    #[default]
    General,
    Ahmer,
    Abyad,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolarCircleResolution {
    #[default]
    Unresolved,
    AqrabBalad,
    AqrabYaum,
}

/// Bornes de la nuit utilisées pour Midnight et Tahajjud.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidnightMethod {
    #[default]
    SunsetToFajr,
    SunsetToSunrise,
}

/// Surcharges d'angles / intervalles de la méthode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleOverrides {
    #[serde(default)]
    pub fajr_angle: Option<f64>,
    #[serde(default)]
    pub isha_angle: Option<f64>,
    #[serde(default)]
    pub maghrib_angle: Option<f64>,
    /// minutes après le maghrib
    #[serde(default)]
    pub isha_interval: Option<u32>,
}

/// Ajustements manuels, en minutes, par repère.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    pub fajr: i32,
    pub sunrise: i32,
    pub dhuhr: i32,
    pub asr: i32,
    pub sunset: i32,
    pub maghrib: i32,
    pub isha: i32,
    pub midnight: i32,
}

impl Adjustments {
    pub fn minutes(&self, prayer: Prayer) -> i32 {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Sunrise => self.sunrise,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Sunset => self.sunset,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
            Prayer::Midnight => self.midnight,
            Prayer::Tahajjud => 0,
        }
    }
}

/// Horaires locaux fixes d'une journée (grille de mosquée).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTimes {
    pub fajr: NaiveTime,
    pub sunrise: NaiveTime,
    pub dhuhr: NaiveTime,
    pub asr: NaiveTime,
    pub sunset: NaiveTime,
    pub maghrib: NaiveTime,
    pub isha: NaiveTime,
}

/// Paramètres de calcul. Toute modification invalide le cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationConfig {
    pub location: Option<Coordinates>,
    /// Identifiant de méthode (`MuslimWorldLeague`, `Turkey`, `Fixed`…)
    pub method: Option<String>,
    pub overrides: AngleOverrides,
    pub high_latitude_rule: Option<HighLatitudeRule>,
    pub madhab: Madhab,
    pub shafaq: Shafaq,
    pub polar_resolution: PolarCircleResolution,
    pub midnight_method: MidnightMethod,
    pub adjustments: Adjustments,
    /// Décalage local en minutes ; définit la frontière des journées.
    ///
    /// Décalage fixe, sans heure d'été : lors d'un changement d'heure, le
    /// minuit local calculé est décalé d'une heure tant que la config n'est
    /// pas mise à jour (ce qui invalide le cache).
    pub utc_offset_minutes: i32,
    /// Grille fixe servie par `TimetableCalculator`.
    pub fixed_times: Option<DailyTimes>,
}

impl CalculationConfig {
    /// Configuration minimale : position valide, méthode, décalage valide.
    pub fn is_minimum_available(&self) -> bool {
        let located = self.location.map(|c| c.is_valid()).unwrap_or(false);
        let has_method = self
            .method
            .as_deref()
            .map(|m| !m.trim().is_empty())
            .unwrap_or(false);
        located && has_method && self.zone().is_some()
    }

    pub fn zone(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Coordonnées à transmettre au calculateur (plafonnées pour `Turkey`).
    pub fn effective_coordinates(&self) -> Option<Coordinates> {
        let mut coords = self.location?;
        if self.method.as_deref() == Some("Turkey") && coords.lat >= TURKEY_MAX_LATITUDE {
            coords.lat = TURKEY_MAX_LATITUDE;
        }
        Some(coords)
    }
}

/// Préférences d'alarme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmPreferences {
    pub pre_alarm_minutes_before: u32,
    pub dont_notify_upcoming: bool,
    pub dont_turn_on_screen: bool,
    pub show_next_prayer_time: bool,
    pub adhan_sound: Option<SoundSelection>,
}

impl Default for AlarmPreferences {
    fn default() -> Self {
        Self {
            pre_alarm_minutes_before: 60,
            dont_notify_upcoming: false,
            dont_turn_on_screen: false,
            show_next_prayer_time: false,
            adhan_sound: None,
        }
    }
}

/// Instantané complet lu par le planificateur.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub calculation: CalculationConfig,
    pub rules: EnablementRules,
    pub preferences: AlarmPreferences,
    pub reminders: Vec<Reminder>,
}

impl Settings {
    /// Charge un fichier JSON ; absent ⇒ réglages par défaut.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let mut settings: Settings = serde_json::from_slice(&data)
            .with_context(|| format!("parsing {}", path.display()))?;
        settings.rules.reconcile();
        sort_reminders(&mut settings.reminders);
        Ok(settings)
    }

    /// Sauvegarde de manière atomique.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).with_context(|| "creating temp file")?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).with_context(|| "atomic rename")?;
        Ok(())
    }

    /// Ajoute ou remplace un rappel en gardant l'ordre d'affichage.
    pub fn save_reminder(&mut self, reminder: Reminder) {
        match self.reminders.iter_mut().find(|r| r.id == reminder.id) {
            Some(existing) => *existing = reminder,
            None => self.reminders.push(reminder),
        }
        sort_reminders(&mut self.reminders);
    }

    pub fn delete_reminder(&mut self, id: &str) -> Option<Reminder> {
        let pos = self.reminders.iter().position(|r| r.id.as_str() == id)?;
        Some(self.reminders.remove(pos))
    }
}
