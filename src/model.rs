use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::rules::EnablementRule;

/// Repères horaires d'une journée, dans l'ordre fixe de résolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prayer {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Sunset,
    Maghrib,
    Isha,
    /// milieu de la nuit
    Midnight,
    /// dernier tiers de la nuit
    Tahajjud,
}

impl Prayer {
    pub const IN_ORDER: [Prayer; 9] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Sunset,
        Prayer::Maghrib,
        Prayer::Isha,
        Prayer::Midnight,
        Prayer::Tahajjud,
    ];

    /// Repères qui peuvent tomber après minuit local.
    pub const AFTER_MIDNIGHT: [Prayer; 2] = [Prayer::Midnight, Prayer::Tahajjud];

    pub fn as_str(&self) -> &'static str {
        match self {
            Prayer::Fajr => "fajr",
            Prayer::Sunrise => "sunrise",
            Prayer::Dhuhr => "dhuhr",
            Prayer::Asr => "asr",
            Prayer::Sunset => "sunset",
            Prayer::Maghrib => "maghrib",
            Prayer::Isha => "isha",
            Prayer::Midnight => "midnight",
            Prayer::Tahajjud => "tahajjud",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Sunrise => "Sunrise",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Sunset => "Sunset",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
            Prayer::Midnight => "Midnight",
            Prayer::Tahajjud => "Tahajjud",
        }
    }

    /// Position dans `IN_ORDER`.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Prayer::IN_ORDER
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown prayer: {s}"))
    }
}

/// Horaires d'une journée locale (instants stockés en UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPrayerTimes {
    pub date: NaiveDate,
    pub fajr: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub dhuhr: DateTime<Utc>,
    pub asr: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub maghrib: DateTime<Utc>,
    pub isha: DateTime<Utc>,
    pub midnight: DateTime<Utc>,
    pub tahajjud: DateTime<Utc>,
}

impl DayPrayerTimes {
    pub fn get(&self, prayer: Prayer) -> DateTime<Utc> {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Sunrise => self.sunrise,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Sunset => self.sunset,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
            Prayer::Midnight => self.midnight,
            Prayer::Tahajjud => self.tahajjud,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Prayer, DateTime<Utc>)> + '_ {
        Prayer::IN_ORDER.iter().map(move |p| (*p, self.get(*p)))
    }

    /// Vérifie l'ordre Fajr ≤ … ≤ Midnight ≤ Tahajjud.
    pub fn is_monotonic(&self) -> bool {
        let times: Vec<DateTime<Utc>> = self.iter().map(|(_, t)| t).collect();
        times.windows(2).all(|w| w[0] <= w[1])
    }
}

/// Identifiant d'une alarme auprès de l'alarm facility.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlarmId(String);

impl AlarmId {
    pub const ADHAN: &'static str = "adhan";
    const PRE_PREFIX: &'static str = "pre-";

    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn adhan() -> Self {
        Self::new(Self::ADHAN)
    }
    pub fn for_reminder(id: &ReminderId) -> Self {
        Self::new(id.as_str())
    }
    /// Identifiant de la pré-alarme associée.
    pub fn pre(&self) -> Self {
        Self(format!("{}{}", Self::PRE_PREFIX, self.0))
    }
    pub fn is_pre(&self) -> bool {
        self.0.starts_with(Self::PRE_PREFIX)
    }
    /// Pour une pré-alarme, l'alarme principale visée.
    pub fn main(&self) -> Self {
        match self.0.strip_prefix(Self::PRE_PREFIX) {
            Some(rest) => Self::new(rest),
            None => self.clone(),
        }
    }
    pub fn is_adhan(&self) -> bool {
        self.main().0 == Self::ADHAN
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cible d'une occurrence : repère de prière ou rappel utilisateur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccurrenceTarget {
    Prayer(Prayer),
    Reminder(ReminderId),
}

/// Occurrence résolue, prête à être armée.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledOccurrence {
    pub target: OccurrenceTarget,
    pub prayer: Prayer,
    pub at: DateTime<Utc>,
    /// Journée locale dont l'horaire est issu.
    pub day: NaiveDate,
    pub play_sound: bool,
    /// Réveille l'écran (sinon notification silencieuse).
    pub intrusive: bool,
}

impl ScheduledOccurrence {
    pub fn is_silent(&self) -> bool {
        !self.play_sound
    }
}

/// Son joué par une alarme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundSelection {
    pub id: String,
    pub uri: String,
}

/// Identifiant fort pour Reminder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReminderId(String);

impl ReminderId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetDirection {
    Before,
    After,
}

impl FromStr for OffsetDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" | "-" => Ok(OffsetDirection::Before),
            "after" | "+" => Ok(OffsetDirection::After),
            other => Err(format!("unknown offset direction: {other}")),
        }
    }
}

/// Rappel défini par l'utilisateur, relatif à une prière.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub prayer: Prayer,
    pub minutes: u32,
    pub direction: OffsetDirection,
    #[serde(default)]
    pub sound: Option<SoundSelection>,
    #[serde(default)]
    pub once: bool,
    #[serde(default = "default_days")]
    pub days: EnablementRule,
}

fn default_enabled() -> bool {
    true
}

fn default_days() -> EnablementRule {
    EnablementRule::On
}

impl Reminder {
    pub fn new(prayer: Prayer, minutes: u32, direction: OffsetDirection) -> Self {
        Self {
            id: ReminderId::random(),
            label: None,
            enabled: true,
            prayer,
            minutes,
            direction,
            sound: None,
            once: false,
            days: EnablementRule::On,
        }
    }

    /// Décalage signé appliqué à l'horaire de la prière.
    pub fn signed_offset(&self) -> Duration {
        let d = Duration::minutes(i64::from(self.minutes));
        match self.direction {
            OffsetDirection::Before => -d,
            OffsetDirection::After => d,
        }
    }

    pub fn alarm_id(&self) -> AlarmId {
        AlarmId::for_reminder(&self.id)
    }
}

/// Tri d'affichage : ordre des prières, puis « avant » (le plus éloigné d'abord)
/// devant « après » (le plus proche d'abord).
pub fn sort_reminders(reminders: &mut [Reminder]) {
    reminders.sort_by(|a, b| {
        a.prayer.cmp(&b.prayer).then_with(|| match (a.direction, b.direction) {
            (OffsetDirection::Before, OffsetDirection::Before) => b.minutes.cmp(&a.minutes),
            (OffsetDirection::After, OffsetDirection::After) => a.minutes.cmp(&b.minutes),
            (OffsetDirection::Before, OffsetDirection::After) => std::cmp::Ordering::Less,
            (OffsetDirection::After, OffsetDirection::Before) => std::cmp::Ordering::Greater,
        })
    });
}
