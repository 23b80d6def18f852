use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AlarmId, ReminderId, ScheduledOccurrence, SoundSelection};

/// Marge ajoutée à un instant congédié pour ne pas réarmer la même occurrence.
pub const DISMISS_EPSILON: Duration = Duration::seconds(10);
/// Délai minimal entre « maintenant » et une pré-alarme.
pub const MIN_PRE_ALARM_DELAY: Duration = Duration::seconds(5);
/// Jours scannés après le jour courant pour l'adhan.
pub const MAIN_SCAN_DAYS: u8 = 7;
/// Jours scannés pour un rappel masqué par jour de semaine.
pub const REMINDER_SCAN_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmKind {
    Main,
    Pre,
}

/// Demande transmise à l'alarm facility ; elle la rend telle quelle au réveil.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    pub id: AlarmId,
    pub kind: AlarmKind,
    pub fire_at: DateTime<Utc>,
    pub occurrence: ScheduledOccurrence,
    pub title: String,
    pub body: String,
    pub sound: Option<SoundSelection>,
    #[serde(default)]
    pub once: bool,
}

impl AlarmRequest {
    /// Alarme principale visée (elle-même pour une alarme principale).
    pub fn target(&self) -> AlarmId {
        self.id.main()
    }
}

/// Cycle de vie d'un identifiant d'alarme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlarmState {
    #[default]
    Idle,
    Scheduled { at: DateTime<Utc> },
    Delivered { at: DateTime<Utc> },
    Dismissed { at: DateTime<Utc> },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    Armed(DateTime<Utc>),
    Delivered(DateTime<Utc>),
    Dismissed(DateTime<Utc>),
    Cancelled,
    Settled,
}

impl AlarmState {
    pub fn apply(self, event: AlarmEvent) -> AlarmState {
        match (self, event) {
            (_, AlarmEvent::Armed(at)) => AlarmState::Scheduled { at },
            (_, AlarmEvent::Delivered(at)) => AlarmState::Delivered { at },
            (_, AlarmEvent::Dismissed(at)) => AlarmState::Dismissed { at },
            (AlarmState::Scheduled { .. }, AlarmEvent::Cancelled) => AlarmState::Cancelled,
            (state, AlarmEvent::Cancelled) => state.settled(),
            (state, AlarmEvent::Settled) => state.settled(),
        }
    }

    /// Les états terminaux retombent sur `Idle`.
    fn settled(self) -> AlarmState {
        match self {
            AlarmState::Scheduled { at } => AlarmState::Scheduled { at },
            _ => AlarmState::Idle,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, AlarmState::Scheduled { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// Aucune notification activée.
    NothingEnabled,
    /// Configuration de calcul absente ou invalide.
    NoConfiguration,
    /// Rien dans l'horizon de recherche.
    NothingToSchedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Armed {
        occurrence: ScheduledOccurrence,
        pre_alarm_at: Option<DateTime<Utc>>,
    },
    Cleared(ClearReason),
    /// Une autre passe est en cours.
    Busy,
}

impl ScheduleOutcome {
    pub fn occurrence(&self) -> Option<&ScheduledOccurrence> {
        match self {
            ScheduleOutcome::Armed { occurrence, .. } => Some(occurrence),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    Armed {
        id: ReminderId,
        occurrence: ScheduledOccurrence,
        pre_alarm_at: Option<DateTime<Utc>>,
    },
    /// Rien d'armable pour cette passe.
    Skipped { id: ReminderId },
    /// Rappel désactivé : alarmes annulées.
    Cancelled { id: ReminderId },
}

/// Réarmement déclenché par un événement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rearm {
    Adhan(ScheduleOutcome),
    Reminders(Vec<ReminderOutcome>),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub playback: Option<PlaybackOutcome>,
    pub rearm: Rearm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsOutcome {
    pub cache_invalidated: bool,
    pub adhan: ScheduleOutcome,
    pub reminders: Vec<ReminderOutcome>,
}
