#![forbid(unsafe_code)]
//! Muezzin — cœur de planification des alarmes de prière (sans UI).
//!
//! - Cache durable des horaires par journée locale, rempli au mois.
//! - Résolution de la prochaine occurrence selon les règles par jour de semaine.
//! - Alarmes adhan + pré-alarmes, rappels relatifs, idempotence par ledger.
//! - Tout en UTC ; la frontière des journées vient du décalage configuré.

pub mod cache;
pub mod calculator;
pub mod config;
pub mod error;
pub mod io;
pub mod ledger;
pub mod model;
pub mod notification;
pub mod resolver;
pub mod rules;
pub mod scheduler;
pub mod storage;

pub use cache::PrayerTimeCache;
pub use calculator::{PrayerCalculator, TimetableCalculator};
pub use config::{AlarmPreferences, CalculationConfig, Coordinates, DailyTimes, Settings};
pub use error::CoreError;
pub use ledger::{DeliveryLedger, StoreLedger};
pub use model::{
    AlarmId, DayPrayerTimes, OccurrenceTarget, OffsetDirection, Prayer, Reminder, ReminderId,
    ScheduledOccurrence, SoundSelection,
};
pub use notification::{AlarmContent, AlarmRenderer, Subject, TextRenderer};
pub use resolver::{resolve_current, resolve_next, ResolveOptions};
pub use rules::{EnablementRule, EnablementRules, PrayerAlarmRule, WeekdayMask};
pub use scheduler::{
    AlarmFacility, AlarmRequest, AlarmScheduler, AlarmState, AudioPlayer, ClearReason,
    InMemoryFacility, ReminderOutcome, ScheduleOutcome, SilentAudio, SingleFlight,
};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StorageError};
