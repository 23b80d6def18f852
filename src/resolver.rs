//! Résolution de la prochaine occurrence à partir d'un instant.
//!
//! Parcours itératif jour par jour (au plus `scan_days` jours après le jour de
//! `from`). Le jour de semaine utilisé pour les règles est celui de la journée
//! candidate, pas celui de `from`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use tracing::debug;

use crate::cache::PrayerTimeCache;
use crate::calculator::PrayerCalculator;
use crate::error::CoreError;
use crate::model::{DayPrayerTimes, OccurrenceTarget, Prayer, ScheduledOccurrence};
use crate::rules::EnablementRules;
use crate::storage::KeyValueStore;

/// Avant cette heure locale, la nuit de la veille peut encore être en cours.
const EARLY_MORNING_HOUR: u32 = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Filtrer selon les règles d'activation (sinon : prochain repère brut).
    pub use_rules: bool,
    /// 0 = même jour, 1 = aussi le lendemain, 6 = une semaine complète.
    pub scan_days: u8,
    /// Restreint les repères considérés.
    pub prayers: Option<Vec<Prayer>>,
}

impl ResolveOptions {
    pub fn with_rules(scan_days: u8) -> Self {
        Self {
            use_rules: true,
            scan_days,
            prayers: None,
        }
    }

    pub fn bare(scan_days: u8) -> Self {
        Self {
            use_rules: false,
            scan_days,
            prayers: None,
        }
    }

    pub fn only(mut self, prayers: &[Prayer]) -> Self {
        self.prayers = Some(prayers.to_vec());
        self
    }

    /// Repères retenus, dans l'ordre fixe et sans doublon.
    fn prayer_set(&self) -> Vec<Prayer> {
        match &self.prayers {
            None => Prayer::IN_ORDER.to_vec(),
            Some(list) => Prayer::IN_ORDER
                .iter()
                .copied()
                .filter(|p| list.contains(p))
                .collect(),
        }
    }
}

/// Prochaine occurrence ≥ `from`, ou `None` si rien dans l'horizon.
pub fn resolve_next<S, C>(
    cache: &PrayerTimeCache<'_, S, C>,
    from: DateTime<Utc>,
    rules: &EnablementRules,
    options: &ResolveOptions,
) -> Result<Option<ScheduledOccurrence>, CoreError>
where
    S: KeyValueStore + ?Sized,
    C: PrayerCalculator + ?Sized,
{
    let prayers = options.prayer_set();
    if prayers.is_empty() {
        return Ok(None);
    }

    let zone = cache.zone()?;
    let local_from = from.with_timezone(&zone);
    let start_day = local_from.date_naive();

    if local_from.hour() < EARLY_MORNING_HOUR {
        let night: Vec<Prayer> = prayers
            .iter()
            .copied()
            .filter(|p| Prayer::AFTER_MIDNIGHT.contains(p))
            .collect();
        let prev = start_day.pred_opt().filter(|_| !night.is_empty());
        if let Some(prev) = prev {
            let times = cache.get_day(prev)?;
            if let Some(found) = first_match(&times, from, &night, rules, options.use_rules) {
                debug!(prayer = %found.prayer, day = %prev, "resolved from previous night");
                return Ok(Some(found));
            }
        }
    }

    for offset in 0..=i64::from(options.scan_days) {
        let day = start_day + Duration::days(offset);
        let times = cache.get_day(day)?;
        if let Some(found) = first_match(&times, from, &prayers, rules, options.use_rules) {
            return Ok(Some(found));
        }
    }

    debug!(%from, scan_days = options.scan_days, "no occurrence within horizon");
    Ok(None)
}

/// Dernier repère ≤ `at` sur la journée locale de `at`.
pub fn resolve_current<S, C>(
    cache: &PrayerTimeCache<'_, S, C>,
    at: DateTime<Utc>,
    prayers: Option<&[Prayer]>,
) -> Result<Option<ScheduledOccurrence>, CoreError>
where
    S: KeyValueStore + ?Sized,
    C: PrayerCalculator + ?Sized,
{
    let times = cache.get(at)?;
    let found = times
        .iter()
        .filter(|(p, _)| prayers.map_or(true, |list| list.contains(p)))
        .filter(|(_, t)| *t <= at)
        .last()
        .map(|(prayer, t)| occurrence(prayer, t, times.date, false));
    Ok(found)
}

fn first_match(
    times: &DayPrayerTimes,
    from: DateTime<Utc>,
    prayers: &[Prayer],
    rules: &EnablementRules,
    use_rules: bool,
) -> Option<ScheduledOccurrence> {
    let weekday = times.date.weekday();
    prayers
        .iter()
        .copied()
        .find(|p| times.get(*p) >= from && (!use_rules || rules.notify_permits(*p, weekday)))
        .map(|prayer| {
            let play_sound = use_rules && rules.sound_permits(prayer, weekday);
            occurrence(prayer, times.get(prayer), times.date, play_sound)
        })
}

fn occurrence(
    prayer: Prayer,
    at: DateTime<Utc>,
    day: NaiveDate,
    play_sound: bool,
) -> ScheduledOccurrence {
    ScheduledOccurrence {
        target: OccurrenceTarget::Prayer(prayer),
        prayer,
        at,
        day,
        play_sound,
        intrusive: play_sound,
    }
}
