//! Cache durable des horaires, une entrée par journée locale.
//!
//! - Clé : `PTC_` + minuit local en millisecondes epoch.
//! - Un défaut de cache calcule et écrit tout le mois calendaire d'un coup.
//! - L'éviction est paresseuse : chaque remplissage purge ce qui précède
//!   l'horizon de 60 jours.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};

use crate::calculator::{local_instant, PrayerCalculator};
use crate::config::CalculationConfig;
use crate::error::CoreError;
use crate::model::DayPrayerTimes;
use crate::storage::{KeyValueStore, StorageError};

pub const CACHE_PREFIX: &str = "PTC_";
pub const EVICTION_HORIZON_DAYS: i64 = 60;

/// Vue sur le cache : emprunte le stockage, le calculateur et la config.
pub struct PrayerTimeCache<'a, S: ?Sized, C: ?Sized> {
    store: &'a S,
    calculator: &'a C,
    config: &'a CalculationConfig,
}

impl<'a, S, C> PrayerTimeCache<'a, S, C>
where
    S: KeyValueStore + ?Sized,
    C: PrayerCalculator + ?Sized,
{
    pub fn new(store: &'a S, calculator: &'a C, config: &'a CalculationConfig) -> Self {
        Self {
            store,
            calculator,
            config,
        }
    }

    pub fn config(&self) -> &CalculationConfig {
        self.config
    }

    pub fn zone(&self) -> Result<FixedOffset, CoreError> {
        if !self.config.is_minimum_available() {
            return Err(CoreError::unavailable("location or calculation method missing"));
        }
        self.config
            .zone()
            .ok_or_else(|| CoreError::unavailable("invalid utc offset"))
    }

    /// Journée locale contenant `at`.
    pub fn local_day(&self, at: DateTime<Utc>) -> Result<NaiveDate, CoreError> {
        Ok(at.with_timezone(&self.zone()?).date_naive())
    }

    /// Horaires de la journée locale contenant `at`.
    pub fn get(&self, at: DateTime<Utc>) -> Result<DayPrayerTimes, CoreError> {
        let day = self.local_day(at)?;
        self.get_day(day)
    }

    pub fn get_day(&self, day: NaiveDate) -> Result<DayPrayerTimes, CoreError> {
        let zone = self.zone()?;
        let key = day_key(zone, day)?;
        if let Some(hit) = self.read(&key)? {
            return Ok(hit);
        }

        let horizon = day - Duration::days(EVICTION_HORIZON_DAYS);
        self.evict_older_than(horizon)?;
        self.fill_month(day)?;

        match self.read(&key)? {
            Some(filled) => Ok(filled),
            // seule la journée demandée fait échouer la lecture
            None => self.calculator.compute(day, self.config),
        }
    }

    /// Calcule et écrit chaque journée calculable du mois calendaire de `day`.
    /// Les journées sans horaires (grille partielle) sont laissées de côté.
    pub fn fill_month(&self, day: NaiveDate) -> Result<usize, CoreError> {
        let zone = self.zone()?;
        let mut entries = Vec::new();
        for date in month_days(day) {
            let times = match self.calculator.compute(date, self.config) {
                Ok(times) => times,
                Err(err) if err.is_unavailable() => {
                    debug!(%date, %err, "day not computable, left out of the month fill");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if !times.is_monotonic() {
                debug!(%date, "non monotonic prayer times (high latitude?)");
            }
            let json = serde_json::to_string(&times).map_err(StorageError::from)?;
            entries.push((day_key(zone, date)?, json));
        }
        self.store.set_many(&entries)?;
        let month = format!("{}-{:02}", day.year(), day.month());
        info!(%month, days = entries.len(), "cached prayer times");
        Ok(entries.len())
    }

    pub fn invalidate_all(&self) -> Result<usize, CoreError> {
        Ok(invalidate_all(self.store)?)
    }

    /// Supprime les journées antérieures à `day`.
    pub fn evict_older_than(&self, day: NaiveDate) -> Result<usize, CoreError> {
        let cutoff = day_boundary_millis(self.zone()?, day)?;
        let mut evicted = 0usize;
        for key in self.store.keys()? {
            let Some(raw) = key.strip_prefix(CACHE_PREFIX) else {
                continue;
            };
            match raw.parse::<i64>() {
                Ok(millis) if millis < cutoff => {
                    self.store.delete(&key)?;
                    evicted += 1;
                }
                Ok(_) => {}
                Err(_) => {
                    warn!(%key, "dropping unparsable cache key");
                    self.store.delete(&key)?;
                }
            }
        }
        if evicted > 0 {
            debug!(evicted, before = %day, "evicted cached days");
        }
        Ok(evicted)
    }

    fn read(&self, key: &str) -> Result<Option<DayPrayerTimes>, CoreError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(times) => Ok(Some(times)),
            Err(err) => {
                warn!(%key, %err, "corrupt cache entry, recomputing");
                self.store.delete(key)?;
                Ok(None)
            }
        }
    }
}

/// Supprime tout le cache ; à appeler quand la config de calcul change.
pub fn invalidate_all<S: KeyValueStore + ?Sized>(store: &S) -> Result<usize, StorageError> {
    let removed = store.delete_prefix(CACHE_PREFIX)?;
    info!(removed, "prayer time cache invalidated");
    Ok(removed)
}

pub fn day_key(zone: FixedOffset, day: NaiveDate) -> Result<String, CoreError> {
    Ok(format!("{CACHE_PREFIX}{}", day_boundary_millis(zone, day)?))
}

fn day_boundary_millis(zone: FixedOffset, day: NaiveDate) -> Result<i64, CoreError> {
    Ok(local_instant(zone, day, NaiveTime::default())?.timestamp_millis())
}

fn month_days(day: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let (year, month) = (day.year(), day.month());
    let first = day.with_day(1).unwrap_or(day);
    first
        .iter_days()
        .take_while(move |d| d.year() == year && d.month() == month)
}
