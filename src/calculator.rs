use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeMap;

use crate::config::{CalculationConfig, DailyTimes, MidnightMethod};
use crate::error::CoreError;
use crate::model::{DayPrayerTimes, Prayer};

/// Calcul des horaires pour une date locale. Boîte noire pour le cœur :
/// une bibliothèque astronomique se branche ici.
pub trait PrayerCalculator {
    fn compute(&self, date: NaiveDate, config: &CalculationConfig)
        -> Result<DayPrayerTimes, CoreError>;
}

impl<T: PrayerCalculator + ?Sized> PrayerCalculator for &T {
    fn compute(
        &self,
        date: NaiveDate,
        config: &CalculationConfig,
    ) -> Result<DayPrayerTimes, CoreError> {
        (**self).compute(date, config)
    }
}

impl<T: PrayerCalculator + ?Sized> PrayerCalculator for Box<T> {
    fn compute(
        &self,
        date: NaiveDate,
        config: &CalculationConfig,
    ) -> Result<DayPrayerTimes, CoreError> {
        (**self).compute(date, config)
    }
}

/// Milieu et dernier tiers de la nuit.
///
/// La nuit court du coucher jusqu'au Fajr (ou au lever) du lendemain.
pub fn night_markers(
    sunset: DateTime<Utc>,
    next_fajr: DateTime<Utc>,
    next_sunrise: DateTime<Utc>,
    method: MidnightMethod,
    midnight_adjustment_minutes: i32,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = match method {
        MidnightMethod::SunsetToFajr => next_fajr,
        MidnightMethod::SunsetToSunrise => next_sunrise,
    };
    let night = end - sunset;
    let midnight =
        sunset + night / 2 + Duration::minutes(i64::from(midnight_adjustment_minutes));
    let tahajjud = sunset + (night * 2) / 3;
    (midnight, tahajjud)
}

/// Calculateur à grille fixe : horaires quotidiens de la config, remplacés
/// date par date par une grille importée.
#[derive(Debug, Clone, Default)]
pub struct TimetableCalculator {
    overrides: BTreeMap<NaiveDate, DailyTimes>,
}

impl TimetableCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: BTreeMap<NaiveDate, DailyTimes>) -> Self {
        Self { overrides }
    }

    pub fn insert(&mut self, date: NaiveDate, times: DailyTimes) {
        self.overrides.insert(date, times);
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    fn times_for(&self, date: NaiveDate, config: &CalculationConfig) -> Option<DailyTimes> {
        self.overrides.get(&date).copied().or(config.fixed_times)
    }
}

impl PrayerCalculator for TimetableCalculator {
    fn compute(
        &self,
        date: NaiveDate,
        config: &CalculationConfig,
    ) -> Result<DayPrayerTimes, CoreError> {
        if !config.is_minimum_available() {
            return Err(CoreError::unavailable("location or calculation method missing"));
        }
        let zone = config
            .zone()
            .ok_or_else(|| CoreError::unavailable("invalid utc offset"))?;
        let next_date = date
            .succ_opt()
            .ok_or_else(|| CoreError::unavailable("date overflow"))?;
        let today = self
            .times_for(date, config)
            .ok_or_else(|| CoreError::unavailable(format!("no timetable entry for {date}")))?;
        let tomorrow = self.times_for(next_date, config).unwrap_or(today);

        let at = |day: NaiveDate, time: NaiveTime, prayer: Prayer| -> Result<DateTime<Utc>, CoreError> {
            let local = local_instant(zone, day, time)?;
            Ok(local + Duration::minutes(i64::from(config.adjustments.minutes(prayer))))
        };

        let sunset = at(date, today.sunset, Prayer::Sunset)?;
        let (midnight, tahajjud) = night_markers(
            sunset,
            at(next_date, tomorrow.fajr, Prayer::Fajr)?,
            at(next_date, tomorrow.sunrise, Prayer::Sunrise)?,
            config.midnight_method,
            config.adjustments.midnight,
        );

        Ok(DayPrayerTimes {
            date,
            fajr: at(date, today.fajr, Prayer::Fajr)?,
            sunrise: at(date, today.sunrise, Prayer::Sunrise)?,
            dhuhr: at(date, today.dhuhr, Prayer::Dhuhr)?,
            asr: at(date, today.asr, Prayer::Asr)?,
            sunset,
            maghrib: at(date, today.maghrib, Prayer::Maghrib)?,
            isha: at(date, today.isha, Prayer::Isha)?,
            midnight,
            tahajjud,
        })
    }
}

/// Instant UTC d'une heure locale.
pub fn local_instant(
    zone: FixedOffset,
    day: NaiveDate,
    time: NaiveTime,
) -> Result<DateTime<Utc>, CoreError> {
    zone.from_local_datetime(&day.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| CoreError::unavailable(format!("ambiguous local time {day} {time}")))
}
