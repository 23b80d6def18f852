#![allow(dead_code)]
use std::cell::Cell;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use muezzin::{
    config::{CalculationConfig, Coordinates, DailyTimes},
    CoreError, DayPrayerTimes, PrayerCalculator, Settings, TimetableCalculator,
};

pub fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Fajr 05:00, Sunrise 06:30, Dhuhr 12:30, Asr 15:30, Sunset 18:30,
/// Maghrib 18:35, Isha 20:00 ; Midnight 23:45, Tahajjud 01:30 (+1 jour).
pub fn daily() -> DailyTimes {
    DailyTimes {
        fajr: hm(5, 0),
        sunrise: hm(6, 30),
        dhuhr: hm(12, 30),
        asr: hm(15, 30),
        sunset: hm(18, 30),
        maghrib: hm(18, 35),
        isha: hm(20, 0),
    }
}

pub fn config(utc_offset_minutes: i32) -> CalculationConfig {
    CalculationConfig {
        location: Some(Coordinates {
            lat: 48.85,
            long: 2.35,
        }),
        method: Some("Fixed".to_string()),
        utc_offset_minutes,
        fixed_times: Some(daily()),
        ..CalculationConfig::default()
    }
}

pub fn settings() -> Settings {
    Settings {
        calculation: config(0),
        ..Settings::default()
    }
}

/// Compte les appels au calculateur.
#[derive(Default)]
pub struct CountingCalculator {
    inner: TimetableCalculator,
    pub calls: Cell<usize>,
}

impl PrayerCalculator for CountingCalculator {
    fn compute(
        &self,
        date: NaiveDate,
        config: &CalculationConfig,
    ) -> Result<DayPrayerTimes, CoreError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.compute(date, config)
    }
}
