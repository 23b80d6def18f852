use crate::cache::PrayerTimeCache;
use crate::calculator::{PrayerCalculator, TimetableCalculator};
use crate::config::DailyTimes;
use crate::model::{DayPrayerTimes, Prayer};
use crate::storage::KeyValueStore;
use anyhow::{bail, Context};
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Préfixe des journées de grille importées dans le stockage.
pub const TIMETABLE_PREFIX: &str = "TTB_";

const TIMETABLE_HEADER: [&str; 8] = [
    "date", "fajr", "sunrise", "dhuhr", "asr", "sunset", "maghrib", "isha",
];

/// Import d'une grille datée : header `date,fajr,sunrise,dhuhr,asr,sunset,maghrib,isha`
/// (date `YYYY-MM-DD`, heures locales `HH:MM[:SS]`).
pub fn import_timetable_csv<P: AsRef<Path>>(
    path: P,
) -> anyhow::Result<BTreeMap<NaiveDate, DailyTimes>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = BTreeMap::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let row = line + 1;
        let date = NaiveDate::parse_from_str(field(&rec, 0, row)?, "%Y-%m-%d")
            .with_context(|| format!("row {row}: invalid date"))?;
        let time = |i: usize| -> anyhow::Result<NaiveTime> {
            parse_clock(field(&rec, i, row)?).with_context(|| format!("row {row} ({date})"))
        };
        let times = DailyTimes {
            fajr: time(1)?,
            sunrise: time(2)?,
            dhuhr: time(3)?,
            asr: time(4)?,
            sunset: time(5)?,
            maghrib: time(6)?,
            isha: time(7)?,
        };
        if out.insert(date, times).is_some() {
            bail!("duplicate timetable row for {date}");
        }
    }
    Ok(out)
}

fn field(rec: &StringRecord, i: usize, row: usize) -> anyhow::Result<&str> {
    let raw = rec
        .get(i)
        .with_context(|| format!("row {row}: missing {}", TIMETABLE_HEADER[i]))?
        .trim();
    if raw.is_empty() {
        bail!("row {row}: empty {}", TIMETABLE_HEADER[i]);
    }
    Ok(raw)
}

fn parse_clock(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .with_context(|| format!("invalid time: {raw}"))
}

/// Enregistre la grille dans le stockage (`TTB_YYYY-MM-DD`).
pub fn store_timetable<S: KeyValueStore + ?Sized>(
    store: &S,
    rows: &BTreeMap<NaiveDate, DailyTimes>,
) -> anyhow::Result<usize> {
    let mut entries = Vec::with_capacity(rows.len());
    for (date, times) in rows {
        entries.push((
            format!("{TIMETABLE_PREFIX}{date}"),
            serde_json::to_string(times)?,
        ));
    }
    store.set_many(&entries)?;
    Ok(entries.len())
}

/// Reconstruit le calculateur à grille à partir du stockage.
pub fn load_timetable<S: KeyValueStore + ?Sized>(store: &S) -> anyhow::Result<TimetableCalculator> {
    let mut calculator = TimetableCalculator::new();
    for key in store.keys()? {
        let Some(raw_date) = key.strip_prefix(TIMETABLE_PREFIX) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .with_context(|| format!("invalid timetable key {key}"))?;
        let Some(raw) = store.get(&key)? else {
            continue;
        };
        let times: DailyTimes =
            serde_json::from_str(&raw).with_context(|| format!("invalid timetable entry {key}"))?;
        calculator.insert(date, times);
    }
    Ok(calculator)
}

/// Horaires de tout le mois calendaire de `day`, via le cache.
pub fn month_times<S, C>(
    cache: &PrayerTimeCache<'_, S, C>,
    day: NaiveDate,
) -> anyhow::Result<Vec<DayPrayerTimes>>
where
    S: KeyValueStore + ?Sized,
    C: PrayerCalculator + ?Sized,
{
    let first = day.with_day(1).context("invalid month")?;
    first
        .iter_days()
        .take_while(|d| d.month() == first.month())
        .map(|d| cache.get_day(d).with_context(|| format!("prayer times for {d}")))
        .collect()
}

/// Export CSV : header `date,fajr,…,tahajjud`, heures locales `HH:MM`.
pub fn write_month_csv<W: Write>(
    writer: W,
    days: &[DayPrayerTimes],
    zone: FixedOffset,
) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(writer);
    let mut header = vec!["date"];
    header.extend(Prayer::IN_ORDER.iter().map(|p| p.as_str()));
    w.write_record(&header)?;
    for times in days {
        let mut row = vec![times.date.to_string()];
        row.extend(
            times
                .iter()
                .map(|(_, at)| at.with_timezone(&zone).format("%H:%M").to_string()),
        );
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

pub fn export_month_csv<P: AsRef<Path>>(
    path: P,
    days: &[DayPrayerTimes],
    zone: FixedOffset,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_month_csv(file, days, zone)
}

/// Export JSON (jolie mise en forme, instants UTC RFC3339)
pub fn export_month_json<P: AsRef<Path>>(path: P, days: &[DayPrayerTimes]) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(days)?;
    fs::write(path, s)?;
    Ok(())
}
