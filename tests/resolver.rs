#![forbid(unsafe_code)]
mod common;

use common::{config, utc};
use muezzin::{
    resolve_current, resolve_next, EnablementRule, EnablementRules, MemoryStore, Prayer,
    PrayerTimeCache, ResolveOptions, TimetableCalculator,
};

fn rules(entries: &[(Prayer, &str, &str)]) -> EnablementRules {
    let mut rules = EnablementRules::new();
    for (prayer, notify, sound) in entries {
        rules.set_notify(*prayer, EnablementRule::parse(notify).unwrap());
        rules.set_sound(*prayer, EnablementRule::parse(sound).unwrap());
    }
    rules
}

#[test]
fn bare_resolution_ignores_rules() {
    let store = MemoryStore::new();
    let calc = TimetableCalculator::new();
    let cfg = config(0);
    let cache = PrayerTimeCache::new(&store, &calc, &cfg);

    let found = resolve_next(
        &cache,
        utc(2025, 10, 6, 10, 0),
        &EnablementRules::new(),
        &ResolveOptions::bare(0),
    )
    .unwrap()
    .unwrap();
    assert_eq!(found.prayer, Prayer::Dhuhr);
    assert_eq!(found.at, utc(2025, 10, 6, 12, 30));
    assert!(!found.play_sound);
}

#[test]
fn monday_only_rules_skip_to_next_monday() {
    let store = MemoryStore::new();
    let calc = TimetableCalculator::new();
    let cfg = config(0);
    let cache = PrayerTimeCache::new(&store, &calc, &cfg);
    let rules = rules(&[(Prayer::Fajr, "mon", "off"), (Prayer::Dhuhr, "mon", "off")]);

    // mardi 7 octobre 2025
    let found = resolve_next(
        &cache,
        utc(2025, 10, 7, 0, 0),
        &rules,
        &ResolveOptions::with_rules(7),
    )
    .unwrap()
    .unwrap();
    assert_eq!(found.prayer, Prayer::Fajr);
    assert_eq!(found.at, utc(2025, 10, 13, 5, 0));
}

#[test]
fn sunday_night_resolves_monday_fajr_with_sound() {
    let store = MemoryStore::new();
    let calc = TimetableCalculator::new();
    let cfg = config(0);
    let cache = PrayerTimeCache::new(&store, &calc, &cfg);
    let rules = rules(&[(Prayer::Fajr, "on", "mon,wed,fri")]);

    // dimanche 5 octobre 2025, 23:00
    let found = resolve_next(
        &cache,
        utc(2025, 10, 5, 23, 0),
        &rules,
        &ResolveOptions::with_rules(1),
    )
    .unwrap()
    .unwrap();
    assert_eq!(found.at, utc(2025, 10, 6, 5, 0));
    assert!(found.play_sound);

    // mardi : notification sans son
    let tuesday = resolve_next(
        &cache,
        utc(2025, 10, 6, 23, 0),
        &rules,
        &ResolveOptions::with_rules(1),
    )
    .unwrap()
    .unwrap();
    assert_eq!(tuesday.at, utc(2025, 10, 7, 5, 0));
    assert!(!tuesday.play_sound);
    assert!(tuesday.is_silent());
}

#[test]
fn exhausted_scan_returns_none() {
    let store = MemoryStore::new();
    let calc = TimetableCalculator::new();
    let cfg = config(0);
    let cache = PrayerTimeCache::new(&store, &calc, &cfg);
    let rules = rules(&[(Prayer::Asr, "sat", "off")]);

    let none = resolve_next(
        &cache,
        utc(2025, 10, 6, 16, 0),
        &rules,
        &ResolveOptions::with_rules(3),
    )
    .unwrap();
    assert!(none.is_none());

    let found = resolve_next(
        &cache,
        utc(2025, 10, 6, 16, 0),
        &rules,
        &ResolveOptions::with_rules(5),
    )
    .unwrap()
    .unwrap();
    assert_eq!(found.at, utc(2025, 10, 11, 15, 30));
}

#[test]
fn early_morning_checks_previous_night() {
    let store = MemoryStore::new();
    let calc = TimetableCalculator::new();
    let cfg = config(0);
    let cache = PrayerTimeCache::new(&store, &calc, &cfg);

    // Tahajjud du 5 tombe le 6 à 01:30
    let found = resolve_next(
        &cache,
        utc(2025, 10, 6, 1, 0),
        &EnablementRules::new(),
        &ResolveOptions::bare(0),
    )
    .unwrap()
    .unwrap();
    assert_eq!(found.prayer, Prayer::Tahajjud);
    assert_eq!(found.day, common::date(2025, 10, 5));
    assert_eq!(found.at, utc(2025, 10, 6, 1, 30));

    let restricted = resolve_next(
        &cache,
        utc(2025, 10, 6, 1, 0),
        &EnablementRules::new(),
        &ResolveOptions::bare(0).only(&[Prayer::Fajr]),
    )
    .unwrap()
    .unwrap();
    assert_eq!(restricted.prayer, Prayer::Fajr);
}

#[test]
fn missing_configuration_is_reported_as_unavailable() {
    let store = MemoryStore::new();
    let calc = TimetableCalculator::new();
    let cfg = muezzin::CalculationConfig::default();
    let cache = PrayerTimeCache::new(&store, &calc, &cfg);

    let err = resolve_next(
        &cache,
        utc(2025, 10, 6, 10, 0),
        &EnablementRules::new(),
        &ResolveOptions::bare(1),
    )
    .unwrap_err();
    assert!(err.is_unavailable());
}

#[test]
fn current_prayer_is_latest_before_instant() {
    let store = MemoryStore::new();
    let calc = TimetableCalculator::new();
    let cfg = config(0);
    let cache = PrayerTimeCache::new(&store, &calc, &cfg);

    let current = resolve_current(&cache, utc(2025, 10, 6, 16, 0), None)
        .unwrap()
        .unwrap();
    assert_eq!(current.prayer, Prayer::Asr);

    let before_fajr = resolve_current(&cache, utc(2025, 10, 6, 4, 0), None).unwrap();
    assert!(before_fajr.is_none());
}
