#![forbid(unsafe_code)]
use chrono::Weekday;
use muezzin::{EnablementRule, EnablementRules, Prayer, PrayerAlarmRule, WeekdayMask};

fn mwf() -> EnablementRule {
    EnablementRule::Masked(WeekdayMask::from_days([
        Weekday::Mon,
        Weekday::Wed,
        Weekday::Fri,
    ]))
}

#[test]
fn mask_bits_start_on_sunday() {
    let mask = WeekdayMask::parse("sun,mon").unwrap();
    assert_eq!(mask.bits(), 0b11);
    assert_eq!(WeekdayMask::parse("0,6").unwrap().bits(), 0b100_0001);
    assert!(WeekdayMask::parse("someday").is_err());
}

#[test]
fn full_and_empty_masks_collapse() {
    assert_eq!(
        EnablementRule::Masked(WeekdayMask::FULL).normalized(),
        EnablementRule::On
    );
    assert_eq!(
        EnablementRule::Masked(WeekdayMask::EMPTY).normalized(),
        EnablementRule::Off
    );
    assert_eq!(EnablementRule::parse("mon,wed,fri").unwrap(), mwf());
    assert_eq!(
        EnablementRule::parse("sun,mon,tue,wed,thu,fri,sat").unwrap(),
        EnablementRule::On
    );
}

#[test]
fn enabling_sound_enables_notification_on_same_days() {
    let mut rules = EnablementRules::new();
    rules.set_sound(Prayer::Fajr, mwf());

    let rule = rules.rule(Prayer::Fajr);
    assert_eq!(rule.sound, mwf());
    assert_eq!(rule.notify, mwf());
    assert!(rules.notify_permits(Prayer::Fajr, Weekday::Wed));
    assert!(!rules.notify_permits(Prayer::Fajr, Weekday::Tue));
}

#[test]
fn narrowing_notification_narrows_sound() {
    let mut rules = EnablementRules::new();
    rules.set_sound(Prayer::Isha, EnablementRule::On);
    rules.set_notify(Prayer::Isha, EnablementRule::parse("mon").unwrap());

    let rule = rules.rule(Prayer::Isha);
    assert!(rules.sound_permits(Prayer::Isha, Weekday::Mon));
    assert!(!rules.sound_permits(Prayer::Isha, Weekday::Fri));
    assert_eq!(rule.sound, rule.notify);

    rules.set_notify(Prayer::Isha, EnablementRule::Off);
    assert_eq!(rules.rule(Prayer::Isha), PrayerAlarmRule::default());
    assert!(!rules.any_notification_enabled());
}

#[test]
fn sound_never_exceeds_notification_after_reconcile() {
    let raw = r#"{ "dhuhr": { "notify": "off", "sound": { "masked": 2 } } }"#;
    let mut rules: EnablementRules = serde_json::from_str(raw).unwrap();
    rules.reconcile();

    let rule = rules.rule(Prayer::Dhuhr);
    assert_eq!(rule.notify, rule.sound);
    assert!(rules.notify_permits(Prayer::Dhuhr, Weekday::Mon));
    assert!(rules.any_notification_enabled());
}
