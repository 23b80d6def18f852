#![forbid(unsafe_code)]
mod common;

use chrono::Duration;
use common::{config, utc};
use muezzin::{
    ledger::DeliveryLedger,
    model::{AlarmId, Prayer, SoundSelection},
    scheduler::{
        AlarmEvent, AlarmFacility, AlarmRequest, AlarmScheduler, AlarmState, AudioPlayer,
        ClearReason,
        FacilityCall, FacilityError, InMemoryFacility, PlaybackOutcome, Rearm, ScheduleOutcome,
        SilentAudio, SingleFlight, DISMISS_EPSILON,
    },
    EnablementRule, EnablementRules, MemoryStore, Settings, TimetableCalculator,
};

type TestScheduler = AlarmScheduler<MemoryStore, TimetableCalculator, InMemoryFacility, SilentAudio>;

fn scheduler(settings: Settings) -> TestScheduler {
    AlarmScheduler::new(
        MemoryStore::new(),
        TimetableCalculator::new(),
        InMemoryFacility::new(),
        SilentAudio,
        settings,
    )
}

fn fajr_settings(sound: bool) -> Settings {
    let mut settings = common::settings();
    settings.rules.set_notify(Prayer::Fajr, EnablementRule::On);
    if sound {
        settings.rules.set_sound(Prayer::Fajr, EnablementRule::On);
        settings.preferences.adhan_sound = Some(SoundSelection {
            id: "makkah".to_string(),
            uri: "sounds/makkah.mp3".to_string(),
        });
    }
    settings
}

fn armed_at(outcome: &ScheduleOutcome) -> chrono::DateTime<chrono::Utc> {
    outcome.occurrence().expect("an armed occurrence").at
}

#[test]
fn arms_main_and_pre_alarm_cancel_first() {
    let mut sched = scheduler(fajr_settings(true));
    let outcome = sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap();

    match &outcome {
        ScheduleOutcome::Armed {
            occurrence,
            pre_alarm_at,
        } => {
            assert_eq!(occurrence.at, utc(2025, 10, 6, 5, 0));
            assert!(occurrence.play_sound);
            assert!(occurrence.intrusive);
            assert_eq!(*pre_alarm_at, Some(utc(2025, 10, 6, 4, 0)));
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let adhan = AlarmId::adhan();
    assert_eq!(
        sched.facility().calls(),
        &[
            FacilityCall::Cancel(adhan.pre()),
            FacilityCall::Arm(adhan.pre()),
            FacilityCall::Cancel(adhan.clone()),
            FacilityCall::Arm(adhan.clone()),
        ]
    );
    let main = sched.facility().pending(&adhan).unwrap();
    assert_eq!(main.title, "Adhan");
    assert_eq!(main.body, "Fajr");
    assert!(main.sound.is_some());
    assert_eq!(
        sched.state(&adhan),
        AlarmState::Scheduled {
            at: utc(2025, 10, 6, 5, 0)
        }
    );
}

#[test]
fn rescheduling_replaces_instead_of_duplicating() {
    let mut sched = scheduler(fajr_settings(true));
    let now = utc(2025, 10, 5, 23, 0);
    let first = sched.schedule_next(now).unwrap();
    let second = sched.schedule_next(now + Duration::minutes(5)).unwrap();

    assert_eq!(armed_at(&first), armed_at(&second));
    assert_eq!(sched.facility().armed().count(), 2);
}

#[test]
fn dismissed_instant_is_never_rescheduled() {
    let mut sched = scheduler(fajr_settings(true));
    sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap();

    let dismissed_at = utc(2025, 10, 6, 5, 0) + Duration::seconds(3);
    let rearm = sched.on_dismissed(&AlarmId::adhan(), dismissed_at).unwrap();
    match rearm {
        Rearm::Adhan(outcome) => assert_eq!(armed_at(&outcome), utc(2025, 10, 7, 5, 0)),
        other => panic!("unexpected rearm {other:?}"),
    }

    let last = sched.ledger().last(&AlarmId::adhan()).unwrap().unwrap();
    assert_eq!(last, dismissed_at + DISMISS_EPSILON);

    // reprise avec une horloge en retard
    let again = sched.schedule_next(utc(2025, 10, 6, 4, 59)).unwrap();
    assert!(armed_at(&again) > dismissed_at);
}

#[test]
fn pre_alarm_is_clamped_or_skipped() {
    let mut sched = scheduler(fajr_settings(true));
    let late = sched.schedule_next(utc(2025, 10, 6, 4, 30)).unwrap();
    match late {
        ScheduleOutcome::Armed { pre_alarm_at, .. } => {
            assert_eq!(
                pre_alarm_at,
                Some(utc(2025, 10, 6, 4, 30) + Duration::seconds(5))
            );
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let too_late = sched
        .schedule_next(utc(2025, 10, 6, 5, 0) - Duration::seconds(3))
        .unwrap();
    match too_late {
        ScheduleOutcome::Armed { pre_alarm_at, .. } => assert_eq!(pre_alarm_at, None),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!sched.facility().is_armed(&AlarmId::adhan().pre()));
}

#[test]
fn silent_or_opted_out_occurrences_have_no_pre_alarm() {
    let mut sched = scheduler(fajr_settings(false));
    let outcome = sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap();
    match outcome {
        ScheduleOutcome::Armed {
            occurrence,
            pre_alarm_at,
        } => {
            assert!(occurrence.is_silent());
            assert!(!occurrence.intrusive);
            assert_eq!(pre_alarm_at, None);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let mut settings = fajr_settings(true);
    settings.preferences.dont_notify_upcoming = true;
    settings.preferences.dont_turn_on_screen = true;
    let mut sched = scheduler(settings);
    match sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap() {
        ScheduleOutcome::Armed {
            occurrence,
            pre_alarm_at,
        } => {
            assert!(occurrence.play_sound);
            assert!(!occurrence.intrusive);
            assert_eq!(pre_alarm_at, None);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn nothing_enabled_or_no_configuration_clears_alarms() {
    let mut sched = scheduler(common::settings());
    assert_eq!(
        sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap(),
        ScheduleOutcome::Cleared(ClearReason::NothingEnabled)
    );

    let mut settings = fajr_settings(true);
    settings.calculation = muezzin::CalculationConfig::default();
    let mut sched = scheduler(settings);
    assert_eq!(
        sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap(),
        ScheduleOutcome::Cleared(ClearReason::NoConfiguration)
    );
    assert_eq!(sched.facility().armed().count(), 0);
}

#[test]
fn delivery_with_sound_plays_then_rearms() {
    let mut sched = scheduler(fajr_settings(true));
    sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap();
    let request: AlarmRequest = sched.facility().pending(&AlarmId::adhan()).unwrap().clone();

    let outcome = sched.on_delivered(&request, request.fire_at).unwrap();
    assert_eq!(outcome.playback, Some(PlaybackOutcome::Completed));
    match outcome.rearm {
        Rearm::Adhan(next) => assert_eq!(armed_at(&next), utc(2025, 10, 7, 5, 0)),
        other => panic!("unexpected rearm {other:?}"),
    }
    assert_eq!(
        sched.state(&AlarmId::adhan()),
        AlarmState::Scheduled {
            at: utc(2025, 10, 7, 5, 0)
        }
    );
}

#[test]
fn silent_delivery_rearms_without_playback() {
    let mut sched = scheduler(fajr_settings(false));
    sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap();
    let request = sched.facility().pending(&AlarmId::adhan()).unwrap().clone();

    let outcome = sched.on_delivered(&request, request.fire_at).unwrap();
    assert_eq!(outcome.playback, None);
    assert!(matches!(outcome.rearm, Rearm::Adhan(ScheduleOutcome::Armed { .. })));
    assert_eq!(
        sched.ledger().last(&AlarmId::adhan()).unwrap(),
        Some(utc(2025, 10, 6, 5, 0))
    );
}

#[test]
fn cancelling_upcoming_skips_its_target() {
    let mut sched = scheduler(fajr_settings(true));
    sched.schedule_next(utc(2025, 10, 6, 3, 0)).unwrap();
    let pre = sched
        .facility()
        .pending(&AlarmId::adhan().pre())
        .unwrap()
        .clone();
    assert_eq!(pre.title, "Upcoming alarm");
    assert_eq!(pre.body, "Fajr at 05:00");

    let rearm = sched
        .on_upcoming_cancelled(&pre, utc(2025, 10, 6, 4, 0))
        .unwrap();
    match rearm {
        Rearm::Adhan(outcome) => assert_eq!(armed_at(&outcome), utc(2025, 10, 7, 5, 0)),
        other => panic!("unexpected rearm {other:?}"),
    }
}

#[test]
fn settings_change_invalidates_cache_and_rearms() {
    let mut sched = scheduler(fajr_settings(true));
    let now = utc(2025, 10, 5, 23, 0);
    sched.schedule_next(now).unwrap();
    sched
        .on_dismissed(&AlarmId::adhan(), utc(2025, 10, 5, 22, 0))
        .unwrap();

    let mut moved = fajr_settings(true);
    moved.calculation = config(60);
    let outcome = sched.on_settings_changed(moved, now).unwrap();
    assert!(outcome.cache_invalidated);
    assert_eq!(armed_at(&outcome.adhan), utc(2025, 10, 6, 4, 0));

    let same = sched.settings().clone();
    let outcome = sched.on_settings_changed(same, now).unwrap();
    assert!(!outcome.cache_invalidated);

    let mut off = sched.settings().clone();
    off.rules = EnablementRules::new();
    let outcome = sched.on_settings_changed(off, now).unwrap();
    assert_eq!(
        outcome.adhan,
        ScheduleOutcome::Cleared(ClearReason::NothingEnabled)
    );
    assert_eq!(sched.facility().armed().count(), 0);
    assert_eq!(sched.state(&AlarmId::adhan()), AlarmState::Idle);
    assert_eq!(sched.state(&AlarmId::adhan().pre()), AlarmState::Idle);
}

#[test]
fn next_prayer_is_named_in_body() {
    let mut settings = fajr_settings(false);
    settings.rules.set_notify(Prayer::Dhuhr, EnablementRule::On);
    settings.preferences.show_next_prayer_time = true;
    let mut sched = scheduler(settings);
    sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap();

    let main = sched.facility().pending(&AlarmId::adhan()).unwrap();
    assert_eq!(main.body, "Fajr\nNext: Dhuhr at 12:30");
}

#[derive(Default)]
struct BrokenFacility {
    cancels: usize,
}

impl AlarmFacility for BrokenFacility {
    fn arm(&mut self, _request: &AlarmRequest) -> Result<(), FacilityError> {
        Err(FacilityError::Unavailable("no alarm permission".to_string()))
    }
    fn cancel(&mut self, _id: &AlarmId) -> Result<(), FacilityError> {
        self.cancels += 1;
        Ok(())
    }
    fn is_armed(&self, _id: &AlarmId) -> bool {
        false
    }
}

#[test]
fn facility_failures_do_not_abort_the_pass() {
    let mut sched = AlarmScheduler::new(
        MemoryStore::new(),
        TimetableCalculator::new(),
        BrokenFacility::default(),
        SilentAudio,
        fajr_settings(true),
    );
    let outcome = sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap();
    assert!(matches!(outcome, ScheduleOutcome::Armed { .. }));
    assert_eq!(sched.facility().cancels, 2);
    assert_eq!(sched.state(&AlarmId::adhan()), AlarmState::Idle);
}

#[test]
fn concurrent_pass_is_refused() {
    let guard = SingleFlight::new();
    let mut sched = scheduler(fajr_settings(true)).with_guard(guard.clone());

    let token = guard.try_enter().unwrap();
    assert_eq!(
        sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap(),
        ScheduleOutcome::Busy
    );
    drop(token);
    assert!(!guard.is_busy());
    assert!(matches!(
        sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap(),
        ScheduleOutcome::Armed { .. }
    ));
}

#[test]
fn alarm_state_transitions() {
    let at = utc(2025, 10, 6, 5, 0);
    let scheduled = AlarmState::Idle.apply(AlarmEvent::Armed(at));
    assert_eq!(scheduled, AlarmState::Scheduled { at });
    let cancelled = scheduled.apply(AlarmEvent::Cancelled);
    assert_eq!(cancelled, AlarmState::Cancelled);
    assert_eq!(cancelled.apply(AlarmEvent::Settled), AlarmState::Idle);
    assert_eq!(
        cancelled.apply(AlarmEvent::Dismissed(at)),
        AlarmState::Dismissed { at }
    );
    let delivered = scheduled.apply(AlarmEvent::Delivered(at));
    assert_eq!(delivered, AlarmState::Delivered { at });
    let dismissed = delivered.apply(AlarmEvent::Dismissed(at));
    assert_eq!(dismissed, AlarmState::Dismissed { at });
    assert_eq!(dismissed.apply(AlarmEvent::Settled), AlarmState::Idle);
    assert_eq!(AlarmState::Idle.apply(AlarmEvent::Cancelled), AlarmState::Idle);
}

#[derive(Default)]
struct CountingAudio {
    plays: usize,
}

impl AudioPlayer for CountingAudio {
    fn play(&mut self, _sound: &SoundSelection) -> Result<PlaybackOutcome, FacilityError> {
        self.plays += 1;
        Ok(PlaybackOutcome::Completed)
    }
}

#[test]
fn repeated_delivery_plays_once() {
    let mut audio = CountingAudio::default();
    {
        let mut sched = AlarmScheduler::new(
            MemoryStore::new(),
            TimetableCalculator::new(),
            InMemoryFacility::new(),
            &mut audio,
            fajr_settings(true),
        );
        sched.schedule_next(utc(2025, 10, 5, 23, 0)).unwrap();
        let request = sched.facility().pending(&AlarmId::adhan()).unwrap().clone();

        let first = sched.on_delivered(&request, request.fire_at).unwrap();
        assert_eq!(first.playback, Some(PlaybackOutcome::Completed));

        let again = sched
            .on_delivered(&request, request.fire_at + Duration::minutes(1))
            .unwrap();
        assert_eq!(again.playback, None);
        match again.rearm {
            Rearm::Adhan(next) => assert_eq!(armed_at(&next), utc(2025, 10, 7, 5, 0)),
            other => panic!("unexpected rearm {other:?}"),
        }
        assert_eq!(
            sched.ledger().last(&AlarmId::adhan()).unwrap(),
            Some(request.fire_at + DISMISS_EPSILON)
        );
    }
    assert_eq!(audio.plays, 1);
}

#[test]
fn dismissal_margin_is_applied_once() {
    // Maghrib 15 s après le coucher, le 6 octobre seulement
    let mut close = common::daily();
    close.maghrib = close.sunset + Duration::seconds(15);
    let mut calc = TimetableCalculator::new();
    calc.insert(common::date(2025, 10, 6), close);

    let mut settings = common::settings();
    settings.rules.set_notify(Prayer::Sunset, EnablementRule::On);
    settings.rules.set_notify(Prayer::Maghrib, EnablementRule::On);
    let mut sched = AlarmScheduler::new(
        MemoryStore::new(),
        calc,
        InMemoryFacility::new(),
        SilentAudio,
        settings,
    );

    let sunset = sched.schedule_next(utc(2025, 10, 6, 18, 0)).unwrap();
    assert_eq!(armed_at(&sunset), utc(2025, 10, 6, 18, 30));

    let rearm = sched
        .on_dismissed(&AlarmId::adhan(), utc(2025, 10, 6, 18, 30))
        .unwrap();
    match rearm {
        Rearm::Adhan(next) => {
            let occurrence = next.occurrence().expect("an armed occurrence");
            assert_eq!(occurrence.prayer, Prayer::Maghrib);
            assert_eq!(occurrence.at, utc(2025, 10, 6, 18, 30) + Duration::seconds(15));
        }
        other => panic!("unexpected rearm {other:?}"),
    }
}
