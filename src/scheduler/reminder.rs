use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::{debug, info, warn};

use super::types::{ReminderOutcome, REMINDER_SCAN_DAYS};
use super::util::floor_instant;
use super::{AlarmFacility, AlarmScheduler, AudioPlayer};
use crate::calculator::PrayerCalculator;
use crate::error::CoreError;
use crate::ledger::DeliveryLedger;
use crate::model::{AlarmId, OccurrenceTarget, Reminder, ReminderId, ScheduledOccurrence};
use crate::notification::Subject;
use crate::storage::KeyValueStore;

pub(super) fn schedule_reminders<S, C, F, A>(
    sched: &mut AlarmScheduler<S, C, F, A>,
    now: DateTime<Utc>,
) -> Result<Vec<ReminderOutcome>, CoreError>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    let Some(_flight) = sched.guard.try_enter() else {
        debug!("reminder pass already running");
        return Ok(Vec::new());
    };
    let mut outcomes = Vec::new();

    // un rappel « une fois » déjà planifié garde son alarme en attente
    let disabled: Vec<ReminderId> = sched
        .settings
        .reminders
        .iter()
        .filter(|r| !r.enabled && !r.once)
        .map(|r| r.id.clone())
        .collect();
    for id in disabled {
        sched.cancel_pair(&AlarmId::for_reminder(&id));
        outcomes.push(ReminderOutcome::Cancelled { id });
    }

    let zone = sched.cache().zone();
    let zone = match zone {
        Ok(zone) => zone,
        Err(err) if err.is_unavailable() => {
            info!(%err, "prayer times unavailable, clearing reminder alarms");
            let enabled = enabled_ids(&sched.settings.reminders);
            for id in enabled {
                sched.cancel_pair(&AlarmId::for_reminder(&id));
                outcomes.push(ReminderOutcome::Skipped { id });
            }
            return Ok(outcomes);
        }
        Err(err) => return Err(err),
    };

    let mut planned = Vec::new();
    for reminder in sched.settings.reminders.iter().filter(|r| r.enabled) {
        let last = sched.ledger().last(&reminder.alarm_id())?;
        match plan(sched, reminder, floor_instant(last, now)) {
            Ok(Some(occurrence)) => planned.push((reminder.id.clone(), occurrence)),
            Ok(None) => {
                debug!(id = %reminder.id.as_str(), "reminder already past, skipped");
                outcomes.push(ReminderOutcome::Skipped {
                    id: reminder.id.clone(),
                });
            }
            Err(err) if err.is_unavailable() => {
                outcomes.push(ReminderOutcome::Skipped {
                    id: reminder.id.clone(),
                });
            }
            Err(err) => {
                warn!(id = %reminder.id.as_str(), %err, "reminder resolution failed");
                return Err(err);
            }
        }
    }

    let mut fired_once = Vec::new();
    for (id, occurrence) in planned {
        let Some(reminder) = sched.settings.reminders.iter().find(|r| r.id == id) else {
            continue;
        };
        let request = sched.main_request(
            reminder.alarm_id(),
            Subject::Reminder(reminder),
            occurrence.clone(),
            None,
            zone,
            reminder.sound.clone(),
            reminder.once,
        );
        let pre = sched.pre_request(&request, Subject::Reminder(reminder), zone, now);
        if reminder.once {
            fired_once.push(id.clone());
        }
        let pre_alarm_at = pre.as_ref().map(|p| p.fire_at);
        sched.arm_pair(&request, pre.as_ref());
        info!(id = %id.as_str(), at = %occurrence.at, "reminder scheduled");
        outcomes.push(ReminderOutcome::Armed {
            id,
            occurrence,
            pre_alarm_at,
        });
    }

    // un rappel « une fois » ne sera plus replanifié
    for id in fired_once {
        if let Some(reminder) = sched.settings.reminders.iter_mut().find(|r| r.id == id) {
            reminder.enabled = false;
        }
    }

    Ok(outcomes)
}

/// Première occurrence ≥ `floor` : aujourd'hui, sinon le prochain jour
/// autorisé. Une cible encore passée le lendemain est ignorée pour cette passe.
fn plan<S, C, F, A>(
    sched: &AlarmScheduler<S, C, F, A>,
    reminder: &Reminder,
    floor: DateTime<Utc>,
) -> Result<Option<ScheduledOccurrence>, CoreError>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    let cache = sched.cache();
    let today = cache.local_day(floor)?;
    for offset in 0..=REMINDER_SCAN_DAYS {
        let day = today + Duration::days(offset);
        if !reminder.days.permits(day.weekday()) {
            continue;
        }
        let times = cache.get_day(day)?;
        let at = times.get(reminder.prayer) + reminder.signed_offset();
        if at >= floor {
            let play_sound = reminder.sound.is_some();
            return Ok(Some(ScheduledOccurrence {
                target: OccurrenceTarget::Reminder(reminder.id.clone()),
                prayer: reminder.prayer,
                at,
                day,
                play_sound,
                intrusive: play_sound && !sched.settings.preferences.dont_turn_on_screen,
            }));
        }
        if offset >= 1 {
            return Ok(None);
        }
    }
    Ok(None)
}

fn enabled_ids(reminders: &[Reminder]) -> Vec<ReminderId> {
    reminders
        .iter()
        .filter(|r| r.enabled)
        .map(|r| r.id.clone())
        .collect()
}
