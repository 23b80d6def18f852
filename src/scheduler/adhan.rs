use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::types::{ClearReason, ScheduleOutcome, MAIN_SCAN_DAYS};
use super::util::floor_instant;
use super::{AlarmFacility, AlarmScheduler, AudioPlayer};
use crate::calculator::PrayerCalculator;
use crate::error::CoreError;
use crate::ledger::DeliveryLedger;
use crate::model::AlarmId;
use crate::notification::Subject;
use crate::resolver::ResolveOptions;
use crate::storage::KeyValueStore;

pub(super) fn schedule_next<S, C, F, A>(
    sched: &mut AlarmScheduler<S, C, F, A>,
    now: DateTime<Utc>,
) -> Result<ScheduleOutcome, CoreError>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    let Some(_flight) = sched.guard.try_enter() else {
        debug!("adhan pass already running");
        return Ok(ScheduleOutcome::Busy);
    };
    let main = AlarmId::adhan();

    if !sched.settings.rules.any_notification_enabled() {
        sched.cancel_pair(&main);
        return Ok(ScheduleOutcome::Cleared(ClearReason::NothingEnabled));
    }

    let last = sched.ledger().last(&main).map_err(|err| {
        warn!(%err, "cannot read delivery ledger");
        CoreError::from(err)
    })?;
    let from = floor_instant(last, now);

    let options = ResolveOptions::with_rules(MAIN_SCAN_DAYS);
    let resolved = match sched.resolve_next(from, &options) {
        Ok(found) => found,
        Err(err) if err.is_unavailable() => {
            info!(%err, "prayer times unavailable, clearing adhan alarms");
            sched.cancel_pair(&main);
            return Ok(ScheduleOutcome::Cleared(ClearReason::NoConfiguration));
        }
        Err(err) => {
            warn!(%err, "adhan resolution failed");
            return Err(err);
        }
    };
    let Some(mut occurrence) = resolved else {
        info!(%from, "nothing enabled within a week, clearing adhan alarms");
        sched.cancel_pair(&main);
        return Ok(ScheduleOutcome::Cleared(ClearReason::NothingToSchedule));
    };

    let prefs = &sched.settings.preferences;
    occurrence.intrusive = occurrence.play_sound && !prefs.dont_turn_on_screen;
    let following = if prefs.show_next_prayer_time {
        sched
            .resolve_next(occurrence.at + Duration::seconds(1), &options)
            .unwrap_or(None)
    } else {
        None
    };

    let zone = sched.cache().zone()?;
    let request = sched.main_request(
        main,
        Subject::Adhan,
        occurrence.clone(),
        following.as_ref(),
        zone,
        prefs.adhan_sound.clone(),
        false,
    );
    let pre = sched.pre_request(&request, Subject::Adhan, zone, now);
    let pre_alarm_at = pre.as_ref().map(|p| p.fire_at);
    sched.arm_pair(&request, pre.as_ref());

    info!(
        prayer = %occurrence.prayer,
        at = %occurrence.at,
        sound = occurrence.play_sound,
        "adhan scheduled"
    );
    Ok(ScheduleOutcome::Armed {
        occurrence,
        pre_alarm_at,
    })
}
