use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::types::{
    AlarmEvent, AlarmKind, AlarmRequest, DeliveryOutcome, PlaybackOutcome, Rearm,
    SettingsOutcome, DISMISS_EPSILON,
};
use super::{AlarmFacility, AlarmScheduler, AudioPlayer};
use crate::cache;
use crate::calculator::PrayerCalculator;
use crate::config::Settings;
use crate::error::CoreError;
use crate::ledger::DeliveryLedger;
use crate::model::{sort_reminders, AlarmId, Reminder};
use crate::storage::KeyValueStore;

pub(super) fn on_delivered<S, C, F, A>(
    sched: &mut AlarmScheduler<S, C, F, A>,
    request: &AlarmRequest,
    at: DateTime<Utc>,
) -> Result<DeliveryOutcome, CoreError>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    // livraison « au moins une fois » : un doublon ne rejoue rien
    let last = sched.ledger().last(&request.id)?;
    if last.is_some_and(|last| last >= request.fire_at) {
        info!(id = %request.id, %at, "duplicate delivery ignored");
        let rearm = match request.kind {
            AlarmKind::Pre => Rearm::None,
            AlarmKind::Main => rearm(sched, &request.id, at)?,
        };
        return Ok(DeliveryOutcome {
            playback: None,
            rearm,
        });
    }

    sched.ledger().record(&request.id, at)?;
    sched.transition(&request.id, AlarmEvent::Delivered(at));
    info!(id = %request.id, %at, "alarm delivered");

    if request.kind == AlarmKind::Pre {
        return Ok(DeliveryOutcome {
            playback: None,
            rearm: Rearm::None,
        });
    }
    // la notification « à venir » n'a plus lieu d'être
    sched.cancel_alarm(&request.id.pre());

    let playback = match request.sound.as_ref().filter(|_| request.occurrence.play_sound) {
        Some(sound) => Some(sched.audio.play(sound).unwrap_or_else(|err| {
            warn!(id = %request.id, %err, "audio playback failed");
            PlaybackOutcome::Interrupted
        })),
        None => None,
    };

    let rearm = if playback.is_some() {
        on_dismissed(sched, &request.id, at)?
    } else {
        rearm(sched, &request.id, at)?
    };
    Ok(DeliveryOutcome { playback, rearm })
}

pub(super) fn on_dismissed<S, C, F, A>(
    sched: &mut AlarmScheduler<S, C, F, A>,
    id: &AlarmId,
    at: DateTime<Utc>,
) -> Result<Rearm, CoreError>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    sched.ledger().record(id, at + DISMISS_EPSILON)?;
    sched.transition(id, AlarmEvent::Dismissed(at));
    sched.transition(id, AlarmEvent::Settled);
    if id.is_pre() {
        return Ok(Rearm::None);
    }
    rearm(sched, id, at)
}

pub(super) fn on_upcoming_cancelled<S, C, F, A>(
    sched: &mut AlarmScheduler<S, C, F, A>,
    pre_request: &AlarmRequest,
    now: DateTime<Utc>,
) -> Result<Rearm, CoreError>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    let target = pre_request.target();
    // l'occurrence visée compte comme livrée
    sched.ledger().record(&target, pre_request.occurrence.at)?;
    sched.cancel_pair(&target);
    info!(%target, at = %pre_request.occurrence.at, "upcoming alarm cancelled by user");
    rearm(sched, &target, now)
}

pub(super) fn on_settings_changed<S, C, F, A>(
    sched: &mut AlarmScheduler<S, C, F, A>,
    settings: Settings,
    now: DateTime<Utc>,
) -> Result<SettingsOutcome, CoreError>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    let mut settings = settings;
    settings.rules.reconcile();
    sort_reminders(&mut settings.reminders);

    let mut to_cancel = vec![AlarmId::adhan()];
    for reminder in sched.settings.reminders.iter().chain(&settings.reminders) {
        let id = reminder.alarm_id();
        if !to_cancel.contains(&id) && !keeps_pending_once(reminder, &settings.reminders) {
            to_cancel.push(id);
        }
    }
    for id in &to_cancel {
        sched.cancel_pair(id);
    }

    let ledger = sched.ledger();
    for id in &to_cancel {
        ledger.clear(id)?;
        ledger.clear(&id.pre())?;
    }

    let cache_invalidated = settings.calculation != sched.settings.calculation;
    if cache_invalidated {
        cache::invalidate_all(&sched.store)?;
    }
    sched.settings = settings;
    info!(cancelled = to_cancel.len(), cache_invalidated, "settings applied");

    let adhan = sched.schedule_next(now)?;
    let reminders = sched.schedule_reminders(now)?;
    Ok(SettingsOutcome {
        cache_invalidated,
        adhan,
        reminders,
    })
}

/// Un rappel « une fois » déjà planifié et inchangé garde son alarme.
fn keeps_pending_once(reminder: &Reminder, next: &[Reminder]) -> bool {
    reminder.once && !reminder.enabled && next.iter().any(|r| r == reminder)
}

fn rearm<S, C, F, A>(
    sched: &mut AlarmScheduler<S, C, F, A>,
    id: &AlarmId,
    now: DateTime<Utc>,
) -> Result<Rearm, CoreError>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    let target = id.main();
    if target.is_adhan() {
        Ok(Rearm::Adhan(sched.schedule_next(now)?))
    } else {
        Ok(Rearm::Reminders(sched.schedule_reminders(now)?))
    }
}
