use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, warn};

use super::types::{AlarmEvent, AlarmKind, AlarmRequest};
use super::util::pre_alarm_instant;
use super::{AlarmFacility, AlarmScheduler, AudioPlayer};
use crate::calculator::PrayerCalculator;
use crate::model::{AlarmId, ScheduledOccurrence, SoundSelection};
use crate::notification::Subject;
use crate::storage::KeyValueStore;

impl<S, C, F, A> AlarmScheduler<S, C, F, A>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    pub(super) fn main_request(
        &self,
        id: AlarmId,
        subject: Subject<'_>,
        occurrence: ScheduledOccurrence,
        following: Option<&ScheduledOccurrence>,
        zone: FixedOffset,
        sound: Option<SoundSelection>,
        once: bool,
    ) -> AlarmRequest {
        let content = self
            .renderer
            .main_alarm(subject, &occurrence, following, zone);
        AlarmRequest {
            id,
            kind: AlarmKind::Main,
            fire_at: occurrence.at,
            sound: sound.filter(|_| occurrence.play_sound),
            occurrence,
            title: content.title,
            body: content.body,
            once,
        }
    }

    /// Pré-alarme de `main`, sauf occurrence silencieuse ou préférence contraire.
    pub(super) fn pre_request(
        &self,
        main: &AlarmRequest,
        subject: Subject<'_>,
        zone: FixedOffset,
        now: DateTime<Utc>,
    ) -> Option<AlarmRequest> {
        let prefs = &self.settings.preferences;
        if main.occurrence.is_silent() || prefs.dont_notify_upcoming {
            return None;
        }
        let Some(at) = pre_alarm_instant(main.fire_at, prefs.pre_alarm_minutes_before, now) else {
            debug!(id = %main.id, "pre-alarm would not precede its target, skipped");
            return None;
        };
        let content = self.renderer.pre_alarm(subject, &main.occurrence, zone);
        Some(AlarmRequest {
            id: main.id.pre(),
            kind: AlarmKind::Pre,
            fire_at: at,
            occurrence: main.occurrence.clone(),
            title: content.title,
            body: content.body,
            sound: None,
            once: main.once,
        })
    }

    /// Annule puis arme, pré-alarme d'abord.
    pub(super) fn arm_pair(&mut self, main: &AlarmRequest, pre: Option<&AlarmRequest>) {
        self.cancel_alarm(&main.id.pre());
        if let Some(pre) = pre {
            self.arm_alarm(pre);
        }
        self.cancel_alarm(&main.id);
        self.arm_alarm(main);
    }

    pub(super) fn cancel_pair(&mut self, id: &AlarmId) {
        self.cancel_alarm(&id.pre());
        self.cancel_alarm(id);
    }

    fn arm_alarm(&mut self, request: &AlarmRequest) {
        match self.facility.arm(request) {
            Ok(()) => {
                debug!(id = %request.id, at = %request.fire_at, "alarm armed");
                self.transition(&request.id, AlarmEvent::Armed(request.fire_at));
            }
            Err(err) => warn!(id = %request.id, %err, "failed to arm alarm"),
        }
    }

    pub(super) fn cancel_alarm(&mut self, id: &AlarmId) {
        match self.facility.cancel(id) {
            Ok(()) => {
                self.transition(id, AlarmEvent::Cancelled);
                self.transition(id, AlarmEvent::Settled);
            }
            Err(err) => warn!(%id, %err, "failed to cancel alarm"),
        }
    }
}
