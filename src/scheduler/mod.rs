//! Machine d'état des alarmes : adhan, pré-alarmes et rappels.
//!
//! Toutes les opérations prennent `now` en paramètre ; rien ne lit l'horloge.
//! Les échecs de l'alarm facility sont journalisés et n'interrompent pas la
//! passe ; les échecs de stockage remontent à l'appelant.

mod adhan;
mod arming;
mod events;
mod facility;
mod guard;
mod reminder;
mod types;
mod util;

pub use facility::{
    AlarmFacility, AudioPlayer, FacilityCall, FacilityError, InMemoryFacility, SilentAudio,
};
pub use guard::{FlightToken, SingleFlight};
pub use types::{
    AlarmEvent, AlarmKind, AlarmRequest, AlarmState, ClearReason, DeliveryOutcome,
    PlaybackOutcome, Rearm, ReminderOutcome, ScheduleOutcome, SettingsOutcome, DISMISS_EPSILON,
    MAIN_SCAN_DAYS, MIN_PRE_ALARM_DELAY, REMINDER_SCAN_DAYS,
};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::cache::PrayerTimeCache;
use crate::calculator::PrayerCalculator;
use crate::config::Settings;
use crate::error::CoreError;
use crate::ledger::StoreLedger;
use crate::model::{AlarmId, DayPrayerTimes, ScheduledOccurrence};
use crate::notification::{AlarmRenderer, TextRenderer};
use crate::resolver::{self, ResolveOptions};
use crate::storage::KeyValueStore;

/// Planificateur : possède le stockage partagé par le cache et le ledger.
pub struct AlarmScheduler<S, C, F, A> {
    store: S,
    calculator: C,
    facility: F,
    audio: A,
    settings: Settings,
    renderer: Box<dyn AlarmRenderer>,
    guard: SingleFlight,
    states: BTreeMap<AlarmId, AlarmState>,
}

impl<S, C, F, A> AlarmScheduler<S, C, F, A>
where
    S: KeyValueStore,
    C: PrayerCalculator,
    F: AlarmFacility,
    A: AudioPlayer,
{
    pub fn new(store: S, calculator: C, facility: F, audio: A, settings: Settings) -> Self {
        let mut settings = settings;
        settings.rules.reconcile();
        Self {
            store,
            calculator,
            facility,
            audio,
            settings,
            renderer: Box::new(TextRenderer),
            guard: SingleFlight::new(),
            states: BTreeMap::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn AlarmRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Partage la garde avec d'autres instances du processus.
    pub fn with_guard(mut self, guard: SingleFlight) -> Self {
        self.guard = guard;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    pub fn facility(&self) -> &F {
        &self.facility
    }
    pub fn facility_mut(&mut self) -> &mut F {
        &mut self.facility
    }
    pub fn store(&self) -> &S {
        &self.store
    }
    pub fn guard(&self) -> &SingleFlight {
        &self.guard
    }

    pub fn state(&self, id: &AlarmId) -> AlarmState {
        self.states.get(id).copied().unwrap_or_default()
    }

    pub fn cache(&self) -> PrayerTimeCache<'_, S, C> {
        PrayerTimeCache::new(&self.store, &self.calculator, &self.settings.calculation)
    }

    pub fn ledger(&self) -> StoreLedger<'_, S> {
        StoreLedger::new(&self.store)
    }

    /// Horaires de la journée locale contenant `at`.
    pub fn prayer_times(&self, at: DateTime<Utc>) -> Result<DayPrayerTimes, CoreError> {
        self.cache().get(at)
    }

    pub fn resolve_next(
        &self,
        from: DateTime<Utc>,
        options: &ResolveOptions,
    ) -> Result<Option<ScheduledOccurrence>, CoreError> {
        resolver::resolve_next(&self.cache(), from, &self.settings.rules, options)
    }

    pub fn resolve_current(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Option<ScheduledOccurrence>, CoreError> {
        resolver::resolve_current(&self.cache(), at, None)
    }

    /// Arme la prochaine alarme d'adhan (et sa pré-alarme).
    pub fn schedule_next(&mut self, now: DateTime<Utc>) -> Result<ScheduleOutcome, CoreError> {
        adhan::schedule_next(self, now)
    }

    /// Passe de planification des rappels.
    pub fn schedule_reminders(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderOutcome>, CoreError> {
        reminder::schedule_reminders(self, now)
    }

    /// Réveil de l'alarm facility pour `request`.
    pub fn on_delivered(
        &mut self,
        request: &AlarmRequest,
        at: DateTime<Utc>,
    ) -> Result<DeliveryOutcome, CoreError> {
        events::on_delivered(self, request, at)
    }

    /// L'utilisateur congédie l'alarme `id` à l'instant `at`.
    pub fn on_dismissed(&mut self, id: &AlarmId, at: DateTime<Utc>) -> Result<Rearm, CoreError> {
        events::on_dismissed(self, id, at)
    }

    /// Action « annuler » d'une pré-alarme : l'occurrence visée est sautée.
    pub fn on_upcoming_cancelled(
        &mut self,
        pre_request: &AlarmRequest,
        now: DateTime<Utc>,
    ) -> Result<Rearm, CoreError> {
        events::on_upcoming_cancelled(self, pre_request, now)
    }

    /// Remplace les réglages, annule tout et replanifie.
    pub fn on_settings_changed(
        &mut self,
        settings: Settings,
        now: DateTime<Utc>,
    ) -> Result<SettingsOutcome, CoreError> {
        events::on_settings_changed(self, settings, now)
    }

    fn transition(&mut self, id: &AlarmId, event: AlarmEvent) {
        let next = self.state(id).apply(event);
        self.states.insert(id.clone(), next);
    }
}
