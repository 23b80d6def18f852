use chrono::{DateTime, Duration, Utc};

use super::types::MIN_PRE_ALARM_DELAY;

/// Pas du ledger (millisecondes epoch) : l'instant enregistré est déjà traité.
const LEDGER_STEP: Duration = Duration::milliseconds(1);

/// Borne basse de résolution : strictement après l'entrée du ledger. La marge
/// de congé est déjà incluse dans l'entrée écrite par `on_dismissed`.
pub(super) fn floor_instant(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match last {
        Some(last) => (last + LEDGER_STEP).max(now),
        None => now,
    }
}

/// Instant de la pré-alarme, ramené à `now + 5s` au plus tôt ; `None` s'il
/// n'est plus strictement avant la cible.
pub(super) fn pre_alarm_instant(
    target: DateTime<Utc>,
    lead_minutes: u32,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let wanted = target - Duration::minutes(i64::from(lead_minutes));
    let at = wanted.max(now + MIN_PRE_ALARM_DELAY);
    (at < target).then_some(at)
}
