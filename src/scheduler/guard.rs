use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Garde « une seule passe à la fois », partageable entre instances du
/// même processus.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` si une passe est déjà en cours.
    pub fn try_enter(&self) -> Option<FlightToken> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightToken {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Libère la garde en sortie de portée.
#[derive(Debug)]
pub struct FlightToken {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightToken {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
