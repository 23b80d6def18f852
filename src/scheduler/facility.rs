use std::collections::BTreeMap;
use thiserror::Error;

use super::types::{AlarmRequest, PlaybackOutcome};
use crate::model::{AlarmId, SoundSelection};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FacilityError {
    #[error("alarm facility rejected request: {0}")]
    Rejected(String),
    #[error("alarm facility unavailable: {0}")]
    Unavailable(String),
}

/// Service d'alarmes du système : réveil au plus tôt à `fire_at`, au moins une fois.
pub trait AlarmFacility {
    fn arm(&mut self, request: &AlarmRequest) -> Result<(), FacilityError>;
    fn cancel(&mut self, id: &AlarmId) -> Result<(), FacilityError>;
    fn is_armed(&self, id: &AlarmId) -> bool;
}

impl<T: AlarmFacility + ?Sized> AlarmFacility for &mut T {
    fn arm(&mut self, request: &AlarmRequest) -> Result<(), FacilityError> {
        (**self).arm(request)
    }
    fn cancel(&mut self, id: &AlarmId) -> Result<(), FacilityError> {
        (**self).cancel(id)
    }
    fn is_armed(&self, id: &AlarmId) -> bool {
        (**self).is_armed(id)
    }
}

/// Lecture audio, invoquée uniquement après livraison.
pub trait AudioPlayer {
    fn play(&mut self, sound: &SoundSelection) -> Result<PlaybackOutcome, FacilityError>;
}

impl<T: AudioPlayer + ?Sized> AudioPlayer for &mut T {
    fn play(&mut self, sound: &SoundSelection) -> Result<PlaybackOutcome, FacilityError> {
        (**self).play(sound)
    }
}

/// Pas de sortie audio : la lecture se termine immédiatement.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioPlayer for SilentAudio {
    fn play(&mut self, _sound: &SoundSelection) -> Result<PlaybackOutcome, FacilityError> {
        Ok(PlaybackOutcome::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityCall {
    Arm(AlarmId),
    Cancel(AlarmId),
}

/// Facility en mémoire : garde les demandes armées et le journal des appels.
#[derive(Debug, Default)]
pub struct InMemoryFacility {
    armed: BTreeMap<AlarmId, AlarmRequest>,
    calls: Vec<FacilityCall>,
}

impl InMemoryFacility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, id: &AlarmId) -> Option<&AlarmRequest> {
        self.armed.get(id)
    }

    pub fn armed(&self) -> impl Iterator<Item = &AlarmRequest> {
        self.armed.values()
    }

    pub fn calls(&self) -> &[FacilityCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl AlarmFacility for InMemoryFacility {
    fn arm(&mut self, request: &AlarmRequest) -> Result<(), FacilityError> {
        if self.armed.contains_key(&request.id) {
            return Err(FacilityError::Rejected(format!(
                "{} is already armed",
                request.id
            )));
        }
        self.calls.push(FacilityCall::Arm(request.id.clone()));
        self.armed.insert(request.id.clone(), request.clone());
        Ok(())
    }

    fn cancel(&mut self, id: &AlarmId) -> Result<(), FacilityError> {
        self.calls.push(FacilityCall::Cancel(id.clone()));
        self.armed.remove(id);
        Ok(())
    }

    fn is_armed(&self, id: &AlarmId) -> bool {
        self.armed.contains_key(id)
    }
}
