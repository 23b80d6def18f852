use chrono::{DateTime, FixedOffset, Utc};

use crate::model::{OffsetDirection, Reminder, ScheduledOccurrence};

/// Titre et corps affichés par l'alarm facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmContent {
    pub title: String,
    pub body: String,
}

/// Ce qui déclenche l'alarme.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Adhan,
    Reminder(&'a Reminder),
}

/// Permet de customiser le texte des alarmes (langue, format…).
pub trait AlarmRenderer {
    fn main_alarm(
        &self,
        subject: Subject<'_>,
        occurrence: &ScheduledOccurrence,
        following: Option<&ScheduledOccurrence>,
        zone: FixedOffset,
    ) -> AlarmContent;

    fn pre_alarm(
        &self,
        subject: Subject<'_>,
        occurrence: &ScheduledOccurrence,
        zone: FixedOffset,
    ) -> AlarmContent;
}

/// Rendu texte anglais, heures locales en `HH:MM`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl AlarmRenderer for TextRenderer {
    fn main_alarm(
        &self,
        subject: Subject<'_>,
        occurrence: &ScheduledOccurrence,
        following: Option<&ScheduledOccurrence>,
        zone: FixedOffset,
    ) -> AlarmContent {
        let (title, mut body) = match subject {
            Subject::Adhan => (
                "Adhan".to_string(),
                occurrence.prayer.display_name().to_string(),
            ),
            Subject::Reminder(reminder) => ("Reminder".to_string(), describe(reminder)),
        };
        if let Some(next) = following {
            body.push_str(&format!(
                "\nNext: {} at {}",
                next.prayer.display_name(),
                clock(next.at, zone)
            ));
        }
        AlarmContent { title, body }
    }

    fn pre_alarm(
        &self,
        subject: Subject<'_>,
        occurrence: &ScheduledOccurrence,
        zone: FixedOffset,
    ) -> AlarmContent {
        let what = match subject {
            Subject::Adhan => occurrence.prayer.display_name().to_string(),
            Subject::Reminder(reminder) => describe(reminder),
        };
        AlarmContent {
            title: "Upcoming alarm".to_string(),
            body: format!("{what} at {}", clock(occurrence.at, zone)),
        }
    }
}

fn describe(reminder: &Reminder) -> String {
    let direction = match reminder.direction {
        OffsetDirection::Before => "before",
        OffsetDirection::After => "after",
    };
    let offset = format!(
        "{} min {direction} {}",
        reminder.minutes,
        reminder.prayer.display_name()
    );
    match reminder.label.as_deref().filter(|l| !l.trim().is_empty()) {
        Some(label) => format!("{label} ({offset})"),
        None => offset,
    }
}

fn clock(at: DateTime<Utc>, zone: FixedOffset) -> String {
    at.with_timezone(&zone).format("%H:%M").to_string()
}
