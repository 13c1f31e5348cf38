//! Progress events and sinks.
//!
//! Sinks are observers only: emitting never blocks and never fails from the
//! caller's point of view.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Propose,
    Enrich,
    Review,
    Revise,
    Complete,
}

/// Journey-loop progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub message: String,
    pub progress_percent: u8,
    pub iteration: u32,
}

impl ProgressEvent {
    pub fn new(
        phase: Phase,
        message: impl Into<String>,
        progress_percent: u8,
        iteration: u32,
    ) -> Self {
        Self {
            phase,
            message: message.into(),
            progress_percent: progress_percent.min(100),
            iteration,
        }
    }
}

/// Per-city day-plan progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityProgressEvent {
    pub city_index: usize,
    pub total_cities: usize,
    pub city_progress_percent: u8,
    pub message: String,
}

impl CityProgressEvent {
    pub fn new(
        city_index: usize,
        total_cities: usize,
        city_progress_percent: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            city_index,
            total_cities,
            city_progress_percent: city_progress_percent.min(100),
            message: message.into(),
        }
    }
}

/// Either kind of event, for sinks that carry both over one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressUpdate {
    Journey(ProgressEvent),
    City(CityProgressEvent),
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    fn emit_city(&self, _event: CityProgressEvent) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

// A closed receiver just means nobody is watching any more.
impl ProgressSink for UnboundedSender<ProgressUpdate> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(ProgressUpdate::Journey(event));
    }

    fn emit_city(&self, event: CityProgressEvent) {
        let _ = self.send(ProgressUpdate::City(event));
    }
}

/// Collects events in memory.
impl ProgressSink for Mutex<Vec<ProgressUpdate>> {
    fn emit(&self, event: ProgressEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressUpdate::Journey(event));
    }

    fn emit_city(&self, event: CityProgressEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressUpdate::City(event));
    }
}

/// Percent reached at the start of review round `iteration`. Late rounds
/// saturate at 100 so the sequence never goes backwards.
pub(crate) fn iteration_base(iteration: u32) -> u8 {
    let base = iteration.saturating_sub(1).saturating_mul(20).saturating_add(35);
    base.min(100) as u8
}

#[derive(Debug, Default)]
struct ReorderState {
    next: usize,
    pending: BTreeMap<usize, Vec<CityProgressEvent>>,
    finished: BTreeSet<usize>,
}

/// Forwards city events strictly in city order while cities run concurrently.
///
/// Events for the city currently at the front pass straight through; events
/// for later cities are held until every earlier city has called
/// [`finish`](Self::finish).
pub struct OrderedCityEmitter<'a> {
    sink: &'a dyn ProgressSink,
    state: Mutex<ReorderState>,
}

impl<'a> OrderedCityEmitter<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            state: Mutex::new(ReorderState::default()),
        }
    }

    pub fn emit(&self, event: CityProgressEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if event.city_index == state.next {
            self.sink.emit_city(event);
        } else if event.city_index > state.next {
            state.pending.entry(event.city_index).or_default().push(event);
        } else {
            debug!(city_index = event.city_index, "dropping event for finished city");
        }
    }

    /// Mark `city_index` done and release any held events that are now in order.
    pub fn finish(&self, city_index: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.finished.insert(city_index);
        while state.finished.contains(&state.next) {
            state.next += 1;
            let next = state.next;
            if let Some(events) = state.pending.remove(&next) {
                for event in events {
                    self.sink.emit_city(event);
                }
            }
        }
    }

    /// Events still held back.
    pub fn pending(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.pending.values().map(Vec::len).sum()
    }
}
