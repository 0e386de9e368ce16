use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::boundary::{Boundary, BoundaryError};
use crate::config::Config;
use crate::playback::PlaybackController;
use crate::source::{SourceError, TrackQuery, TrackSource};
use crate::track::{normalize_with, NormalizeOptions, TrackError};

const MISSING_SELECTION: &str = "Please select IMEI, start date, and end date";

/// Device and civil time window picked in the header controls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Selection {
    #[serde(default = "default_device_id")]
    pub device_id: String,
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_end")]
    pub end: String,
}

fn default_device_id() -> String {
    "937066763492".to_string()
}

fn default_start() -> String {
    "2025-03-18T15:37:58".to_string()
}

fn default_end() -> String {
    "2025-03-18T15:38:57".to_string()
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            start: default_start(),
            end: default_end(),
        }
    }
}

/// One issued load. Completing a ticket older than the latest is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    device_id: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    query: TrackQuery,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &TrackQuery {
        &self.query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { samples: usize },
    /// A newer load was issued before this one completed.
    Stale,
}

/// Glue between the selection controls, a track source and the controller.
///
/// Every failure ends up in a single error slot; the controller keeps its
/// previous sequence and position when a load fails.
pub struct Session<S: TrackSource> {
    source: S,
    controller: PlaybackController,
    boundary: Boundary,
    normalize: NormalizeOptions,
    selection: Selection,
    error: Option<String>,
    loading: bool,
    generation: u64,
}

impl<S: TrackSource> Session<S> {
    pub fn new(source: S, config: &Config) -> Result<Self, BoundaryError> {
        Ok(Self {
            source,
            controller: PlaybackController::new(config.playback.settings()),
            boundary: Boundary::from_config(&config.boundary)?,
            normalize: config.normalize,
            selection: config.selection.clone(),
            error: None,
            loading: false,
            generation: 0,
        })
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Validates the selection and issues a new load generation.
    ///
    /// Validation failures are reported before any request is made and do
    /// not invalidate loads already in flight.
    pub fn begin_load(&mut self) -> Result<LoadTicket, TrackError> {
        let (device_id, start, end) = match self.validate() {
            Ok(window) => window,
            Err(e) => {
                self.record_error(&e);
                return Err(e);
            }
        };

        self.generation += 1;
        self.loading = true;
        self.error = None;

        let query = TrackQuery {
            imei: device_id.clone(),
            start_date: self.boundary.request_param(start),
            end_date: self.boundary.request_param(end),
        };
        log::debug!("Issuing load #{} for {}", self.generation, device_id);

        Ok(LoadTicket {
            generation: self.generation,
            device_id,
            start,
            end,
            query,
        })
    }

    /// Applies the raw result of a fetch issued by `begin_load`.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        raw: Result<Value, SourceError>,
    ) -> Result<LoadOutcome, TrackError> {
        if ticket.generation != self.generation {
            log::debug!(
                "Discarding stale load #{} (latest is #{})",
                ticket.generation,
                self.generation
            );
            return Ok(LoadOutcome::Stale);
        }
        self.loading = false;

        let result = raw.map_err(TrackError::from).and_then(|raw| {
            normalize_with(
                &raw,
                &ticket.device_id,
                ticket.start,
                ticket.end,
                self.normalize,
            )
        });

        match result {
            Ok(samples) => {
                let count = samples.len();
                self.controller.load(samples);
                self.error = None;
                Ok(LoadOutcome::Loaded { samples: count })
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    pub async fn load(&mut self) -> Result<LoadOutcome, TrackError> {
        let ticket = self.begin_load()?;
        let raw = self.source.fetch_raw_track(ticket.query()).await;
        self.complete_load(ticket, raw)
    }

    /// Replaces the selection with the trip's device and expected window,
    /// then loads it.
    pub async fn prefill_from_trip(&mut self, trip_id: &str) -> Result<LoadOutcome, TrackError> {
        self.loading = true;
        let meta = match self.source.fetch_trip_metadata(trip_id).await {
            Ok(meta) => meta,
            Err(e) => {
                self.loading = false;
                let message = match &e {
                    SourceError::Trip(msg) => msg.clone(),
                    other => format!("Error fetching trip data: {}", other),
                };
                log::warn!("Trip {} could not be loaded: {}", trip_id, e);
                self.error = Some(message);
                return Err(TrackError::Fetch(e));
            }
        };
        self.loading = false;

        log::info!("Pre-filling selection from trip {}", trip_id);
        self.selection = Selection {
            device_id: meta.device_id,
            start: self.boundary.input_value(meta.expected_start),
            end: self.boundary.input_value(meta.expected_end),
        };
        self.load().await
    }

    fn validate(&self) -> Result<(String, DateTime<Utc>, DateTime<Utc>), TrackError> {
        let Selection {
            device_id,
            start,
            end,
        } = &self.selection;
        let device_id = device_id.trim();
        if device_id.is_empty() || start.trim().is_empty() || end.trim().is_empty() {
            return Err(TrackError::Validation(MISSING_SELECTION.into()));
        }

        let start = self
            .boundary
            .parse_local(start)
            .map_err(|e| TrackError::Validation(format!("Invalid start date: {}", e)))?;
        let end = self
            .boundary
            .parse_local(end)
            .map_err(|e| TrackError::Validation(format!("Invalid end date: {}", e)))?;
        if start > end {
            return Err(TrackError::Validation(
                "Start date must not be after end date".into(),
            ));
        }

        Ok((device_id.to_string(), start, end))
    }

    fn record_error(&mut self, err: &TrackError) {
        log::warn!("Load failed: {}", err);
        self.error = Some(err.user_message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackMode;
    use crate::source::{parse_trip_metadata, TripMetadata};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MemorySource {
        track: StdMutex<Option<Value>>,
        trips: HashMap<String, Value>,
        queries: StdMutex<Vec<TrackQuery>>,
    }

    impl MemorySource {
        fn with_track(track: Value) -> Self {
            let source = Self::default();
            source.set_track(Some(track));
            source
        }

        fn set_track(&self, track: Option<Value>) {
            *self.track.lock().unwrap() = track;
        }
    }

    #[async_trait]
    impl TrackSource for MemorySource {
        async fn fetch_raw_track(&self, query: &TrackQuery) -> Result<Value, SourceError> {
            self.queries.lock().unwrap().push(query.clone());
            self.track.lock().unwrap().clone().ok_or_else(|| {
                SourceError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no track",
                ))
            })
        }

        async fn fetch_trip_metadata(&self, trip_id: &str) -> Result<TripMetadata, SourceError> {
            match self.trips.get(trip_id) {
                Some(raw) => parse_trip_metadata(raw),
                None => Err(SourceError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "unknown trip",
                ))),
            }
        }
    }

    fn record(id: &str, imei: &str, time: &str) -> Value {
        json!({
            "_id": id,
            "imei": imei,
            "latitude": 12.9716,
            "longitude": 77.5946,
            "dateTime": time,
            "speed": 40
        })
    }

    fn track() -> Value {
        json!([
            record("a", "937066763492", "2025-03-18T10:07:58Z"),
            record("b", "700070635325", "2025-03-18T10:08:10Z"),
            record("c", "937066763492", "2025-03-18T10:08:20Z"),
            record("d", "937066763492", "2025-03-18T10:08:57Z"),
            record("e", "937066763492", "2025-03-18T11:00:00Z"),
        ])
    }

    fn session(source: MemorySource) -> Session<MemorySource> {
        let _ = env_logger::builder().is_test(true).try_init();
        Session::new(source, &Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_load_default_selection() {
        let mut session = session(MemorySource::with_track(track()));
        let outcome = session.load().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { samples: 3 });
        assert_eq!(session.error(), None);
        assert!(!session.is_loading());

        let snap = session.controller().snapshot();
        assert_eq!(snap.mode, PlaybackMode::Stopped);
        assert_eq!(snap.current_index, Some(0));

        let queries = session.source.queries.lock().unwrap();
        assert_eq!(
            queries[0],
            TrackQuery {
                imei: "937066763492".into(),
                start_date: "2025-03-18T15:37:58".into(),
                end_date: "2025-03-18T15:38:57".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_selection_is_reported_before_fetch() {
        let mut session = session(MemorySource::with_track(track()));
        session.set_selection(Selection {
            device_id: "  ".into(),
            ..Selection::default()
        });

        let err = session.load().await.unwrap_err();
        assert!(matches!(err, TrackError::Validation(_)));
        assert_eq!(session.error(), Some(MISSING_SELECTION));
        assert_eq!(session.generation(), 0);
        assert!(session.source.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_window_is_a_validation_error() {
        let mut session = session(MemorySource::with_track(track()));
        session.set_selection(Selection {
            start: "someday".into(),
            ..Selection::default()
        });
        let err = session.load().await.unwrap_err();
        assert!(matches!(err, TrackError::Validation(_)));
        assert!(session.error().unwrap().starts_with("Invalid start date"));

        session.set_selection(Selection {
            start: "2025-03-18T16:00:00".into(),
            ..Selection::default()
        });
        assert!(matches!(
            session.load().await,
            Err(TrackError::Validation(_))
        ));
        assert!(session.source.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_state() {
        let mut session = session(MemorySource::with_track(track()));
        session.load().await.unwrap();
        session.controller_mut().step_forward();

        session.source.set_track(None);
        let err = session.load().await.unwrap_err();
        assert!(matches!(err, TrackError::Fetch(_)));
        assert_eq!(session.error(), Some("Failed to fetch track data"));
        assert!(!session.is_loading());

        let snap = session.controller().snapshot();
        assert_eq!(snap.samples.map(|s| s.len()), Some(3));
        assert_eq!(snap.progress, 10);
    }

    #[tokio::test]
    async fn test_no_data_is_reported_distinctly() {
        let mut session = session(MemorySource::with_track(track()));
        session.set_selection(Selection {
            device_id: "800070635323".into(),
            ..Selection::default()
        });
        let err = session.load().await.unwrap_err();
        assert!(matches!(err, TrackError::NoData { .. }));
        assert_eq!(
            session.error(),
            Some("No track data available for the selected criteria")
        );
        assert_eq!(session.controller().mode(), PlaybackMode::Idle);
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let mut session = session(MemorySource::default());
        assert!(session.load().await.is_err());
        assert!(session.error().is_some());

        session.source.set_track(Some(track()));
        session.load().await.unwrap();
        assert_eq!(session.error(), None);
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let mut session = session(MemorySource::default());
        let first = session.begin_load().unwrap();
        let second = session.begin_load().unwrap();
        assert_eq!(second.generation(), first.generation() + 1);

        let outcome = session.complete_load(first, Ok(track())).unwrap();
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(session.is_loading());
        assert_eq!(session.controller().mode(), PlaybackMode::Idle);

        // a stale failure must not touch the error slot either
        let third = session.begin_load().unwrap();
        let outcome = session
            .complete_load(second, Err(SourceError::UnrecognisedShape))
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(session.error(), None);

        let outcome = session.complete_load(third, Ok(track())).unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { samples: 3 });
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_prefill_from_trip() {
        let mut source = MemorySource::with_track(track());
        source.trips.insert(
            "trip-1".into(),
            json!({
                "success": true,
                "data": {
                    "vehicleDetails": {"vehicleNumber": {"device": {"imei": "937066763492"}}},
                    "tripDetails": {
                        "tripExpectedStartDate": 1742292478000i64,
                        "tripExpectedEndDate": 1742292537000i64
                    }
                }
            }),
        );
        let mut session = session(source);
        session.set_selection(Selection {
            device_id: "700070635325".into(),
            start: String::new(),
            end: String::new(),
        });

        let outcome = session.prefill_from_trip("trip-1").await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { samples: 3 });
        assert_eq!(
            session.selection(),
            &Selection {
                device_id: "937066763492".into(),
                start: "2025-03-18T15:37:58.000".into(),
                end: "2025-03-18T15:38:57.000".into(),
            }
        );
        let queries = session.source.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].start_date, "2025-03-18T15:37:58");
    }

    #[tokio::test]
    async fn test_prefill_failure_fills_error_slot() {
        let mut session = session(MemorySource::with_track(track()));
        let err = session.prefill_from_trip("missing").await.unwrap_err();
        assert!(matches!(err, TrackError::Fetch(_)));
        assert!(session
            .error()
            .unwrap()
            .starts_with("Error fetching trip data"));
        assert_eq!(session.selection(), &Selection::default());
        assert!(session.source.queries.lock().unwrap().is_empty());
    }
}
