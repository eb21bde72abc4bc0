//! Scripted stand-ins for the device and the geocoding service.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{AuthorizationStatus, LocationEvent, LocationProvider, Placemark, ReverseGeocoder};
use crate::model::Coordinate;

pub(crate) fn minsk() -> Coordinate {
    Coordinate::new(53.9006, 27.559).unwrap()
}

pub(crate) fn placemark(locality: &str) -> Placemark {
    Placemark {
        name: Some(locality.to_string()),
        locality: Some(locality.to_string()),
        country: None,
    }
}

/// Device double. Events queued before `start_updates` are delivered on start;
/// `emit` pushes to the live subscription if there is one.
#[derive(Debug)]
pub(crate) struct ScriptedProvider {
    status: Mutex<AuthorizationStatus>,
    /// `None` leaves the permission dialog open forever.
    decision: Option<AuthorizationStatus>,
    pending: Mutex<Vec<LocationEvent>>,
    sender: Mutex<Option<UnboundedSender<LocationEvent>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    authorization_requests: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new(status: AuthorizationStatus) -> Self {
        Self {
            status: Mutex::new(status),
            decision: None,
            pending: Mutex::new(Vec::new()),
            sender: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            authorization_requests: AtomicUsize::new(0),
        }
    }

    pub(crate) fn deciding(mut self, decision: AuthorizationStatus) -> Self {
        self.decision = Some(decision);
        self
    }

    pub(crate) fn queued(self, event: LocationEvent) -> Self {
        self.pending.lock().push(event);
        self
    }

    pub(crate) fn emit(&self, event: LocationEvent) {
        match self.sender.lock().as_ref() {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => self.pending.lock().push(event),
        }
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationProvider for ScriptedProvider {
    fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    async fn request_authorization(&self) -> AuthorizationStatus {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        match self.decision {
            Some(decision) => {
                *self.status.lock() = decision;
                decision
            }
            None => std::future::pending().await,
        }
    }

    fn start_updates(&self) -> UnboundedReceiver<LocationEvent> {
        self.starts.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = unbounded_channel();
        for event in self.pending.lock().drain(..) {
            let _ = tx.send(event);
        }
        *self.sender.lock() = Some(tx);

        rx
    }

    fn stop_updates(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().take();
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedGeocoder {
    /// `None` never answers.
    answer: Option<Result<Vec<Placemark>, String>>,
    calls: AtomicUsize,
    last_coordinate: Mutex<Option<Coordinate>>,
}

impl ScriptedGeocoder {
    fn with_answer(answer: Option<Result<Vec<Placemark>, String>>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
            last_coordinate: Mutex::new(None),
        }
    }

    pub(crate) fn returning(placemarks: Vec<Placemark>) -> Self {
        Self::with_answer(Some(Ok(placemarks)))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::with_answer(Some(Err(message.to_string())))
    }

    pub(crate) fn hanging() -> Self {
        Self::with_answer(None)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_coordinate(&self) -> Option<Coordinate> {
        *self.last_coordinate.lock()
    }
}

#[async_trait]
impl ReverseGeocoder for ScriptedGeocoder {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> anyhow::Result<Vec<Placemark>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_coordinate.lock() = Some(coordinate);

        match &self.answer {
            Some(Ok(placemarks)) => Ok(placemarks.clone()),
            Some(Err(message)) => Err(anyhow::anyhow!(message.clone())),
            None => std::future::pending().await,
        }
    }
}
