//! Testing utilities for the funnel workspace
//!
//! Shared fixtures, scripted fakes for the remote seams, and an in-process
//! stub HTTP server.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use funnel_core::{
    CandidateRecord, EpiForm, Municipality, Named, NewCandidate, PaymentGateway, PaymentInfo,
    PaymentRequest, PaymentStatus, PayoutForm, ProfileForm, ProviderError, VehicleBackend,
    VehicleInfo, VehicleType,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use warp::http::{Method, StatusCode};
use warp::path::FullPath;
use warp::Filter;

pub fn profile_form() -> ProfileForm {
    ProfileForm {
        full_name: "Jane Doe".to_string(),
        tax_id: "123.456.789-09".to_string(),
        phone: "(11) 98888-7777".to_string(),
        email: "a@b.com".to_string(),
        vehicle_type: Some(VehicleType::Motorcycle),
        license_plate: Some("ABC1D23".to_string()),
        is_rented_vehicle: false,
        state: "SP".to_string(),
        city: "Campinas".to_string(),
    }
}

pub fn rented_profile_form() -> ProfileForm {
    ProfileForm {
        license_plate: None,
        is_rented_vehicle: true,
        ..profile_form()
    }
}

pub fn epi_form() -> EpiForm {
    EpiForm {
        vest_size: "G".to_string(),
        glove_size: "M".to_string(),
        shoe_size: "41".to_string(),
        terms_accepted: true,
    }
}

pub fn payout_form() -> PayoutForm {
    PayoutForm {
        bank: "nubank".to_string(),
        account_type: "checking".to_string(),
    }
}

pub fn complete_record() -> CandidateRecord {
    let mut record = CandidateRecord::default();
    profile_form()
        .apply_to(&mut record)
        .expect("fixture profile is valid");
    record.selected_municipalities = vec![
        Municipality::new("Campinas", 40),
        Municipality::new("Sorocaba", 36),
    ];
    record.start_date = Some("03/03/2025".to_string());
    record
}

pub fn new_candidate(email: &str) -> NewCandidate {
    NewCandidate {
        name: "Jane Doe".to_string(),
        email: email.to_string(),
        phone: "11988887777".to_string(),
        state: "SP".to_string(),
        city: "Campinas".to_string(),
        vehicle_type: "motorcycle".to_string(),
        has_experience: false,
    }
}

pub fn payment_request() -> PaymentRequest {
    PaymentRequest::new("Jane Doe", "123.456.789-01").with_amount(84.70)
}

pub fn vehicle(plate: &str, brand: &str) -> VehicleInfo {
    VehicleInfo {
        brand: brand.to_string(),
        model: "MODEL".to_string(),
        year: "2020".to_string(),
        model_year: "2021".to_string(),
        color: "PRATA".to_string(),
        chassis_number: "9BWZZZ377VT004251".to_string(),
        plate: plate.to_string(),
    }
}

/// Vehicle backend answering from a fixed table
#[derive(Debug)]
pub struct ScriptedVehicleBackend {
    name: String,
    vehicles: DashMap<String, VehicleInfo>,
    failure: ProviderError,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedVehicleBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vehicles: DashMap::new(),
            failure: ProviderError::Status(503),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vehicle(self, info: VehicleInfo) -> Self {
        self.vehicles.insert(info.plate.clone(), info);
        self
    }

    pub fn with_failure(mut self, failure: ProviderError) -> Self {
        self.failure = failure;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Named for ScriptedVehicleBackend {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl VehicleBackend for ScriptedVehicleBackend {
    async fn fetch(&self, plate: &str) -> Result<VehicleInfo, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.vehicles
            .get(plate)
            .map(|v| v.clone())
            .ok_or_else(|| self.failure.clone())
    }
}

/// Payment gateway with a fixed outcome
#[derive(Debug)]
pub struct ScriptedGateway {
    name: String,
    outcome: Result<PaymentInfo, ProviderError>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn succeeding(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(PaymentInfo {
                id: format!("{name}_1"),
                pix_code: "00020126360014BR.GOV.BCB.PIX".to_string(),
                pix_qr_code_url: "https://example.com/qr.png".to_string(),
                status: PaymentStatus::Pending,
                created_at: Utc::now(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str, error: ProviderError) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Named for ScriptedGateway {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create(&self, _request: &PaymentRequest) -> Result<PaymentInfo, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// One canned response of a [`StubServer`]
#[derive(Debug, Clone)]
pub struct StubRoute {
    pub method: Method,
    pub path: String,
    pub status: u16,
    pub body: Value,
    pub delay: Duration,
}

impl StubRoute {
    pub fn get(path: &str, status: u16, body: Value) -> Self {
        Self {
            method: Method::GET,
            path: path.to_string(),
            status,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn post(path: &str, status: u16, body: Value) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(path, status, body)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct StubState {
    routes: Vec<StubRoute>,
    hits: DashMap<String, usize>,
    last_auth: DashMap<String, String>,
    last_body: DashMap<String, Value>,
}

/// In-process HTTP server replying with canned JSON
///
/// Unknown paths answer 404 `{"error": "not found"}`.
#[derive(Debug)]
pub struct StubServer {
    addr: SocketAddr,
    state: Arc<StubState>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<StubRoute>) -> Self {
        let state = Arc::new(StubState {
            routes,
            ..StubState::default()
        });

        let shared = Arc::clone(&state);
        let filter = warp::method()
            .and(warp::path::full())
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::body::bytes())
            .then(move |method: Method, path: FullPath, auth: Option<String>, body: warp::hyper::body::Bytes| {
                let state = Arc::clone(&shared);
                async move {
                    let path = path.as_str().to_string();
                    *state.hits.entry(path.clone()).or_insert(0) += 1;
                    if let Some(auth) = auth {
                        state.last_auth.insert(path.clone(), auth);
                    }
                    if let Ok(json) = serde_json::from_slice::<Value>(&body) {
                        state.last_body.insert(path.clone(), json);
                    }

                    let route = state
                        .routes
                        .iter()
                        .find(|r| r.method == method && r.path == path)
                        .cloned();
                    match route {
                        Some(route) => {
                            tokio::time::sleep(route.delay).await;
                            let status =
                                StatusCode::from_u16(route.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                            warp::reply::with_status(warp::reply::json(&route.body), status)
                        }
                        None => warp::reply::with_status(
                            warp::reply::json(&serde_json::json!({"error": "not found"})),
                            StatusCode::NOT_FOUND,
                        ),
                    }
                }
            });

        let (addr, server) = warp::serve(filter).bind_ephemeral(([127, 0, 0, 1], 0));
        let task = tokio::spawn(server);
        Self { addr, state, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.get(path).map_or(0, |h| *h)
    }

    pub fn last_auth(&self, path: &str) -> Option<String> {
        self.state.last_auth.get(path).map(|a| a.clone())
    }

    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.state.last_body.get(path).map(|b| b.clone())
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
