//! HTTP backends against an in-process stub server

use funnel_client::{
    standard_payment_service, vehicle_lookup, ApiClient, ClientError, HttpConfig, HttpVehicleBackend,
    ServerPixGateway, VehicleBackendConfig,
};
use funnel_core::{LookupConfig, LookupError, MockPixGenerator, PaymentGateway, ProviderError, VehicleBackend};
use funnel_test_utils::{new_candidate, payment_request, StubRoute, StubServer};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn vehicle_body() -> serde_json::Value {
    json!({"MARCA": "HONDA", "MODELO": "CG 160", "ano": "2021", "anoModelo": "2022", "cor": "Vermelha", "chassi": "9C2KC"})
}

#[tokio::test]
async fn lookup_falls_through_failing_backends() {
    let proxy = StubServer::start(vec![StubRoute::get(
        "/api/vehicle-info/ABC1D23",
        500,
        json!({"error": "upstream down"}),
    )])
    .await;
    let regional = StubServer::start(vec![StubRoute::get("/vehicle-api/ABC1D23", 200, vehicle_body())]).await;
    let remote = StubServer::start(vec![StubRoute::get("/api/vehicle-info/ABC1D23", 200, vehicle_body())]).await;

    let configs = vec![
        VehicleBackendConfig::proxy(&proxy.url()),
        VehicleBackendConfig::regional(&regional.url()),
        VehicleBackendConfig::remote(&remote.url()),
    ];
    let lookup = vehicle_lookup(&configs, LookupConfig::default(), &HttpConfig::default()).unwrap();

    let resolved = lookup.lookup("abc-1d23").await.unwrap();
    assert_eq!(resolved.source, "regional");
    assert_eq!(resolved.info.brand, "HONDA");
    assert_eq!(resolved.info.plate, "ABC1D23");

    assert_eq!(proxy.hits("/api/vehicle-info/ABC1D23"), 1);
    assert_eq!(regional.hits("/vehicle-api/ABC1D23"), 1);
    assert_eq!(remote.hits("/api/vehicle-info/ABC1D23"), 0);
}

#[tokio::test]
async fn every_backend_failing_is_unavailable() {
    let server = StubServer::start(vec![StubRoute::get(
        "/api/vehicle-info/ABC1234",
        200,
        json!({"error": "plate not found"}),
    )])
    .await;
    let configs = vec![VehicleBackendConfig::proxy(&server.url())];
    let lookup = vehicle_lookup(&configs, LookupConfig::default(), &HttpConfig::default()).unwrap();

    match lookup.lookup("ABC1234").await {
        Err(LookupError::Unavailable { attempts }) => {
            assert_eq!(attempts.len(), 1);
            assert!(matches!(attempts[0].error, ProviderError::Incomplete(_)));
        }
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn token_is_sent_as_bearer() {
    let server = StubServer::start(vec![StubRoute::get("/api/vehicle-info/XYZ9876", 200, vehicle_body())]).await;
    let config = VehicleBackendConfig::remote(&server.url()).with_token("secret-token");
    let backend = HttpVehicleBackend::new(config, &HttpConfig::default()).unwrap();

    backend.fetch("XYZ9876").await.unwrap();
    assert_eq!(
        server.last_auth("/api/vehicle-info/XYZ9876").as_deref(),
        Some("Bearer secret-token")
    );
}

#[tokio::test]
async fn slow_backend_times_out_as_transport_failure() {
    let server = StubServer::start(vec![StubRoute::get("/api/vehicle-info/ABC1234", 200, vehicle_body())
        .with_delay(Duration::from_millis(500))])
    .await;
    let http = HttpConfig::default().with_timeout(Duration::from_millis(50));
    let backend = HttpVehicleBackend::new(VehicleBackendConfig::proxy(&server.url()), &http).unwrap();

    let err = backend.fetch("ABC1234").await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn server_gateway_posts_payer_data() {
    let server = StubServer::start(vec![StubRoute::post(
        "/api/payments/pix",
        200,
        json!({"id": "pix_1", "pixCode": "000201", "pixQrCode": "https://qr/1.png", "status": "pending"}),
    )])
    .await;
    let gateway = ServerPixGateway::new(&server.url(), 84.70, reqwest::Client::new()).unwrap();

    let payment = gateway.create(&payment_request()).await.unwrap();
    assert_eq!(payment.id, "pix_1");
    assert_eq!(payment.pix_qr_code_url, "https://qr/1.png");

    let body = server.last_body("/api/payments/pix").unwrap();
    assert_eq!(body["name"], "Jane Doe");
    assert_eq!(body["cpf"], "123.456.789-01");
}

#[tokio::test]
async fn payment_service_falls_back_to_local_generator() {
    let server = StubServer::start(vec![StubRoute::post(
        "/api/payments/pix",
        503,
        json!({"error": "maintenance"}),
    )])
    .await;
    let generator = Arc::new(MockPixGenerator::default());
    let service =
        standard_payment_service(None, Some(&server.url()), generator, &HttpConfig::default()).unwrap();

    let payment = service.create(&payment_request()).await.unwrap();
    assert!(payment.id.starts_with("pix_"));
    assert!(payment.pix_code.starts_with("000201"));
    assert_eq!(server.hits("/api/payments/pix"), 1);
}

#[tokio::test]
async fn duplicate_candidate_is_conflict() {
    let server = StubServer::start(vec![StubRoute::post(
        "/api/candidates",
        409,
        json!({"error": "Email already registered"}),
    )])
    .await;
    let client = ApiClient::new(&server.url(), &HttpConfig::default()).unwrap();

    let err = client.create_candidate(&new_candidate("a@b.com")).await.unwrap_err();
    assert!(matches!(&err, ClientError::Conflict(msg) if msg == "Email already registered"));
    assert_eq!(err.status_code(), Some(409));
}

#[tokio::test]
async fn api_client_reads_regions() {
    let server = StubServer::start(vec![StubRoute::get(
        "/api/regions",
        200,
        json!([{"name": "São Paulo", "abbr": "SP", "vacancies": 26}]),
    )])
    .await;
    let client = ApiClient::new(&server.url(), &HttpConfig::default()).unwrap();

    let regions = client.regions().await.unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].abbr, "SP");

    let err = client.benefits().await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
}
