//! Mock PIX payment generation
//!
//! Produces plausible but non-functional payment data for the final step:
//! - [`MockPixGenerator`]: ids, PIX-shaped code, QR-code URL, payer fallbacks
//! - [`PaymentService`]: ordered fallback across [`PaymentGateway`]s
//! - [`Countdown`]: cosmetic expiry timer
//!
//! Nothing here settles money. Expiry only flips a display flag.

use crate::error::{PaymentError, ProviderError};
use crate::fallback::{FallbackChain, Named};
use crate::storage::{keys, Persistence};
use crate::timer::{spawn_interval, TimerHandle};
use crate::types::{PaymentInfo, PaymentRequest, PaymentStatus};
use crate::validation::{digits, mask_cpf};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

/// Kit price in BRL
pub const DEFAULT_KIT_AMOUNT: f64 = 84.70;

/// Description sent with payment requests
pub const KIT_DESCRIPTION: &str = "Kit de Segurança Shopee Delivery";

/// Domain of generated fallback emails
pub const FALLBACK_EMAIL_DOMAIN: &str = "mail.shopee.br";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generator and countdown settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PixConfig {
    /// QR rendering endpoint; the code is passed as `data`
    pub qr_endpoint: String,
    /// QR image size parameter
    pub qr_size: String,
    /// Merchant name embedded in the code
    pub merchant_name: String,
    /// Merchant city embedded in the code
    pub merchant_city: String,
    /// Amount used when the request has none
    pub default_amount: f64,
    /// Payment description
    pub description: String,
    /// Countdown length in seconds
    pub countdown_secs: u64,
}

impl Default for PixConfig {
    fn default() -> Self {
        Self {
            qr_endpoint: "https://api.qrserver.com/v1/create-qr-code/".to_string(),
            qr_size: "200x200".to_string(),
            merchant_name: "Shopee Delivery".to_string(),
            merchant_city: "SAO PAULO".to_string(),
            default_amount: DEFAULT_KIT_AMOUNT,
            description: KIT_DESCRIPTION.to_string(),
            countdown_secs: 30 * 60,
        }
    }
}

impl PixConfig {
    /// Set default amount
    #[inline]
    #[must_use]
    pub fn with_default_amount(mut self, amount: f64) -> Self {
        self.default_amount = amount;
        self
    }

    /// Set QR endpoint
    #[inline]
    #[must_use]
    pub fn with_qr_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.qr_endpoint = endpoint.into();
        self
    }

    /// Countdown length
    #[inline]
    #[must_use]
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }
}

/// Payer data with fallbacks filled in, as sent to a payment provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedPayment {
    /// Payer name
    pub name: String,
    /// CPF digits
    pub document: String,
    /// Payer or fallback email
    pub email: String,
    /// Payer or fallback phone
    pub phone: String,
    /// Amount in BRL
    pub amount: f64,
    /// Payment description
    pub description: String,
}

/// Longest value a two-digit length can describe
const MAX_TLV_LEN: usize = 99;

/// EMV-style field: id, two-digit length, value
///
/// Values are printable ASCII, so the length counts bytes and characters alike.
fn tlv(id: &str, value: &str) -> String {
    let value = emv_text(value, MAX_TLV_LEN);
    format!("{id}{:02}{value}", value.len())
}

/// Fold Portuguese accents to ASCII, drop anything else outside printable
/// ASCII, and cut to `max` characters
fn emv_text(value: &str, max: usize) -> String {
    value
        .chars()
        .filter_map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => Some('a'),
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => Some('A'),
            'é' | 'ê' | 'è' => Some('e'),
            'É' | 'Ê' | 'È' => Some('E'),
            'í' | 'î' => Some('i'),
            'Í' | 'Î' => Some('I'),
            'ó' | 'ô' | 'õ' | 'ò' => Some('o'),
            'Ó' | 'Ô' | 'Õ' | 'Ò' => Some('O'),
            'ú' | 'ü' | 'û' => Some('u'),
            'Ú' | 'Ü' | 'Û' => Some('U'),
            'ç' => Some('c'),
            'Ç' => Some('C'),
            c if c == ' ' || c.is_ascii_graphic() => Some(c),
            _ => None,
        })
        .take(max)
        .collect()
}

/// Generator of fabricated PIX payloads
pub struct MockPixGenerator {
    config: PixConfig,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for MockPixGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPixGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for MockPixGenerator {
    fn default() -> Self {
        Self::new(PixConfig::default())
    }
}

impl MockPixGenerator {
    /// Create generator seeded from entropy
    #[must_use]
    pub fn new(config: PixConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create generator with a given random source
    #[must_use]
    pub fn with_rng(config: PixConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    /// Generator settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PixConfig {
        &self.config
    }

    /// Require payer name and CPF, fill in missing contact data
    ///
    /// # Errors
    /// `InvalidRequest` when name or CPF is missing
    pub fn prepare(&self, request: &PaymentRequest) -> Result<PreparedPayment, PaymentError> {
        let name = request.name.trim();
        let document = digits(&request.cpf);
        if name.is_empty() || document.is_empty() {
            return Err(PaymentError::InvalidRequest("name and cpf are required".to_string()));
        }

        let email = match request.email.trim() {
            "" => self.fallback_email(name),
            email => email.to_string(),
        };
        let phone = match digits(&request.phone) {
            p if p.is_empty() => self.fallback_phone(),
            p => p,
        };

        Ok(PreparedPayment {
            name: name.to_string(),
            document,
            email,
            phone,
            amount: request
                .amount
                .filter(|a| *a > 0.0)
                .unwrap_or(self.config.default_amount),
            description: self.config.description.clone(),
        })
    }

    /// Build a pending payment for a request
    ///
    /// # Errors
    /// `InvalidRequest` for missing payer data, `Config` for a bad QR endpoint
    pub fn generate(&self, request: &PaymentRequest) -> Result<PaymentInfo, PaymentError> {
        let prepared = self.prepare(request)?;
        let id = self.payment_id();
        let pix_code = self.pix_code(&prepared.document, prepared.amount, &id);
        let pix_qr_code_url = self.qr_code_url(&pix_code)?;

        tracing::info!("Generated mock PIX {} for {}", id, mask_cpf(&prepared.document));
        Ok(PaymentInfo {
            id,
            pix_code,
            pix_qr_code_url,
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        })
    }

    /// Session-unique id: `pix_<unix-millis>_<0..999>`
    #[must_use]
    pub fn payment_id(&self) -> String {
        let suffix: u32 = self.rng.lock().gen_range(0..1000);
        format!("pix_{}_{}", Utc::now().timestamp_millis(), suffix)
    }

    /// PIX-shaped code embedding the CPF and a random numeric suffix
    #[must_use]
    pub fn pix_code(&self, cpf_digits: &str, amount: f64, reference: &str) -> String {
        let account = format!("{}{}", tlv("00", "BR.GOV.BCB.PIX"), tlv("01", cpf_digits));
        let reference: String = reference
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(25)
            .collect();
        let merchant = emv_text(&self.config.merchant_name, 25);
        let city = emv_text(&self.config.merchant_city, 15);
        let suffix: u32 = self.rng.lock().gen_range(0..10_000);

        let mut code = String::new();
        code.push_str(&tlv("00", "01"));
        code.push_str(&tlv("26", &account));
        code.push_str(&tlv("52", "0000"));
        code.push_str(&tlv("53", "986"));
        code.push_str(&tlv("54", &format!("{amount:.2}")));
        code.push_str(&tlv("58", "BR"));
        code.push_str(&tlv("59", &merchant));
        code.push_str(&tlv("60", &city));
        code.push_str(&tlv("62", &tlv("05", &reference)));
        code.push_str(&format!("6304{suffix:04}"));
        code
    }

    /// QR image URL carrying the code as payload
    ///
    /// # Errors
    /// `Config` when the QR endpoint is not a valid URL
    pub fn qr_code_url(&self, pix_code: &str) -> Result<String, PaymentError> {
        let url = Url::parse_with_params(
            &self.config.qr_endpoint,
            &[("size", self.config.qr_size.as_str()), ("data", pix_code)],
        )
        .map_err(|e| PaymentError::Config(format!("invalid QR endpoint: {e}")))?;
        Ok(url.into())
    }

    /// `name.parts.<random>@mail.shopee.br`
    #[must_use]
    pub fn fallback_email(&self, name: &str) -> String {
        let user: String = name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(".")
            .chars()
            .take(15)
            .collect();
        let mut rng = self.rng.lock();
        let tag: String = (0..8)
            .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
            .collect();
        format!("{user}.{tag}@{FALLBACK_EMAIL_DOMAIN}")
    }

    /// Random 11-digit mobile number
    #[must_use]
    pub fn fallback_phone(&self) -> String {
        let mut rng = self.rng.lock();
        let area: u32 = rng.gen_range(11..99);
        let first: u32 = rng.gen_range(10_000..99_999);
        let second: u32 = rng.gen_range(1_000..9_999);
        format!("{area}{first}{second}")
    }
}

/// A provider that creates PIX payments
#[async_trait]
pub trait PaymentGateway: Named + Send + Sync + fmt::Debug {
    /// Create a payment
    ///
    /// # Errors
    /// Any non-2xx status, transport failure or unusable body
    async fn create(&self, request: &PaymentRequest) -> Result<PaymentInfo, ProviderError>;
}

/// Gateway backed by the local generator; never touches the network
#[derive(Debug, Clone)]
pub struct LocalPixGateway {
    generator: Arc<MockPixGenerator>,
}

impl LocalPixGateway {
    /// Create gateway over a generator
    #[inline]
    #[must_use]
    pub fn new(generator: Arc<MockPixGenerator>) -> Self {
        Self { generator }
    }
}

impl Named for LocalPixGateway {
    fn name(&self) -> &str {
        "local"
    }
}

#[async_trait]
impl PaymentGateway for LocalPixGateway {
    async fn create(&self, request: &PaymentRequest) -> Result<PaymentInfo, ProviderError> {
        self.generator.generate(request).map_err(|e| match e {
            PaymentError::InvalidRequest(msg) => ProviderError::Incomplete(msg),
            other => ProviderError::NotConfigured(other.to_string()),
        })
    }
}

/// Ordered fallback across payment gateways
#[derive(Debug, Clone)]
pub struct PaymentService {
    gateways: FallbackChain<dyn PaymentGateway>,
}

impl PaymentService {
    /// Create service over gateways in priority order
    #[must_use]
    pub fn new(gateways: Vec<Arc<dyn PaymentGateway>>) -> Self {
        Self {
            gateways: FallbackChain::new(gateways),
        }
    }

    /// Service that only uses the local generator
    #[must_use]
    pub fn local(generator: Arc<MockPixGenerator>) -> Self {
        Self::new(vec![Arc::new(LocalPixGateway::new(generator))])
    }

    /// Gateway names in the order they are tried
    #[must_use]
    pub fn gateway_names(&self) -> Vec<&str> {
        self.gateways.names()
    }

    /// Create a payment with the first gateway that succeeds
    ///
    /// # Errors
    /// `InvalidRequest` without any call when name or CPF is missing;
    /// `Unavailable` when every gateway failed
    pub async fn create(&self, request: &PaymentRequest) -> Result<PaymentInfo, PaymentError> {
        if request.name.trim().is_empty() || digits(&request.cpf).is_empty() {
            return Err(PaymentError::InvalidRequest("name and cpf are required".to_string()));
        }

        let resolved = self
            .gateways
            .first_success(|gateway| async move {
                let payment = gateway.create(request).await?;
                if payment.pix_code.is_empty() {
                    return Err(ProviderError::Incomplete("missing pixCode".to_string()));
                }
                if payment.pix_qr_code_url.is_empty() {
                    return Err(ProviderError::Incomplete("missing pixQrCode".to_string()));
                }
                Ok(payment)
            })
            .await
            .map_err(|attempts| PaymentError::Unavailable { attempts })?;

        tracing::info!("Payment {} created via {}", resolved.value.id, resolved.provider);
        Ok(resolved.value)
    }

    /// Create a payment and keep it for the payment page
    ///
    /// # Errors
    /// See [`create`](Self::create)
    pub async fn create_and_store(
        &self,
        request: &PaymentRequest,
        persistence: &Persistence,
    ) -> Result<PaymentInfo, PaymentError> {
        let payment = self.create(request).await?;
        persistence.save(keys::PAYMENT, &payment);
        Ok(payment)
    }
}

/// `MM:SS` rendering of a second count
#[must_use]
pub fn format_mm_ss(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Countdown snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownState {
    /// Seconds left
    pub remaining_secs: u64,
    /// Reached zero
    pub expired: bool,
}

impl CountdownState {
    /// Remaining time as `MM:SS`
    #[must_use]
    pub fn display(&self) -> String {
        format_mm_ss(self.remaining_secs)
    }
}

/// Cosmetic payment countdown ticking once per second
#[derive(Debug)]
pub struct Countdown {
    state: watch::Receiver<CountdownState>,
    handle: TimerHandle,
}

impl Countdown {
    /// Start counting down from `total`
    pub fn start(total: Duration) -> Self {
        let secs = total.as_secs();
        let (tx, rx) = watch::channel(CountdownState {
            remaining_secs: secs,
            expired: secs == 0,
        });
        if secs == 0 {
            return Self {
                state: rx,
                handle: TimerHandle::detached(),
            };
        }

        let handle = spawn_interval(Duration::from_secs(1), move || {
            let mut expired = false;
            tx.send_modify(|s| {
                s.remaining_secs = s.remaining_secs.saturating_sub(1);
                s.expired = s.remaining_secs == 0;
                expired = s.expired;
            });
            if expired {
                tracing::debug!("Payment countdown expired");
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        Self { state: rx, handle }
    }

    /// Current snapshot
    #[must_use]
    pub fn state(&self) -> CountdownState {
        *self.state.borrow()
    }

    /// Remaining time as `MM:SS`
    #[must_use]
    pub fn display(&self) -> String {
        self.state().display()
    }

    /// True once zero is reached
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state().expired
    }

    /// State updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        self.state.clone()
    }

    /// Stop ticking
    pub fn cancel(&mut self) -> bool {
        self.handle.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> MockPixGenerator {
        MockPixGenerator::with_rng(PixConfig::default(), StdRng::seed_from_u64(42))
    }

    #[derive(Debug)]
    struct Failing(&'static str, ProviderError);

    impl Named for Failing {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[async_trait]
    impl PaymentGateway for Failing {
        async fn create(&self, _request: &PaymentRequest) -> Result<PaymentInfo, ProviderError> {
            Err(self.1.clone())
        }
    }

    #[derive(Debug)]
    struct Hollow;

    impl Named for Hollow {
        fn name(&self) -> &str {
            "hollow"
        }
    }

    #[async_trait]
    impl PaymentGateway for Hollow {
        async fn create(&self, _request: &PaymentRequest) -> Result<PaymentInfo, ProviderError> {
            Ok(PaymentInfo {
                id: "x".to_string(),
                pix_code: "000201".to_string(),
                pix_qr_code_url: String::new(),
                status: PaymentStatus::Pending,
                created_at: Utc::now(),
            })
        }
    }

    #[test]
    fn pix_code_embeds_cpf_and_amount() {
        let payment = generator()
            .generate(&PaymentRequest::new("Jane Doe", "123.456.789-01").with_amount(84.70))
            .unwrap();

        assert!(payment.pix_code.starts_with("000201"));
        assert!(payment.pix_code.contains("0014BR.GOV.BCB.PIX011112345678901"));
        assert!(payment.pix_code.contains("540584.70"));
        assert!(payment.pix_code[payment.pix_code.len() - 8..].starts_with("6304"));
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[test]
    fn accented_merchant_fields_stay_ascii() {
        let config = PixConfig {
            merchant_name: "Entregas Ágil Ltda".to_string(),
            merchant_city: "SÃO PAULO".to_string(),
            ..PixConfig::default()
        };
        let generator = MockPixGenerator::with_rng(config, StdRng::seed_from_u64(7));
        let code = generator.pix_code("12345678901", 84.70, "ref1");

        assert!(code.is_ascii());
        assert!(code.contains("5918Entregas Agil Ltda"));
        assert!(code.contains("6009SAO PAULO"));
    }

    #[test]
    fn tlv_length_never_exceeds_two_digits() {
        let field = tlv("26", &"x".repeat(150));
        assert_eq!(&field[..4], "2699");
        assert_eq!(field.len(), 4 + 99);
        assert_eq!(tlv("60", "SÃO"), "6003SAO");
    }

    #[test]
    fn qr_url_is_well_formed() {
        let payment = generator().generate(&PaymentRequest::new("Jane", "12345678901")).unwrap();
        let url = Url::parse(&payment.pix_qr_code_url).unwrap();

        assert_eq!(url.host_str(), Some("api.qrserver.com"));
        let data = url.query_pairs().find(|(k, _)| k == "data").unwrap().1;
        assert_eq!(data, payment.pix_code);
    }

    #[test]
    fn payment_id_shape() {
        let id = generator().payment_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "pix");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].parse::<u32>().unwrap() < 1000);
    }

    #[test]
    fn prepare_fills_contact_fallbacks() {
        let prepared = generator().prepare(&PaymentRequest::new("Jane  Maria Doe", "123.456.789-01")).unwrap();

        assert!(prepared.email.starts_with("jane.maria.doe."));
        assert!(prepared.email.ends_with("@mail.shopee.br"));
        assert_eq!(prepared.phone.len(), 11);
        assert_eq!(prepared.document, "12345678901");
        assert!((prepared.amount - DEFAULT_KIT_AMOUNT).abs() < f64::EPSILON);
    }

    #[test]
    fn prepare_requires_name_and_cpf() {
        assert!(matches!(
            generator().prepare(&PaymentRequest::new("", "123")),
            Err(PaymentError::InvalidRequest(_))
        ));
        assert!(generator().prepare(&PaymentRequest::new("Jane", "")).is_err());
    }

    #[test]
    fn bad_qr_endpoint_is_config_error() {
        let gen = MockPixGenerator::new(PixConfig::default().with_qr_endpoint("not a url"));
        assert!(matches!(
            gen.generate(&PaymentRequest::new("Jane", "12345678901")),
            Err(PaymentError::Config(_))
        ));
    }

    #[tokio::test]
    async fn service_falls_back_to_local_generator() {
        let service = PaymentService::new(vec![
            Arc::new(Failing("direct", ProviderError::NotConfigured("no secret".to_string()))),
            Arc::new(Hollow),
            Arc::new(LocalPixGateway::new(Arc::new(generator()))),
        ]);

        let payment = service.create(&PaymentRequest::new("Jane", "12345678901")).await.unwrap();

        assert!(payment.pix_code.contains("12345678901"));
        assert_eq!(service.gateway_names(), vec!["direct", "hollow", "local"]);
    }

    #[tokio::test]
    async fn service_reports_unavailable_when_all_fail() {
        let service = PaymentService::new(vec![Arc::new(Failing("server", ProviderError::Status(502)))]);
        let err = service.create(&PaymentRequest::new("Jane", "12345678901")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Unavailable { ref attempts } if attempts.len() == 1));
    }

    #[test]
    fn mm_ss_format() {
        assert_eq!(format_mm_ss(1800), "30:00");
        assert_eq!(format_mm_ss(61), "01:01");
        assert_eq!(format_mm_ss(0), "00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_and_expires() {
        let countdown = Countdown::start(Duration::from_secs(3));
        assert_eq!(countdown.display(), "00:03");

        tokio::time::sleep(Duration::from_millis(1_001)).await;
        assert_eq!(countdown.display(), "00:02");
        assert!(!countdown.is_expired());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(countdown.is_expired());
        assert_eq!(countdown.display(), "00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_stops() {
        let mut countdown = Countdown::start(Duration::from_secs(1_800));
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert!(countdown.cancel());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(countdown.display(), "29:50");
    }
}
