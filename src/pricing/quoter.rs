use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::warn;

use crate::model::{DateRange, Money, RoomType};

use super::{FALLBACK_NIGHTLY_RATE, PricingError, PricingResponse, calculate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSource {
    Engine,
    Remote,
    Fallback,
}

/// What the booking side needs from pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub total: Money,
    pub price_per_night: Money,
    pub nights: u32,
    pub source: QuoteSource,
}

impl Quote {
    pub fn flat(nightly: Money, nights: u32) -> Self {
        Self {
            total: nightly * nights,
            price_per_night: nightly,
            nights,
            source: QuoteSource::Fallback,
        }
    }
}

#[derive(Debug)]
pub enum QuoteError {
    Pricing(PricingError),
    Transport(String),
    Status { status: u16, message: String },
    Malformed(String),
    TimedOut(Duration),
}

impl std::fmt::Display for QuoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteError::Pricing(e) => write!(f, "{e}"),
            QuoteError::Transport(e) => write!(f, "pricing request failed: {e}"),
            QuoteError::Status { status, message } => {
                write!(f, "pricing service returned {status}: {message}")
            }
            QuoteError::Malformed(e) => write!(f, "malformed pricing response: {e}"),
            QuoteError::TimedOut(after) => write!(f, "pricing timed out after {after:?}"),
        }
    }
}

impl std::error::Error for QuoteError {}

impl From<PricingError> for QuoteError {
    fn from(e: PricingError) -> Self {
        QuoteError::Pricing(e)
    }
}

#[async_trait]
pub trait RateQuoter: Send + Sync {
    async fn quote(&self, room_type: RoomType, range: &DateRange) -> Result<Quote, QuoteError>;
}

/// Runs the rule table in-process.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalQuoter;

#[async_trait]
impl RateQuoter for LocalQuoter {
    async fn quote(&self, room_type: RoomType, range: &DateRange) -> Result<Quote, QuoteError> {
        let result = calculate(room_type, range)?;
        Ok(Quote {
            total: result.total,
            price_per_night: result.price_per_night,
            nights: result.nights,
            source: QuoteSource::Engine,
        })
    }
}

/// Calls a pricing service's `/api/pricing/calculate` endpoint.
#[derive(Clone)]
pub struct RemoteQuoter {
    client: Client,
    base_url: String,
}

impl RemoteQuoter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, QuoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RateQuoter for RemoteQuoter {
    async fn quote(&self, room_type: RoomType, range: &DateRange) -> Result<Quote, QuoteError> {
        let check_in = range.check_in().to_string();
        let check_out = range.check_out().to_string();
        let response = self
            .client
            .get(format!("{}/api/pricing/calculate", self.base_url))
            .query(&[
                ("roomType", room_type.as_str()),
                ("checkin", check_in.as_str()),
                ("checkout", check_out.as_str()),
            ])
            .send()
            .await
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: PricingResponse = response
                    .json()
                    .await
                    .map_err(|e| QuoteError::Malformed(e.to_string()))?;
                let total = Money::new(body.total_price.round_dp(2))
                    .map_err(|e| QuoteError::Malformed(e.to_string()))?;
                let price_per_night = Money::new(body.price_per_night.round_dp(2))
                    .map_err(|e| QuoteError::Malformed(e.to_string()))?;
                Ok(Quote {
                    total,
                    price_per_night,
                    nights: body.nights,
                    source: QuoteSource::Remote,
                })
            }
            status => Err(QuoteError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Never fails: an inner error or timeout degrades to a flat nightly rate.
pub struct FallbackQuoter {
    inner: Arc<dyn RateQuoter>,
    timeout: Duration,
    nightly: Money,
}

impl FallbackQuoter {
    pub fn new(inner: Arc<dyn RateQuoter>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            nightly: Money::new(FALLBACK_NIGHTLY_RATE).unwrap_or(Money::ZERO),
        }
    }
}

#[async_trait]
impl RateQuoter for FallbackQuoter {
    async fn quote(&self, room_type: RoomType, range: &DateRange) -> Result<Quote, QuoteError> {
        let outcome = match tokio::time::timeout(self.timeout, self.inner.quote(room_type, range)).await {
            Ok(result) => result,
            Err(_) => Err(QuoteError::TimedOut(self.timeout)),
        };
        match outcome {
            Ok(quote) => Ok(quote),
            Err(e) => {
                warn!("pricing unavailable for {room_type} {range}, using flat rate: {e}");
                metrics::counter!(crate::observability::PRICING_FALLBACKS_TOTAL).increment(1);
                Ok(Quote::flat(self.nightly, range.nights()))
            }
        }
    }
}
