//! Quotes provider backed by the National Bank of Poland (NBP) Web API.
//!
//! Table A of the API publishes average exchange rates for working days
//! only; a request for a day without a fixing returns HTTP 404. See
//! <https://api.nbp.pl/> for the endpoint documentation.

use super::QuotesProvider;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::{debug, warn};
use ureq::tls::{TlsConfig, TlsProvider};
use ureq::Agent;

pub const DEFAULT_NBP_URL: &str = "https://api.nbp.pl";

#[derive(Debug, Deserialize)]
struct RatesEnvelope {
    rates: Vec<RateEntry>,
}

#[derive(Debug, Deserialize)]
struct RateEntry {
    mid: Decimal,
}

pub struct NbpClient {
    agent: Agent,
    base_url: String,

    // Rows of one report repeatedly hit the same few (currency, day) keys.
    cache: RefCell<HashMap<(String, NaiveDate), Option<Decimal>>>,
}

impl NbpClient {
    pub fn new(base_url: &str) -> Self {
        let agent = Agent::from(
            Agent::config_builder()
                // 404 means "no fixing that day", not an error.
                .http_status_as_error(false)
                .tls_config(
                    TlsConfig::builder()
                        .provider(TlsProvider::NativeTls)
                        .build(),
                )
                .build(),
        );

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn fetch(&self, currency: &str, day: NaiveDate) -> Option<Decimal> {
        let url = format!(
            "{}/api/exchangerates/rates/a/{}/{}?format=json",
            self.base_url,
            currency.to_lowercase(),
            day.format("%Y-%m-%d"),
        );
        debug!("Fetching NBP quote from `{url}`");

        let mut resp = match self.agent.get(&url).call() {
            Ok(resp) => resp,
            Err(err) => {
                warn!("NBP request for {currency} on {day} failed: {err}");
                return None;
            }
        };

        match resp.status().as_u16() {
            200 => (),
            404 => return None,
            status => {
                warn!("NBP request for {currency} on {day} returned status {status}");
                return None;
            }
        }

        let envelope: RatesEnvelope = match resp.body_mut().read_json() {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("Unparsable NBP response for {currency} on {day}: {err}");
                return None;
            }
        };

        envelope.rates.first().map(|entry| entry.mid)
    }
}

impl QuotesProvider for NbpClient {
    fn average_rate(&self, currency: &str, day: NaiveDate) -> Option<Decimal> {
        let key = (currency.to_string(), day);
        if let Some(rate) = self.cache.borrow().get(&key) {
            return *rate;
        }

        let rate = self.fetch(currency, day);
        self.cache.borrow_mut().insert(key, rate);

        rate
    }
}
