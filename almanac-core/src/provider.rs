use std::{collections::BTreeMap, fmt::Debug};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::{
    Config,
    error::FetchError,
    model::{DailyRecord, GeoPoint, MonthDay, ScalarVariable, YearRange, YearlyScalars},
    provider::{gesdisc::GesDiscProvider, power::PowerProvider},
};

pub mod gesdisc;
pub mod power;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// NASA GES DISC OPeNDAP service, hourly MERRA-2 reanalysis.
    GesDisc,
    /// NASA POWER daily point API.
    Power,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::GesDisc => "gesdisc",
            ProviderId::Power => "power",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::GesDisc, ProviderId::Power]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "gesdisc" => Ok(ProviderId::GesDisc),
            "power" => Ok(ProviderId::Power),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: gesdisc, power."
            )),
        }
    }
}

/// A fully-qualified GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
}

/// Builds a provider request for a period, a location and a list of
/// provider variable codes.
pub trait QueryBuilder {
    type Period;

    fn build(
        &self,
        period: &Self::Period,
        point: GeoPoint,
        variables: &[&str],
    ) -> Result<RequestDescriptor, FetchError>;
}

/// Produces one cleaned [`DailyRecord`] per calendar date.
#[async_trait]
pub trait DailyRecordSource: Send + Sync + Debug {
    async fn fetch_day(&self, date: NaiveDate, point: GeoPoint) -> Result<DailyRecord, FetchError>;
}

/// Produces per-year scalars for a fixed calendar day over a span of years.
#[async_trait]
pub trait YearlyScalarSource: Send + Sync + Debug {
    async fn fetch_yearly(
        &self,
        variables: &[ScalarVariable],
        month_day: MonthDay,
        point: GeoPoint,
        years: YearRange,
    ) -> Result<BTreeMap<ScalarVariable, YearlyScalars>, FetchError>;
}

/// Construct the hourly reanalysis provider from config.
pub fn gesdisc_from_config(config: &Config, http: Client) -> GesDiscProvider {
    let base_url = config
        .provider_base_url(ProviderId::GesDisc)
        .unwrap_or(gesdisc::DEFAULT_BASE_URL);

    GesDiscProvider::new(http, base_url, config.gesdisc_token())
}

/// Construct the daily point provider from config.
pub fn power_from_config(config: &Config, http: Client) -> PowerProvider {
    let base_url = config
        .provider_base_url(ProviderId::Power)
        .unwrap_or(power::DEFAULT_BASE_URL);

    PowerProvider::new(http, base_url)
}

/// Issue a GET and return the body of a successful response.
pub(crate) async fn get_text(
    http: &Client,
    provider: &'static str,
    request: &RequestDescriptor,
    bearer_token: Option<&str>,
) -> Result<String, FetchError> {
    let mut builder = http.get(&request.url);
    if !request.query.is_empty() {
        builder = builder.query(&request.query);
    }
    if let Some(token) = bearer_token {
        builder = builder.bearer_auth(token);
    }

    let res = builder
        .send()
        .await
        .map_err(|e| FetchError::transport(provider, e))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| FetchError::transport(provider, e))?;

    if !status.is_success() {
        return Err(FetchError::upstream(provider, status, &body));
    }

    Ok(body)
}

/// Ensure a base URL ends with exactly one `/`.
pub(crate) fn normalize_base_url(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}

/// Loopback HTTP/1.1 server answering every request with a canned response.
#[cfg(test)]
pub(crate) mod test_server {
    use std::sync::{Arc, Mutex};

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    pub(crate) struct TestServer {
        pub base_url: String,
        /// Raw request heads, in arrival order.
        pub requests: Arc<Mutex<Vec<String>>>,
    }

    impl TestServer {
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// `respond` maps a request target (path and query) to a status and body.
    pub(crate) async fn serve<F>(respond: F) -> TestServer
    where
        F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let log = log.clone();
                let respond = respond.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).into_owned();
                    let target = head.split_whitespace().nth(1).unwrap_or_default().to_string();
                    log.lock().unwrap().push(head);

                    let (status, body) = respond(&target);
                    let response = format!(
                        "HTTP/1.1 {status} Test\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        TestServer {
            base_url: format!("http://{addr}/"),
            requests,
        }
    }
}
