//! Client for the capture device's filter API
//!
//! The device exposes its whitelist, blacklist, mask filter and inactivity
//! timeout as small JSON endpoints. Updates are sent as form-urlencoded
//! bodies; lists use the `name[]=value` convention and an empty `name=`
//! clears them.

use can_monitor_core::{InactivityTimeout, MaskPair};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Which identifier list a request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    Whitelist,
    Blacklist,
}

impl ListTarget {
    /// Form field carrying the identifiers
    fn field(self) -> &'static str {
        match self {
            ListTarget::Whitelist => "whitelist",
            ListTarget::Blacklist => "blacklist",
        }
    }

    fn set_path(self) -> &'static str {
        match self {
            ListTarget::Whitelist => "/api/filter1/installByIds",
            ListTarget::Blacklist => "/api/filter2/setExcluded",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListTarget::Whitelist => "identifier whitelist",
            ListTarget::Blacklist => "identifier blacklist",
        }
    }
}

/// One call to the device
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ApplyList(ListTarget, Vec<String>),
    ResetList(ListTarget),
    ReloadList(ListTarget),
    ApplyMask(Option<MaskPair>),
    ResetMask,
    ReloadMask,
    ApplyTimeout(InactivityTimeout),
    ReloadTimeout,
}

impl Request {
    /// Human description used in notifications ("Could not ...")
    pub fn describe(&self) -> String {
        match self {
            Request::ApplyList(target, _) => format!("apply the {}", target.label()),
            Request::ResetList(target) => format!("reset the {}", target.label()),
            Request::ReloadList(target) => format!("reload the {}", target.label()),
            Request::ApplyMask(_) => "apply the identifier mask".to_string(),
            Request::ResetMask => "reset the identifier mask".to_string(),
            Request::ReloadMask => "reload the identifier mask".to_string(),
            Request::ApplyTimeout(_) => "apply the CAN inactivity timeout".to_string(),
            Request::ReloadTimeout => "reload the CAN inactivity timeout".to_string(),
        }
    }
}

/// Successful reply content
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    Identifiers(Vec<u32>),
    Mask { mask: u32, masking_result: u32 },
    Timeout(f64),
}

/// Reply of `/api/filter1/getInstalled`
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledFilter {
    #[serde(default)]
    pub mask: Option<u32>,
    #[serde(default, rename = "maskingResult")]
    pub masking_result: Option<u32>,
    #[serde(default)]
    pub whitelist: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExcludedReply {
    #[serde(default)]
    blacklist: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize)]
struct TimeoutReply {
    timeout: f64,
}

#[derive(Clone)]
pub struct DeviceClient {
    http: Client,
    base_url: Url,
}

impl DeviceClient {
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    /// Execute one request
    pub async fn perform(&self, request: &Request) -> Result<Outcome> {
        match request {
            Request::ApplyList(target, identifiers) => {
                self.post(target.set_path(), &list_form(target.field(), identifiers))
                    .await?;
                Ok(Outcome::Done)
            }
            Request::ResetList(target) => {
                self.post(target.set_path(), &list_form(target.field(), &[]))
                    .await?;
                Ok(Outcome::Done)
            }
            Request::ReloadList(ListTarget::Whitelist) => {
                let installed = self.installed_filter().await?;
                Ok(Outcome::Identifiers(installed.whitelist.unwrap_or_default()))
            }
            Request::ReloadList(ListTarget::Blacklist) => {
                let reply: ExcludedReply = self.get("/api/filter2/getExcluded").await?;
                Ok(Outcome::Identifiers(reply.blacklist.unwrap_or_default()))
            }
            Request::ApplyMask(pair) => {
                self.post("/api/filter1/installByMask", &mask_form(*pair)).await?;
                Ok(Outcome::Done)
            }
            Request::ResetMask => {
                self.post("/api/filter1/installByMask", &mask_form(None)).await?;
                Ok(Outcome::Done)
            }
            Request::ReloadMask => {
                let installed = self.installed_filter().await?;
                Ok(Outcome::Mask {
                    mask: installed.mask.unwrap_or(0),
                    masking_result: installed.masking_result.unwrap_or(0),
                })
            }
            Request::ApplyTimeout(timeout) => {
                let form = vec![("timeout".to_string(), timeout.to_string())];
                self.post("/api/setInactivityTimeout", &form).await?;
                Ok(Outcome::Done)
            }
            Request::ReloadTimeout => {
                let reply: TimeoutReply = self.get("/api/getInactivityTimeout").await?;
                Ok(Outcome::Timeout(reply.timeout))
            }
        }
    }

    pub async fn installed_filter(&self) -> Result<InstalledFilter> {
        self.get("/api/filter1/getInstalled").await
    }

    async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        log::debug!("GET {}", url);
        let res = self.http.get(url).send().await?;

        if res.status().is_success() {
            Ok(res.json::<T>().await?)
        } else {
            Err(unexpected(res).await)
        }
    }

    async fn post(&self, path: &str, form: &[(String, String)]) -> Result<()> {
        let url = self.base_url.join(path)?;
        log::debug!("POST {} {:?}", url, form);
        let res = self.http.post(url).form(form).send().await?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(res).await)
        }
    }
}

async fn unexpected(res: reqwest::Response) -> RemoteError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    RemoteError::UnexpectedStatus { status, body }
}

/// `field[]=a&field[]=b`, or `field=` to clear the list
fn list_form(field: &str, identifiers: &[String]) -> Vec<(String, String)> {
    if identifiers.is_empty() {
        return vec![(field.to_string(), String::new())];
    }
    identifiers
        .iter()
        .map(|identifier| (format!("{}[]", field), identifier.clone()))
        .collect()
}

/// `mask=..&maskingResult=..`, both empty to remove the mask
fn mask_form(pair: Option<MaskPair>) -> Vec<(String, String)> {
    let (mask, masking_result) = match pair {
        Some(pair) => (pair.mask_text(), pair.masking_result_text()),
        None => (String::new(), String::new()),
    };
    vec![
        ("mask".to_string(), mask),
        ("maskingResult".to_string(), masking_result),
    ]
}
