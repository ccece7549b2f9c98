//! ContentDirectory Browse action over SOAP
//!
//! [`BrowseAction`] is the seam between paging logic and the network. The
//! default [`SoapBrowseAction`] posts a SOAP 1.1 envelope to the service's
//! control URL and reads `Result`, `NumberReturned`, `TotalMatches` and
//! `UpdateID` out of the reply. Failed calls are reported, never retried.

use crate::error::{Error, ProtocolError, Result};
use async_trait::async_trait;
use quick_xml::escape::escape;
use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use std::collections::HashMap;
use tracing::debug;

/// ContentDirectory service type used when the description does not name one
pub const CDS_SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

/// Arguments of one `BrowseDirectChildren` call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseRequest {
    /// Object to browse
    pub object_id: String,
    /// Property filter
    pub filter: String,
    /// Sort criteria
    pub sort_criteria: String,
    /// Offset of the first requested entry
    pub starting_index: u32,
    /// Number of entries requested
    pub requested_count: u32,
}

/// Output arguments of one Browse call
///
/// Counts keep the signed wire value; anything missing or unparseable is
/// decoded as -1 so the paging layer rejects it as a protocol violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseResponse {
    /// DIDL-Lite payload, verbatim
    pub result: String,
    /// `NumberReturned`
    pub number_returned: i64,
    /// `TotalMatches`
    pub total_matches: i64,
    /// `UpdateID`, if present
    pub update_id: Option<u32>,
}

/// Invokes the remote listing action
#[async_trait]
pub trait BrowseAction: Send + Sync {
    /// Perform one Browse call
    async fn browse(&self, request: &BrowseRequest) -> Result<BrowseResponse>;
}

/// [`BrowseAction`] that talks SOAP over HTTP to a ContentDirectory control URL
#[derive(Clone, Debug)]
pub struct SoapBrowseAction {
    client: reqwest::Client,
    control_url: url::Url,
    service_type: String,
}

impl SoapBrowseAction {
    /// Create an action for the given control URL and service type
    pub fn new(client: reqwest::Client, control_url: url::Url, service_type: &str) -> Self {
        Self {
            client,
            control_url,
            service_type: service_type.to_string(),
        }
    }

    /// Control URL the action posts to
    pub fn control_url(&self) -> &url::Url {
        &self.control_url
    }

    fn envelope(&self, request: &BrowseRequest) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" "#,
                r#"s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">"#,
                r#"<s:Body><u:Browse xmlns:u="{service}">"#,
                "<ObjectID>{object_id}</ObjectID>",
                "<BrowseFlag>BrowseDirectChildren</BrowseFlag>",
                "<Filter>{filter}</Filter>",
                "<StartingIndex>{start}</StartingIndex>",
                "<RequestedCount>{count}</RequestedCount>",
                "<SortCriteria>{sort}</SortCriteria>",
                "</u:Browse></s:Body></s:Envelope>"
            ),
            service = escape(self.service_type.as_str()),
            object_id = escape(request.object_id.as_str()),
            filter = escape(request.filter.as_str()),
            start = request.starting_index,
            count = request.requested_count,
            sort = escape(request.sort_criteria.as_str()),
        )
    }
}

#[async_trait]
impl BrowseAction for SoapBrowseAction {
    async fn browse(&self, request: &BrowseRequest) -> Result<BrowseResponse> {
        debug!(
            object_id = %request.object_id,
            start = request.starting_index,
            count = request.requested_count,
            url = %self.control_url,
            "invoking Browse"
        );

        let response = self
            .client
            .post(self.control_url.clone())
            .header("SOAPACTION", format!("\"{}#Browse\"", self.service_type))
            .header(reqwest::header::CONTENT_TYPE, r#"text/xml; charset="utf-8""#)
            .body(self.envelope(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            if let Some(fault) = parse_fault(&body) {
                return Err(fault.into());
            }
            return Err(Error::Transport(format!(
                "Browse on {} failed with HTTP {}",
                self.control_url, status
            )));
        }

        parse_browse_response(&body).map_err(|reason| {
            Error::from(ProtocolError::Malformed {
                container: request.object_id.clone(),
                reason,
            })
        })
    }
}

/// Read the Browse output arguments from a SOAP response body
pub fn parse_browse_response(body: &str) -> std::result::Result<BrowseResponse, String> {
    let fields = collect_text(body, &["Result", "NumberReturned", "TotalMatches", "UpdateID"])?;
    if fields.is_empty() {
        return Err("response carries no Browse output arguments".to_string());
    }
    let number = |name: &str| {
        fields
            .get(name)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(-1)
    };
    Ok(BrowseResponse {
        result: fields.get("Result").cloned().unwrap_or_default(),
        number_returned: number("NumberReturned"),
        total_matches: number("TotalMatches"),
        update_id: fields.get("UpdateID").and_then(|v| v.trim().parse().ok()),
    })
}

/// Extract a UPnP fault (`errorCode` / `errorDescription`) from a SOAP body
pub fn parse_fault(body: &str) -> Option<ProtocolError> {
    let fields = collect_text(body, &["errorCode", "errorDescription"]).ok()?;
    let code = fields.get("errorCode")?.trim().parse().ok()?;
    Some(ProtocolError::Fault {
        code,
        description: fields.get("errorDescription").cloned().unwrap_or_default(),
    })
}

/// Unescaped text of the first element with each of the given local names
fn collect_text(
    xml: &str,
    names: &[&str],
) -> std::result::Result<HashMap<String, String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut fields = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            XmlEvent::Start(e) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if names.contains(&local.as_str()) && !fields.contains_key(&local) {
                    fields.insert(local.clone(), String::new());
                    current = Some(local);
                } else {
                    current = None;
                }
            }
            XmlEvent::Empty(e) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if names.contains(&local.as_str()) {
                    fields.entry(local).or_default();
                }
            }
            XmlEvent::Text(t) => {
                if let Some(name) = current.as_ref() {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    if let Some(value) = fields.get_mut(name) {
                        value.push_str(&text);
                    }
                }
            }
            XmlEvent::CData(c) => {
                if let Some(value) = current.as_ref().and_then(|n| fields.get_mut(n)) {
                    value.push_str(&String::from_utf8_lossy(&c));
                }
            }
            XmlEvent::End(_) => current = None,
            XmlEvent::Eof => break,
            _ => {}
        }
    }
    Ok(fields)
}
