//! Media server device description and connection
//!
//! A [`MediaServer`] bundles what an export needs from a device: its
//! description documents, a [`BrowseAction`] for the ContentDirectory service
//! and a [`ResponseDecoder`] for Browse results. [`MediaServer::connect`]
//! builds one from a device description URL over HTTP; tests and embedders
//! can assemble one from their own parts with [`MediaServer::new`].

use crate::config::HttpConfig;
use crate::control::{BrowseAction, CDS_SERVICE_TYPE, SoapBrowseAction};
use crate::didl::{DidlDecoder, ResponseDecoder};
use crate::error::{Error, Result};
use crate::fetch::{BrowseOptions, PageFetcher};
use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

/// Device type prefix every media server advertises
pub const MEDIA_SERVER_DEVICE_TYPE: &str = "urn:schemas-upnp-org:device:MediaServer";

/// Service id of the ContentDirectory service
pub const CDS_SERVICE_ID: &str = "urn:upnp-org:serviceId:ContentDirectory";

/// One service entry of a device description
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceDescription {
    /// `serviceId`
    pub service_id: String,
    /// `serviceType`
    pub service_type: String,
    /// Absolute SCPD URL, if the description names one
    pub scpd_url: Option<Url>,
    /// Absolute control URL, if the description names one
    pub control_url: Option<Url>,
    /// SCPD document (empty until fetched)
    pub description: String,
}

/// Root device of a device description document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    /// `friendlyName`
    pub friendly_name: String,
    /// `deviceType`
    pub device_type: String,
    /// `UDN`
    pub udn: String,
    /// Base every relative URL was resolved against
    pub url_base: Option<Url>,
    /// The description document, verbatim
    pub xml: String,
    /// Services of the root device, in document order
    pub services: Vec<ServiceDescription>,
}

impl DeviceDescription {
    /// Parse a device description fetched from `location`
    ///
    /// Only the root device is read; embedded devices are ignored. Relative
    /// service URLs are resolved against `URLBase` when present, otherwise
    /// against `location`.
    pub fn parse(location: &Url, xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut description = DeviceDescription {
            xml: xml.to_string(),
            ..Default::default()
        };
        let mut url_base: Option<String> = None;
        let mut raw_services: Vec<[String; 4]> = Vec::new();
        let mut stack: Vec<String> = Vec::new();

        loop {
            match reader.read_event().map_err(|e| Error::Xml(e.to_string()))? {
                XmlEvent::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    stack.push(name);
                    if is_path(&stack, &["root", "device", "serviceList", "service"]) {
                        raw_services.push(Default::default());
                    }
                }
                XmlEvent::End(_) => {
                    stack.pop();
                }
                XmlEvent::Text(t) => {
                    let text = t.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                    let text = text.trim().to_string();
                    let Some((leaf, parents)) = stack.split_last() else {
                        continue;
                    };
                    let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
                    match parents.as_slice() {
                        ["root"] if leaf == "URLBase" => url_base = Some(text),
                        ["root", "device"] => match leaf.as_str() {
                            "friendlyName" => description.friendly_name = text,
                            "deviceType" => description.device_type = text,
                            "UDN" => description.udn = text,
                            _ => {}
                        },
                        ["root", "device", "serviceList", "service"] => {
                            if let Some(service) = raw_services.last_mut() {
                                let slot = match leaf.as_str() {
                                    "serviceId" => 0,
                                    "serviceType" => 1,
                                    "SCPDURL" => 2,
                                    "controlURL" => 3,
                                    _ => continue,
                                };
                                service[slot] = text;
                            }
                        }
                        _ => {}
                    }
                }
                XmlEvent::Eof => break,
                _ => {}
            }
        }

        if description.udn.is_empty() && description.device_type.is_empty() {
            return Err(Error::Xml("document has no root device element".to_string()));
        }

        let base = match url_base.filter(|b| !b.is_empty()) {
            Some(raw) => {
                let parsed = Url::parse(&raw)
                    .map_err(|e| Error::Xml(format!("invalid URLBase '{}': {}", raw, e)))?;
                description.url_base = Some(parsed.clone());
                parsed
            }
            None => location.clone(),
        };

        for [service_id, service_type, scpd, control] in raw_services {
            description.services.push(ServiceDescription {
                service_id,
                service_type,
                scpd_url: resolve(&base, &scpd)?,
                control_url: resolve(&base, &control)?,
                description: String::new(),
            });
        }
        Ok(description)
    }

    /// Find a service by id
    pub fn service(&self, service_id: &str) -> Option<&ServiceDescription> {
        self.services.iter().find(|s| s.service_id == service_id)
    }
}

fn is_path(stack: &[String], path: &[&str]) -> bool {
    stack.len() == path.len() && stack.iter().zip(path).all(|(a, b)| a == b)
}

fn resolve(base: &Url, raw: &str) -> Result<Option<Url>> {
    if raw.is_empty() {
        return Ok(None);
    }
    base.join(raw)
        .map(Some)
        .map_err(|e| Error::Xml(format!("invalid service URL '{}': {}", raw, e)))
}

/// Build the HTTP client used to talk to media servers
pub fn http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.clone())
        .build()?)
}

/// A media server ready to be browsed
#[derive(Clone)]
pub struct MediaServer {
    description: DeviceDescription,
    browse: Arc<dyn BrowseAction>,
    decoder: Arc<dyn ResponseDecoder>,
}

impl std::fmt::Debug for MediaServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaServer")
            .field("friendly_name", &self.description.friendly_name)
            .field("udn", &self.description.udn)
            .finish_non_exhaustive()
    }
}

impl MediaServer {
    /// Assemble a media server from a description and its collaborators
    ///
    /// Fails with [`Error::InvalidDevice`] unless the device is a MediaServer
    /// with a ContentDirectory service.
    pub fn new(
        description: DeviceDescription,
        browse: Arc<dyn BrowseAction>,
        decoder: Arc<dyn ResponseDecoder>,
    ) -> Result<Self> {
        if !description.device_type.starts_with(MEDIA_SERVER_DEVICE_TYPE) {
            return Err(Error::InvalidDevice(format!(
                "'{}' is not a MediaServer (device type {})",
                description.friendly_name, description.device_type
            )));
        }
        if description.service(CDS_SERVICE_ID).is_none() {
            return Err(Error::InvalidDevice(format!(
                "'{}' has no ContentDirectory service",
                description.friendly_name
            )));
        }
        Ok(Self {
            description,
            browse,
            decoder,
        })
    }

    /// Fetch the device description at `location`, its service descriptions,
    /// and wire a SOAP Browse action for the ContentDirectory service
    pub async fn connect(client: &reqwest::Client, location: &str) -> Result<Self> {
        let location = Url::parse(location).map_err(|e| Error::Config {
            message: format!("invalid device location '{}': {}", location, e),
            key: Some("location".to_string()),
        })?;

        let xml = fetch_text(client, &location).await?;
        let mut description = DeviceDescription::parse(&location, &xml)?;
        for service in &mut description.services {
            if let Some(url) = &service.scpd_url {
                debug!(service_id = %service.service_id, %url, "fetching service description");
                service.description = fetch_text(client, url).await?;
            }
        }

        let cds = description.service(CDS_SERVICE_ID).ok_or_else(|| {
            Error::InvalidDevice(format!(
                "'{}' has no ContentDirectory service",
                description.friendly_name
            ))
        })?;
        let control_url = cds.control_url.clone().ok_or_else(|| {
            Error::InvalidDevice(format!(
                "'{}' ContentDirectory has no control URL",
                description.friendly_name
            ))
        })?;
        let service_type = match cds.service_type.as_str() {
            "" => CDS_SERVICE_TYPE.to_string(),
            t => t.to_string(),
        };

        info!(
            device = %description.friendly_name,
            udn = %description.udn,
            %control_url,
            "connected to media server"
        );
        let browse = SoapBrowseAction::new(client.clone(), control_url, &service_type);
        Self::new(description, Arc::new(browse), Arc::new(DidlDecoder))
    }

    /// Device friendly name
    pub fn friendly_name(&self) -> &str {
        &self.description.friendly_name
    }

    /// Device UDN
    pub fn udn(&self) -> &str {
        &self.description.udn
    }

    /// Name used for this device in archive paths and file names
    ///
    /// The friendly name, else the UDN, else `device`.
    pub fn label(&self) -> &str {
        match (self.friendly_name(), self.udn()) {
            ("", "") => "device",
            ("", udn) => udn,
            (name, _) => name,
        }
    }

    /// Device description, including service descriptions
    pub fn description(&self) -> &DeviceDescription {
        &self.description
    }

    /// Start a paginated fetch of a container's children
    pub fn browse(
        &self,
        object_id: &str,
        options: BrowseOptions,
        cancel: CancellationToken,
    ) -> PageFetcher<'_> {
        PageFetcher::new(
            self.browse.as_ref(),
            self.decoder.as_ref(),
            &self.description.udn,
            object_id,
            options,
            cancel,
        )
    }
}

async fn fetch_text(client: &reqwest::Client, url: &Url) -> Result<String> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.text().await?)
}
