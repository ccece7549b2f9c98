//! Shared test helpers: in-memory content directories and fixtures.

use crate::control::{BrowseAction, BrowseRequest, BrowseResponse};
use crate::device::{CDS_SERVICE_ID, DeviceDescription, MediaServer, ServiceDescription};
use crate::didl::DidlDecoder;
use crate::error::{Error, ProtocolError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// One object known to a [`FakeContentDirectory`]
#[derive(Clone, Debug)]
pub(crate) struct FakeObject {
    pub(crate) id: String,
    pub(crate) parent_id: String,
    pub(crate) is_container: bool,
    pub(crate) title: String,
}

type CallHook = Box<dyn Fn(&BrowseRequest) + Send + Sync>;

/// In-memory ContentDirectory that answers Browse like a well-behaved server
///
/// `RequestedCount == 0` returns everything from the starting index, matching
/// UPnP semantics.
#[derive(Default)]
pub(crate) struct FakeContentDirectory {
    children: HashMap<String, Vec<FakeObject>>,
    broken: HashSet<String>,
    requests: Mutex<Vec<BrowseRequest>>,
    on_call: Option<CallHook>,
}

impl FakeContentDirectory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `count` items (ids `<parent>/i<n>`) to `parent`
    pub(crate) fn with_items(mut self, parent: &str, count: usize) -> Self {
        let list = self.children.entry(parent.to_string()).or_default();
        for n in 0..count {
            list.push(FakeObject {
                id: format!("{}/i{}", parent, n),
                parent_id: parent.to_string(),
                is_container: false,
                title: format!("Item {}", n),
            });
        }
        self
    }

    /// Add containers with the given ids to `parent`
    pub(crate) fn with_containers(mut self, parent: &str, ids: &[&str]) -> Self {
        let list = self.children.entry(parent.to_string()).or_default();
        for id in ids {
            list.push(FakeObject {
                id: id.to_string(),
                parent_id: parent.to_string(),
                is_container: true,
                title: format!("Folder {}", id),
            });
        }
        for id in ids {
            self.children.entry(id.to_string()).or_default();
        }
        self
    }

    /// Make every Browse of `container` fail with a protocol error
    pub(crate) fn with_broken(mut self, container: &str) -> Self {
        self.broken.insert(container.to_string());
        self
    }

    /// Run `hook` at the start of every Browse call
    pub(crate) fn on_call(mut self, hook: impl Fn(&BrowseRequest) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    /// Every Browse request received so far
    pub(crate) fn requests(&self) -> Vec<BrowseRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Object ids browsed, in call order
    pub(crate) fn browsed_ids(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.object_id).collect()
    }
}

#[async_trait]
impl BrowseAction for FakeContentDirectory {
    async fn browse(&self, request: &BrowseRequest) -> Result<BrowseResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(hook) = &self.on_call {
            hook(request);
        }
        if self.broken.contains(&request.object_id) {
            return Err(ProtocolError::Fault {
                code: 720,
                description: format!("Cannot process {}", request.object_id),
            }
            .into());
        }

        let children = self
            .children
            .get(&request.object_id)
            .ok_or_else(no_such_object)?;
        let start = (request.starting_index as usize).min(children.len());
        let end = match request.requested_count {
            0 => children.len(),
            n => (start + n as usize).min(children.len()),
        };
        let slice = &children[start..end];
        Ok(BrowseResponse {
            result: didl(slice),
            number_returned: slice.len() as i64,
            total_matches: children.len() as i64,
            update_id: Some(1),
        })
    }
}

fn no_such_object() -> Error {
    ProtocolError::Fault {
        code: 701,
        description: "No such object".to_string(),
    }
    .into()
}

/// Browse action that replays canned responses per container, in order
#[derive(Default)]
pub(crate) struct ScriptedBrowse {
    script: Mutex<HashMap<String, VecDeque<std::result::Result<BrowseResponse, String>>>>,
}

impl ScriptedBrowse {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `container`
    pub(crate) fn respond(self, container: &str, result: String, number: i64, total: i64) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(container.to_string())
            .or_default()
            .push_back(Ok(BrowseResponse {
                result,
                number_returned: number,
                total_matches: total,
                update_id: None,
            }));
        self
    }

    /// Queue a transport failure for `container`
    pub(crate) fn fail(self, container: &str, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(container.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
        self
    }
}

#[async_trait]
impl BrowseAction for ScriptedBrowse {
    async fn browse(&self, request: &BrowseRequest) -> Result<BrowseResponse> {
        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&request.object_id)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(Error::Transport(message)),
            None => Err(Error::Transport(format!(
                "no scripted response left for {}",
                request.object_id
            ))),
        }
    }
}

/// DIDL-Lite document for the given objects
pub(crate) fn didl(objects: &[FakeObject]) -> String {
    let mut xml = String::from(concat!(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" "#,
        r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
        r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">"#
    ));
    for object in objects {
        let (tag, class) = if object.is_container {
            ("container", "object.container.storageFolder")
        } else {
            ("item", "object.item.videoItem")
        };
        xml.push_str(&format!(
            r#"<{tag} id="{id}" parentID="{parent}" restricted="1"><dc:title>{title}</dc:title><upnp:class>{class}</upnp:class></{tag}>"#,
            tag = tag,
            id = quick_xml::escape::escape(object.id.as_str()),
            parent = quick_xml::escape::escape(object.parent_id.as_str()),
            title = quick_xml::escape::escape(object.title.as_str()),
            class = class,
        ));
    }
    xml.push_str("</DIDL-Lite>");
    xml
}

/// DIDL-Lite document with `count` items numbered from `first`
pub(crate) fn didl_items(first: usize, count: usize) -> String {
    let objects: Vec<FakeObject> = (first..first + count)
        .map(|n| FakeObject {
            id: format!("i{}", n),
            parent_id: "0".to_string(),
            is_container: false,
            title: format!("Item {}", n),
        })
        .collect();
    didl(&objects)
}

/// Description of a MediaServer with ConnectionManager and ContentDirectory services
pub(crate) fn device_description(friendly_name: &str) -> DeviceDescription {
    DeviceDescription {
        friendly_name: friendly_name.to_string(),
        device_type: "urn:schemas-upnp-org:device:MediaServer:1".to_string(),
        udn: format!("uuid:{}", friendly_name),
        url_base: None,
        xml: format!("<root><device><friendlyName>{}</friendlyName></device></root>", friendly_name),
        services: vec![
            ServiceDescription {
                service_id: "urn:upnp-org:serviceId:ConnectionManager".to_string(),
                service_type: "urn:schemas-upnp-org:service:ConnectionManager:1".to_string(),
                description: "<scpd>cm</scpd>".to_string(),
                ..Default::default()
            },
            ServiceDescription {
                service_id: CDS_SERVICE_ID.to_string(),
                service_type: "urn:schemas-upnp-org:service:ContentDirectory:1".to_string(),
                description: "<scpd>cds</scpd>".to_string(),
                ..Default::default()
            },
        ],
    }
}

/// Media server backed by the given fake
pub(crate) fn media_server(friendly_name: &str, cds: Arc<FakeContentDirectory>) -> MediaServer {
    MediaServer::new(device_description(friendly_name), cds, Arc::new(DidlDecoder)).unwrap()
}
