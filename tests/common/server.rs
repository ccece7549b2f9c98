//! Wiremock-backed media server answering description, SCPD and Browse requests

use super::fixtures::{
    CONTROL_PATH, Child, DESCRIPTION_PATH, browse_response, device_description, didl, scpd,
    soap_fault,
};
use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// One Browse call received by the fake server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseCall {
    /// `ObjectID` argument
    pub object_id: String,
    /// `StartingIndex` argument
    pub starting_index: u32,
    /// `RequestedCount` argument
    pub requested_count: u32,
}

/// Content hierarchy served by a [`FakeMediaServer`]
#[derive(Clone, Debug, Default)]
pub struct FakeTree {
    children: HashMap<String, Vec<Child>>,
    faults: HashSet<String>,
    delay: Option<Duration>,
}

impl FakeTree {
    /// Empty tree with a root container "0"
    pub fn new() -> Self {
        let mut tree = Self::default();
        tree.children.insert("0".to_string(), Vec::new());
        tree
    }

    /// Add `count` items (ids `<parent>-<n>`) to `parent`
    pub fn items(mut self, parent: &str, count: usize) -> Self {
        let list = self.children.entry(parent.to_string()).or_default();
        list.extend((0..count).map(|n| Child {
            id: format!("{}-{}", parent, n),
            is_container: false,
        }));
        self
    }

    /// Add containers to `parent`
    pub fn containers(mut self, parent: &str, ids: &[&str]) -> Self {
        self.children
            .entry(parent.to_string())
            .or_default()
            .extend(ids.iter().map(|id| Child {
                id: id.to_string(),
                is_container: true,
            }));
        for id in ids {
            self.children.entry(id.to_string()).or_default();
        }
        self
    }

    /// Answer every Browse of `container` with a UPnP fault
    pub fn fault(mut self, container: &str) -> Self {
        self.faults.insert(container.to_string());
        self
    }

    /// Delay every Browse response
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Unescaped text of each `u:Browse` argument in a SOAP request body
fn arguments(body: &str) -> HashMap<String, String> {
    let mut reader = Reader::from_str(body);
    let mut args = HashMap::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) => {
                current = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(XmlEvent::Text(t)) => {
                if let (Some(name), Ok(text)) = (current.as_ref(), t.unescape()) {
                    args.entry(name.clone())
                        .or_insert_with(String::new)
                        .push_str(&text);
                }
            }
            Ok(XmlEvent::End(_)) => current = None,
            Ok(XmlEvent::Eof) | Err(_) => break,
            _ => {}
        }
    }
    args
}

struct BrowseResponder {
    tree: FakeTree,
    calls: Arc<Mutex<Vec<BrowseCall>>>,
}

impl Respond for BrowseResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let args = arguments(&String::from_utf8_lossy(&request.body));
        let number = |name: &str| {
            args.get(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0)
        };
        let call = BrowseCall {
            object_id: args.get("ObjectID").cloned().unwrap_or_default(),
            starting_index: number("StartingIndex"),
            requested_count: number("RequestedCount"),
        };
        self.calls.lock().unwrap().push(call.clone());

        let response = match self.tree.children.get(&call.object_id) {
            _ if self.tree.faults.contains(&call.object_id) => {
                ResponseTemplate::new(500).set_body_string(soap_fault(720, "Cannot process the request"))
            }
            None => ResponseTemplate::new(500).set_body_string(soap_fault(701, "No such object")),
            Some(children) => {
                let start = (call.starting_index as usize).min(children.len());
                let end = match call.requested_count {
                    0 => children.len(),
                    n => (start + n as usize).min(children.len()),
                };
                let page = &children[start..end];
                ResponseTemplate::new(200).set_body_string(browse_response(
                    &didl(&call.object_id, page),
                    page.len() as i64,
                    children.len() as i64,
                ))
            }
        };
        match self.tree.delay {
            Some(delay) => response.set_delay(delay),
            None => response,
        }
    }
}

/// A media server on a local port
pub struct FakeMediaServer {
    /// Underlying mock server
    pub server: MockServer,
    calls: Arc<Mutex<Vec<BrowseCall>>>,
}

impl FakeMediaServer {
    /// Start a server named `friendly_name` serving `tree`
    pub async fn start(friendly_name: &str, tree: FakeTree) -> Self {
        let server = MockServer::start().await;
        let calls = Arc::new(Mutex::new(Vec::new()));

        Mock::given(method("GET"))
            .and(path(DESCRIPTION_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(device_description(friendly_name)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cm.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(scpd("GetProtocolInfo")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/desc/cds.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(scpd("Browse")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(CONTROL_PATH))
            .and(header(
                "SOAPACTION",
                "\"urn:schemas-upnp-org:service:ContentDirectory:1#Browse\"",
            ))
            .respond_with(BrowseResponder {
                tree,
                calls: calls.clone(),
            })
            .mount(&server)
            .await;

        Self { server, calls }
    }

    /// Device description URL
    pub fn location(&self) -> String {
        format!("{}{}", self.server.uri(), DESCRIPTION_PATH)
    }

    /// Browse calls received so far, in order
    pub fn calls(&self) -> Vec<BrowseCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Object ids browsed so far, consecutive repeats collapsed
    pub fn browsed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.calls().into_iter().map(|c| c.object_id).collect();
        ids.dedup();
        ids
    }
}
