//! Device description, SCPD and DIDL-Lite fixtures

/// Path the device description is served under
pub const DESCRIPTION_PATH: &str = "/desc/root.xml";

/// Path the ContentDirectory control URL points at
pub const CONTROL_PATH: &str = "/cds/control";

/// Device description of a media server called `friendly_name`
///
/// SCPD and control URLs are relative to the description location.
pub fn device_description(friendly_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>{name}</friendlyName>
    <manufacturer>Test</manufacturer>
    <UDN>uuid:4d696e69-444c-164e-9d41-b827eb0dc9f1</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
        <SCPDURL>/cm.xml</SCPDURL>
        <controlURL>/cm/control</controlURL>
        <eventSubURL>/cm/event</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
        <SCPDURL>cds.xml</SCPDURL>
        <controlURL>{control}</controlURL>
        <eventSubURL>/cds/event</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#,
        name = quick_xml::escape::escape(friendly_name),
        control = CONTROL_PATH,
    )
}

/// Minimal SCPD document for a service
pub fn scpd(action: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><scpd xmlns="urn:schemas-upnp-org:service-1-0"><actionList><action><name>{}</name></action></actionList></scpd>"#,
        action
    )
}

/// One child of a container in a [`FakeTree`](super::FakeTree)
#[derive(Clone, Debug)]
pub struct Child {
    /// Object id
    pub id: String,
    /// Whether the child is a container
    pub is_container: bool,
}

/// DIDL-Lite document listing `children` of `parent`
pub fn didl(parent: &str, children: &[Child]) -> String {
    let mut xml = String::from(concat!(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" "#,
        r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
        r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">"#
    ));
    for child in children {
        let id = quick_xml::escape::escape(child.id.as_str());
        let parent = quick_xml::escape::escape(parent);
        if child.is_container {
            xml.push_str(&format!(
                r#"<container id="{id}" parentID="{parent}" restricted="1"><dc:title>{id}</dc:title><upnp:class>object.container.storageFolder</upnp:class></container>"#
            ));
        } else {
            xml.push_str(&format!(
                r#"<item id="{id}" parentID="{parent}" restricted="1"><dc:title>{id}</dc:title><upnp:class>object.item.audioItem.musicTrack</upnp:class><res protocolInfo="http-get:*:audio/mpeg:*">http://127.0.0.1/{id}.mp3</res></item>"#
            ));
        }
    }
    xml.push_str("</DIDL-Lite>");
    xml
}

/// SOAP envelope carrying a Browse response
pub fn browse_response(result: &str, number_returned: i64, total_matches: i64) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>"#,
            r#"<u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">"#,
            "<Result>{}</Result><NumberReturned>{}</NumberReturned>",
            "<TotalMatches>{}</TotalMatches><UpdateID>1</UpdateID>",
            "</u:BrowseResponse></s:Body></s:Envelope>"
        ),
        quick_xml::escape::escape(result),
        number_returned,
        total_matches
    )
}

/// SOAP fault envelope with a UPnP error
pub fn soap_fault(code: u32, description: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault>"#,
            "<faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail>",
            r#"<UPnPError xmlns="urn:schemas-upnp-org:control-1-0">"#,
            "<errorCode>{}</errorCode><errorDescription>{}</errorDescription>",
            "</UPnPError></detail></s:Fault></s:Body></s:Envelope>"
        ),
        code, description
    )
}
