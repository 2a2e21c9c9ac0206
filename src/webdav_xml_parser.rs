use anyhow::{anyhow, Result};
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

const DAV_NAMESPACE: &[u8] = b"DAV:";

/// Extract every `href` element in the `DAV:` namespace, in document order.
///
/// The first href of a `Depth: 1` listing is the collection itself; dropping it
/// is the caller's job. An empty `<D:href/>` yields an empty string so positions
/// are preserved.
pub fn parse_multistatus_hrefs(xml_text: &str) -> Result<Vec<String>> {
    let mut reader = NsReader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut hrefs = Vec::new();
    let mut current_href: Option<String> = None;

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) => {
                if is_dav_href(&ns, e.local_name().as_ref()) {
                    current_href = Some(String::new());
                }
            }
            Ok((ns, Event::Empty(e))) => {
                if is_dav_href(&ns, e.local_name().as_ref()) {
                    hrefs.push(String::new());
                }
            }
            Ok((_, Event::Text(e))) => {
                if let Some(ref mut href) = current_href {
                    href.push_str(&e.unescape()?);
                }
            }
            Ok((_, Event::CData(e))) => {
                if let Some(ref mut href) = current_href {
                    href.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok((ns, Event::End(e))) => {
                if is_dav_href(&ns, e.local_name().as_ref()) {
                    if let Some(href) = current_href.take() {
                        hrefs.push(href.trim().to_string());
                    }
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                return Err(anyhow!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    if current_href.is_some() {
        return Err(anyhow!("XML parsing error: unterminated href element"));
    }

    Ok(hrefs)
}

fn is_dav_href(ns: &ResolveResult, local_name: &[u8]) -> bool {
    local_name == b"href" && matches!(ns, ResolveResult::Bound(namespace) if namespace.as_ref() == DAV_NAMESPACE)
}
