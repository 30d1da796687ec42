//! Routed resource hrefs.
//!
//! Group resources are addressed with routed hrefs of the form
//! `/<route>/<device id>/<local path>`, e.g. `/di/d1/a/light/1`. Device ACEs
//! only ever see the local part (`/a/light/1`).

/// Number of leading `/`-separated segments (including the empty one before
/// the first slash) that make up the routing prefix.
const ROUTING_SEGMENTS: usize = 3;
const DEVICE_SEGMENT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HrefError {
    #[error("href is not absolute: {0}")]
    NotAbsolute(String),
    #[error("href has no device segment: {0}")]
    MissingDevice(String),
    #[error("href has no device-local path: {0}")]
    MissingLocalPath(String),
}

fn split(href: &str) -> Result<(&str, &str), HrefError> {
    if !href.starts_with('/') {
        return Err(HrefError::NotAbsolute(href.to_string()));
    }

    let mut parts = href.splitn(ROUTING_SEGMENTS + 1, '/');
    let device = parts
        .nth(DEVICE_SEGMENT)
        .filter(|di| !di.is_empty())
        .ok_or_else(|| HrefError::MissingDevice(href.to_string()))?;
    let rest = parts
        .next()
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| HrefError::MissingLocalPath(href.to_string()))?;

    // the local path is the tail of `href` starting at the slash before `rest`
    let local = &href[href.len() - rest.len() - 1..];
    Ok((device, local))
}

/// Extract the device id from a routed href.
pub fn device_id(href: &str) -> Result<&str, HrefError> {
    split(href).map(|(device, _)| device)
}

/// Strip the routing prefix, leaving the device-local href.
pub fn local_href(href: &str) -> Result<&str, HrefError> {
    split(href).map(|(_, local)| local)
}
