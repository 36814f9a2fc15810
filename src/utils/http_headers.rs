//! Header inspection used to decide between buffered relay and hijack.

use http::{HeaderMap, header};

/// Upgrade protocol the gateway relays with full support.
pub const TCP_UPGRADE: &str = "tcp";

const STREAM_CONTENT_TYPE: &str = "application/octet-stream";

/// `Connection` lists the `upgrade` token and an `Upgrade` header is present.
pub fn is_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Lowercased value of the `Upgrade` header, if any.
pub fn upgrade_protocol(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase())
}

/// The response carries an opaque byte stream rather than a JSON document.
pub fn is_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(STREAM_CONTENT_TYPE))
}
