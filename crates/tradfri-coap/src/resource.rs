// Well-known gateway resource paths and locator construction.

use crate::transport::SECURE_PORT;

pub const DEVICES: &str = "15001";
pub const GROUPS: &str = "15004";
pub const SCENES: &str = "15005";
pub const NOTIFICATIONS: &str = "15006";
pub const SMART_TASKS: &str = "15010";
pub const GATEWAY: &str = "15011";
pub const GATEWAY_DETAILS: &str = "15011/15012";
pub const GATEWAY_REBOOT: &str = "15011/9030";
pub const AUTHENTICATE: &str = "15011/9063";

/// Full `coaps://` locator for `path` on the gateway at `host`.
pub fn uri(host: &str, path: &str) -> String {
    uri_with_port(host, SECURE_PORT, path)
}

pub fn uri_with_port(host: &str, port: u16, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if host.contains(':') && !host.starts_with('[') {
        format!("coaps://[{host}]:{port}/{path}")
    } else {
        format!("coaps://{host}:{port}/{path}")
    }
}

/// Locator for one device.
pub fn device(host: &str, id: u32) -> String {
    uri(host, &format!("{DEVICES}/{id}"))
}

/// Locator for one group.
pub fn group(host: &str, id: u32) -> String {
    uri(host, &format!("{GROUPS}/{id}"))
}
