/// Relying-party context derived from the incoming request's Host header.
///
/// The catalogue is served from whatever host the reverse proxy forwards, so
/// the RP id and expected origin are resolved per request rather than pinned
/// in configuration. Local development (any host containing `localhost`)
/// stays on plain http.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpContext {
    pub rp_id: String,
    pub origin: String,
}

impl RpContext {
    pub fn resolve(host_header: Option<&str>) -> Self {
        let host = host_header.unwrap_or("localhost");

        let rp_id = host
            .split(':')
            .next()
            .unwrap_or("localhost")
            .to_string();

        let origin = if host.contains("localhost") {
            format!("http://{host}")
        } else {
            format!("https://{rp_id}")
        };

        Self { rp_id, origin }
    }
}
