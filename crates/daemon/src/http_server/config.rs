use std::net::SocketAddr;

/// Slack on top of the encoded file for the rest of an upload body
///  (name, delegation, flags).
const REQUEST_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    // Listen address
    pub listen_addr: SocketAddr,
    // log level for http tracing
    pub log_level: tracing::Level,
    // Largest request body accepted, sized for a base64 encoded file
    pub body_limit: usize,
}

impl Config {
    pub fn new(listen_addr: SocketAddr, max_file_size: usize) -> Self {
        let body_limit = encoded_body_limit(max_file_size);
        tracing::info!(
            "Creating HTTP server Config: listen_addr={}, body_limit={}",
            listen_addr,
            body_limit
        );
        Self {
            listen_addr,
            log_level: tracing::Level::INFO,
            body_limit,
        }
    }
}

/// Request body size needed to carry `max_file_size` bytes as base64.
pub fn encoded_body_limit(max_file_size: usize) -> usize {
    max_file_size
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(REQUEST_OVERHEAD_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_covers_base64() {
        assert_eq!(encoded_body_limit(0), REQUEST_OVERHEAD_BYTES);
        assert_eq!(encoded_body_limit(3), 4 + REQUEST_OVERHEAD_BYTES);
        assert_eq!(encoded_body_limit(4), 8 + REQUEST_OVERHEAD_BYTES);
        assert_eq!(encoded_body_limit(usize::MAX), usize::MAX);
    }
}
