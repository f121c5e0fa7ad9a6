use std::{sync::OnceLock, time::Duration};

use tracing::debug;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the shared `reqwest::Client` used for every upstream call.
///
/// `request_timeout` of zero leaves reqwest's default (no timeout) in place.
pub fn build_http_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    builder.build()
}

/// Client for unit tests talking to a local mock server.
#[cfg(test)]
pub(crate) fn test_client() -> reqwest::Client {
    build_http_client(Duration::from_secs(5)).expect("test client")
}
