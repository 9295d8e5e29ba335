//! TLS engine (stunnel) configuration rendering

use std::path::Path;

use pf_core::TlsOverlayConfig;

/// Service section name inside the rendered configuration
const SERVICE_NAME: &str = "overlay";

/// Render a stunnel configuration that terminates TLS on the listen port
/// and forwards plaintext to the connect endpoint
///
/// The engine runs in the foreground so the supervisor owns its lifetime.
pub fn render_engine_config(
    overlay: &TlsOverlayConfig,
    cert_path: &Path,
    key_path: &Path,
) -> String {
    format!(
        r#"; Generated by proxyfleet. Changes are overwritten on reconfiguration.
foreground = yes
cert = {cert}
key = {key}
client = no
socket = a:SO_REUSEADDR=1
socket = l:TCP_NODELAY=1
socket = r:TCP_NODELAY=1

[{service}]
accept = {listen}
connect = {connect}
"#,
        cert = cert_path.display(),
        key = key_path.display(),
        service = SERVICE_NAME,
        listen = overlay.listen_port,
        connect = overlay.connect_address(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_core::Port;

    #[test]
    fn test_render_binds_listen_to_connect() {
        let overlay = TlsOverlayConfig {
            listen_port: Port::new(443).unwrap(),
            connect_host: "127.0.0.1".into(),
            connect_port: Port::new(22).unwrap(),
        };
        let rendered = render_engine_config(
            &overlay,
            Path::new("/opt/proxyfleet/tls/certs/cert.pem"),
            Path::new("/opt/proxyfleet/tls/certs/key.pem"),
        );

        assert!(rendered.contains("foreground = yes\n"));
        assert!(rendered.contains("cert = /opt/proxyfleet/tls/certs/cert.pem\n"));
        assert!(rendered.contains("key = /opt/proxyfleet/tls/certs/key.pem\n"));
        assert!(rendered.contains("accept = 443\nconnect = 127.0.0.1:22\n"));
    }
}
