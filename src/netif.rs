//! Local callback address resolution.

use crate::camera::CameraAddress;
use crate::config::ServerConfig;
use crate::error::ServerError;
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Port used only to select a route; nothing is sent
const ROUTE_TARGET_PORT: u16 = 80;

/// Address cameras should call back to: the configured `callback_ip`, or the
/// source address the kernel picks for traffic towards `camera`
pub async fn resolve_callback_ip(
    config: &ServerConfig,
    camera: &CameraAddress,
) -> Result<IpAddr, ServerError> {
    if let Some(configured) = config.callback_ip.as_deref() {
        let ip = configured
            .trim()
            .parse::<IpAddr>()
            .map_err(|e| ServerError::LocalAddress {
                details: format!("invalid callback_ip '{}': {}", configured, e),
            })?;
        debug!("Using configured callback address {}", ip);
        return Ok(ip);
    }

    let ip = route_source(camera.ip()).await?;
    info!("Discovered local callback address {}", ip);
    Ok(ip)
}

/// Source address of the route towards `target`
pub async fn route_source(target: IpAddr) -> Result<IpAddr, ServerError> {
    let bind: SocketAddr = match target {
        IpAddr::V4(_) => ([0, 0, 0, 0], 0).into(),
        IpAddr::V6(_) => ([0u16; 8], 0).into(),
    };

    let socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| local_address_error(target, e))?;
    socket
        .connect(SocketAddr::new(target, ROUTE_TARGET_PORT))
        .await
        .map_err(|e| local_address_error(target, e))?;

    let ip = socket
        .local_addr()
        .map_err(|e| local_address_error(target, e))?
        .ip();

    if ip.is_unspecified() {
        return Err(ServerError::LocalAddress {
            details: format!("no usable route towards {}", target),
        });
    }

    Ok(ip)
}

/// Endpoint registered with cameras for pushed notifications
pub fn callback_url(ip: IpAddr, port: u16) -> String {
    format!("http://{}/events", SocketAddr::new(ip, port))
}

fn local_address_error(target: IpAddr, e: std::io::Error) -> ServerError {
    ServerError::LocalAddress {
        details: format!("no route towards {}: {}", target, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_config(callback_ip: Option<&str>) -> ServerConfig {
        ServerConfig {
            bind_ip: "0.0.0.0".to_string(),
            port: 8080,
            callback_ip: callback_ip.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_configured_callback_ip_wins() {
        let camera: CameraAddress = "192.168.1.100".parse().unwrap();
        let ip = resolve_callback_ip(&server_config(Some("10.1.2.3")), &camera)
            .await
            .unwrap();
        assert_eq!(ip.to_string(), "10.1.2.3");
    }

    #[tokio::test]
    async fn test_invalid_callback_ip_is_error() {
        let camera: CameraAddress = "192.168.1.100".parse().unwrap();
        let result = resolve_callback_ip(&server_config(Some("not-an-ip")), &camera).await;
        assert!(matches!(result, Err(ServerError::LocalAddress { .. })));
    }

    #[tokio::test]
    async fn test_route_towards_loopback() {
        let ip = route_source("127.0.0.1".parse().unwrap()).await.unwrap();
        assert!(ip.is_loopback());
    }

    #[test]
    fn test_callback_url() {
        assert_eq!(
            callback_url("192.168.1.10".parse().unwrap(), 8080),
            "http://192.168.1.10:8080/events"
        );
        assert_eq!(
            callback_url("fe80::1".parse().unwrap(), 8080),
            "http://[fe80::1]:8080/events"
        );
    }
}
