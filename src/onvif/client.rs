use crate::camera::CameraAddress;
use crate::error::SubscriptionError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use super::envelope::{new_message_id, render_renew, render_subscribe, render_unsubscribe};

const SOAP_CONTENT_TYPE: &str = "application/soap+xml";

/// Request/response operations against one camera's event service
#[async_trait::async_trait]
pub trait EventService: Send + Sync {
    /// Open a subscription that pushes to our callback until `expiration`
    async fn subscribe(
        &self,
        address: &CameraAddress,
        expiration: DateTime<Utc>,
    ) -> Result<(), SubscriptionError>;

    /// Extend an existing subscription to `expiration`
    async fn renew(
        &self,
        address: &CameraAddress,
        expiration: DateTime<Utc>,
    ) -> Result<(), SubscriptionError>;

    /// Tear the subscription down
    async fn unsubscribe(&self, address: &CameraAddress) -> Result<(), SubscriptionError>;
}

/// HTTP implementation of [`EventService`] posting SOAP envelopes to
/// `http://<camera>/onvif/events`
#[derive(Clone)]
pub struct SubscriptionClient {
    http: reqwest::Client,
    callback_url: String,
}

impl SubscriptionClient {
    pub fn new(callback_url: String, timeout: Duration) -> Result<Self, SubscriptionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubscriptionError::Client {
                details: e.to_string(),
            })?;

        Ok(Self { http, callback_url })
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    async fn post(
        &self,
        address: &CameraAddress,
        operation: &'static str,
        body: String,
    ) -> Result<(), SubscriptionError> {
        let url = address.events_url();
        debug!("[{}] Sending {} request to {}", address, operation, url);

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| SubscriptionError::Request {
                address: address.to_string(),
                operation,
                source: e,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SubscriptionError::Rejected {
                address: address.to_string(),
                operation,
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl EventService for SubscriptionClient {
    async fn subscribe(
        &self,
        address: &CameraAddress,
        expiration: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        let body = render_subscribe(&new_message_id(), &self.callback_url, expiration);
        self.post(address, "subscribe", body).await
    }

    async fn renew(
        &self,
        address: &CameraAddress,
        expiration: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        let body = render_renew(&new_message_id(), expiration);
        self.post(address, "renew", body).await
    }

    async fn unsubscribe(&self, address: &CameraAddress) -> Result<(), SubscriptionError> {
        let body = render_unsubscribe(&new_message_id());
        self.post(address, "unsubscribe", body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single HTTP request with the given status and returns the raw request
    async fn one_shot_server(status_line: &'static str) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!("{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (port, handle)
    }

    #[tokio::test]
    async fn test_subscribe_posts_envelope() {
        let (port, server) = one_shot_server("HTTP/1.1 200 OK").await;
        let client = SubscriptionClient::new(
            "http://10.0.0.2:8080/events".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        let address: CameraAddress = format!("127.0.0.1:{}", port).parse().unwrap();

        client.subscribe(&address, Utc::now()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /onvif/events HTTP/1.1"));
        assert!(request.contains("application/soap+xml"));
        assert!(request.contains("<wsa5:Address>http://10.0.0.2:8080/events</wsa5:Address>"));
    }

    #[tokio::test]
    async fn test_non_200_is_rejected() {
        let (port, server) = one_shot_server("HTTP/1.1 500 Internal Server Error").await;
        let client =
            SubscriptionClient::new("http://10.0.0.2:8080/events".to_string(), Duration::from_secs(5))
                .unwrap();
        let address: CameraAddress = format!("127.0.0.1:{}", port).parse().unwrap();

        let result = client.renew(&address, Utc::now()).await;
        let _ = server.await;

        match result {
            Err(SubscriptionError::Rejected {
                operation, status, ..
            }) => {
                assert_eq!(operation, "renew");
                assert_eq!(status, 500);
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_camera_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            SubscriptionClient::new("http://10.0.0.2:8080/events".to_string(), Duration::from_secs(2))
                .unwrap();
        let address: CameraAddress = format!("127.0.0.1:{}", port).parse().unwrap();

        let result = client.unsubscribe(&address).await;
        assert!(matches!(
            result,
            Err(SubscriptionError::Request {
                operation: "unsubscribe",
                ..
            })
        ));
    }
}
