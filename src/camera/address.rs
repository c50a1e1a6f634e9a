use serde::Serialize;
use std::fmt;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::str::FromStr;

/// Network address of a camera's ONVIF service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraAddress {
    ip: IpAddr,
    port: Option<u16>,
}

impl CameraAddress {
    pub fn new(ip: IpAddr, port: Option<u16>) -> Self {
        Self { ip, port }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Event service endpoint for subscribe/renew/unsubscribe
    pub fn events_url(&self) -> String {
        format!("http://{}/onvif/events", self)
    }

    /// Media stream of the camera, always on the RTSP port
    pub fn stream_url(&self, port: u16, path: &str) -> String {
        let host = SocketAddr::new(self.ip, port);
        if path.starts_with('/') {
            format!("rtsp://{}{}", host, path)
        } else {
            format!("rtsp://{}/{}", host, path)
        }
    }
}

impl FromStr for CameraAddress {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::new(ip, None));
        }
        let socket = s.parse::<SocketAddr>()?;
        Ok(Self::new(socket.ip(), Some(socket.port())))
    }
}

impl fmt::Display for CameraAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ip, self.port) {
            (ip, Some(port)) => write!(f, "{}", SocketAddr::new(ip, port)),
            (IpAddr::V6(ip), None) => write!(f, "[{}]", ip),
            (IpAddr::V4(ip), None) => write!(f, "{}", ip),
        }
    }
}

impl Serialize for CameraAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Who a camera is: its address plus an optional name, which doubles as the
/// relay base topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraIdentity {
    address: CameraAddress,
    name: Option<String>,
}

impl CameraIdentity {
    pub fn new(address: CameraAddress, name: Option<String>) -> Self {
        Self {
            address,
            name: name.filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn address(&self) -> &CameraAddress {
        &self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name when configured, address otherwise
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.address.ip().to_string(),
        }
    }

    /// Label safe to embed in a file name
    pub fn file_label(&self) -> String {
        self.label().replace('/', "-").replace(':', "-")
    }
}

impl fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.address.ip()),
        }
    }
}
