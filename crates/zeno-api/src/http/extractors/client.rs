//! Client identity for admission control.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Remote IP of the caller, or `"unknown"` when the server was not started
/// with connect info.
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientIp(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn reads_connect_info() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let addr: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        parts.extensions.insert(ConnectInfo(addr));
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, "10.0.0.7");
    }

    #[tokio::test]
    async fn missing_connect_info_is_unknown() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, "unknown");
    }
}
