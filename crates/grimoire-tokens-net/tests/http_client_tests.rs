//! Integration tests for the HTTP client.

use grimoire_tokens_net::http::{HttpClient, HttpClientBuilder};
use grimoire_tokens_net::ProxyEndpoint;
use std::time::Duration;

#[tokio::test]
async fn test_client_creation() {
    let client = HttpClient::new();
    assert!(client.config().timeout.is_some());
    assert!(client.config().follow_redirects);
}

#[tokio::test]
async fn test_client_builder() {
    let client = HttpClientBuilder::new()
        .timeout(Duration::from_secs(60))
        .max_redirects(5)
        .max_body_bytes(1024)
        .build()
        .expect("Failed to build client");

    assert_eq!(client.config().timeout, Some(Duration::from_secs(60)));
    assert_eq!(client.config().max_redirects, 5);
    assert_eq!(client.config().max_body_bytes, 1024);
}

#[test]
fn test_invalid_default_header_is_an_error() {
    let result = HttpClientBuilder::new().default_header("not a header", "image/png");
    assert!(matches!(
        result,
        Err(grimoire_tokens_net::NetworkError::InvalidHeader(_))
    ));
}

#[tokio::test]
async fn test_invalid_url_is_rejected_before_sending() {
    let client = HttpClient::new();
    let result = client.fetch_bytes("not a url").await;
    assert!(matches!(
        result,
        Err(grimoire_tokens_net::NetworkError::InvalidUrl(_))
    ));
}

#[test]
fn test_proxy_endpoint_round_trip() {
    let proxy = ProxyEndpoint::new("https://proxy.example.com/cors").unwrap();
    let mirrored = proxy.mirror_url("https://example.com/imp.png");
    let parsed = url::Url::parse(&mirrored).unwrap();
    assert_eq!(parsed.host_str(), Some("proxy.example.com"));
    let decoded: String = url::form_urlencoded::parse(parsed.query().unwrap().as_bytes())
        .map(|(k, _)| k.into_owned())
        .collect();
    assert_eq!(decoded, "https://example.com/imp.png");
}

// Note: We use wiremock for mocked HTTP tests
#[cfg(feature = "integration-tests")]
mod integration_tests {
    use super::*;
    use grimoire_tokens_net::IMAGE_ACCEPT;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_bytes() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/imp.png"))
            .and(header("accept", IMAGE_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let body = client
            .fetch_bytes(&format!("{}/imp.png", mock_server.uri()))
            .await
            .expect("Request failed");

        assert_eq!(body.as_ref(), &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let result = client
            .fetch_bytes(&format!("{}/missing.png", mock_server.uri()))
            .await;

        match result {
            Err(grimoire_tokens_net::NetworkError::HttpStatus { status, .. }) => {
                assert_eq!(status, 404)
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/huge.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&mock_server)
            .await;

        let client = HttpClient::builder()
            .max_body_bytes(1024)
            .build()
            .expect("Failed to build client");
        let result = client
            .fetch_bytes(&format!("{}/huge.png", mock_server.uri()))
            .await;

        assert!(matches!(
            result,
            Err(grimoire_tokens_net::NetworkError::InvalidBody(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow.png"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let client = HttpClient::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build client");

        let result = client
            .fetch_bytes(&format!("{}/slow.png", mock_server.uri()))
            .await;

        assert!(result.is_err());
    }
}
