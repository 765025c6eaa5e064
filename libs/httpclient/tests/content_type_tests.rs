#![allow(clippy::unwrap_used, clippy::expect_used)]

//! `Content-Type` defaulting of the default transport, end to end.

use bytes::Bytes;
use httpclient::{HttpClient, MapSource};
use httpmock::prelude::*;
use serde_json::json;

fn default_client() -> HttpClient {
    let source = MapSource::new(json!({ "httpclient": { "type": "DEFAULT" } }));
    HttpClient::from_settings(&source).unwrap()
}

#[tokio::test]
async fn request_without_content_type_is_sent_as_json() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/")
            .header("content-type", "application/json");
        then.status(200).body("OK");
    });

    let text = default_client()
        .post(&server.url("/"))
        .body_string(r#"{"hello": "world"}"#.to_owned())
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(text, "OK");
    mock.assert();
}

#[tokio::test]
async fn explicit_content_type_is_preserved() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/")
            .header("content-type", "application/jsonlines");
        then.status(200).body("OK");
    });

    let text = default_client()
        .post(&server.url("/"))
        .header("content-type", "application/jsonlines")
        .body_bytes(Bytes::from_static(b"{\"a\":1}\n{\"a\":2}\n"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(text, "OK");
    mock.assert();
}

#[tokio::test]
async fn configured_default_applies_to_bodiless_requests() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/feed")
            .header("content-type", "application/x-ndjson");
        then.status(200);
    });

    let source = MapSource::new(json!({
        "httpclient": { "default": { "content_type": "application/x-ndjson" } }
    }));
    let client = HttpClient::from_settings(&source).unwrap();
    let resp = client.get(&server.url("/feed")).send().await.unwrap();

    assert!(resp.error_for_status().is_ok());
    mock.assert();
}
