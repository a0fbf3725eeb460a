//! Multipart request building and NDJSON response collection

use axum::body::Body;
use axum::http::{header, Request, Response};
use http_body_util::BodyExt;
use revin_common::events::PipelineEvent;
use revin_common::ndjson::NdjsonDecoder;

const BOUNDARY: &str = "revin-test-boundary";

/// One multipart form field
pub struct MultipartPart<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> MultipartPart<'a> {
    pub fn file(file_name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name: "file",
            file_name: Some(file_name),
            data,
        }
    }

    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            data: value.as_bytes(),
        }
    }
}

/// POST /analyze with the given form fields
pub fn analyze_request(parts: &[MultipartPart<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Read a whole NDJSON response body into events
pub async fn collect_events(response: Response<Body>) -> Vec<PipelineEvent> {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut decoder = NdjsonDecoder::new();
    let mut events = decoder.push(&bytes).unwrap();
    events.extend(decoder.finish().unwrap());
    events
}
