//! HTTP backend tests against a local server with canned responses

use bg_reveal::{
    error::NO_FOREGROUND_GUIDANCE, HttpBackend, PipelineConfig, PresentationShell,
    ProcessingBackend, ProcessingError, ProcessingRequest, RemoteReply, SelectedFile, Status,
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read one HTTP request, honouring `Content-Length` or chunked encoding
async fn read_request(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return request;
        }
        request.extend_from_slice(&chunk[..n]);

        let Some(header_end) = find(&request, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
        let body = &request[header_end + 4..];

        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());
        let complete = match content_length {
            Some(length) => body.len() >= length,
            None if headers.contains("transfer-encoding: chunked") => {
                find(body, b"0\r\n\r\n").is_some()
            },
            None => true,
        };
        if complete {
            return request;
        }
    }
}

/// Serve a single canned response and hand back the raw request
async fn serve_once(status_line: &str, content_type: &str, body: Vec<u8>) -> (String, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/remove-bg", listener.local_addr().unwrap());

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status_line,
        content_type,
        body.len()
    );
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });

    (url, server)
}

fn config_for(url: &str) -> PipelineConfig {
    PipelineConfig::builder()
        .endpoint(url)
        .settle_delay_ms(0)
        .request_timeout_secs(5)
        .build()
        .unwrap()
}

fn request() -> ProcessingRequest {
    ProcessingRequest {
        file_name: "cat.png".to_string(),
        mime_type: "image/png".to_string(),
        bytes: Arc::from(&b"\x89PNG-fake-bytes"[..]),
    }
}

#[tokio::test]
async fn test_multipart_upload_and_image_reply() {
    let (url, server) = serve_once("200 OK", "image/png", b"processed".to_vec()).await;
    let backend = HttpBackend::new(&config_for(&url)).unwrap();

    let response = backend.upload(request()).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.content_type(), Some("image/png"));
    assert_eq!(
        response.into_reply().await.unwrap(),
        RemoteReply::Image {
            bytes: b"processed".to_vec(),
            mime_type: "image/png".to_string()
        }
    );

    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("POST /api/remove-bg HTTP/1.1"));
    assert!(text.to_ascii_lowercase().contains("content-type: multipart/form-data"));
    assert!(text.contains("name=\"image\""));
    assert!(text.contains("filename=\"cat.png\""));
    assert!(text.contains("PNG-fake-bytes"));
}

#[tokio::test]
async fn test_error_reply_carries_json_message() {
    let body = br#"{"error":"Could not identify foreground"}"#.to_vec();
    let (url, server) = serve_once("400 Bad Request", "application/json", body).await;
    let backend = HttpBackend::new(&config_for(&url)).unwrap();

    let reply = backend
        .upload(request())
        .await
        .unwrap()
        .into_reply()
        .await
        .unwrap();
    assert_eq!(
        reply,
        RemoteReply::Rejected {
            status: 400,
            message: Some("Could not identify foreground".to_string())
        }
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_shell_over_http_translates_failure() {
    let body = br#"{"error":"Could not identify foreground"}"#.to_vec();
    let (url, server) = serve_once("400 Bad Request", "application/json", body).await;
    let config = config_for(&url);
    let backend: Arc<dyn ProcessingBackend> = Arc::new(HttpBackend::new(&config).unwrap());
    let shell = PresentationShell::new(config, backend).unwrap();

    let file = SelectedFile::new("cat.png", "image/png", vec![1u8; 32]);
    assert!(shell.submit(Some(file)).await.is_err());

    let state = shell.snapshot();
    assert_eq!(state.status, Status::Failed);
    assert_eq!(state.error_message.as_deref(), Some(NO_FOREGROUND_GUIDANCE));
    server.await.unwrap();
}

#[tokio::test]
async fn test_shell_over_http_succeeds() {
    let (url, server) = serve_once("200 OK", "image/webp", b"webp-result".to_vec()).await;
    let config = config_for(&url);
    let backend: Arc<dyn ProcessingBackend> = Arc::new(HttpBackend::new(&config).unwrap());
    let shell = PresentationShell::new(config, backend).unwrap();

    let file = SelectedFile::new("cat.jpg", "image/jpeg", vec![7u8; 64]);
    let processed = shell.submit(Some(file)).await.unwrap();

    assert_eq!(processed.mime_type(), "image/webp");
    assert_eq!(processed.bytes(), b"webp-result");
    assert_eq!(shell.snapshot().progress, 100);
    let raw = server.await.unwrap();
    assert!(String::from_utf8_lossy(&raw).contains("filename=\"cat.jpg\""));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/remove-bg", listener.local_addr().unwrap());
    drop(listener);

    let backend = HttpBackend::new(&config_for(&url)).unwrap();
    let err = backend.upload(request()).await.unwrap_err();
    assert!(matches!(err, ProcessingError::Transport(_)));
}

#[tokio::test]
async fn test_request_timeout_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/remove-bg", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    });

    let config = PipelineConfig::builder()
        .endpoint(url.as_str())
        .request_timeout_secs(1)
        .build()
        .unwrap();
    let backend = HttpBackend::new(&config).unwrap();
    let err = backend.upload(request()).await.unwrap_err();
    assert!(matches!(err, ProcessingError::Transport(_)));
    server.abort();
}
