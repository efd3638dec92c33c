//! QuickLaTeX-style remote compilation.
//!
//! One form-encoded POST submits the wrapped document. The service answers
//! with a line-oriented body: a status code (`0` is success) followed by the
//! URL of the rendered image and optional metrics. The image is then fetched
//! and repackaged as SVG.
//!
//! `ureq` is blocking, so each round trip runs on `spawn_blocking` and is
//! additionally bounded by `tokio::time::timeout`.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tikz_render_config::RemoteConfig;

use crate::document::{self, DocumentTarget};
use crate::hasher::CacheKey;
use crate::http;
use crate::store::ArtifactVariant;
use crate::strategy::{RenderError, RenderFuture, RenderStrategy};

const DEFAULT_REMOTE_HOST: &str = "quicklatex.com";

/// Parsed success line of the service response.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RemoteRenderer {
    endpoint: String,
    font_size: String,
    color: String,
    timeout: Duration,
    agent: ureq::Agent,
}

impl RemoteRenderer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            font_size: tikz_render_config::defaults::remote_font_size(),
            color: tikz_render_config::defaults::remote_color(),
            timeout,
            agent: http::agent(timeout),
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        let mut renderer = Self::new(config.endpoint.clone(), config.timeout());
        renderer.font_size = config.font_size.clone();
        renderer.color = config.color.clone();
        renderer
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit `source`, fetch the result, and return SVG bytes.
    pub async fn render(&self, source: &str) -> Result<Vec<u8>, RenderError> {
        let body = self.form_body(source);
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();

        let task = tokio::task::spawn_blocking(move || round_trip(&agent, &endpoint, &body));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(svg))) => Ok(svg),
            Ok(Ok(Err(reason))) => Err(RenderError::RemoteRenderFailed(reason)),
            Ok(Err(join_err)) => Err(RenderError::RemoteRenderFailed(format!(
                "request task failed: {join_err}"
            ))),
            Err(_) => Err(RenderError::RemoteRenderFailed(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        }
    }

    fn form_body(&self, source: &str) -> String {
        let remhost = url::Url::parse(&self.endpoint)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_REMOTE_HOST.to_string());

        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("formula", &document::wrap(source, DocumentTarget::Remote))
            .append_pair("fsize", &self.font_size)
            .append_pair("fcolor", &self.color)
            .append_pair("mode", "0")
            .append_pair("out", "1")
            .append_pair("remhost", &remhost)
            .append_pair("rnd", &uuid::Uuid::new_v4().to_string())
            .finish()
    }
}

impl RenderStrategy for RemoteRenderer {
    fn variant(&self) -> ArtifactVariant {
        ArtifactVariant::Remote
    }

    fn name(&self) -> &'static str {
        "remote"
    }

    fn render<'a>(&'a self, source: &'a str, _key: &'a CacheKey) -> RenderFuture<'a> {
        Box::pin(RemoteRenderer::render(self, source))
    }
}

fn round_trip(agent: &ureq::Agent, endpoint: &str, body: &str) -> Result<Vec<u8>, String> {
    let text = agent
        .post(endpoint)
        .header("User-Agent", http::USER_AGENT)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .send(body.as_bytes())
        .map_err(|e| format!("submit to {endpoint} failed: {e}"))?
        .into_body()
        .with_config()
        .limit(http::MAX_RESPONSE_SIZE)
        .read_to_string()
        .map_err(|e| format!("reading service response failed: {e}"))?;

    crate::debug_trace!("REMOTE", "service response: {:?}", text);
    let image = parse_response(&text)?;
    crate::debug_info!("REMOTE", "service returned image {}", image.url);
    http::validate_fetch_url(&image.url)?;

    let response = agent
        .get(&image.url)
        .header("User-Agent", http::USER_AGENT)
        .call()
        .map_err(|e| format!("fetching {} failed: {e}", image.url))?;
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let payload = response
        .into_body()
        .with_config()
        .limit(http::MAX_RESPONSE_SIZE)
        .read_to_vec()
        .map_err(|e| format!("reading {} failed: {e}", image.url))?;

    repackage(&payload, content_type.as_deref(), &image)
}

/// Parse the service's line-oriented reply.
///
/// Lines may end in `\r\n` or `\n`. The first line is the status; on `0` the
/// second line is `<url> [baseline] [width] [height]`.
pub fn parse_response(text: &str) -> Result<ServiceImage, String> {
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
    let status = lines.next().unwrap_or("").trim();
    if status != "0" {
        let detail: Vec<&str> = lines.map(str::trim).filter(|l| !l.is_empty()).collect();
        return Err(if detail.is_empty() {
            format!("service returned status {status:?}")
        } else {
            format!("service returned status {status:?}: {}", detail.join(" "))
        });
    }

    let locator = lines.next().unwrap_or("").trim();
    let mut fields = locator.split_whitespace();
    let url = fields
        .next()
        .ok_or_else(|| "service reported success without an image URL".to_string())?;
    let rest: Vec<&str> = fields.collect();
    let dim = |i: usize| rest.get(i).and_then(|s| s.parse::<u32>().ok()).filter(|v| *v > 0);

    Ok(ServiceImage {
        url: url.to_string(),
        width: dim(1),
        height: dim(2),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Svg,
    Raster(&'static str),
}

fn sniff(bytes: &[u8], content_type: Option<&str>) -> Option<Payload> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(Payload::Raster("image/png"));
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(Payload::Raster("image/gif"));
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(Payload::Raster("image/jpeg"));
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return Some(Payload::Svg);
    }
    match content_type {
        Some(ct) if ct.starts_with("image/svg+xml") => Some(Payload::Svg),
        _ => None,
    }
}

/// PNG dimensions from the IHDR chunk.
fn png_size(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let w = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let h = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Some((w, h))
}

/// Turn a fetched payload into SVG bytes. Raster images are embedded as a
/// base64 data URI; no transcoding is done.
pub fn repackage(
    payload: &[u8],
    content_type: Option<&str>,
    image: &ServiceImage,
) -> Result<Vec<u8>, String> {
    if payload.is_empty() {
        return Err(format!("{} returned an empty body", image.url));
    }

    let mime = match sniff(payload, content_type) {
        Some(Payload::Svg) => return Ok(payload.to_vec()),
        Some(Payload::Raster(mime)) => mime,
        None => {
            return Err(format!(
                "{} returned an unrecognized payload ({})",
                image.url,
                content_type.unwrap_or("no content type")
            ));
        }
    };

    let size = match (image.width, image.height) {
        (Some(w), Some(h)) => Some((w, h)),
        _ if mime == "image/png" => png_size(payload),
        _ => None,
    };
    let (size_attrs, image_size) = match size {
        Some((w, h)) => (
            format!(r#" width="{w}" height="{h}" viewBox="0 0 {w} {h}""#),
            format!(r#"width="{w}" height="{h}""#),
        ),
        None => (String::new(), r#"width="100%" height="100%""#.to_string()),
    };

    let svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\"{size_attrs}>\n  <image href=\"data:{mime};base64,{data}\" {image_size}/>\n</svg>\n",
        data = BASE64.encode(payload),
    );
    Ok(svg.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;

    const PNG_1X1: &[u8] = &[
        0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 13, b'I', b'H', b'D', b'R', 0,
        0, 0, 3, 0, 0, 0, 2, 8, 6, 0, 0, 0,
    ];

    /// Read one HTTP request and return (request line, body).
    fn read_request(stream: &mut TcpStream) -> (String, String) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().unwrap();
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).unwrap();
        (request_line, String::from_utf8_lossy(&body).into_owned())
    }

    fn respond(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(body).unwrap();
        stream.flush().unwrap();
    }

    #[test]
    fn test_parse_response_success() {
        let image = parse_response("0\r\nhttps://q.example/cache/ql_abc.png 0 120 80\r\n").unwrap();
        assert_eq!(image.url, "https://q.example/cache/ql_abc.png");
        assert_eq!(image.width, Some(120));
        assert_eq!(image.height, Some(80));

        let bare = parse_response("0\nhttps://q.example/a.png\n").unwrap();
        assert_eq!(bare.width, None);
    }

    #[test]
    fn test_parse_response_failures() {
        let err = parse_response("-1\r\nhttp://x/error.png 0 0 0\r\nUndefined control sequence\r\n")
            .unwrap_err();
        assert!(err.contains("-1"));
        assert!(err.contains("Undefined control sequence"));
        assert!(parse_response("0\r\n\r\n").is_err());
        assert!(parse_response("").is_err());
    }

    #[test]
    fn test_repackage_png_embeds_base64() {
        let image = ServiceImage {
            url: "http://x/a.png".into(),
            width: None,
            height: None,
        };
        let svg = String::from_utf8(repackage(PNG_1X1, Some("image/png"), &image).unwrap()).unwrap();
        assert!(svg.contains("data:image/png;base64,"));
        assert!(svg.contains(&BASE64.encode(PNG_1X1)));
        assert!(svg.contains(r#"viewBox="0 0 3 2""#));
    }

    #[test]
    fn test_repackage_svg_passes_through_and_rejects_junk() {
        let image = ServiceImage {
            url: "http://x/a.svg".into(),
            width: None,
            height: None,
        };
        let svg = b"<?xml version=\"1.0\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\"/>";
        assert_eq!(repackage(svg, None, &image).unwrap(), svg.to_vec());
        assert!(repackage(b"<html>oops</html>", Some("text/html"), &image).is_err());
        assert!(repackage(b"", Some("image/png"), &image).is_err());
    }

    #[tokio::test]
    async fn test_render_against_local_service() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();

        let server = std::thread::spawn(move || {
            let (mut submit, _) = listener.accept().unwrap();
            let (line, body) = read_request(&mut submit);
            tx.send((line, body)).unwrap();
            let reply = format!("0\r\nhttp://127.0.0.1:{port}/ql_test.png 0 3 2\r\n");
            respond(&mut submit, "200 OK", "text/plain", reply.as_bytes());

            let (mut fetch, _) = listener.accept().unwrap();
            let (line, _) = read_request(&mut fetch);
            tx.send((line, String::new())).unwrap();
            respond(&mut fetch, "200 OK", "image/png", PNG_1X1);
        });

        let renderer = RemoteRenderer::new(
            format!("http://127.0.0.1:{port}/latex3.f"),
            Duration::from_secs(5),
        );
        let svg = renderer.render("\\draw (0,0) -- (1,1);").await.unwrap();
        server.join().unwrap();

        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.contains("data:image/png;base64,"));

        let (submit_line, body) = rx.recv().unwrap();
        assert!(submit_line.starts_with("POST /latex3.f"));
        let fields: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        let field = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert!(field("formula").contains("\\draw (0,0) -- (1,1);"));
        assert!(field("formula").starts_with("\\documentclass[border=2pt]{standalone}"));
        assert_eq!(field("fsize"), "17px");
        assert_eq!(field("mode"), "0");
        assert_eq!(field("remhost"), "127.0.0.1");
        assert!(uuid::Uuid::parse_str(&field("rnd")).is_ok());

        let (fetch_line, _) = rx.recv().unwrap();
        assert!(fetch_line.starts_with("GET /ql_test.png"));
    }

    #[tokio::test]
    async fn test_render_maps_http_status_to_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            respond(&mut stream, "503 Service Unavailable", "text/plain", b"busy");
        });

        let renderer =
            RemoteRenderer::new(format!("http://127.0.0.1:{port}/"), Duration::from_secs(5));
        let result = renderer.render("\\draw (0,0) -- (1,1);").await;
        server.join().unwrap();
        assert!(matches!(result, Err(RenderError::RemoteRenderFailed(_))));
    }

    #[tokio::test]
    async fn test_render_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let renderer =
            RemoteRenderer::new(format!("http://127.0.0.1:{port}/"), Duration::from_secs(5));
        let result = renderer.render("x").await;
        assert!(matches!(result, Err(RenderError::RemoteRenderFailed(_))));
    }

    #[tokio::test]
    async fn test_render_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(1));
        });

        let renderer =
            RemoteRenderer::new(format!("http://127.0.0.1:{port}/"), Duration::from_millis(200));
        let started = std::time::Instant::now();
        let result = renderer.render("x").await;
        assert!(started.elapsed() < Duration::from_secs(1));
        match result {
            Err(RenderError::RemoteRenderFailed(reason)) => assert!(!reason.is_empty()),
            other => panic!("expected failure, got {other:?}"),
        }
        server.join().unwrap();
    }
}
