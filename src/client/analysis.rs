//! HTTP client for the advisory backend
//!
//! Leaf analysis walks the configured base URLs in order and only moves on
//! when a server cannot be reached. Every other call goes to the first base
//! URL. Nothing is retried automatically.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;

use super::multipart::MultipartForm;
use super::types::{
    AnalysisRequest, DeficiencyPrediction, HistoryEntry, PestDetection, WeatherGuidance,
    parse_deficiency, parse_history, parse_pest, parse_weather,
};

const PREDICT_PATH: &str = "/predict";
const PEST_PATH: &str = "/pest/detect";
const HISTORY_PATH: &str = "/fertilizer/history";
const WEATHER_PATH: &str = "/weather/yield";

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn map_ureq_error(url: &str, err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::StatusCode(code) => ClientError::Status {
            url: url.to_string(),
            code,
        },
        ureq::Error::Timeout(_) => ClientError::Timeout {
            url: url.to_string(),
        },
        ureq::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => ClientError::Timeout {
            url: url.to_string(),
        },
        other => ClientError::Transport {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

/// A body that stops arriving is a network failure, not a malformed reply
fn body_error(url: &str, err: serde_json::Error) -> ClientError {
    if !err.is_io() {
        return malformed(url, err.to_string());
    }
    let io = std::io::Error::from(err);
    if io.kind() == std::io::ErrorKind::TimedOut {
        return ClientError::Timeout {
            url: url.to_string(),
        };
    }
    let message = io.to_string();
    if let Some(inner) = io.into_inner()
        && let Ok(err) = inner.downcast::<ureq::Error>()
    {
        return map_ureq_error(url, *err);
    }
    ClientError::Transport {
        url: url.to_string(),
        message,
    }
}

fn read_json(url: &str, response: ureq::http::Response<ureq::Body>) -> Result<Value, ClientError> {
    let mut body = response.into_body();
    serde_json::from_reader(body.as_reader()).map_err(|e| body_error(url, e))
}

fn malformed(url: &str, message: String) -> ClientError {
    ClientError::Malformed {
        url: url.to_string(),
        message,
    }
}

fn post_form(agent: &ureq::Agent, url: &str, form: &MultipartForm) -> Result<Value, ClientError> {
    let body = form.encode();
    let response = agent
        .post(url)
        .header("Content-Type", &form.content_type())
        .header("Accept", "application/json")
        .send(&body[..])
        .map_err(|e| map_ureq_error(url, e))?;
    read_json(url, response)
}

fn leaf_form(request: &AnalysisRequest) -> MultipartForm {
    let mut form = MultipartForm::default();
    if let Some(age) = request.plant_age_days {
        form = form.text("plant_age", age.to_string());
    }
    if let Some(sample_type) = &request.sample_type {
        form = form.text("sample_type", sample_type.clone());
    }
    form.file(
        "file",
        &request.file_name,
        &request.mime_type,
        request.bytes.clone(),
    )
}

pub(crate) struct AnalysisClient {
    base_urls: Vec<String>,
    agent: ureq::Agent,
}

impl AnalysisClient {
    pub(crate) fn new(base_urls: Vec<String>, timeout: Duration) -> Result<Self, ClientError> {
        let base_urls: Vec<String> = base_urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if base_urls.is_empty() {
            return Err(ClientError::NoBaseUrls);
        }
        Ok(Self {
            base_urls,
            agent: build_agent(timeout),
        })
    }

    fn primary(&self) -> &str {
        &self.base_urls[0]
    }

    /// Submit a leaf image, falling back through the base URLs.
    ///
    /// A timeout or connection failure moves on to the next URL. An HTTP
    /// error status or an unreadable body from a server that did answer is
    /// returned as-is.
    pub(crate) fn analyze_leaf(
        &self,
        request: &AnalysisRequest,
    ) -> Result<DeficiencyPrediction, ClientError> {
        let form = leaf_form(request);
        let mut attempts = Vec::new();

        for base in &self.base_urls {
            let url = join_url(base, PREDICT_PATH);
            debug!(%url, "submitting leaf image");
            match post_form(&self.agent, &url, &form) {
                Ok(value) => return parse_deficiency(value).map_err(|m| malformed(&url, m)),
                Err(e) if e.is_network() => {
                    warn!(%url, error = %e, "server unreachable, trying next");
                    attempts.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        Err(ClientError::AllCandidatesFailed { attempts })
    }

    /// Pest detection runs against the primary server only and is abandoned
    /// after `timeout`.
    pub(crate) fn detect_pest(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
    ) -> Result<PestDetection, ClientError> {
        let url = join_url(self.primary(), PEST_PATH);
        let agent = build_agent(timeout);
        debug!(%url, ?timeout, "submitting pest image");
        let value = post_form(&agent, &url, &leaf_form(request))?;
        parse_pest(value).map_err(|m| malformed(&url, m))
    }

    pub(crate) fn list_history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        let url = join_url(self.primary(), HISTORY_PATH);
        let response = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;
        parse_history(read_json(&url, response)?).map_err(|m| malformed(&url, m))
    }

    /// Returns the stored entry. Backends that only echo an id get it merged
    /// into the submitted entry.
    pub(crate) fn add_history(&self, entry: &HistoryEntry) -> Result<HistoryEntry, ClientError> {
        let url = join_url(self.primary(), HISTORY_PATH);
        let response = self
            .agent
            .post(&url)
            .header("Accept", "application/json")
            .send_json(entry)
            .map_err(|e| map_ureq_error(&url, e))?;
        let value = read_json(&url, response)?;
        if let Ok(stored) = serde_json::from_value::<HistoryEntry>(value.clone()) {
            return Ok(stored);
        }
        let id = match value.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Ok(HistoryEntry {
            id,
            ..entry.clone()
        })
    }

    pub(crate) fn delete_history(&self, id: &str) -> Result<(), ClientError> {
        let url = format!("{}/{}", join_url(self.primary(), HISTORY_PATH), id);
        self.agent
            .delete(&url)
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;
        Ok(())
    }

    pub(crate) fn weather_guidance(
        &self,
        lat: f64,
        lon: f64,
        crop: Option<&str>,
    ) -> Result<WeatherGuidance, ClientError> {
        let url = join_url(self.primary(), WEATHER_PATH);
        let mut request = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .query("lat", lat.to_string())
            .query("lon", lon.to_string());
        if let Some(crop) = crop {
            request = request.query("crop", crop);
        }
        let response = request.call().map_err(|e| map_ureq_error(&url, e))?;
        Ok(parse_weather(read_json(&url, response)?))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use super::*;

    fn leaf_request() -> AnalysisRequest {
        AnalysisRequest {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            file_name: "leaf.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            plant_age_days: None,
            sample_type: None,
        }
    }

    /// Accepts one connection, writes `head` and then goes quiet
    fn stalling_server(head: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.flush();
                std::thread::sleep(Duration::from_secs(5));
            }
        });
        url
    }

    fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        url
    }

    #[test]
    fn stalled_body_falls_back_to_next_server() {
        let stalled = stalling_server(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"predic",
        );
        let mut healthy = mockito::Server::new();
        let predict = healthy
            .mock("POST", "/predict")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prediction":"Magnesium","confidence":0.6}"#)
            .create();

        let client =
            AnalysisClient::new(vec![stalled, healthy.url()], Duration::from_secs(1)).unwrap();
        let prediction = client.analyze_leaf(&leaf_request()).unwrap();
        assert_eq!(prediction.deficiency, "Magnesium");
        predict.assert();
    }

    #[test]
    fn stalled_body_alone_exhausts_candidates() {
        let stalled = stalling_server(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{",
        );
        let client = AnalysisClient::new(vec![stalled], Duration::from_secs(1)).unwrap();
        match client.analyze_leaf(&leaf_request()) {
            Err(ClientError::AllCandidatesFailed { attempts }) => assert_eq!(attempts.len(), 1),
            other => panic!("expected AllCandidatesFailed, got {other:?}"),
        }
    }

    #[test]
    fn truncated_json_is_malformed_not_network() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/predict")
            .with_status(200)
            .with_body("{\"prediction\":")
            .create();
        let client = AnalysisClient::new(vec![server.url()], Duration::from_secs(5)).unwrap();
        let err = client.analyze_leaf(&leaf_request()).unwrap_err();
        assert!(matches!(err, ClientError::Malformed { .. }), "{err:?}");
    }

    #[test]
    fn pest_detection_times_out_on_silent_server() {
        let silent = stalling_server("");
        let client = AnalysisClient::new(vec![silent], Duration::from_secs(30)).unwrap();
        let err = client
            .detect_pest(&leaf_request(), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }), "{err:?}");
    }

    #[test]
    fn pest_detection_uses_primary_only() {
        let mut primary = mockito::Server::new();
        let mut secondary = mockito::Server::new();
        let detect = primary
            .mock("POST", "/pest/detect")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"pest":"Aphid","confidence":64}"#)
            .create();
        let unused = secondary.mock("POST", "/pest/detect").expect(0).create();

        let client =
            AnalysisClient::new(vec![primary.url(), secondary.url()], Duration::from_secs(5))
                .unwrap();
        let detection = client
            .detect_pest(&leaf_request(), Duration::from_secs(5))
            .unwrap();
        assert_eq!(detection.pest, "Aphid");
        assert!((detection.confidence - 0.64).abs() < 1e-9);
        detect.assert();
        unused.assert();
    }

    #[test]
    fn pest_detection_does_not_fall_back() {
        let mut secondary = mockito::Server::new();
        let unused = secondary.mock("POST", "/pest/detect").expect(0).create();
        let client =
            AnalysisClient::new(vec![dead_url(), secondary.url()], Duration::from_secs(5)).unwrap();
        let err = client
            .detect_pest(&leaf_request(), Duration::from_secs(5))
            .unwrap_err();
        assert!(err.is_network(), "{err:?}");
        unused.assert();
    }

    #[test]
    fn join_url_strips_trailing_slash() {
        assert_eq!(join_url("http://a:8000/", "/predict"), "http://a:8000/predict");
        assert_eq!(join_url("http://a:8000", "/predict"), "http://a:8000/predict");
    }

    #[test]
    fn new_rejects_empty_url_list() {
        assert!(matches!(
            AnalysisClient::new(vec![" ".to_string()], Duration::from_secs(1)),
            Err(ClientError::NoBaseUrls)
        ));
    }

    #[test]
    fn status_code_maps_to_status_error() {
        let e = map_ureq_error("http://a", ureq::Error::StatusCode(503));
        assert!(matches!(e, ClientError::Status { code: 503, .. }));
        assert!(!e.is_network());
    }

    #[test]
    fn leaf_form_carries_optional_fields() {
        let request = AnalysisRequest {
            bytes: vec![0xFF, 0xD8],
            file_name: "leaf.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            plant_age_days: Some(45),
            sample_type: Some("leaf".to_string()),
        };
        let body = String::from_utf8_lossy(&leaf_form(&request).encode()).into_owned();
        assert!(body.contains("name=\"plant_age\"\r\n\r\n45\r\n"));
        assert!(body.contains("name=\"sample_type\"\r\n\r\nleaf\r\n"));
        assert!(body.contains("filename=\"leaf.jpg\""));
    }
}
