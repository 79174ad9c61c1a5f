use base64::Engine;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ServiceConfig;
use crate::voltages::CELL_COUNT;

/// Name of the plot the service returns when `include_plots` is set.
pub const PERFORMANCE_PLOT: &str = "performance";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub voltages: [f64; CELL_COUNT],
    pub threshold: f64,
    pub include_plots: bool,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    soh: f64,
    soh_raw: f64,
    classification: String,
    equation: String,
    #[serde(default)]
    plots: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: String,
    #[allow(dead_code)]
    #[serde(default)]
    error: Option<String>,
}

/// A decoded PNG returned alongside a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub soh: f64,
    pub soh_raw: f64,
    pub classification: String,
    pub equation: String,
    pub plots: BTreeMap<String, Plot>,
}

impl PredictionResult {
    pub fn performance_plot(&self) -> Option<&Plot> {
        self.plots.get(PERFORMANCE_PLOT)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("prediction unavailable: {0}")]
    Transport(String),
    #[error("prediction unavailable: service returned status {0}")]
    Status(u16),
    #[error("prediction unavailable: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("chat unavailable: {0}")]
    Transport(String),
    #[error("chat unavailable: service returned status {0}")]
    Status(u16),
    #[error("chat unavailable: {0}")]
    Decode(String),
}

fn decode_plot(name: &str, encoded: &str) -> Result<Plot, PredictionError> {
    let png = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| PredictionError::Decode(format!("plot '{}' is not base64: {}", name, e)))?;

    let img = image::load_from_memory(&png)
        .map_err(|e| PredictionError::Decode(format!("plot '{}' is not an image: {}", name, e)))?;
    let (width, height) = img.dimensions();

    Ok(Plot { png, width, height })
}

impl TryFrom<PredictionResponse> for PredictionResult {
    type Error = PredictionError;

    fn try_from(response: PredictionResponse) -> Result<Self, Self::Error> {
        let mut plots = BTreeMap::new();
        for (name, encoded) in &response.plots {
            plots.insert(name.clone(), decode_plot(name, encoded)?);
        }

        Ok(PredictionResult {
            soh: response.soh,
            soh_raw: response.soh_raw,
            classification: response.classification,
            equation: response.equation,
            plots,
        })
    }
}

/// HTTP client for the prediction/chat backend.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    host: String,
    api_base: String,
    client: reqwest::Client,
}

impl ServiceClient {
    pub fn with_config(config: &ServiceConfig) -> Self {
        ServiceClient {
            host: config.host.trim_end_matches('/').to_string(),
            api_base: config.api_base(),
            client: reqwest::Client::new(),
        }
    }

    #[allow(dead_code)]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let url = format!("{}/predict", self.api_base);
        log::debug!("POST {} ({} cells, threshold {})", url, request.voltages.len(), request.threshold);

        let response = self.client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PredictionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PredictionError::Status(response.status().as_u16()));
        }

        let body: PredictionResponse = response
            .json()
            .await
            .map_err(|e| PredictionError::Decode(e.to_string()))?;

        PredictionResult::try_from(body)
    }

    pub async fn chat(&self, message: &str) -> Result<String, ChatError> {
        let url = format!("{}/chat", self.api_base);
        log::debug!("POST {} ({} chars)", url, message.len());

        let response = self.client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status().as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;

        Ok(body.reply)
    }

    /// `GET {host}/health`; true on any 2xx.
    pub async fn health(&self) -> bool {
        match self.client.get(format!("{}/health", self.host)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn png_base64(width: u32, height: u32) -> String {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([34, 197, 94]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(buffer)
    }

    #[test]
    fn test_prediction_request_shape() {
        let request = PredictionRequest {
            voltages: [3.6; CELL_COUNT],
            threshold: 0.6,
            include_plots: true,
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["threshold"], json!(0.6));
        assert_eq!(value["include_plots"], json!(true));
        let voltages = value["voltages"].as_array().unwrap();
        assert_eq!(voltages.len(), 21);
        assert!(voltages.iter().all(|v| *v == json!(3.6)));
    }

    #[test]
    fn test_chat_request_shape() {
        let value = serde_json::to_value(ChatRequest { message: "hello" }).unwrap();
        assert_eq!(value, json!({ "message": "hello" }));
    }

    #[test]
    fn test_decode_response_without_plots() {
        let body = r#"{"soh": 0.85, "soh_raw": 0.87, "classification": "Good", "equation": "SOH = 0.1*U1 + ..."}"#;
        let response: PredictionResponse = serde_json::from_str(body).unwrap();
        let result = PredictionResult::try_from(response).unwrap();

        assert_eq!(result.soh, 0.85);
        assert_eq!(result.soh_raw, 0.87);
        assert_eq!(result.classification, "Good");
        assert!(result.plots.is_empty());
        assert!(result.performance_plot().is_none());
    }

    #[test]
    fn test_decode_performance_plot() {
        let body = json!({
            "soh": 0.42,
            "soh_raw": 0.40,
            "classification": "Unhealthy",
            "equation": "SOH = ...",
            "plots": { "performance": png_base64(6, 4) }
        });
        let response: PredictionResponse = serde_json::from_value(body).unwrap();
        let result = PredictionResult::try_from(response).unwrap();

        let plot = result.performance_plot().unwrap();
        assert_eq!((plot.width, plot.height), (6, 4));
        assert!(plot.png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_corrupt_plot_fails_whole_result() {
        let body = json!({
            "soh": 0.9,
            "soh_raw": 0.9,
            "classification": "Healthy",
            "equation": "",
            "plots": { "performance": "***not base64***" }
        });
        let response: PredictionResponse = serde_json::from_value(body).unwrap();
        let err = PredictionResult::try_from(response).unwrap_err();

        assert!(matches!(err, PredictionError::Decode(_)));
        assert!(err.to_string().starts_with("prediction unavailable"));
    }

    #[test]
    fn test_chat_response_ignores_error_field() {
        let body = r#"{"reply": "Sorry, I couldn't reach the AI service", "error": "quota"}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.reply, "Sorry, I couldn't reach the AI service");
    }

    fn unreachable_client() -> ServiceClient {
        ServiceClient::with_config(&ServiceConfig {
            host: "http://127.0.0.1:1".to_string(),
            api_path: "/api".to_string(),
        })
    }

    #[tokio::test]
    async fn test_predict_unreachable_is_transport_error() {
        let client = unreachable_client();
        assert_eq!(client.api_base(), "http://127.0.0.1:1/api");

        let request = PredictionRequest {
            voltages: [3.6; CELL_COUNT],
            threshold: 0.6,
            include_plots: false,
        };
        let err = client.predict(&request).await.unwrap_err();
        assert!(matches!(err, PredictionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_chat_unreachable_is_transport_error() {
        let client = unreachable_client();
        let err = client.chat("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
        assert!(!client.health().await);
    }
}
