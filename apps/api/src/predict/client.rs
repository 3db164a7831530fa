//! Prediction client — the single point of entry for calls to the external
//! ML endpoints (map prediction and image analysis).
//!
//! No other module may talk to the ML service directly; handlers go through
//! this client so gating and usage accounting stay in one place around it.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::errors::AppError;
use crate::tiers::Tier;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<PredictError> for AppError {
    fn from(e: PredictError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct MapPredictionRequest<'a> {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<&'a str>,
    pub username: &'a str,
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictedLabel {
    Toxic,
    NonToxic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapPrediction {
    pub prediction_for_date: String,
    pub predicted_label: PredictedLabel,
    pub confidence_scores: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_image_base64: Option<String>,
    pub analysis_result: AnalysisResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub prediction: String,
    pub confidence: f64,
    pub processing_time: String,
    pub model_used: String,
}

#[derive(Clone)]
pub struct PredictionClient {
    http: Client,
    prediction_url: String,
    image_analysis_url: String,
}

impl PredictionClient {
    pub fn new(http: Client, prediction_url: String, image_analysis_url: String) -> Self {
        PredictionClient {
            http,
            prediction_url,
            image_analysis_url,
        }
    }

    pub async fn predict_map(
        &self,
        request: &MapPredictionRequest<'_>,
    ) -> Result<MapPrediction, PredictError> {
        debug!(
            "Map prediction for '{}' at ({}, {})",
            request.username, request.latitude, request.longitude
        );
        let response = self
            .http
            .post(format!("{}/predict/map", self.prediction_url))
            .json(request)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn analyze_image(
        &self,
        username: &str,
        tier: Tier,
        file_name: String,
        image: Vec<u8>,
    ) -> Result<ImageAnalysis, PredictError> {
        debug!("Image analysis for '{username}' ({} bytes)", image.len());
        let form = Form::new()
            .part("image", Part::bytes(image).file_name(file_name))
            .text("tier", tier.as_str())
            .text("username", username.to_string());

        let response = self
            .http
            .post(format!("{}/predict/imageupload", self.image_analysis_url))
            .multipart(form)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PredictError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PredictError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_prediction_deserializes_upstream_shape() {
        let body = r#"{
            "prediction_for_date": "2024-06-01",
            "predicted_label": "non_toxic",
            "confidence_scores": {"toxic": 0.12, "non_toxic": 0.88}
        }"#;
        let prediction: MapPrediction = serde_json::from_str(body).unwrap();
        assert!(matches!(prediction.predicted_label, PredictedLabel::NonToxic));
        assert_eq!(prediction.prediction_for_date, "2024-06-01");
    }

    #[test]
    fn test_image_analysis_deserializes_upstream_shape() {
        let body = r#"{
            "success": true,
            "output_image_url": "https://cdn.example/result.png",
            "analysis_result": {
                "prediction": "toxic",
                "confidence": 0.97,
                "processing_time": "12s",
                "model_used": "hab-resnet-v2"
            }
        }"#;
        let analysis: ImageAnalysis = serde_json::from_str(body).unwrap();
        assert!(analysis.success);
        assert_eq!(analysis.analysis_result.model_used, "hab-resnet-v2");
        assert!(analysis.output_image_base64.is_none());
    }

    #[test]
    fn test_request_omits_missing_date() {
        let request = MapPredictionRequest {
            latitude: 27.9,
            longitude: -82.8,
            date: None,
            username: "abc",
            tier: Tier::Free,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("date").is_none());
        assert_eq!(json["tier"], "free");
    }
}
