use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::artifact::ArtifactRef;
use crate::domain::wizard::{file_content_type, Field, FieldError, TopicSource, WizardConfig};

/// Generation request lifecycle.
///
/// State transitions:
/// - Idle -> Validating (submit)
/// - Validating -> Failed (config invalid, no request issued)
/// - Validating -> Submitting (config valid, request issued)
/// - Submitting -> Success | Failed (response received)
///
/// Success and Failed are terminal for that request; the next submit starts
/// again from Validating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Validating,
    Submitting,
    Success(ArtifactRef),
    Failed(String),
}

impl GenerationStatus {
    /// Whether a request is currently being validated or sent.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, GenerationStatus::Validating | GenerationStatus::Submitting)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Success(_) | GenerationStatus::Failed(_))
    }
}

/// Result lookup lifecycle for the results view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum ResultStatus {
    #[default]
    Idle,
    Loading,
    Success(String),
    Error(String),
}

/// Download lifecycle for the results view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum DownloadStatus {
    #[default]
    Idle,
    Downloading,
    Saved(PathBuf),
    Failed(String),
}

/// One part of a multipart/form-data body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        filename: String,
        content_type: &'static str,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn name(&self) -> &'static str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => *name,
        }
    }
}

/// Transport-neutral multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name,
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: &'static str,
        filename: impl Into<String>,
        content_type: &'static str,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name,
            filename: filename.into(),
            content_type,
            bytes,
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<FormPart> {
        self.parts
    }

    pub fn get(&self, name: &str) -> Option<&FormPart> {
        self.parts.iter().find(|p| p.name() == name)
    }

    /// Value of a text part.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FormPart::Text { value, .. }) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Build the generation request body for a configuration.
///
/// Carries exactly one of `file` or `text`, then `duration`,
/// `detail_level`, `character` and `language`.
pub fn build_form(config: &WizardConfig) -> Result<MultipartForm, Vec<FieldError>> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(errors);
    }

    let form = match &config.topic {
        TopicSource::Text(text) => MultipartForm::new().text("text", text.trim()),
        TopicSource::File { filename, content } => MultipartForm::new().file(
            "file",
            filename.clone(),
            file_content_type(filename),
            content.clone(),
        ),
        TopicSource::Unset => {
            return Err(vec![FieldError::new(Field::Topic, "enter a topic or upload a file")]);
        }
    };

    // validate() guarantees both are present
    let duration = config.duration_minutes.unwrap_or_default();
    let detail = config
        .detail_level
        .map(|d| d.as_wire())
        .unwrap_or_default();

    Ok(form
        .text("duration", duration.to_string())
        .text("detail_level", detail)
        .text("character", config.voice.as_wire())
        .text("language", config.language.as_wire()))
}

/// Pull a human-readable reason out of an error response body.
///
/// Understands `{"detail": "..."}` and the validation shape
/// `{"detail": [{"msg": "..."}, ...]}`.
pub fn extract_error_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

/// Reason used when the server gives nothing structured back.
pub fn generic_failure_reason(status: u16) -> String {
    format!("Video generation failed (HTTP {})", status)
}

/// Body of a successful result lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoLocation {
    #[serde(rename = "videoUrl", alias = "video_url")]
    pub video_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::wizard::{DetailLevel, Language, Voice};

    fn valid_config() -> WizardConfig {
        WizardConfig {
            topic: TopicSource::Text("  photosynthesis ".to_string()),
            duration_minutes: Some(5),
            detail_level: Some(DetailLevel::WorldClass),
            language: Language::Portuguese,
            voice: Voice::Woman,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_form_text_topic() {
        let form = build_form(&valid_config()).unwrap();
        assert_eq!(form.text_value("text"), Some("photosynthesis"));
        assert!(form.get("file").is_none());
        assert_eq!(form.text_value("duration"), Some("5"));
        assert_eq!(form.text_value("detail_level"), Some("World class"));
        assert_eq!(form.text_value("character"), Some("Default - Woman"));
        assert_eq!(form.text_value("language"), Some("Portuguese"));
    }

    #[test]
    fn test_build_form_file_topic() {
        let mut config = valid_config();
        config.topic = TopicSource::File {
            filename: "slides.pdf".to_string(),
            content: b"%PDF-1.4".to_vec(),
        };
        let form = build_form(&config).unwrap();
        assert!(form.get("text").is_none());
        match form.get("file") {
            Some(FormPart::File {
                filename,
                content_type,
                bytes,
                ..
            }) => {
                assert_eq!(filename, "slides.pdf");
                assert_eq!(*content_type, "application/pdf");
                assert_eq!(bytes, b"%PDF-1.4");
            }
            other => panic!("expected file part, got {:?}", other),
        }
    }

    #[test]
    fn test_build_form_rejects_invalid_config() {
        let errors = build_form(&WizardConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_extract_error_detail() {
        assert_eq!(
            extract_error_detail(br#"{"detail":"bad input"}"#),
            Some("bad input".to_string())
        );
        assert_eq!(
            extract_error_detail(
                br#"{"detail":[{"loc":["body","duration"],"msg":"field required"},{"msg":"value is not a valid integer"}]}"#
            ),
            Some("field required; value is not a valid integer".to_string())
        );
        assert_eq!(extract_error_detail(b"<html>502</html>"), None);
        assert_eq!(extract_error_detail(br#"{"error":"x"}"#), None);
        assert_eq!(extract_error_detail(br#"{"detail":""}"#), None);
    }

    #[test]
    fn test_generation_status_flags() {
        assert!(GenerationStatus::Submitting.is_in_flight());
        assert!(GenerationStatus::Validating.is_in_flight());
        assert!(!GenerationStatus::Idle.is_in_flight());
        assert!(GenerationStatus::Failed("x".into()).is_terminal());
        assert!(!GenerationStatus::Submitting.is_terminal());
    }

    #[test]
    fn test_video_location_accepts_both_spellings() {
        let a: VideoLocation = serde_json::from_str(r#"{"videoUrl":"/videos/a.mp4"}"#).unwrap();
        let b: VideoLocation = serde_json::from_str(r#"{"video_url":"/videos/b.mp4"}"#).unwrap();
        assert_eq!(a.video_url, "/videos/a.mp4");
        assert_eq!(b.video_url, "/videos/b.mp4");
    }
}
