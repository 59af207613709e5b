use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the presentation content comes from.
///
/// A single slot, so typing text after uploading a file (or the reverse)
/// replaces the earlier source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TopicSource {
    #[default]
    Unset,
    Text(String),
    File { filename: String, content: Vec<u8> },
}

impl TopicSource {
    pub fn is_set(&self) -> bool {
        !matches!(self, TopicSource::Unset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailLevel {
    Basic,
    Intermediate,
    WorldClass,
}

impl DetailLevel {
    /// Value expected by the generation endpoint.
    pub fn as_wire(&self) -> &'static str {
        match self {
            DetailLevel::Basic => "Basic",
            DetailLevel::Intermediate => "Intermediate",
            DetailLevel::WorldClass => "World class",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Portuguese,
}

impl Language {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Portuguese => "Portuguese",
        }
    }
}

/// Narrator voice, sent to the backend as the `character` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Voice {
    #[default]
    Man,
    Woman,
}

impl Voice {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Voice::Man => "Default - Man",
            Voice::Woman => "Default - Woman",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Music {
    #[default]
    Background,
    None,
}

/// Multi-field generation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardConfig {
    pub topic: TopicSource,
    pub duration_minutes: Option<u32>,
    pub detail_level: Option<DetailLevel>,
    pub language: Language,
    pub voice: Voice,
    pub music: Music,
    pub subtitles: bool,
}

/// Form fields that can fail validation, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Topic,
    Duration,
    DetailLevel,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Topic => "topic",
            Field::Duration => "duration",
            Field::DetailLevel => "detail_level",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl WizardConfig {
    /// Check the configuration, returning every problem in field order.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        match &self.topic {
            TopicSource::Unset => {
                errors.push(FieldError::new(Field::Topic, "enter a topic or upload a file"));
            }
            TopicSource::Text(text) if text.trim().is_empty() => {
                errors.push(FieldError::new(Field::Topic, "topic text cannot be empty"));
            }
            TopicSource::File { content, .. } if content.is_empty() => {
                errors.push(FieldError::new(Field::Topic, "uploaded file is empty"));
            }
            _ => {}
        }

        match self.duration_minutes {
            None => errors.push(FieldError::new(Field::Duration, "duration is required")),
            Some(0) => errors.push(FieldError::new(
                Field::Duration,
                "duration must be a positive number of minutes",
            )),
            Some(_) => {}
        }

        if self.detail_level.is_none() {
            errors.push(FieldError::new(Field::DetailLevel, "choose a detail level"));
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Parse the duration box contents as typed.
///
/// Returns `Ok(None)` for an empty box and rejects anything that is not
/// made of ASCII digits, so bad input never reaches the model.
pub fn parse_duration_input(input: &str) -> Result<Option<u32>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{}' is not a whole number of minutes", trimmed));
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| format!("'{}' is too large", trimmed))
}

/// Content type for an uploaded topic file, by extension.
pub fn file_content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" | "md" | "text" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(errors: &[FieldError]) -> Vec<Field> {
        errors.iter().map(|e| e.field).collect()
    }

    #[test]
    fn test_empty_config_reports_all_required_fields() {
        let errors = WizardConfig::default().validate();
        assert_eq!(
            fields(&errors),
            vec![Field::Topic, Field::Duration, Field::DetailLevel]
        );
    }

    #[test]
    fn test_minimal_valid_config() {
        let config = WizardConfig {
            topic: TopicSource::Text("x".to_string()),
            duration_minutes: Some(5),
            detail_level: Some(DetailLevel::Basic),
            ..Default::default()
        };
        assert!(config.validate().is_empty());
        assert!(config.is_valid());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let config = WizardConfig {
            topic: TopicSource::Text("rust".to_string()),
            duration_minutes: Some(0),
            detail_level: Some(DetailLevel::Intermediate),
            ..Default::default()
        };
        assert_eq!(fields(&config.validate()), vec![Field::Duration]);
    }

    #[test]
    fn test_blank_text_and_empty_file_rejected() {
        let mut config = WizardConfig {
            topic: TopicSource::Text("   ".to_string()),
            duration_minutes: Some(3),
            detail_level: Some(DetailLevel::Basic),
            ..Default::default()
        };
        assert_eq!(fields(&config.validate()), vec![Field::Topic]);

        config.topic = TopicSource::File {
            filename: "notes.txt".to_string(),
            content: Vec::new(),
        };
        assert_eq!(fields(&config.validate()), vec![Field::Topic]);
    }

    #[test]
    fn test_parse_duration_input() {
        assert_eq!(parse_duration_input(""), Ok(None));
        assert_eq!(parse_duration_input(" 12 "), Ok(Some(12)));
        assert_eq!(parse_duration_input("0"), Ok(Some(0)));
        assert!(parse_duration_input("5m").is_err());
        assert!(parse_duration_input("-3").is_err());
        assert!(parse_duration_input("2.5").is_err());
        assert!(parse_duration_input("99999999999").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = WizardConfig::default();
        assert_eq!(config.language, Language::English);
        assert_eq!(config.voice, Voice::Man);
        assert_eq!(config.music, Music::Background);
        assert!(!config.subtitles);
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(DetailLevel::WorldClass.as_wire(), "World class");
        assert_eq!(Voice::Woman.as_wire(), "Default - Woman");
        assert_eq!(Language::Portuguese.as_wire(), "Portuguese");
    }

    #[test]
    fn test_file_content_type() {
        assert_eq!(file_content_type("lecture.PDF"), "application/pdf");
        assert_eq!(file_content_type("notes.txt"), "text/plain");
        assert_eq!(file_content_type("README"), "application/octet-stream");
    }
}
