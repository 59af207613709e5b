use std::path::Path;

use tracing::{debug, info};

use crate::domain::wizard::parse_duration_input;
use crate::domain::{
    DetailLevel, DomainError, FieldError, Language, Music, TopicSource, Voice, WizardConfig,
};

/// Holds the generation settings while the user fills them in.
///
/// Topic text and topic file share one slot: whichever was set last is the
/// one submitted.
#[derive(Debug, Default, Clone)]
pub struct WizardForm {
    config: WizardConfig,
    duration_input: String,
}

impl WizardForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    /// Raw contents of the duration box.
    pub fn duration_input(&self) -> &str {
        &self.duration_input
    }

    pub fn set_topic_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let TopicSource::File { filename, .. } = &self.config.topic {
            debug!(filename = %filename, "Typed topic replaces uploaded file");
        }
        self.config.topic = if text.is_empty() {
            TopicSource::Unset
        } else {
            TopicSource::Text(text)
        };
    }

    /// Use already-read file content as the topic.
    pub fn set_topic_file(&mut self, filename: impl Into<String>, content: Vec<u8>) {
        let filename = filename.into();
        info!(filename = %filename, bytes = content.len(), "Topic file loaded");
        self.config.topic = TopicSource::File { filename, content };
    }

    /// Read a topic file from disk and make it the topic.
    ///
    /// The form is mutably borrowed for the whole read, so it cannot be
    /// submitted until the content has landed.
    pub async fn ingest_file(&mut self, path: &Path) -> Result<(), DomainError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DomainError::InvalidInput {
                field: "file",
                message: format!("{} is not a file", path.display()),
            })?;
        let content = tokio::fs::read(path).await?;
        self.set_topic_file(filename, content);
        Ok(())
    }

    /// Update the duration from the text box.
    ///
    /// Anything other than digits is refused and the previous value kept.
    pub fn set_duration_input(&mut self, input: &str) -> Result<(), DomainError> {
        let minutes = parse_duration_input(input).map_err(|message| DomainError::InvalidInput {
            field: "duration",
            message,
        })?;
        self.duration_input = input.trim().to_string();
        self.config.duration_minutes = minutes;
        Ok(())
    }

    pub fn set_detail_level(&mut self, level: DetailLevel) {
        self.config.detail_level = Some(level);
    }

    pub fn set_language(&mut self, language: Language) {
        self.config.language = language;
    }

    pub fn set_voice(&mut self, voice: Voice) {
        self.config.voice = voice;
    }

    pub fn set_music(&mut self, music: Music) {
        self.config.music = music;
    }

    pub fn set_subtitles(&mut self, subtitles: bool) {
        self.config.subtitles = subtitles;
    }

    pub fn toggle_subtitles(&mut self) {
        self.config.subtitles = !self.config.subtitles;
    }

    pub fn validate(&self) -> Vec<FieldError> {
        self.config.validate()
    }

    /// Whether the form can be submitted as is.
    pub fn is_complete(&self) -> bool {
        self.config.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Field;
    use std::io::Write;

    #[test]
    fn test_is_complete_once_required_fields_set() {
        let mut form = WizardForm::new();
        assert!(!form.is_complete());
        form.set_topic_text("Volcanoes");
        form.set_duration_input("3").unwrap();
        assert!(!form.is_complete());
        form.set_detail_level(DetailLevel::Basic);
        assert!(form.is_complete());
    }

    #[test]
    fn test_text_after_file_wins() {
        let mut form = WizardForm::new();
        form.set_topic_file("notes.txt", b"from file".to_vec());
        form.set_topic_text("typed later");
        assert_eq!(form.config().topic, TopicSource::Text("typed later".to_string()));
    }

    #[test]
    fn test_file_after_text_wins() {
        let mut form = WizardForm::new();
        form.set_topic_text("typed first");
        form.set_topic_file("notes.txt", b"from file".to_vec());
        assert!(matches!(form.config().topic, TopicSource::File { .. }));
    }

    #[test]
    fn test_clearing_text_unsets_topic() {
        let mut form = WizardForm::new();
        form.set_topic_text("something");
        form.set_topic_text("");
        assert_eq!(form.config().topic, TopicSource::Unset);
    }

    #[test]
    fn test_non_numeric_duration_rejected_at_entry() {
        let mut form = WizardForm::new();
        form.set_duration_input("10").unwrap();
        let err = form.set_duration_input("10a").unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput { field: "duration", .. }));
        assert_eq!(form.config().duration_minutes, Some(10));
        assert_eq!(form.duration_input(), "10");

        form.set_duration_input("").unwrap();
        assert_eq!(form.config().duration_minutes, None);
    }

    #[test]
    fn test_validate_orders_fields() {
        let mut form = WizardForm::new();
        form.set_detail_level(DetailLevel::Basic);
        let fields: Vec<Field> = form.validate().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::Topic, Field::Duration]);
    }

    #[test]
    fn test_settings_with_defaults() {
        let mut form = WizardForm::new();
        form.set_language(Language::Portuguese);
        form.set_voice(Voice::Woman);
        form.set_music(Music::None);
        form.toggle_subtitles();
        let config = form.config();
        assert_eq!(config.language, Language::Portuguese);
        assert_eq!(config.voice, Voice::Woman);
        assert_eq!(config.music, Music::None);
        assert!(config.subtitles);
    }

    #[tokio::test]
    async fn test_ingest_file_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topic.md");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"# Black holes").unwrap();

        let mut form = WizardForm::new();
        form.set_topic_text("will be replaced");
        form.ingest_file(&path).await.unwrap();
        assert_eq!(
            form.config().topic,
            TopicSource::File {
                filename: "topic.md".to_string(),
                content: b"# Black holes".to_vec(),
            }
        );
    }

    #[tokio::test]
    async fn test_ingest_missing_file_keeps_previous_topic() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = WizardForm::new();
        form.set_topic_text("kept");
        assert!(form.ingest_file(&dir.path().join("missing.txt")).await.is_err());
        assert_eq!(form.config().topic, TopicSource::Text("kept".to_string()));
    }
}
