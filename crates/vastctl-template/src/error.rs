use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("unknown template format: {0} (expected minimal, detailed or user_friendly)")]
  UnknownFormat(String),

  #[error("template is missing '{0}'")]
  MissingField(&'static str),

  #[error("failed to serialize template: {0}")]
  Serialize(#[from] serde_json::Error),
}
