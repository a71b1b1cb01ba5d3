use std::path::PathBuf;

use thiserror::Error;

/// The primary error type that can be produced by fibereport.
#[derive(Debug, Error)]
pub enum Error {
    #[error("nothing is selected: select some data or include the chart image")]
    EmptySelection,
    #[error("template names must not be blank")]
    InvalidName,
    #[error("no such template: \"{0}\"")]
    NotFound(String),
    #[error("transport failed with status {status}: {body}")]
    Transport { status: u16, body: String },
    #[error("I/O error {0}: {1}")]
    Io(String, std::io::Error),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("cannot determine file type of file: {0}")]
    CannotDetermineFileType(PathBuf),
    #[error("failed to load data from file {0}: {1}")]
    LoadFromFile(PathBuf, Box<Error>),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to compile template \"{0}\": {1}")]
    TemplateCompile(String, Box<handlebars::TemplateError>),
    #[error("failed to render template \"{0}\": {1}")]
    TemplateRender(String, handlebars::RenderError),
    #[error("invalid folder name: \"{0}\"")]
    InvalidFolderName(String),
    #[error("path is outside of the served root: {0}")]
    PathOutsideRoot(String),
    #[error("too many files in one upload: {count} (at most {max} allowed)")]
    TooManyFiles { count: usize, max: usize },
}
