use thiserror::Error;

/// Failures raised while reading a scene description.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("invalid scene XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{0}> tag is missing")]
    MissingTag(&'static str),
    #[error("<{tag}> is missing components")]
    MissingComponents { tag: &'static str },
    #[error("<{tag}> has an invalid number `{value}`")]
    InvalidNumber { tag: &'static str, value: String },
    #[error("unknown object type `{0}`; expected surface, flat, light or camera")]
    UnknownObjectType(String),
    #[error("duplicate object name `{0}`")]
    DuplicateName(String),
    #[error("surface resolution must be at least 1")]
    ZeroResolution,
    #[error("surface resolution {value} exceeds the maximum of {max}")]
    ResolutionTooLarge { value: u32, max: u32 },
}

/// Raised when the windowing system cannot be brought up.
///
/// The binary downcasts to this type to decide whether to fall back to the
/// headless summary.
#[derive(Debug, Error)]
#[error("failed to initialize {stage}: {message}")]
pub struct WindowInitError {
    pub stage: &'static str,
    pub message: String,
}

impl WindowInitError {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}
