pub type NewsreelResult<T> = Result<T, NewsreelError>;

#[derive(thiserror::Error, Debug)]
pub enum NewsreelError {
    #[error("headlines fetch failed: {0}")]
    Fetch(String),

    #[error("no headlines available today")]
    EmptyFeed,

    #[error("rendering error: {0}")]
    Render(String),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NewsreelError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
