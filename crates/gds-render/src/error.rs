//! The **Renderer** error kind (§7) plus the **Limit** case that belongs to
//! a specific back-end (Cairo's layer cap).

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("io error writing render output: {0}")]
    Io(#[from] std::io::Error),

    #[error("cell '{0}' is affected by a reference loop; refusing to render")]
    ReferenceLoop(String),

    #[error("cell '{0}' has not been validated")]
    NotValidated(String),

    #[error("cairo surface error: {0}")]
    Cairo(String),

    #[error("layer count {count} exceeds this renderer's cap of {cap}")]
    LayerLimitExceeded { count: usize, cap: usize },

    #[error("external renderer plugin error: {0}")]
    Plugin(String),

    #[error("external renderer init returned nonzero status {0}")]
    PluginInitFailed(i32),

    #[error("external renderer render call returned nonzero status {0}")]
    PluginRenderFailed(i32),
}
