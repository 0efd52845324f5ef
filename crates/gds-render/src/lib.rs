//! C6: the renderer dispatch layer. Owns the abstract [`OutputRenderer`]
//! contract and every concrete back-end (§4.6), plus the asynchronous
//! wrapper (§5.1) `gds-cli` uses to keep a render job off its own thread.

pub mod async_handle;
pub mod cairo_backend;
pub mod error;
pub mod external;
pub mod renderer;
pub mod tikz;

pub use async_handle::{AsyncRenderHandle, RenderProgress};
pub use cairo_backend::{CairoRenderer, RasterFormat, MAX_LAYERS};
pub use error::RenderError;
pub use external::{run_worker, ExternalRenderer};
pub use renderer::{check_renderable, OutputRenderer};
pub use tikz::TikzRenderer;
