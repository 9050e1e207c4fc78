pub mod fallback;

pub use fallback::{create_fallback_provider, FallbackConfig};
