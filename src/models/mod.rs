mod analytics;
mod session;
mod stream_config;

pub use analytics::*;
pub use session::*;
pub use stream_config::*;
