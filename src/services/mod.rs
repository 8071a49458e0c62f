mod analytics;
mod config_sync;
mod managed_block;
mod reload;
mod session;
mod token;
mod viewer_cache;

pub use analytics::*;
pub use config_sync::*;
pub use managed_block::*;
pub use reload::*;
pub use session::*;
pub use token::*;
pub use viewer_cache::*;
