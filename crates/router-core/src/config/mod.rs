//! Config schema and loader. See `loader::load_config`.

mod loader;
mod schema;

pub use loader::{default_runtime_dir, get_config_path, load_config, resolve_runtime_dir};
pub use schema::{
    Config, FeaturesConfig, HttpConfig, ProviderCmdConfig, ProvidersConfig, RouterConfig,
    TelegramConfig, WsConfig,
};
