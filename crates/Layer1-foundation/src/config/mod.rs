//! Config - 런타임 설정 관리
//!
//! - `runtime.rs` - RuntimeConfig 통합 설정 (플러그인, 샌드박스, 보안, 마켓플레이스, 테스트)

mod runtime;

pub use runtime::{
    MarketplaceSettings, PluginSettings, RuntimeConfig, SandboxSettings, SecuritySettings,
    TestingSettings, ENV_MARKETPLACE_URL, ENV_PLUGIN_DIR, RUNTIME_CONFIG_FILE,
};
