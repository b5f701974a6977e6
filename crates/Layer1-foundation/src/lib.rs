//! # plugrt-foundation
//!
//! Foundation layer for plugrt:
//! - Error: 플러그인 런타임 에러 분류 (로드/활성화/설정/디스패치/마켓플레이스/종료)
//! - Config: 런타임 통합 설정 (RuntimeConfig, 글로벌 + 프로젝트 병합)
//! - Storage: JsonStore (범용 JSON 파일 저장소)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    MarketplaceSettings, PluginSettings, RuntimeConfig, SandboxSettings, SecuritySettings,
    TestingSettings, ENV_MARKETPLACE_URL, ENV_PLUGIN_DIR, RUNTIME_CONFIG_FILE,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::JsonStore;
