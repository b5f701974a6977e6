//! plugrt-core: Plugin Runtime Core
//!
//! Layer2 - 플러그인 라이프사이클/디스패치 레이어
//!
//! # 주요 구성
//!
//! - `PluginManager`: 로드/활성화/비활성화/설정/언로드 + 기능별 디스패치
//! - `PluginLoader`: 네이티브 모듈(libloading) 및 `builtin:` 모듈 로드, 샌드박스 래핑
//! - `SecurityManager`: 권한 정책, 매니페스트 무결성/서명 검증
//! - `EventBus`: 라이프사이클 이벤트 팬아웃 (핸들러 에러 격리)
//! - `MarketplaceClient`: 원격 카탈로그 검색/다운로드/업데이트 확인
//! - `PluginTestFramework`: 플러그인 적합성 테스트
//! - `PluginService`: UI/CLI용 파사드
//!
//! # 사용 예시
//!
//! ```ignore
//! use plugrt_core::{PluginService, RuntimeConfig};
//!
//! let service = PluginService::from_config(&RuntimeConfig::load())?;
//! service.initialize().await?;
//!
//! for plugin in service.list_plugins().await {
//!     println!("{} {:?}", plugin.info.id, plugin.status);
//! }
//! ```

pub mod plugin;

// Re-exports: Plugin runtime
pub use plugin::{
    // Contract
    Capability,
    // Events
    EventBus,
    // Marketplace
    MarketplaceClient,
    Plugin,
    PluginContext,
    PluginEvent,
    PluginInfo,
    PluginInstance,
    PluginInstanceView,
    // Loader
    PluginLoader,
    // Manager
    PluginManager,
    PluginManagerConfig,
    PluginManifest,
    // Service
    PluginService,
    PluginStatus,
    // Testing
    PluginTestFramework,
    SecurityManager,
    StaticModuleLoader,
};

// Layer1 re-exports
pub use plugrt_foundation::{Error, Result, RuntimeConfig};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
