//! # Plugin Runtime
//!
//! 코드 생성 호스트용 플러그인 런타임
//!
//! ## 개요
//!
//! 플러그인은 하나 이상의 기능(Capability)을 구현한 모듈입니다:
//! - 템플릿 처리 / 검증 / 출력 변환 / UI 컴포넌트 / 외부 연동
//! - 테스트 / 파서 / 생성기 / 미들웨어 / 이벤트 리스너
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        PluginService                         │
//! │  ┌────────────────────────────────────────────────────────┐ │
//! │  │                    PluginManager                        │ │
//! │  │   Loaded → Active ⇄ Disabled, Error → Active (enable)   │ │
//! │  │  ┌──────────────┬──────────────┬──────────────────┐    │ │
//! │  │  │ PluginLoader │ Security     │ EventBus         │    │ │
//! │  │  │ (+ Sandbox)  │ Manager      │ (broadcast)      │    │ │
//! │  │  └──────────────┴──────────────┴──────────────────┘    │ │
//! │  └────────────────────────────────────────────────────────┘ │
//! │          │                                   │               │
//! │  ┌───────┴──────────┐             ┌──────────┴───────────┐  │
//! │  │ MarketplaceClient│             │ PluginTestFramework  │  │
//! │  └──────────────────┘             └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! let manager = PluginManager::new(PluginManagerConfig::default())
//!     .with_loader(PluginLoader::new().with_backend(Arc::new(builtin_loader())));
//!
//! let id = manager.load_plugin("builtin:example.template-processor").await?;
//! let output = manager
//!     .execute_template_processor(&id, "Hello {{name}}!", &data)
//!     .await?;
//! ```

pub mod api;
pub mod builtin;
mod capability;
mod discovery;
mod events;
mod info;
mod instance;
mod loader;
mod manager;
mod manifest;
pub mod marketplace;
mod sandbox;
mod security;
mod service;
mod testing;
mod traits;
mod types;

pub use api::{to_plugin_info_api, PluginInfoApi, PluginInstanceView};
pub use capability::{
    EventListener, Generator, Integration, Middleware, OutputConverter, Parser, TemplateProcessor,
    TestingPlugin, UiComponent, Validator,
};
pub use discovery::{DiscoveredPlugin, PluginDiscovery, MODULE_METADATA_KEY};
pub use events::{
    event_handler, EventBus, EventBusConfig, EventHandler, HandlerId, PluginEvent, MANAGER_SOURCE,
    PLUGIN_CONFIGURED, PLUGIN_ERROR, PLUGIN_LOADED, PLUGIN_UNLOADED, PLUGIN_UPDATE_AVAILABLE,
    WILDCARD,
};
pub use info::{Permission, PluginConfig, PluginDependency, PluginInfo};
pub use instance::{PluginInstance, PluginStats, PluginStatus};
pub use loader::{
    ModuleLoader, NativeModuleLoader, PluginFactory, PluginLoader, StaticModuleLoader,
    ABI_SYMBOL, BUILTIN_PREFIX, CREATE_SYMBOL, PLUGIN_ABI_VERSION,
};
pub use manager::{PluginManager, PluginManagerConfig, HOST_VERSION};
pub use manifest::{sha256_hex, ManifestFile, ManifestFileType, PluginManifest, MANIFEST_SUFFIX};
pub use marketplace::{MarketplaceClient, SearchRequest, SearchResponse, UpdateInfo};
pub use sandbox::{SandboxPolicy, SandboxedPlugin};
pub use security::{file_checksum, SecurityManager};
pub use service::PluginService;
pub use testing::{
    capability_case, PluginTestFramework, CASE_BENCHMARK, CASE_INFO, CASE_INITIALIZE,
    CASE_SECURITY, CASE_SHUTDOWN,
};
pub use traits::{
    Capability, Plugin, PluginContext, ATTR_SANDBOX_ALLOWED_HOSTS, ATTR_SANDBOX_ENABLED,
    ATTR_SANDBOX_TEMP_DIR,
};
pub use types::{
    ConvertedOutput, CoverageSummary, FindingKind, GenerateOptions, GeneratedFiles, ParsedApi,
    PerformanceSummary, Severity, TestCase, TestResult, TestStatus, UiComponentDefinition,
    ValidationFinding, ValidationResult, ValidationRule,
};
