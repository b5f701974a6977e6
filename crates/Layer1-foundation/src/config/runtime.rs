//! Runtime Config - 플러그인 런타임 통합 설정
//!
//! 글로벌(`<config_dir>/plugrt/runtime.json`)과 프로젝트(`.plugrt/runtime.json`) 설정을
//! 병합해서 사용합니다. 프로젝트 설정이 우선합니다.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

/// 설정 파일명
pub const RUNTIME_CONFIG_FILE: &str = "runtime.json";

/// 마켓플레이스 URL 환경 변수
pub const ENV_MARKETPLACE_URL: &str = "PLUGRT_MARKETPLACE_URL";

/// 플러그인 디렉토리 환경 변수
pub const ENV_PLUGIN_DIR: &str = "PLUGRT_PLUGIN_DIR";

// ============================================================================
// RuntimeConfig (통합)
// ============================================================================

/// plugrt 런타임 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// 플러그인 매니저 설정
    pub plugins: PluginSettings,

    /// 샌드박스 설정
    pub sandbox: SandboxSettings,

    /// 보안 정책
    pub security: SecuritySettings,

    /// 마켓플레이스 클라이언트 설정
    pub marketplace: MarketplaceSettings,

    /// 테스트 프레임워크 설정
    pub testing: TestingSettings,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드 (환경 변수 오버라이드 포함)
    pub fn load() -> Result<Self> {
        let mut merged = Value::Object(Default::default());

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(value) = global.load_optional::<Value>(RUNTIME_CONFIG_FILE)? {
                debug!("Loaded global runtime config from {:?}", global.base_dir());
                merge_values(&mut merged, value);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(value) = project.load_optional::<Value>(RUNTIME_CONFIG_FILE)? {
                debug!("Loaded project runtime config from {:?}", project.base_dir());
                merge_values(&mut merged, value);
            }
        }

        let mut config: RuntimeConfig = serde_json::from_value(merged)
            .map_err(|e| crate::Error::Config(format!("Invalid runtime config: {}", e)))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// 특정 저장소에서만 로드
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        Ok(store
            .load_optional::<RuntimeConfig>(RUNTIME_CONFIG_FILE)?
            .unwrap_or_default())
    }

    /// 저장
    pub fn save_to(&self, store: &JsonStore) -> Result<()> {
        store.save(RUNTIME_CONFIG_FILE, self)
    }

    /// 환경 변수 적용
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_MARKETPLACE_URL) {
            if !url.trim().is_empty() {
                self.marketplace.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(dir) = std::env::var(ENV_PLUGIN_DIR) {
            if !dir.trim().is_empty() {
                self.plugins.plugin_dir = PathBuf::from(dir.trim());
            }
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugins.plugin_dir = dir.into();
        self
    }

    pub fn max_plugins(mut self, max: usize) -> Self {
        self.plugins.max_plugins = max;
        self
    }

    pub fn marketplace_url(mut self, url: impl Into<String>) -> Self {
        self.marketplace.base_url = url.into();
        self
    }
}

/// JSON 객체 깊은 병합 (overlay가 우선)
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ============================================================================
// Plugin Settings
// ============================================================================

/// 플러그인 매니저 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginSettings {
    /// 플러그인 설치 디렉토리 (*.manifest.json 검색 경로)
    pub plugin_dir: PathBuf,

    /// 동시에 로드 가능한 최대 플러그인 수
    pub max_plugins: usize,

    /// Initialize 시 발견된 플러그인 자동 로드
    pub auto_load: bool,

    /// 필수 의존성 누락 시 로드 실패 처리 (false면 경고만)
    pub strict_dependencies: bool,

    /// 로드 시 샌드박스 래퍼 적용
    pub sandbox: bool,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            plugin_dir: default_plugin_dir(),
            max_plugins: 50,
            auto_load: true,
            strict_dependencies: false,
            sandbox: false,
        }
    }
}

fn default_plugin_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".plugrt").join("plugins"))
        .unwrap_or_else(|| PathBuf::from("plugins"))
}

// ============================================================================
// Sandbox Settings
// ============================================================================

/// 샌드박스 설정 (권고용 메타데이터, 격리 강제 아님)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxSettings {
    /// 허용된 네트워크 호스트
    pub allowed_hosts: Vec<String>,

    /// 제한된 임시 디렉토리
    pub temp_dir: PathBuf,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            temp_dir: std::env::temp_dir().join("plugrt-sandbox"),
        }
    }
}

// ============================================================================
// Security Settings
// ============================================================================

/// 보안 정책 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecuritySettings {
    /// 허용된 권한 목록 (None이면 알려진 모든 권한 허용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_permissions: Option<Vec<String>>,

    /// 매니페스트 파일 체크섬 검증
    pub require_checksums: bool,

    /// 서명 필수 여부
    pub require_signature: bool,

    /// 신뢰하는 ed25519 공개키 (hex)
    pub trusted_keys: Vec<String>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            allowed_permissions: None,
            require_checksums: true,
            require_signature: false,
            trusted_keys: Vec::new(),
        }
    }
}

// ============================================================================
// Marketplace Settings
// ============================================================================

/// 마켓플레이스 클라이언트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketplaceSettings {
    /// 마켓플레이스 API 기본 URL
    pub base_url: String,

    /// HTTP 타임아웃 (초)
    pub timeout_secs: u64,

    /// API 키
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// 백그라운드 업데이트 확인
    pub auto_update_check: bool,

    /// 업데이트 확인 주기 (초)
    pub update_check_interval_secs: u64,

    /// 캐시 TTL (초, None이면 프로세스 수명 동안 유지)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://marketplace.plugrt.dev".to_string(),
            timeout_secs: 30,
            api_key: None,
            auto_update_check: false,
            update_check_interval_secs: 3600,
            cache_ttl_secs: None,
        }
    }
}

// ============================================================================
// Testing Settings
// ============================================================================

/// 테스트 프레임워크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestingSettings {
    /// 벤치마크 실행 여부
    pub benchmark: bool,

    /// 벤치마크 반복 횟수
    pub benchmark_iterations: usize,

    /// 평균 지연 임계값 (ms) - 초과 시 warning
    pub benchmark_threshold_ms: u64,
}

impl Default for TestingSettings {
    fn default() -> Self {
        Self {
            benchmark: false,
            benchmark_iterations: 10,
            benchmark_threshold_ms: 100,
        }
    }
}
