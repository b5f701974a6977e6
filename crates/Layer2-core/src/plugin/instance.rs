//! Plugin Instance - 로드된 플러그인의 런타임 기록

use super::info::PluginInfo;
use super::manifest::PluginManifest;
use super::traits::Plugin;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// PluginStatus - 라이프사이클 상태
// ============================================================================

/// 플러그인 상태
///
/// `Unloaded -> Loading -> Loaded -> Active <-> Disabled -> Unloading -> (제거)`
/// 초기화 실패 시 `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    Unloaded,
    Loading,
    Loaded,
    Active,
    Disabled,
    Unloading,
    Error,
}

impl PluginStatus {
    /// EnablePlugin 가능 상태
    pub fn can_enable(&self) -> bool {
        matches!(self, Self::Disabled | Self::Error)
    }

    /// DisablePlugin 가능 상태
    pub fn can_disable(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unloaded => write!(f, "unloaded"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Active => write!(f, "active"),
            Self::Disabled => write!(f, "disabled"),
            Self::Unloading => write!(f, "unloading"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ============================================================================
// PluginStats - 사용 통계
// ============================================================================

/// 사용 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStats {
    pub call_count: u64,

    pub error_count: u64,

    /// 누적 소요 시간 (ms)
    pub total_duration_ms: f64,

    /// 평균 소요 시간 (ms)
    pub average_duration_ms: f64,

    pub last_used: Option<DateTime<Utc>>,

    /// 메모리 추정치 (바이트)
    pub memory_estimate: u64,
}

impl PluginStats {
    /// 호출 기록
    pub fn record_call(&mut self, elapsed: Duration, success: bool) {
        self.call_count += 1;
        if !success {
            self.error_count += 1;
        }
        self.total_duration_ms += elapsed.as_secs_f64() * 1000.0;
        self.average_duration_ms = self.total_duration_ms / self.call_count as f64;
        self.last_used = Some(Utc::now());
    }
}

// ============================================================================
// PluginInstance
// ============================================================================

/// 로드된 플러그인 인스턴스
///
/// 플러그인 id 하나당 최대 하나만 존재합니다.
#[derive(Clone)]
pub struct PluginInstance {
    /// 플러그인 핸들
    pub plugin: Arc<dyn Plugin>,

    /// 로드 시점의 정보 (불변)
    pub info: PluginInfo,

    pub status: PluginStatus,

    /// 마지막으로 성공한 설정
    pub config: Option<Value>,

    /// 모듈 경로
    pub path: String,

    pub loaded_at: DateTime<Utc>,

    pub last_error: Option<String>,

    pub stats: PluginStats,

    pub manifest: Option<PluginManifest>,
}

impl PluginInstance {
    pub fn new(plugin: Arc<dyn Plugin>, path: impl Into<String>) -> Self {
        let info = plugin.info();
        let config = info.config.as_ref().and_then(|c| c.default.clone());
        Self {
            plugin,
            info,
            status: PluginStatus::Loaded,
            config,
            path: path.into(),
            loaded_at: Utc::now(),
            last_error: None,
            stats: PluginStats::default(),
            manifest: None,
        }
    }

    pub fn with_manifest(mut self, manifest: Option<PluginManifest>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn is_active(&self) -> bool {
        self.status == PluginStatus::Active
    }

    /// 에러 상태로 전환
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = PluginStatus::Error;
        self.last_error = Some(message.into());
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.info.id)
            .field("version", &self.info.version)
            .field("status", &self.status)
            .field("path", &self.path)
            .field("last_error", &self.last_error)
            .finish()
    }
}
