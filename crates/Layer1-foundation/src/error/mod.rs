//! Error types for plugrt
//!
//! 플러그인 런타임의 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// plugrt 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 로드 관련 (LoadPlugin 실패 - 부분 상태 없음)
    // ========================================================================
    #[error("Plugin load error: {0}")]
    PluginLoad(String),

    #[error("Plugin already loaded: {0}")]
    AlreadyLoaded(String),

    #[error("Plugin capacity exceeded: maximum {max} plugins")]
    CapacityExceeded { max: usize },

    // ========================================================================
    // 라이프사이클 관련
    // ========================================================================
    #[error("Plugin activation failed: {plugin} - {message}")]
    Activation { plugin: String, message: String },

    #[error("Invalid plugin state: {0}")]
    InvalidState(String),

    #[error("Plugin shutdown failed: {plugin} - {message}")]
    Shutdown { plugin: String, message: String },

    // ========================================================================
    // 디스패치 관련
    // ========================================================================
    #[error("plugin {plugin} is not a {capability}")]
    CapabilityMismatch { plugin: String, capability: String },

    #[error("Plugin error: {0}")]
    Plugin(String),

    // ========================================================================
    // 보안/권한 관련
    // ========================================================================
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 마켓플레이스 관련
    // ========================================================================
    #[error("Marketplace error: {0}")]
    Marketplace(String),

    #[error("HTTP error: {0}")]
    Http(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::Http(_) | Error::Marketplace(_)
        )
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::PermissionDenied(_)
                | Error::NotFound(_)
                | Error::InvalidInput(_)
                | Error::Validation(_)
                | Error::AlreadyLoaded(_)
                | Error::CapacityExceeded { .. }
                | Error::CapabilityMismatch { .. }
                | Error::InvalidState(_)
                | Error::Cancelled
        )
    }

    /// 활성화 에러 생성 헬퍼
    pub fn activation(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Activation {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// 종료 에러 생성 헬퍼
    pub fn shutdown(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Shutdown {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// 기능 불일치 에러 생성 헬퍼
    pub fn capability_mismatch(plugin: impl Into<String>, capability: impl Into<String>) -> Self {
        Error::CapabilityMismatch {
            plugin: plugin.into(),
            capability: capability.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
