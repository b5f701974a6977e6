//! Plugin API shapes - 셸(UI)과 주고받는 요청/응답 형태
//!
//! 런타임 핸들(`Arc<dyn Plugin>`)은 제외하고 직렬화 가능한 값만 노출합니다.

use super::info::{Permission, PluginConfig, PluginDependency, PluginInfo};
use super::instance::{PluginInstance, PluginStats, PluginStatus};
use super::traits::Capability;
use chrono::{DateTime, Utc};
use plugrt_foundation::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// PluginInfoApi
// ============================================================================

/// API용 플러그인 정보 (권한은 문자열, 태그는 정렬된 목록)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfoApi {
    pub id: String,
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub license: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_host_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_host_version: Option<String>,

    #[serde(default)]
    pub permissions: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,

    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PluginConfig>,
}

/// `PluginInfo` -> API 투영
pub fn to_plugin_info_api(info: &PluginInfo) -> PluginInfoApi {
    PluginInfoApi::from(info)
}

impl From<&PluginInfo> for PluginInfoApi {
    fn from(info: &PluginInfo) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            version: info.version.clone(),
            description: info.description.clone(),
            author: info.author.clone(),
            license: info.license.clone(),
            tags: info.tags.iter().cloned().collect(),
            min_host_version: info.min_host_version.clone(),
            max_host_version: info.max_host_version.clone(),
            permissions: info.permissions.iter().map(|p| p.to_string()).collect(),
            dependencies: info.dependencies.clone(),
            metadata: info.metadata.clone(),
            config: info.config.clone(),
        }
    }
}

impl PluginInfoApi {
    /// API 투영에서 `PluginInfo` 복원 (알 수 없는 권한은 에러)
    pub fn into_plugin_info(self) -> Result<PluginInfo> {
        let permissions: BTreeSet<Permission> = self
            .permissions
            .iter()
            .map(|p| p.parse::<Permission>())
            .collect::<Result<_>>()?;

        let mut info = PluginInfo::new(self.id, self.name, self.version)
            .with_description(self.description)
            .with_author(self.author)
            .with_license(self.license);
        info.tags = self.tags.into_iter().collect();
        info.min_host_version = self.min_host_version;
        info.max_host_version = self.max_host_version;
        info.permissions = permissions;
        info.dependencies = self.dependencies;
        info.metadata = self.metadata;
        info.config = self.config;
        Ok(info)
    }
}

// ============================================================================
// PluginInstanceView
// ============================================================================

/// API용 인스턴스 뷰
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInstanceView {
    pub info: PluginInfoApi,

    pub status: PluginStatus,

    /// 선언 + 구현이 일치하는 기능
    pub capabilities: Vec<Capability>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    pub path: String,

    pub loaded_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    pub stats: PluginStats,

    /// 매니페스트 검증 여부 (매니페스트 없으면 false)
    pub verified: bool,
}

impl From<&PluginInstance> for PluginInstanceView {
    fn from(instance: &PluginInstance) -> Self {
        let capabilities = instance
            .plugin
            .capabilities()
            .into_iter()
            .filter(|c| c.is_satisfied_by(instance.plugin.as_ref()))
            .collect();

        Self {
            info: PluginInfoApi::from(&instance.info),
            status: instance.status,
            capabilities,
            config: instance.config.clone(),
            path: instance.path.clone(),
            loaded_at: instance.loaded_at,
            last_error: instance.last_error.clone(),
            stats: instance.stats.clone(),
            verified: instance.manifest.as_ref().map_or(false, |m| m.verified),
        }
    }
}
