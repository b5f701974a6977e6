//! Plugin Discovery - 설치 디렉토리에서 매니페스트 발견
//!
//! 플러그인 디렉토리를 재귀적으로 탐색하며 `*.manifest.json` 파일을 찾습니다.

use super::loader::BUILTIN_PREFIX;
use super::manifest::{PluginManifest, MANIFEST_SUFFIX};
use plugrt_foundation::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// 매니페스트 메타데이터에서 내장 모듈을 가리키는 키
pub const MODULE_METADATA_KEY: &str = "module";

// ============================================================================
// DiscoveredPlugin - 발견된 플러그인
// ============================================================================

/// 발견된 플러그인
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub manifest: PluginManifest,

    /// 매니페스트 파일 경로
    pub manifest_path: PathBuf,
}

impl DiscoveredPlugin {
    /// 설치 디렉토리
    pub fn base_dir(&self) -> PathBuf {
        self.manifest.base_dir(&self.manifest_path).to_path_buf()
    }

    /// 로드할 모듈 경로
    ///
    /// 현재 플랫폼/아키텍처용 바이너리가 우선이며, 없으면
    /// `metadata.module`의 `builtin:<name>` 값을 사용합니다.
    pub fn module_path(&self) -> Option<String> {
        if let Some(artifact) = self.manifest.current_artifact() {
            return Some(self.base_dir().join(&artifact.path).to_string_lossy().to_string());
        }

        self.manifest
            .info
            .metadata
            .get(MODULE_METADATA_KEY)
            .and_then(Value::as_str)
            .filter(|module| module.starts_with(BUILTIN_PREFIX))
            .map(String::from)
    }
}

// ============================================================================
// PluginDiscovery
// ============================================================================

/// 플러그인 발견
pub struct PluginDiscovery {
    root: PathBuf,
}

impl PluginDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 모든 매니페스트 발견 (파싱 실패는 경고 후 건너뜀)
    pub async fn discover(&self) -> Vec<DiscoveredPlugin> {
        if !self.root.exists() {
            debug!("Plugin directory {:?} does not exist", self.root);
            return Vec::new();
        }

        let paths = match self.scan(&self.root).await {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Failed to scan plugin directory {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        let mut plugins = Vec::new();
        for manifest_path in paths {
            match Self::parse_manifest(&manifest_path).await {
                Ok(manifest) => {
                    debug!("Found plugin: {} at {:?}", manifest.info.id, manifest_path);
                    plugins.push(DiscoveredPlugin {
                        manifest,
                        manifest_path,
                    });
                }
                Err(e) => {
                    warn!("Failed to parse plugin manifest {:?}: {}", manifest_path, e);
                }
            }
        }

        info!("Discovered {} plugins in {:?}", plugins.len(), self.root);
        plugins
    }

    /// 디렉토리 재귀 탐색
    async fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot read directory {:?}: {}", current, e);
                    continue;
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.ends_with(MANIFEST_SUFFIX))
                {
                    found.push(path);
                }
            }
        }

        found.sort();
        Ok(found)
    }

    async fn parse_manifest(path: &Path) -> Result<PluginManifest> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
