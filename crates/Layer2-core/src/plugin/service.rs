//! Plugin Service - 셸(UI/CLI)용 얇은 파사드
//!
//! 매니저/마켓플레이스/테스트 프레임워크 호출을 API 형태(`PluginInstanceView` 등)로 변환합니다.

use super::api::PluginInstanceView;
use super::events::PluginEvent;
use super::manager::PluginManager;
use super::manifest::{ManifestFile, ManifestFileType, PluginManifest};
use super::marketplace::{Category, MarketplaceClient, MarketplacePlugin, SearchRequest, SearchResponse, UpdateInfo};
use super::testing::PluginTestFramework;
use super::traits::Capability;
use super::types::{ConvertedOutput, GeneratedFiles, ParsedApi, TestResult, ValidationResult};
use plugrt_foundation::{Error, Result, RuntimeConfig};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// 플러그인 서비스
pub struct PluginService {
    manager: Arc<PluginManager>,
    marketplace: Arc<MarketplaceClient>,
    test_framework: PluginTestFramework,
    plugin_dir: PathBuf,
}

impl PluginService {
    pub fn new(
        manager: Arc<PluginManager>,
        marketplace: Arc<MarketplaceClient>,
        test_framework: PluginTestFramework,
    ) -> Self {
        let plugin_dir = manager.config().plugin_dir.clone();
        Self {
            manager,
            marketplace,
            test_framework,
            plugin_dir,
        }
    }

    /// 런타임 설정에서 전체 구성
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let manager = PluginManager::from_runtime_config(config)?;
        let marketplace = match manager.marketplace() {
            Some(marketplace) => marketplace.clone(),
            None => Arc::new(MarketplaceClient::new(&config.marketplace)?),
        };
        let test_framework = PluginTestFramework::new(manager.loader().clone(), config.testing.clone())
            .with_security(manager.security().clone());

        Ok(Self::new(Arc::new(manager), marketplace, test_framework))
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    pub fn marketplace(&self) -> &Arc<MarketplaceClient> {
        &self.marketplace
    }

    pub async fn initialize(&self) -> Result<usize> {
        self.manager.initialize().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.manager.shutdown().await
    }

    // ========================================================================
    // 관리
    // ========================================================================

    pub async fn list_plugins(&self) -> Vec<PluginInstanceView> {
        self.manager
            .list_plugins()
            .await
            .iter()
            .map(PluginInstanceView::from)
            .collect()
    }

    pub async fn get_plugin(&self, id: &str) -> Result<PluginInstanceView> {
        self.manager
            .get_plugin(id)
            .await
            .map(|instance| PluginInstanceView::from(&instance))
            .ok_or_else(|| Error::NotFound(format!("plugin {}", id)))
    }

    pub async fn plugins_by_capability(&self, capability: Capability) -> Vec<PluginInstanceView> {
        self.manager
            .get_plugins_by_capability(capability)
            .await
            .iter()
            .map(PluginInstanceView::from)
            .collect()
    }

    pub async fn load_plugin(&self, path: &str) -> Result<PluginInstanceView> {
        let id = self.manager.load_plugin(path).await?;
        self.get_plugin(&id).await
    }

    pub async fn unload_plugin(&self, id: &str) -> Result<()> {
        self.manager.unload_plugin(id).await
    }

    pub async fn enable_plugin(&self, id: &str) -> Result<()> {
        self.manager.enable_plugin(id).await
    }

    pub async fn disable_plugin(&self, id: &str) -> Result<()> {
        self.manager.disable_plugin(id).await
    }

    pub async fn configure_plugin(&self, id: &str, config: &Value) -> Result<()> {
        self.manager.configure_plugin(id, &config.to_string()).await
    }

    // ========================================================================
    // 실행
    // ========================================================================

    pub async fn execute_template_processor(
        &self,
        id: &str,
        template: &str,
        data: &HashMap<String, Value>,
    ) -> Result<String> {
        self.manager.execute_template_processor(id, template, data).await
    }

    pub async fn execute_validator(&self, id: &str, api: &Value) -> Result<ValidationResult> {
        self.manager
            .execute_validator(id, &ParsedApi::new(api.clone()))
            .await
    }

    pub async fn execute_output_converter(
        &self,
        id: &str,
        files: &GeneratedFiles,
        format: &str,
    ) -> Result<ConvertedOutput> {
        self.manager.execute_output_converter(id, files, format).await
    }

    pub async fn execute_integration(&self, id: &str, action: &str, params: &Value) -> Result<Value> {
        self.manager.execute_integration(id, action, params).await
    }

    pub async fn execute_tests(&self, id: &str, api: &Value) -> Result<TestResult> {
        self.manager
            .execute_tests(id, &ParsedApi::new(api.clone()))
            .await
    }

    // ========================================================================
    // 마켓플레이스
    // ========================================================================

    pub async fn search_plugins(
        &self,
        query: &str,
        category: Option<&str>,
        tags: Vec<String>,
        limit: usize,
    ) -> Result<SearchResponse> {
        let mut request = SearchRequest::new(query).with_tags(tags).with_page(limit, 0);
        if let Some(category) = category {
            request = request.with_category(category);
        }
        self.marketplace.search(&request).await
    }

    pub async fn get_marketplace_plugin(&self, id: &str) -> Result<MarketplacePlugin> {
        self.marketplace.get_plugin(id).await
    }

    pub async fn get_featured_plugins(&self, limit: usize) -> Result<Vec<MarketplacePlugin>> {
        self.marketplace.get_featured(limit).await
    }

    pub async fn get_categories(&self) -> Result<Vec<Category>> {
        self.marketplace.get_categories().await
    }

    /// 다운로드 -> 매니페스트 작성 -> 로드
    ///
    /// `<pluginDir>/<id>/`에 아티팩트와 `<id>.manifest.json`을 기록합니다.
    pub async fn install_plugin(&self, id: &str) -> Result<PluginInstanceView> {
        let install_dir = self.plugin_dir.join(sanitize_id(id)?);
        let record = self.marketplace.get_plugin(id).await?;
        let file_name = artifact_file_name(&record);

        let artifact = install_dir.join(&file_name);
        let bytes = self.marketplace.download(id, &artifact).await?;
        info!("Installed {} ({} bytes) to {:?}", id, bytes, install_dir);

        let manifest_path = write_install_manifest(&record, &install_dir, &file_name)?;
        let loaded = self.manager.load_from_manifest(&manifest_path).await?;
        self.get_plugin(&loaded).await
    }

    pub async fn check_for_updates(&self) -> Result<HashMap<String, UpdateInfo>> {
        self.manager.check_for_updates().await
    }

    // ========================================================================
    // 이벤트 / 테스트
    // ========================================================================

    /// 이벤트 피드 구독
    pub fn subscribe_events(&self) -> broadcast::Receiver<PluginEvent> {
        self.manager.event_bus().stream()
    }

    /// 별도 인스턴스로 적합성 테스트 실행
    pub async fn test_plugin(&self, path: &str) -> Result<TestResult> {
        self.test_framework
            .test_plugin(&self.manager.context(), path)
            .await
    }
}

/// 디렉토리 이름으로 쓸 수 있는 id인지 확인
fn sanitize_id(id: &str) -> Result<&str> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(id)
    } else {
        Err(Error::InvalidInput(format!("invalid plugin id: {}", id)))
    }
}

/// 다운로드 URL의 마지막 경로 조각 (없으면 `<id>.bin`)
fn artifact_file_name(record: &MarketplacePlugin) -> String {
    record
        .download_url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(String::from)
        .unwrap_or_else(|| format!("{}.bin", record.id()))
}

fn write_install_manifest(record: &MarketplacePlugin, install_dir: &Path, file_name: &str) -> Result<PathBuf> {
    let is_library = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| matches!(ext, "so" | "dylib" | "dll"));

    let file = if is_library {
        ManifestFile::from_disk(install_dir, file_name, ManifestFileType::Binary)?
            .with_target(std::env::consts::OS, std::env::consts::ARCH)
    } else {
        ManifestFile::from_disk(install_dir, file_name, ManifestFileType::Asset)?
    };

    let manifest = PluginManifest::new(record.info.clone())
        .with_file(file)
        .with_install_path(install_dir);
    let path = install_dir.join(PluginManifest::file_name(record.id()));
    manifest.save(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::builtin::{builtin_loader, VALIDATOR_ID};
    use crate::plugin::events::PLUGIN_LOADED;
    use crate::plugin::loader::PluginLoader;
    use crate::plugin::manager::PluginManagerConfig;
    use crate::plugin::marketplace::test_support::{serve, Route};
    use crate::plugin::security::SecurityManager;
    use plugrt_foundation::TestingSettings;
    use serde_json::json;
    use tempfile::TempDir;

    fn service(base_url: &str, plugin_dir: &Path) -> PluginService {
        let loader = Arc::new(PluginLoader::new().with_backend(Arc::new(builtin_loader())));
        let marketplace = Arc::new(MarketplaceClient::with_base_url(base_url).unwrap());
        let manager = PluginManager::new(PluginManagerConfig::default().with_plugin_dir(plugin_dir))
            .with_loader(PluginLoader::new().with_backend(Arc::new(builtin_loader())))
            .with_security(SecurityManager::new())
            .with_marketplace(marketplace.clone());
        let framework = PluginTestFramework::new(loader, TestingSettings::default());
        PluginService::new(Arc::new(manager), marketplace, framework)
    }

    #[tokio::test]
    async fn test_install_plugin_writes_manifest_and_loads() {
        let record = json!({
            "id": VALIDATOR_ID,
            "name": "Example Validator",
            "version": "1.0.0",
            "metadata": { "module": "builtin:example.validator" },
            "downloadUrl": "/downloads/validator-rules.json"
        });
        let server = serve(vec![
            Route::json("GET", &format!("/api/v1/plugins/{}", VALIDATOR_ID), record.to_string()),
            Route::json("GET", "/downloads/validator-rules.json", r#"{"rules":[]}"#),
        ])
        .await;
        let temp = TempDir::new().unwrap();
        let service = service(&server.base_url, temp.path());
        let mut events = service.subscribe_events();

        let view = service.install_plugin(VALIDATOR_ID).await.unwrap();
        assert_eq!(view.info.id, VALIDATOR_ID);
        assert!(view.verified);

        let install_dir = temp.path().join(VALIDATOR_ID);
        assert!(install_dir.join("validator-rules.json").exists());
        let manifest =
            PluginManifest::load(&install_dir.join(PluginManifest::file_name(VALIDATOR_ID))).unwrap();
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].file_type, ManifestFileType::Asset);

        let event = events.recv().await.unwrap();
        assert_eq!(event.event_type, PLUGIN_LOADED);
        assert_eq!(event.plugin_id(), Some(VALIDATOR_ID));
    }

    #[tokio::test]
    async fn test_install_rejects_path_like_id() {
        let temp = TempDir::new().unwrap();
        let service = service("http://127.0.0.1:9", temp.path());
        let err = service.install_plugin("../escape").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_execute_validator_through_service() {
        let temp = TempDir::new().unwrap();
        let service = service("http://127.0.0.1:9", temp.path());
        service
            .load_plugin(&format!("builtin:{}", VALIDATOR_ID))
            .await
            .unwrap();

        let result = service
            .execute_validator(VALIDATOR_ID, &json!({"info": {"version": "1.0.0"}, "paths": {}}))
            .await
            .unwrap();
        assert!(result.valid);
        assert!(result.has_code("MISSING_TITLE"));

        assert_eq!(service.plugins_by_capability(Capability::Validator).await.len(), 1);
        assert!(matches!(
            service.get_plugin("missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_artifact_file_name() {
        let record = MarketplacePlugin::new(crate::plugin::info::PluginInfo::new("a.b", "A", "1.0.0"))
            .with_download_url("https://cdn.example.com/files/liba.so?token=1");
        assert_eq!(artifact_file_name(&record), "liba.so");

        let bare = MarketplacePlugin::new(crate::plugin::info::PluginInfo::new("a.b", "A", "1.0.0"))
            .with_download_url("https://cdn.example.com/");
        assert_eq!(artifact_file_name(&bare), "a.b.bin");
    }

    #[test]
    fn test_sanitize_id() {
        assert!(sanitize_id("example.validator").is_ok());
        assert!(sanitize_id("..").is_err());
        assert!(sanitize_id("a/b").is_err());
    }
}
