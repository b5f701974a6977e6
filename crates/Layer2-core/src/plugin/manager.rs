//! Plugin Manager - 플러그인 라이프사이클 관리 및 기능 디스패치
//!
//! 상태 전이:
//! `Unloaded -> Loading -> Loaded -> Active <-> Disabled -> Unloading -> (제거)`
//! 초기화 실패 시 `Error` (인스턴스는 남아있고 EnablePlugin으로 재시도 가능).
//!
//! 변경 작업은 전이 동안 단일 쓰기 락을 잡습니다. 기능 호출은 플러그인 핸들을
//! 복사한 뒤 락 밖에서 실행하므로 오래 걸리는 호출이 다른 작업을 막지 않습니다.

use super::capability::EventListener;
use super::discovery::{DiscoveredPlugin, PluginDiscovery};
use super::events::{
    event_handler, EventBus, EventHandler, HandlerId, PluginEvent, PLUGIN_CONFIGURED,
    PLUGIN_ERROR, PLUGIN_LOADED, PLUGIN_UNLOADED, PLUGIN_UPDATE_AVAILABLE,
};
use super::instance::{PluginInstance, PluginStatus};
use super::loader::{PluginLoader, BUILTIN_PREFIX};
use super::manifest::PluginManifest;
use super::marketplace::{MarketplaceClient, UpdateInfo};
use super::sandbox::SandboxPolicy;
use super::security::SecurityManager;
use super::traits::{Capability, Plugin, PluginContext};
use super::types::{
    ConvertedOutput, GenerateOptions, GeneratedFiles, ParsedApi, TestResult, ValidationResult,
};
use plugrt_foundation::{Error, Result, RuntimeConfig};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 호스트 버전 (minHostVersion/maxHostVersion 비교 기준)
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PluginManagerConfig
// ============================================================================

/// 플러그인 매니저 설정
#[derive(Debug, Clone)]
pub struct PluginManagerConfig {
    /// 플러그인 검색 경로
    pub plugin_dir: PathBuf,

    /// 최대 플러그인 수
    pub max_plugins: usize,

    /// Initialize 시 자동 로드
    pub auto_load: bool,

    /// 필수 의존성 누락 시 로드 실패
    pub strict_dependencies: bool,

    /// 샌드박스 래퍼 적용 여부
    pub sandbox: bool,

    pub sandbox_policy: SandboxPolicy,

    /// 호스트 버전
    pub host_version: String,

    /// 백그라운드 업데이트 확인 주기 (None이면 비활성)
    pub update_check_interval: Option<Duration>,
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        Self::from_runtime(&RuntimeConfig::default())
    }
}

impl PluginManagerConfig {
    /// 런타임 설정에서 생성
    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        let marketplace = &config.marketplace;
        Self {
            plugin_dir: config.plugins.plugin_dir.clone(),
            max_plugins: config.plugins.max_plugins,
            auto_load: config.plugins.auto_load,
            strict_dependencies: config.plugins.strict_dependencies,
            sandbox: config.plugins.sandbox,
            sandbox_policy: SandboxPolicy::from_settings(&config.sandbox),
            host_version: HOST_VERSION.to_string(),
            update_check_interval: marketplace
                .auto_update_check
                .then(|| Duration::from_secs(marketplace.update_check_interval_secs.max(1))),
        }
    }

    pub fn with_max_plugins(mut self, max: usize) -> Self {
        self.max_plugins = max;
        self
    }

    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = dir.into();
        self
    }

    pub fn with_sandbox(mut self, policy: SandboxPolicy) -> Self {
        self.sandbox = true;
        self.sandbox_policy = policy;
        self
    }

    pub fn with_strict_dependencies(mut self, strict: bool) -> Self {
        self.strict_dependencies = strict;
        self
    }

    pub fn with_host_version(mut self, version: impl Into<String>) -> Self {
        self.host_version = version.into();
        self
    }

    pub fn with_update_check_interval(mut self, interval: Duration) -> Self {
        self.update_check_interval = Some(interval);
        self
    }
}

// ============================================================================
// ManagerState - 락으로 보호되는 공유 상태
// ============================================================================

#[derive(Default)]
struct ManagerState {
    /// id -> 인스턴스
    instances: HashMap<String, PluginInstance>,

    /// 기능 -> Active 플러그인 id (삽입 순서, 미들웨어는 우선순위 순)
    index: HashMap<Capability, Vec<String>>,

    /// 플러그인 id -> (이벤트 타입, 핸들러 id)
    subscriptions: HashMap<String, Vec<(String, HandlerId)>>,
}

impl ManagerState {
    fn instance_mut(&mut self, id: &str) -> Result<&mut PluginInstance> {
        self.instances
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("plugin {}", id)))
    }

    fn index_insert(&mut self, capability: Capability, id: &str) {
        let ManagerState {
            instances, index, ..
        } = self;
        let list = index.entry(capability).or_default();
        if !list.iter().any(|existing| existing == id) {
            list.push(id.to_string());
        }

        if capability == Capability::Middleware {
            // stable sort: 같은 우선순위는 삽입 순서 유지
            list.sort_by_key(|id| {
                instances
                    .get(id)
                    .and_then(|i| i.plugin.as_middleware().map(|m| m.priority()))
                    .unwrap_or(0)
            });
        }
    }

    fn index_remove(&mut self, id: &str) {
        for list in self.index.values_mut() {
            list.retain(|existing| existing != id);
        }
        self.index.retain(|_, list| !list.is_empty());
    }
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저
pub struct PluginManager {
    state: Arc<RwLock<ManagerState>>,

    loader: Arc<PluginLoader>,

    security: Arc<SecurityManager>,

    event_bus: Arc<EventBus>,

    marketplace: Option<Arc<MarketplaceClient>>,

    config: PluginManagerConfig,

    /// 매니저 수명 토큰 (Shutdown 시 취소)
    lifetime: CancellationToken,

    update_task: parking_lot::Mutex<Option<JoinHandle<()>>>,

    available_updates: Arc<parking_lot::RwLock<HashMap<String, UpdateInfo>>>,
}

impl PluginManager {
    /// 새 매니저 생성 (네이티브 로더, 기본 보안 정책)
    pub fn new(config: PluginManagerConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(ManagerState::default())),
            loader: Arc::new(PluginLoader::new()),
            security: Arc::new(SecurityManager::default()),
            event_bus: Arc::new(EventBus::new()),
            marketplace: None,
            config,
            lifetime: CancellationToken::new(),
            update_task: parking_lot::Mutex::new(None),
            available_updates: Arc::new(parking_lot::RwLock::new(HashMap::new())),
        }
    }

    /// 런타임 설정에서 생성 (보안 정책 + 마켓플레이스 + 내장 플러그인 로더)
    pub fn from_runtime_config(config: &RuntimeConfig) -> Result<Self> {
        let security = SecurityManager::from_settings(&config.security)?;
        let marketplace = MarketplaceClient::new(&config.marketplace)?;
        let loader = PluginLoader::new().with_backend(Arc::new(super::builtin::builtin_loader()));

        Ok(Self::new(PluginManagerConfig::from_runtime(config))
            .with_loader(loader)
            .with_security(security)
            .with_marketplace(Arc::new(marketplace)))
    }

    pub fn with_loader(mut self, loader: PluginLoader) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    pub fn with_security(mut self, security: SecurityManager) -> Self {
        self.security = Arc::new(security);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_marketplace(mut self, marketplace: Arc<MarketplaceClient>) -> Self {
        self.marketplace = Some(marketplace);
        self
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    pub fn config(&self) -> &PluginManagerConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn security(&self) -> &Arc<SecurityManager> {
        &self.security
    }

    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    pub fn marketplace(&self) -> Option<&Arc<MarketplaceClient>> {
        self.marketplace.as_ref()
    }

    /// 호출 컨텍스트 (수명 토큰의 자식)
    pub fn context(&self) -> PluginContext {
        PluginContext::with_cancellation(self.lifetime.child_token())
    }

    /// 이벤트 구독
    pub fn subscribe(&self, event_type: impl Into<String>, handler: EventHandler) -> HandlerId {
        self.event_bus.subscribe(event_type, handler)
    }

    fn emit(&self, event: PluginEvent) {
        self.event_bus.emit(&self.context(), event);
    }

    // ========================================================================
    // Initialize / Shutdown
    // ========================================================================

    /// 플러그인 디렉토리 탐색 후 자동 로드, 업데이트 확인 시작
    ///
    /// 개별 플러그인 실패는 로그만 남기고 건너뜁니다. 로드된 수를 반환합니다.
    pub async fn initialize(&self) -> Result<usize> {
        let mut loaded = 0;

        if self.config.auto_load {
            let discovered = PluginDiscovery::new(&self.config.plugin_dir).discover().await;
            for found in discovered {
                let id = found.manifest.info.id.clone();
                match self.load_discovered(found).await {
                    Ok(_) => loaded += 1,
                    Err(e) => warn!("Skipping plugin {}: {}", id, e),
                }
            }
        }

        self.start_update_checker();
        info!("Plugin manager initialized ({} plugins loaded)", loaded);
        Ok(loaded)
    }

    /// 모든 플러그인 언로드 후 백그라운드 작업 종료
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down plugin manager");

        let ids: Vec<String> = self.state.read().await.instances.keys().cloned().collect();
        let mut first_error = None;
        for id in ids {
            if let Err(e) = self.unload_plugin(&id).await {
                error!("Failed to unload plugin {} during shutdown: {}", id, e);
                first_error.get_or_insert(e);
            }
        }

        self.lifetime.cancel();
        let task = self.update_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Update checker ended abnormally: {}", e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================================================================
    // 로드 / 언로드
    // ========================================================================

    /// 모듈 경로에서 플러그인 로드 후 활성화
    ///
    /// 모듈 옆에 `<stem>.manifest.json`이 있으면 먼저 검증합니다.
    /// 로드 단계 실패 시 인스턴스가 남지 않습니다. 활성화 실패 시 인스턴스는
    /// `Error` 상태로 남고 에러를 반환합니다.
    pub async fn load_plugin(&self, path: &str) -> Result<String> {
        let manifest = self.sibling_manifest(path)?;
        self.load_verified(path, manifest).await
    }

    /// 매니페스트 파일 기준으로 로드 (검증 -> 현재 플랫폼 모듈 선택 -> 로드)
    pub async fn load_from_manifest(&self, manifest_path: &Path) -> Result<String> {
        let manifest = PluginManifest::load(manifest_path)?;
        self.load_discovered(DiscoveredPlugin {
            manifest,
            manifest_path: manifest_path.to_path_buf(),
        })
        .await
    }

    async fn load_discovered(&self, found: DiscoveredPlugin) -> Result<String> {
        let base_dir = found.base_dir();
        self.security.validate_manifest(&found.manifest, &base_dir)?;

        let module = found.module_path().ok_or_else(|| {
            Error::PluginLoad(format!(
                "plugin {} has no artifact for {}/{}",
                found.manifest.info.id,
                std::env::consts::OS,
                std::env::consts::ARCH
            ))
        })?;

        let mut manifest = found.manifest;
        manifest.verified = true;
        self.load_verified(&module, Some(manifest)).await
    }

    async fn load_verified(&self, path: &str, manifest: Option<PluginManifest>) -> Result<String> {
        info!("Loading plugin from {}", path);

        // 디스크 접근은 락 밖에서
        let plugin =
            self.loader
                .load_with_wrapper(path, self.config.sandbox, &self.config.sandbox_policy)?;
        let info = plugin.info();

        if let Some(manifest) = &manifest {
            if manifest.info.id != info.id {
                return Err(Error::Validation(format!(
                    "manifest id {} does not match plugin id {}",
                    manifest.info.id, info.id
                )));
            }
        }

        let mut state = self.state.write().await;

        if state.instances.contains_key(&info.id) {
            return Err(Error::AlreadyLoaded(info.id));
        }
        if state.instances.len() >= self.config.max_plugins {
            return Err(Error::CapacityExceeded {
                max: self.config.max_plugins,
            });
        }
        self.validate_shape(plugin.as_ref(), &state)?;

        let id = info.id.clone();
        let instance = PluginInstance::new(plugin, path).with_manifest(manifest);
        state.instances.insert(id.clone(), instance);
        debug!("Plugin {} registered as loaded", id);

        self.activate(&mut state, &id).await?;
        info!("Loaded plugin: {} (v{})", id, info.version);
        Ok(id)
    }

    /// 플러그인 언로드 (모든 상태에서 가능)
    ///
    /// 종료 에러는 제거 이후에 반환됩니다.
    pub async fn unload_plugin(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;

        let was_active = state.instance_mut(id)?.is_active();
        if was_active {
            self.deactivate(&mut state, id);
        }

        let plugin = {
            let instance = state.instance_mut(id)?;
            instance.status = PluginStatus::Unloading;
            instance.plugin.clone()
        };
        let shutdown = plugin.shutdown(&self.context()).await;

        state.index_remove(id);
        state.instances.remove(id);
        drop(state);

        if !was_active {
            self.emit(PluginEvent::lifecycle(PLUGIN_UNLOADED, id));
        }
        info!("Unloaded plugin: {}", id);

        shutdown.map_err(|e| {
            warn!("Plugin {} shutdown failed: {}", id, e);
            Error::shutdown(id, e.to_string())
        })
    }

    /// Disabled/Error 상태에서 재활성화
    pub async fn enable_plugin(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let status = state.instance_mut(id)?.status;
        if !status.can_enable() {
            return Err(Error::InvalidState(format!(
                "cannot enable plugin {} in state {}",
                id, status
            )));
        }
        self.activate(&mut state, id).await
    }

    /// Active 상태에서 비활성화 (Shutdown은 호출하지 않음)
    pub async fn disable_plugin(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let status = state.instance_mut(id)?.status;
        if !status.can_disable() {
            return Err(Error::InvalidState(format!(
                "cannot disable plugin {} in state {}",
                id, status
            )));
        }
        self.deactivate(&mut state, id);
        Ok(())
    }

    /// 설정 변경 (검증 -> 재초기화 -> 실패 시 이전 설정으로 롤백)
    ///
    /// Active가 아닌 인스턴스는 검증 후 저장만 하고 다음 활성화 때 적용됩니다.
    pub async fn configure_plugin(&self, id: &str, raw_config: &str) -> Result<()> {
        let new_config: Value = serde_json::from_str(raw_config)
            .map_err(|e| Error::Config(format!("invalid config for {}: {}", id, e)))?;

        let mut state = self.state.write().await;
        let instance = state.instance_mut(id)?;

        if let Some(declared) = &instance.info.config {
            declared.validate(&new_config)?;
        }

        if !instance.is_active() {
            instance.config = Some(new_config);
            debug!("Stored config for inactive plugin {}", id);
            drop(state);
            self.emit(PluginEvent::lifecycle(PLUGIN_CONFIGURED, id));
            return Ok(());
        }

        let plugin = instance.plugin.clone();
        let previous = instance.config.clone();
        let ctx = self.context();

        match plugin.initialize(&ctx, Some(&new_config)).await {
            Ok(()) => {
                instance.config = Some(new_config);
                drop(state);
                info!("Reconfigured plugin {}", id);
                self.emit(PluginEvent::lifecycle(PLUGIN_CONFIGURED, id));
                Ok(())
            }
            Err(e) => {
                warn!("Reconfiguring {} failed, rolling back: {}", id, e);
                if let Err(rollback) = plugin.initialize(&ctx, previous.as_ref()).await {
                    error!("Rollback of {} failed: {}", id, rollback);
                    instance.last_error = Some(rollback.to_string());
                }
                Err(Error::Config(format!(
                    "re-initialization of {} failed, previous config kept: {}",
                    id, e
                )))
            }
        }
    }

    // ========================================================================
    // 상태 전이 (쓰기 락 보유 중 호출)
    // ========================================================================

    async fn activate(&self, state: &mut ManagerState, id: &str) -> Result<()> {
        let ctx = self.context();
        let (plugin, config) = {
            let instance = state.instance_mut(id)?;
            (instance.plugin.clone(), instance.config.clone())
        };

        if let Err(e) = plugin.initialize(&ctx, config.as_ref()).await {
            let message = e.to_string();
            warn!("Plugin {} failed to initialize: {}", id, message);
            state.instance_mut(id)?.mark_error(message.clone());
            self.event_bus.emit(
                &ctx,
                PluginEvent::lifecycle(PLUGIN_ERROR, id).with_data("error", Value::from(message.clone())),
            );
            return Err(Error::activation(id, message));
        }

        let mut declared = plugin.capabilities();
        declared.sort();
        declared.dedup();

        for capability in declared {
            if capability.is_satisfied_by(plugin.as_ref()) {
                state.index_insert(capability, id);
            } else {
                debug!(
                    "Plugin {} declares {} but does not implement it; skipping",
                    id, capability
                );
                continue;
            }

            if capability == Capability::EventListener {
                if let Some(listener) = plugin.as_event_listener() {
                    let handles = self.subscribe_listener(id, &plugin, listener);
                    state.subscriptions.insert(id.to_string(), handles);
                }
            }
        }

        {
            let instance = state.instance_mut(id)?;
            instance.status = PluginStatus::Active;
            instance.last_error = None;
        }

        self.event_bus
            .emit(&ctx, PluginEvent::lifecycle(PLUGIN_LOADED, id));
        debug!("Plugin {} activated", id);
        Ok(())
    }

    fn deactivate(&self, state: &mut ManagerState, id: &str) {
        state.index_remove(id);
        if let Some(handles) = state.subscriptions.remove(id) {
            for (event_type, handle) in handles {
                self.event_bus.unsubscribe(&event_type, handle);
            }
        }
        if let Some(instance) = state.instances.get_mut(id) {
            instance.status = PluginStatus::Disabled;
        }

        self.emit(PluginEvent::lifecycle(PLUGIN_UNLOADED, id));
        debug!("Plugin {} deactivated", id);
    }

    fn subscribe_listener(
        &self,
        id: &str,
        plugin: &Arc<dyn Plugin>,
        listener: &dyn EventListener,
    ) -> Vec<(String, HandlerId)> {
        listener
            .event_types()
            .into_iter()
            .map(|event_type| {
                let plugin = plugin.clone();
                let plugin_id = id.to_string();
                let handler = event_handler(move |ctx, event| {
                    let plugin = plugin.clone();
                    let plugin_id = plugin_id.clone();
                    async move {
                        if !event.is_for(&plugin_id) {
                            return Ok(());
                        }
                        match plugin.as_event_listener() {
                            Some(listener) => listener.handle_event(&ctx, &event).await,
                            None => Ok(()),
                        }
                    }
                });
                let handle = self.event_bus.subscribe(event_type.clone(), handler);
                (event_type, handle)
            })
            .collect()
    }

    // ========================================================================
    // 검증
    // ========================================================================

    /// 플러그인 형태 검증 (id/name/version, 권한, 기능, 호스트 버전, 의존성)
    fn validate_shape(&self, plugin: &dyn Plugin, state: &ManagerState) -> Result<()> {
        let info = plugin.info();
        info.validate_identity()?;
        self.security.validate_permissions(&info.permissions)?;

        if plugin.capabilities().is_empty() {
            return Err(Error::Validation(format!(
                "plugin {} declares no capabilities",
                info.id
            )));
        }

        if !info.is_compatible_with_host(&self.config.host_version)? {
            return Err(Error::Validation(format!(
                "plugin {} is not compatible with host version {}",
                info.id, self.config.host_version
            )));
        }

        for dep in info.dependencies.iter().filter(|d| !d.optional) {
            let satisfied = state
                .instances
                .get(&dep.id)
                .map_or(false, |loaded| dep.is_satisfied_by(&loaded.info.version));
            if satisfied {
                continue;
            }
            if self.config.strict_dependencies {
                return Err(Error::Validation(format!(
                    "plugin {} requires {} {}",
                    info.id, dep.id, dep.version
                )));
            }
            warn!(
                "Plugin {} missing dependency {} {}; continuing",
                info.id, dep.id, dep.version
            );
        }

        Ok(())
    }

    /// 모듈 옆의 매니페스트 검증 (없으면 None)
    fn sibling_manifest(&self, path: &str) -> Result<Option<PluginManifest>> {
        if path.starts_with(BUILTIN_PREFIX) {
            return Ok(None);
        }
        let Some(manifest_path) = PluginManifest::sibling_of(Path::new(path)) else {
            return Ok(None);
        };
        if !manifest_path.exists() {
            return Ok(None);
        }

        let mut manifest = PluginManifest::load(&manifest_path)?;
        let base_dir = manifest.base_dir(&manifest_path).to_path_buf();
        self.security.validate_manifest(&manifest, &base_dir)?;
        manifest.verified = true;
        Ok(Some(manifest))
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub async fn get_plugin(&self, id: &str) -> Option<PluginInstance> {
        self.state.read().await.instances.get(id).cloned()
    }

    pub async fn get_plugins(&self) -> HashMap<String, PluginInstance> {
        self.state.read().await.instances.clone()
    }

    /// id 순으로 정렬된 목록
    pub async fn list_plugins(&self) -> Vec<PluginInstance> {
        let mut plugins: Vec<PluginInstance> =
            self.state.read().await.instances.values().cloned().collect();
        plugins.sort_by(|a, b| a.info.id.cmp(&b.info.id));
        plugins
    }

    /// 기능별 Active 플러그인 (미들웨어는 우선순위 오름차순)
    pub async fn get_plugins_by_capability(&self, capability: Capability) -> Vec<PluginInstance> {
        let state = self.state.read().await;
        state
            .index
            .get(&capability)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.instances.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 백그라운드 확인으로 발견된 업데이트
    pub fn available_updates(&self) -> HashMap<String, UpdateInfo> {
        self.available_updates.read().clone()
    }

    // ========================================================================
    // 기능 디스패치
    // ========================================================================

    /// Active + 기능 구현 확인 후 핸들 복사 (읽기 락은 여기서 해제)
    async fn resolve(&self, id: &str, capability: Capability) -> Result<Arc<dyn Plugin>> {
        let state = self.state.read().await;
        let instance = state
            .instances
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("plugin {}", id)))?;
        if !instance.is_active() {
            return Err(Error::InvalidState(format!(
                "plugin {} is {}",
                id, instance.status
            )));
        }
        if !capability.is_satisfied_by(instance.plugin.as_ref()) {
            return Err(capability.mismatch(id));
        }
        Ok(instance.plugin.clone())
    }

    async fn record_call(&self, id: &str, started: Instant, success: bool) {
        if let Some(instance) = self.state.write().await.instances.get_mut(id) {
            instance.stats.record_call(started.elapsed(), success);
        }
    }

    pub async fn execute_template_processor(
        &self,
        id: &str,
        template: &str,
        data: &HashMap<String, Value>,
    ) -> Result<String> {
        let plugin = self.resolve(id, Capability::TemplateProcessor).await?;
        let started = Instant::now();
        let result = match plugin.as_template_processor() {
            Some(processor) => processor.process_template(&self.context(), template, data).await,
            None => Err(Capability::TemplateProcessor.mismatch(id)),
        };
        self.record_call(id, started, result.is_ok()).await;
        result
    }

    pub async fn execute_validator(&self, id: &str, api: &ParsedApi) -> Result<ValidationResult> {
        let plugin = self.resolve(id, Capability::Validator).await?;
        let started = Instant::now();
        let result = match plugin.as_validator() {
            Some(validator) => validator.validate(&self.context(), api).await,
            None => Err(Capability::Validator.mismatch(id)),
        };
        self.record_call(id, started, result.is_ok()).await;
        result
    }

    pub async fn execute_output_converter(
        &self,
        id: &str,
        files: &GeneratedFiles,
        format: &str,
    ) -> Result<ConvertedOutput> {
        let plugin = self.resolve(id, Capability::OutputConverter).await?;
        let started = Instant::now();
        let result = match plugin.as_output_converter() {
            Some(converter) => converter.convert(&self.context(), files, format).await,
            None => Err(Capability::OutputConverter.mismatch(id)),
        };
        self.record_call(id, started, result.is_ok()).await;
        result
    }

    pub async fn execute_integration(&self, id: &str, action: &str, params: &Value) -> Result<Value> {
        let plugin = self.resolve(id, Capability::Integration).await?;
        let started = Instant::now();
        let result = match plugin.as_integration() {
            Some(integration) => integration.execute(&self.context(), action, params).await,
            None => Err(Capability::Integration.mismatch(id)),
        };
        self.record_call(id, started, result.is_ok()).await;
        result
    }

    pub async fn execute_tests(&self, id: &str, api: &ParsedApi) -> Result<TestResult> {
        let plugin = self.resolve(id, Capability::Testing).await?;
        let started = Instant::now();
        let result = match plugin.as_testing() {
            Some(testing) => testing.run_tests(&self.context(), api).await,
            None => Err(Capability::Testing.mismatch(id)),
        };
        self.record_call(id, started, result.is_ok()).await;
        result
    }

    pub async fn execute_parser(&self, id: &str, input: &[u8], format: &str) -> Result<ParsedApi> {
        let plugin = self.resolve(id, Capability::Parser).await?;
        let started = Instant::now();
        let result = match plugin.as_parser() {
            Some(parser) => parser.parse(&self.context(), input, format).await,
            None => Err(Capability::Parser.mismatch(id)),
        };
        self.record_call(id, started, result.is_ok()).await;
        result
    }

    pub async fn execute_generator(
        &self,
        id: &str,
        api: &ParsedApi,
        options: &GenerateOptions,
    ) -> Result<GeneratedFiles> {
        let plugin = self.resolve(id, Capability::Generator).await?;
        let started = Instant::now();
        let result = match plugin.as_generator() {
            Some(generator) => generator.generate(&self.context(), api, options).await,
            None => Err(Capability::Generator.mismatch(id)),
        };
        self.record_call(id, started, result.is_ok()).await;
        result
    }

    pub async fn render_ui_component(&self, id: &str, props: &Value) -> Result<Value> {
        let plugin = self.resolve(id, Capability::UiComponent).await?;
        let started = Instant::now();
        let result = match plugin.as_ui_component() {
            Some(component) => component.render(&self.context(), props).await,
            None => Err(Capability::UiComponent.mismatch(id)),
        };
        self.record_call(id, started, result.is_ok()).await;
        result
    }

    /// 모든 Active 미들웨어를 우선순위 오름차순으로 통과
    pub async fn run_middleware_chain(&self, payload: Value) -> Result<Value> {
        let chain = self.get_plugins_by_capability(Capability::Middleware).await;
        let ctx = self.context();
        let mut payload = payload;

        for instance in chain {
            let Some(middleware) = instance.plugin.as_middleware() else {
                continue;
            };
            let started = Instant::now();
            let result = middleware.process(&ctx, payload).await;
            self.record_call(instance.id(), started, result.is_ok()).await;
            payload = result?;
        }

        Ok(payload)
    }

    // ========================================================================
    // 업데이트 확인
    // ========================================================================

    /// 로드된 플러그인의 업데이트 확인 (마켓플레이스 필요)
    pub async fn check_for_updates(&self) -> Result<HashMap<String, UpdateInfo>> {
        let marketplace = self
            .marketplace
            .as_ref()
            .ok_or_else(|| Error::Config("marketplace is not configured".into()))?;
        run_update_check(
            &self.state,
            marketplace,
            &self.event_bus,
            &self.available_updates,
            &self.context(),
        )
        .await
    }

    fn start_update_checker(&self) {
        let (Some(marketplace), Some(interval)) =
            (self.marketplace.clone(), self.config.update_check_interval)
        else {
            return;
        };

        let mut task = self.update_task.lock();
        if task.is_some() {
            return;
        }

        let token = self.lifetime.child_token();
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let updates = self.available_updates.clone();
        let ctx = PluginContext::with_cancellation(token.clone());

        info!("Starting update checker (every {:?})", interval);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Update checker stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = run_update_check(&state, &marketplace, &event_bus, &updates, &ctx).await {
                            warn!("Background update check failed: {}", e);
                        }
                    }
                }
            }
        }));
    }
}

/// 한 번의 업데이트 확인 (새로 발견된 업데이트마다 이벤트 발행)
async fn run_update_check(
    state: &RwLock<ManagerState>,
    marketplace: &MarketplaceClient,
    event_bus: &EventBus,
    store: &parking_lot::RwLock<HashMap<String, UpdateInfo>>,
    ctx: &PluginContext,
) -> Result<HashMap<String, UpdateInfo>> {
    let installed: Vec<_> = state
        .read()
        .await
        .instances
        .values()
        .map(|i| i.info.clone())
        .collect();

    let updates = marketplace.check_updates(&installed).await?;

    let previous = std::mem::replace(&mut *store.write(), updates.clone());
    for (id, update) in &updates {
        if previous.get(id).map(|p| &p.latest_version) == Some(&update.latest_version) {
            continue;
        }
        event_bus.emit(
            ctx,
            PluginEvent::lifecycle(PLUGIN_UPDATE_AVAILABLE, id)
                .with_data("currentVersion", Value::from(update.current_version.clone()))
                .with_data("latestVersion", Value::from(update.latest_version.clone())),
        );
    }

    Ok(updates)
}
