//! Plugin Loader - 모듈 아티팩트를 `Plugin` 값으로 변환
//!
//! 로더 백엔드는 `ModuleLoader` 트레이트 뒤에 둡니다.
//! - `NativeModuleLoader`: 동적 라이브러리 + 팩토리 심볼 (libloading)
//! - `StaticModuleLoader`: `builtin:<name>` 경로를 프로세스 내 팩토리로 해석

use super::sandbox::{SandboxPolicy, SandboxedPlugin};
use super::traits::{Capability, Plugin, PluginContext};
use super::capability::{
    EventListener, Generator, Integration, Middleware, OutputConverter, Parser, TemplateProcessor,
    TestingPlugin, UiComponent, Validator,
};
use super::info::PluginInfo;
use async_trait::async_trait;
use libloading::{Library, Symbol};
use parking_lot::RwLock;
use plugrt_foundation::{Error, Result};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// 팩토리 심볼 이름
pub const CREATE_SYMBOL: &[u8] = b"plugrt_create_plugin";

/// ABI 버전 심볼 이름
pub const ABI_SYMBOL: &[u8] = b"plugrt_abi_version";

/// 현재 플러그인 ABI 버전
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// 내장 플러그인 경로 접두사
pub const BUILTIN_PREFIX: &str = "builtin:";

type CreateFn = unsafe extern "C" fn() -> *mut Box<dyn Plugin>;
type AbiVersionFn = unsafe extern "C" fn() -> u32;

// ============================================================================
// ModuleLoader - 로더 백엔드
// ============================================================================

/// 로더 백엔드 트레이트
pub trait ModuleLoader: Send + Sync {
    /// 백엔드 이름
    fn name(&self) -> &str;

    /// 경로를 처리할 수 있는지
    fn can_load(&self, path: &str) -> bool;

    /// 모듈 로드
    fn load(&self, path: &str) -> Result<Arc<dyn Plugin>>;
}

// ============================================================================
// NativeModuleLoader
// ============================================================================

/// 동적 라이브러리 로더
///
/// 라이브러리는 `plugrt_abi_version`과 `plugrt_create_plugin` 심볼을 내보내야 합니다.
/// 플러그인 크레이트에서는 `declare_plugin!` 매크로를 사용합니다.
#[derive(Debug, Default)]
pub struct NativeModuleLoader;

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self
    }

    fn is_library(path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext, "so" | "dylib" | "dll"))
            .unwrap_or(false)
    }
}

impl ModuleLoader for NativeModuleLoader {
    fn name(&self) -> &str {
        "native"
    }

    fn can_load(&self, path: &str) -> bool {
        Self::is_library(path)
    }

    fn load(&self, path: &str) -> Result<Arc<dyn Plugin>> {
        if !Path::new(path).exists() {
            return Err(Error::PluginLoad(format!("artifact not found: {}", path)));
        }

        // SAFETY: 라이브러리 초기화 코드가 실행됩니다. 신뢰 여부는 SecurityManager가 판단합니다.
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::PluginLoad(format!("failed to open {}: {}", path, e)))?;

        let plugin = {
            // SAFETY: 심볼 시그니처는 declare_plugin! 매크로가 정의한 것과 같아야 합니다.
            let abi: Symbol<AbiVersionFn> = unsafe { library.get(ABI_SYMBOL) }.map_err(|e| {
                Error::PluginLoad(format!("{}: missing symbol plugrt_abi_version: {}", path, e))
            })?;
            let version = unsafe { abi() };
            if version != PLUGIN_ABI_VERSION {
                return Err(Error::PluginLoad(format!(
                    "{}: ABI version {} does not match host ABI {}",
                    path, version, PLUGIN_ABI_VERSION
                )));
            }

            let create: Symbol<CreateFn> = unsafe { library.get(CREATE_SYMBOL) }.map_err(|e| {
                Error::PluginLoad(format!("{}: missing symbol plugrt_create_plugin: {}", path, e))
            })?;
            let raw = unsafe { create() };
            if raw.is_null() {
                return Err(Error::PluginLoad(format!(
                    "{}: plugrt_create_plugin returned null",
                    path
                )));
            }
            // SAFETY: 팩토리가 Box::into_raw로 넘긴 포인터입니다.
            *unsafe { Box::from_raw(raw) }
        };

        debug!("Loaded native module {}", path);
        Ok(Arc::new(NativePlugin {
            plugin,
            _library: library,
        }))
    }
}

/// 라이브러리를 플러그인 수명 동안 유지하는 래퍼
///
/// 필드 선언 순서대로 drop되므로 플러그인이 먼저 해제됩니다.
struct NativePlugin {
    plugin: Box<dyn Plugin>,
    _library: Library,
}

#[async_trait]
impl Plugin for NativePlugin {
    fn info(&self) -> PluginInfo {
        self.plugin.info()
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.plugin.capabilities()
    }

    async fn initialize(&self, ctx: &PluginContext, config: Option<&Value>) -> Result<()> {
        self.plugin.initialize(ctx, config).await
    }

    async fn shutdown(&self, ctx: &PluginContext) -> Result<()> {
        self.plugin.shutdown(ctx).await
    }

    fn as_template_processor(&self) -> Option<&dyn TemplateProcessor> {
        self.plugin.as_template_processor()
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        self.plugin.as_validator()
    }

    fn as_output_converter(&self) -> Option<&dyn OutputConverter> {
        self.plugin.as_output_converter()
    }

    fn as_ui_component(&self) -> Option<&dyn UiComponent> {
        self.plugin.as_ui_component()
    }

    fn as_integration(&self) -> Option<&dyn Integration> {
        self.plugin.as_integration()
    }

    fn as_testing(&self) -> Option<&dyn TestingPlugin> {
        self.plugin.as_testing()
    }

    fn as_parser(&self) -> Option<&dyn Parser> {
        self.plugin.as_parser()
    }

    fn as_generator(&self) -> Option<&dyn Generator> {
        self.plugin.as_generator()
    }

    fn as_middleware(&self) -> Option<&dyn Middleware> {
        self.plugin.as_middleware()
    }

    fn as_event_listener(&self) -> Option<&dyn EventListener> {
        self.plugin.as_event_listener()
    }

    fn as_any(&self) -> &dyn Any {
        self.plugin.as_any()
    }
}

/// 플러그인 크레이트에서 팩토리/ABI 심볼을 내보냅니다.
///
/// ```ignore
/// plugrt_core::declare_plugin!(MyPlugin, MyPlugin::default);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($plugin_type:ty, $constructor:path) => {
        #[no_mangle]
        pub extern "C" fn plugrt_abi_version() -> u32 {
            $crate::plugin::PLUGIN_ABI_VERSION
        }

        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn plugrt_create_plugin(
        ) -> *mut ::std::boxed::Box<dyn $crate::plugin::Plugin> {
            let constructor: fn() -> $plugin_type = $constructor;
            let plugin: ::std::boxed::Box<dyn $crate::plugin::Plugin> =
                ::std::boxed::Box::new(constructor());
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(plugin))
        }
    };
}

// ============================================================================
// StaticModuleLoader
// ============================================================================

/// 내장 플러그인 팩토리
pub type PluginFactory = Arc<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;

/// `builtin:<name>` 경로 로더
#[derive(Default)]
pub struct StaticModuleLoader {
    factories: RwLock<HashMap<String, PluginFactory>>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 팩토리 등록
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registered builtin plugin factory: {}", name);
        self.factories.write().insert(name, Arc::new(factory));
    }

    /// 빌더 패턴 등록
    pub fn with<F>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// 등록된 이름 목록
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// 내장 경로 생성 (`builtin:<name>`)
    pub fn path_for(name: &str) -> String {
        format!("{}{}", BUILTIN_PREFIX, name)
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn name(&self) -> &str {
        "static"
    }

    fn can_load(&self, path: &str) -> bool {
        path.starts_with(BUILTIN_PREFIX)
    }

    fn load(&self, path: &str) -> Result<Arc<dyn Plugin>> {
        let name = path.strip_prefix(BUILTIN_PREFIX).unwrap_or(path);
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::PluginLoad(format!("unknown builtin plugin: {}", name)))?;
        Ok(factory())
    }
}

// ============================================================================
// PluginLoader - 백엔드 선택 + 샌드박스 래핑
// ============================================================================

/// 플러그인 로더
pub struct PluginLoader {
    backends: Vec<Arc<dyn ModuleLoader>>,
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginLoader {
    /// 네이티브 백엔드만 가진 로더
    pub fn new() -> Self {
        Self {
            backends: vec![Arc::new(NativeModuleLoader::new())],
        }
    }

    /// 백엔드 없이 생성
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// 백엔드 추가 (먼저 추가된 것이 우선)
    pub fn with_backend(mut self, backend: Arc<dyn ModuleLoader>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|b| b.name())
    }

    /// 경로에서 플러그인 로드
    pub fn load(&self, path: &str) -> Result<Arc<dyn Plugin>> {
        let backend = self
            .backends
            .iter()
            .find(|b| b.can_load(path))
            .ok_or_else(|| Error::PluginLoad(format!("no loader can handle {}", path)))?;

        let plugin = backend.load(path)?;
        info!("Loaded module {} via {} loader", path, backend.name());
        Ok(plugin)
    }

    /// 로드 후 선택적으로 샌드박스 래퍼 적용
    pub fn load_with_wrapper(
        &self,
        path: &str,
        sandbox: bool,
        policy: &SandboxPolicy,
    ) -> Result<Arc<dyn Plugin>> {
        let plugin = self.load(path)?;
        if sandbox {
            debug!("Wrapping {} in sandbox", path);
            Ok(Arc::new(SandboxedPlugin::new(plugin, policy.clone())))
        } else {
            Ok(plugin)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl Plugin for Dummy {
        fn info(&self) -> PluginInfo {
            PluginInfo::new("test.dummy", "Dummy", "1.0.0")
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Integration]
        }

        async fn initialize(&self, _ctx: &PluginContext, _config: Option<&Value>) -> Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn loader() -> PluginLoader {
        let builtins = StaticModuleLoader::new().with("dummy", || Arc::new(Dummy) as Arc<dyn Plugin>);
        PluginLoader::new().with_backend(Arc::new(builtins))
    }

    #[test]
    fn test_static_loader() {
        let plugin = loader().load("builtin:dummy").unwrap();
        assert_eq!(plugin.info().id, "test.dummy");
        assert!(plugin.as_any().downcast_ref::<Dummy>().is_some());
    }

    #[test]
    fn test_unknown_builtin() {
        let err = loader().load("builtin:missing").err().unwrap();
        assert!(matches!(err, Error::PluginLoad(_)));
    }

    #[test]
    fn test_missing_native_artifact() {
        let err = loader().load("/nonexistent/libplugin.so").err().unwrap();
        assert!(err.to_string().contains("artifact not found"));
    }

    #[test]
    fn test_no_backend_for_path() {
        let err = loader().load("plugin.wasm").err().unwrap();
        assert!(err.to_string().contains("no loader can handle"));
    }

    #[test]
    fn test_load_with_wrapper_keeps_downcast() {
        let policy = SandboxPolicy::default();
        let plugin = loader()
            .load_with_wrapper("builtin:dummy", true, &policy)
            .unwrap();
        assert!(plugin.as_any().downcast_ref::<Dummy>().is_some());
        assert_eq!(plugin.capabilities(), vec![Capability::Integration]);
    }
}
