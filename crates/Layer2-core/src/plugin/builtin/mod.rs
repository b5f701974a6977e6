//! Builtin plugins - 프로세스 내장 예제 플러그인
//!
//! `builtin:<id>` 경로로 로드됩니다.

mod template_processor;
mod validator;

pub use template_processor::{ExampleTemplateProcessor, TEMPLATE_PROCESSOR_ID};
pub use validator::{ExampleValidator, MISSING_TITLE, VALIDATOR_ID};

use super::loader::StaticModuleLoader;
use super::traits::Plugin;
use std::sync::Arc;

/// 내장 플러그인 팩토리 등록
pub fn register_builtins(loader: &StaticModuleLoader) {
    loader.register(TEMPLATE_PROCESSOR_ID, || {
        Arc::new(ExampleTemplateProcessor::new()) as Arc<dyn Plugin>
    });
    loader.register(VALIDATOR_ID, || Arc::new(ExampleValidator::new()) as Arc<dyn Plugin>);
}

/// 내장 플러그인이 등록된 로더
pub fn builtin_loader() -> StaticModuleLoader {
    let loader = StaticModuleLoader::new();
    register_builtins(&loader);
    loader
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::loader::ModuleLoader;

    #[test]
    fn test_builtin_loader() {
        let loader = builtin_loader();
        assert_eq!(
            loader.names(),
            vec![TEMPLATE_PROCESSOR_ID.to_string(), VALIDATOR_ID.to_string()]
        );

        let plugin = loader
            .load(&StaticModuleLoader::path_for(VALIDATOR_ID))
            .unwrap();
        assert_eq!(plugin.info().id, VALIDATOR_ID);
    }
}
