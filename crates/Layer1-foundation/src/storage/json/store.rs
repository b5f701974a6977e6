//! JSON 파일 저장소
//!
//! 런타임 설정(`runtime.json`)을 글로벌/프로젝트 디렉토리에서 읽고 씁니다.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// 글로벌/프로젝트 설정 디렉토리 이름
const APP_DIR: &str = "plugrt";

/// 디렉토리 기반 JSON 저장소
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<config_dir>/plugrt/`
    pub fn global() -> Result<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join(APP_DIR)))
            .ok_or_else(|| Error::Config("no user config directory on this platform".into()))
    }

    /// `<root>/.plugrt/`
    pub fn project(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(format!(".{}", APP_DIR)))
    }

    pub fn current_project() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("cannot resolve working directory: {}", e)))?;
        Ok(Self::project(cwd))
    }

    pub fn base_dir(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// 파일이 없으면 `None`, 파싱 실패는 에러
    pub fn load_optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path_of(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Config(format!("{} is not valid: {}", path.display(), e)))
    }

    /// 임시 파일에 쓴 뒤 rename (중간 상태가 남지 않음)
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_of(name);
        let staging = path.with_extension("tmp");

        std::fs::write(&staging, serde_json::to_vec_pretty(value)?)?;
        std::fs::rename(&staging, &path)?;
        Ok(())
    }
}
