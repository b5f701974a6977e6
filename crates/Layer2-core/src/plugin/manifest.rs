//! Plugin Manifest - 설치 가능한 패키지 기술서
//!
//! `<id>.manifest.json`으로 저장되며, 로드/설치 시 SecurityManager가 검증합니다.

use super::info::PluginInfo;
use plugrt_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// 매니페스트 파일 확장자
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

/// 문자열/바이트 SHA-256 (hex)
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ============================================================================
// ManifestFile
// ============================================================================

/// 패키지 구성 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestFileType {
    /// 로드 가능한 모듈
    Binary,
    Config,
    Asset,
    Documentation,
}

/// 패키지 구성 파일
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    /// 설치 디렉토리 기준 상대 경로
    pub path: String,

    /// 바이트 크기
    pub size: u64,

    /// SHA-256 (hex)
    pub checksum: String,

    #[serde(rename = "type")]
    pub file_type: ManifestFileType,

    /// 대상 OS (None이면 모든 플랫폼)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// 대상 아키텍처 (None이면 모든 아키텍처)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl ManifestFile {
    /// 디스크의 파일로부터 생성 (크기/체크섬 계산)
    pub fn from_disk(base_dir: &Path, relative: &str, file_type: ManifestFileType) -> Result<Self> {
        let bytes = std::fs::read(base_dir.join(relative))?;
        Ok(Self {
            path: relative.to_string(),
            size: bytes.len() as u64,
            checksum: sha256_hex(&bytes),
            file_type,
            platform: None,
            arch: None,
        })
    }

    pub fn with_target(mut self, platform: impl Into<String>, arch: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self.arch = Some(arch.into());
        self
    }

    /// 주어진 플랫폼/아키텍처에서 사용 가능한지
    pub fn matches_target(&self, platform: &str, arch: &str) -> bool {
        self.platform.as_deref().map_or(true, |p| p == platform)
            && self.arch.as_deref().map_or(true, |a| a == arch)
    }

    fn is_generic(&self) -> bool {
        self.platform.is_none() && self.arch.is_none()
    }
}

// ============================================================================
// PluginManifest
// ============================================================================

/// 플러그인 매니페스트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// 플러그인 정보
    pub info: PluginInfo,

    /// 구성 파일
    #[serde(default)]
    pub files: Vec<ManifestFile>,

    /// 전체 체크섬 (정렬된 "path:checksum" 줄의 SHA-256)
    #[serde(default)]
    pub checksum: String,

    /// 전체 크기
    #[serde(default)]
    pub size: u64,

    /// 설치 경로
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,

    /// 검증 완료 여부 (SecurityManager가 설정)
    #[serde(default)]
    pub verified: bool,

    /// 전체 체크섬에 대한 ed25519 서명 (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl PluginManifest {
    pub fn new(info: PluginInfo) -> Self {
        Self {
            info,
            files: Vec::new(),
            checksum: String::new(),
            size: 0,
            install_path: None,
            verified: false,
            signature: None,
        }
    }

    /// 파일 추가 후 체크섬/크기 갱신
    pub fn with_file(mut self, file: ManifestFile) -> Self {
        self.files.push(file);
        self.refresh_totals();
        self
    }

    pub fn with_install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// 전체 체크섬/크기 재계산
    pub fn refresh_totals(&mut self) {
        self.checksum = self.compute_checksum();
        self.size = self.files.iter().map(|f| f.size).sum();
    }

    /// 전체 체크섬 계산
    pub fn compute_checksum(&self) -> String {
        let mut lines: Vec<String> = self
            .files
            .iter()
            .map(|f| format!("{}:{}", f.path, f.checksum))
            .collect();
        lines.sort();
        sha256_hex(lines.join("\n").as_bytes())
    }

    // ========================================================================
    // 아티팩트 선택
    // ========================================================================

    /// 플랫폼/아키텍처에 맞는 바이너리 (정확히 일치하는 것 우선)
    pub fn artifact_for(&self, platform: &str, arch: &str) -> Option<&ManifestFile> {
        let candidates = || {
            self.files
                .iter()
                .filter(|f| f.file_type == ManifestFileType::Binary)
                .filter(|f| f.matches_target(platform, arch))
        };
        candidates()
            .find(|f| !f.is_generic())
            .or_else(|| candidates().next())
    }

    /// 현재 플랫폼용 바이너리
    pub fn current_artifact(&self) -> Option<&ManifestFile> {
        self.artifact_for(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// 설치 디렉토리 (install_path 또는 매니페스트 파일 위치)
    pub fn base_dir<'a>(&'a self, manifest_path: &'a Path) -> &'a Path {
        match &self.install_path {
            Some(path) => path.as_path(),
            None => manifest_path.parent().unwrap_or_else(|| Path::new(".")),
        }
    }

    // ========================================================================
    // 파일 입출력
    // ========================================================================

    /// 매니페스트 파일 로드
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::PluginLoad(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Validation(format!("Invalid manifest {}: {}", path.display(), e))
        })
    }

    /// 매니페스트 파일 저장
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 매니페스트 파일명 (`<id>.manifest.json`)
    pub fn file_name(id: &str) -> String {
        format!("{}{}", id, MANIFEST_SUFFIX)
    }

    /// 모듈 옆의 매니페스트 경로 (`<stem>.manifest.json`)
    pub fn sibling_of(module_path: &Path) -> Option<PathBuf> {
        let stem = module_path.file_stem()?.to_str()?;
        let stem = stem.strip_prefix("lib").unwrap_or(stem);
        Some(module_path.with_file_name(Self::file_name(stem)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file(path: &str, checksum: &str) -> ManifestFile {
        ManifestFile {
            path: path.to_string(),
            size: 4,
            checksum: checksum.to_string(),
            file_type: ManifestFileType::Binary,
            platform: None,
            arch: None,
        }
    }

    #[test]
    fn test_checksum_is_order_independent() {
        let info = PluginInfo::new("example.validator", "Validator", "1.0.0");
        let a = PluginManifest::new(info.clone())
            .with_file(file("a.so", "aa"))
            .with_file(file("b.so", "bb"));
        let b = PluginManifest::new(info)
            .with_file(file("b.so", "bb"))
            .with_file(file("a.so", "aa"));

        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.size, 8);
        assert_eq!(a.checksum, sha256_hex(b"a.so:aa\nb.so:bb"));
    }

    #[test]
    fn test_artifact_selection_prefers_exact_target() {
        let info = PluginInfo::new("example.validator", "Validator", "1.0.0");
        let manifest = PluginManifest::new(info)
            .with_file(file("generic.so", "00"))
            .with_file(file("linux.so", "11").with_target("linux", "x86_64"))
            .with_file(file("mac.dylib", "22").with_target("macos", "aarch64"));

        assert_eq!(
            manifest.artifact_for("linux", "x86_64").map(|f| f.path.as_str()),
            Some("linux.so")
        );
        assert_eq!(
            manifest.artifact_for("windows", "x86_64").map(|f| f.path.as_str()),
            Some("generic.so")
        );
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("plugin.so"), b"data").unwrap();

        let info = PluginInfo::new("example.validator", "Validator", "1.0.0");
        let manifest = PluginManifest::new(info).with_file(
            ManifestFile::from_disk(temp.path(), "plugin.so", ManifestFileType::Binary).unwrap(),
        );
        let path = temp.path().join(PluginManifest::file_name("example.validator"));
        manifest.save(&path).unwrap();

        let loaded = PluginManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.files[0].size, 4);
        assert_eq!(loaded.base_dir(&path), temp.path());
    }

    #[test]
    fn test_sibling_manifest_path() {
        let path = PluginManifest::sibling_of(Path::new("/plugins/foo/libfoo.so")).unwrap();
        assert_eq!(path, PathBuf::from("/plugins/foo/foo.manifest.json"));
    }
}
