//! Security Manager - 플러그인 수락 전 정책 검사
//!
//! - 권한: 알 수 없는 값 거부, 허용 목록 밖의 권한 거부
//! - 매니페스트: 파일 경로/크기/SHA-256, 전체 체크섬, ed25519 서명

use super::info::Permission;
use super::manifest::{sha256_hex, PluginManifest};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use plugrt_foundation::{Error, Result, SecuritySettings};
use std::collections::BTreeSet;
use std::path::{Component, Path};
use tracing::{debug, warn};

/// 파일 SHA-256 (hex)
pub fn file_checksum(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_hex(&bytes))
}

/// 보안 관리자
#[derive(Debug, Clone)]
pub struct SecurityManager {
    /// 허용된 권한 (None이면 알려진 모든 권한)
    allowed: Option<BTreeSet<Permission>>,

    require_checksums: bool,

    require_signature: bool,

    trusted_keys: Vec<VerifyingKey>,
}

impl Default for SecurityManager {
    fn default() -> Self {
        Self {
            allowed: None,
            require_checksums: true,
            require_signature: false,
            trusted_keys: Vec::new(),
        }
    }
}

impl SecurityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정에서 생성 (권한 이름/공개키 파싱)
    pub fn from_settings(settings: &SecuritySettings) -> Result<Self> {
        let allowed = match &settings.allowed_permissions {
            Some(names) => Some(Self::parse_permissions(names)?),
            None => None,
        };

        let trusted_keys = settings
            .trusted_keys
            .iter()
            .map(|key| parse_public_key(key))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            allowed,
            require_checksums: settings.require_checksums,
            require_signature: settings.require_signature,
            trusted_keys,
        })
    }

    pub fn with_allowed_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.allowed = Some(permissions.into_iter().collect());
        self
    }

    pub fn with_trusted_key(mut self, key: VerifyingKey) -> Self {
        self.trusted_keys.push(key);
        self
    }

    pub fn require_signature(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    pub fn require_checksums(mut self, required: bool) -> Self {
        self.require_checksums = required;
        self
    }

    // ========================================================================
    // 권한
    // ========================================================================

    /// 권한 이름 파싱 (알 수 없는 값은 거부)
    pub fn parse_permissions(names: &[String]) -> Result<BTreeSet<Permission>> {
        names
            .iter()
            .map(|name| {
                name.parse::<Permission>()
                    .map_err(|_| Error::PermissionDenied(format!("unknown permission: {}", name)))
            })
            .collect()
    }

    /// 권한 집합 검증
    pub fn validate_permissions(&self, permissions: &BTreeSet<Permission>) -> Result<()> {
        if let Some(allowed) = &self.allowed {
            if let Some(denied) = permissions.iter().find(|p| !allowed.contains(p)) {
                return Err(Error::PermissionDenied(format!(
                    "permission {} is not allowed by policy",
                    denied
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // 매니페스트
    // ========================================================================

    /// 매니페스트 검증
    ///
    /// `base_dir`은 매니페스트의 파일 경로가 가리키는 설치 디렉토리입니다.
    pub fn validate_manifest(&self, manifest: &PluginManifest, base_dir: &Path) -> Result<()> {
        let info = &manifest.info;
        info.validate_identity()?;
        semver::Version::parse(&info.version).map_err(|e| {
            Error::Validation(format!(
                "plugin {} has invalid version {}: {}",
                info.id, info.version, e
            ))
        })?;
        self.validate_permissions(&info.permissions)?;

        for file in &manifest.files {
            if !is_contained(&file.path) {
                return Err(Error::Integrity(format!(
                    "manifest path escapes install directory: {}",
                    file.path
                )));
            }

            if !self.require_checksums {
                continue;
            }

            let path = base_dir.join(&file.path);
            let bytes = std::fs::read(&path).map_err(|e| {
                Error::Integrity(format!("cannot read {}: {}", path.display(), e))
            })?;
            if bytes.len() as u64 != file.size {
                return Err(Error::Integrity(format!(
                    "size mismatch for {}: expected {}, got {}",
                    file.path,
                    file.size,
                    bytes.len()
                )));
            }
            if !sha256_hex(&bytes).eq_ignore_ascii_case(&file.checksum) {
                return Err(Error::Integrity(format!("checksum mismatch for {}", file.path)));
            }
        }

        let computed = manifest.compute_checksum();
        if manifest.checksum.is_empty() {
            if self.require_checksums && !manifest.files.is_empty() {
                return Err(Error::Integrity(format!(
                    "manifest for {} has no checksum",
                    info.id
                )));
            }
        } else if !manifest.checksum.eq_ignore_ascii_case(&computed) {
            return Err(Error::Integrity(format!(
                "manifest checksum mismatch for {}",
                info.id
            )));
        }

        match &manifest.signature {
            Some(signature) => self.verify_signature(&computed, signature)?,
            None if self.require_signature => {
                return Err(Error::Integrity(format!(
                    "manifest for {} is not signed",
                    info.id
                )));
            }
            None => {}
        }

        debug!("Manifest for {} validated", info.id);
        Ok(())
    }

    /// 전체 체크섬에 대한 서명 검증 (신뢰하는 키 중 하나라도 일치하면 통과)
    pub fn verify_signature(&self, checksum: &str, signature: &str) -> Result<()> {
        if self.trusted_keys.is_empty() {
            return Err(Error::Integrity(
                "manifest is signed but no trusted keys are configured".into(),
            ));
        }

        let bytes = BASE64
            .decode(signature.trim())
            .map_err(|e| Error::Integrity(format!("invalid signature encoding: {}", e)))?;
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| Error::Integrity(format!("invalid signature: {}", e)))?;

        if self
            .trusted_keys
            .iter()
            .any(|key| key.verify(checksum.as_bytes(), &signature).is_ok())
        {
            Ok(())
        } else {
            warn!("Manifest signature did not match any trusted key");
            Err(Error::Integrity("signature verification failed".into()))
        }
    }
}

/// ed25519 공개키 파싱 (hex, 32바이트)
fn parse_public_key(hex_key: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| Error::Config(format!("invalid trusted key {}: {}", hex_key, e)))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Config(format!("trusted key {} must be 32 bytes", hex_key)))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| Error::Config(format!("invalid trusted key {}: {}", hex_key, e)))
}

/// 상대 경로이며 상위 디렉토리로 벗어나지 않는지
fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::info::PluginInfo;
    use crate::plugin::manifest::{ManifestFile, ManifestFileType};
    use ed25519_dalek::{Signer, SigningKey};
    use tempfile::TempDir;

    fn manifest_in(dir: &Path) -> PluginManifest {
        std::fs::write(dir.join("plugin.so"), b"binary").unwrap();
        let info = PluginInfo::new("example.validator", "Example Validator", "1.0.0")
            .with_permission(Permission::FileSystemRead);
        PluginManifest::new(info).with_file(
            ManifestFile::from_disk(dir, "plugin.so", ManifestFileType::Binary).unwrap(),
        )
    }

    #[test]
    fn test_parse_permissions_rejects_unknown() {
        let ok = SecurityManager::parse_permissions(&["network".into(), "ui".into()]).unwrap();
        assert_eq!(ok.len(), 2);

        let err = SecurityManager::parse_permissions(&["root".into()]).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }

    #[test]
    fn test_policy_allow_list() {
        let security = SecurityManager::new().with_allowed_permissions([Permission::Network]);
        let mut requested = BTreeSet::new();
        requested.insert(Permission::Network);
        assert!(security.validate_permissions(&requested).is_ok());

        requested.insert(Permission::Execute);
        assert!(matches!(
            security.validate_permissions(&requested),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_valid_manifest() {
        let temp = TempDir::new().unwrap();
        let manifest = manifest_in(temp.path());
        SecurityManager::new()
            .validate_manifest(&manifest, temp.path())
            .unwrap();
    }

    #[test]
    fn test_tampered_file_fails() {
        let temp = TempDir::new().unwrap();
        let manifest = manifest_in(temp.path());
        std::fs::write(temp.path().join("plugin.so"), b"BINARY").unwrap();

        let err = SecurityManager::new()
            .validate_manifest(&manifest, temp.path())
            .unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_path_traversal_fails() {
        let temp = TempDir::new().unwrap();
        let mut manifest = manifest_in(temp.path());
        manifest.files[0].path = "../plugin.so".into();
        manifest.refresh_totals();

        let err = SecurityManager::new()
            .require_checksums(false)
            .validate_manifest(&manifest, temp.path())
            .unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn test_signature_verification() {
        let temp = TempDir::new().unwrap();
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let manifest = manifest_in(temp.path());
        let signature = BASE64.encode(signing.sign(manifest.checksum.as_bytes()).to_bytes());
        let signed = manifest.clone().with_signature(signature);

        let settings = SecuritySettings {
            require_signature: true,
            trusted_keys: vec![hex::encode(signing.verifying_key().to_bytes())],
            ..Default::default()
        };
        let security = SecurityManager::from_settings(&settings).unwrap();

        security.validate_manifest(&signed, temp.path()).unwrap();
        assert!(security.validate_manifest(&manifest, temp.path()).is_err());

        let other = SigningKey::from_bytes(&[9u8; 32]);
        let forged = manifest
            .with_signature(BASE64.encode(other.sign(b"anything").to_bytes()));
        assert!(security.validate_manifest(&forged, temp.path()).is_err());
    }

    #[test]
    fn test_invalid_version_rejected() {
        let temp = TempDir::new().unwrap();
        let mut manifest = manifest_in(temp.path());
        manifest.info.version = "latest".into();

        assert!(matches!(
            SecurityManager::new().validate_manifest(&manifest, temp.path()),
            Err(Error::Validation(_))
        ));
    }
}
