//! シークレット参照モジュール
//!
//! 設定に埋め込まれる秘密情報は値そのものではなく `scheme://NAME` 形式の
//! 参照として表現されます。実際の値への解決はプロバイダー呼び出しの直前まで
//! 遅延されます。
//!
//! ## 参照形式
//!
//! ```text
//! env://API_KEY          環境変数 API_KEY から解決
//! ```
//!
//! ## セキュリティ
//!
//! - 状態ファイルとフィンガープリントには参照文字列のみが記録されます
//! - 解決された値は [`SecretString`] に包まれ、Debug/Display 出力で伏字になります
//! - 解決された値はログに出力されません

use crate::error::{ResourceError, Result};
use serde::{Deserialize, Serialize};

/// 環境変数スキーム
pub const SCHEME_ENV: &str = "env";

/// シークレット参照
///
/// `scheme://NAME` 形式の文字列を保持します。値の解決は行いません。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretRef {
    reference: String,
    scheme_len: usize,
}

impl SecretRef {
    /// 参照文字列をパース
    ///
    /// スキームと名前の両方が非空でなければエラーになります。
    pub fn parse(reference: impl Into<String>) -> Result<Self> {
        let reference = reference.into();
        let Some(scheme_len) = reference.find("://") else {
            return Err(ResourceError::InvalidSecretRef(reference));
        };
        let name = &reference[scheme_len + 3..];
        if scheme_len == 0 || name.is_empty() {
            return Err(ResourceError::InvalidSecretRef(reference));
        }
        Ok(Self {
            reference,
            scheme_len,
        })
    }

    /// 環境変数参照を作成
    pub fn env(name: impl AsRef<str>) -> Result<Self> {
        Self::parse(format!("{}://{}", SCHEME_ENV, name.as_ref()))
    }

    /// スキーム部（`env` など）
    pub fn scheme(&self) -> &str {
        &self.reference[..self.scheme_len]
    }

    /// 名前部（`API_KEY` など）
    pub fn name(&self) -> &str {
        &self.reference[self.scheme_len + 3..]
    }

    /// 参照文字列全体
    pub fn as_str(&self) -> &str {
        &self.reference
    }
}

impl TryFrom<String> for SecretRef {
    type Error = ResourceError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<SecretRef> for String {
    fn from(value: SecretRef) -> Self {
        value.reference
    }
}

impl std::fmt::Display for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reference)
    }
}

/// 解決済みシークレット値
///
/// Debug/Display では常に伏字で表示されます。Serialize は意図的に
/// 実装していません。状態ファイルへの混入をコンパイル時に防ぐためです。
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 値を取り出す
    ///
    /// 呼び出し側はこの値をログや永続化層に渡してはいけません。
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretString(***)")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***")
    }
}
