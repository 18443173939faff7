//! リソース記述子
//!
//! 宣言集合の1要素です。論理ID、種別付き設定、依存関係、ポリシーを
//! 保持します。エンジンはこの記述子の集合と状態レコードを突き合わせて
//! 実行計画を導出します。

use crate::error::{ResourceError, Result};
use crate::model::ResourceConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// リソースIDの最大長
const MAX_ID_LEN: usize = 64;

/// リソースの論理ID
///
/// スコープ内で一意な識別子です。小文字英数字とハイフンのみ使用でき、
/// 先頭はハイフン以外でなければなりません。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if !Self::is_valid(&value) {
            return Err(ResourceError::InvalidResourceId(value));
        }
        Ok(Self(value))
    }

    fn is_valid(value: &str) -> bool {
        !value.is_empty()
            && value.len() <= MAX_ID_LEN
            && !value.starts_with('-')
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    /// テンプレート等、文字種が検証済みの文脈から構築する
    pub(crate) fn from_validated(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ResourceError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.0
    }
}

impl std::str::FromStr for ResourceId {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// リソースポリシー
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    /// 状態レコードにない同名リモートリソースが存在した場合に採用するか
    #[serde(default)]
    pub adopt: bool,

    /// 宣言から外れた際に削除を許可するか（falseなら保持）
    #[serde(default)]
    pub delete: bool,
}

/// リソース記述子
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// 論理ID（スコープ内で一意）
    pub id: ResourceId,

    /// 種別付き設定
    pub config: ResourceConfig,

    /// 明示的な依存リソースID
    #[serde(default)]
    pub depends_on: BTreeSet<ResourceId>,

    /// 採用・削除ポリシー
    #[serde(default)]
    pub policy: ResourcePolicy,
}

impl ResourceDescriptor {
    pub fn new(id: ResourceId, config: ResourceConfig) -> Self {
        Self {
            id,
            config,
            depends_on: BTreeSet::new(),
            policy: ResourcePolicy::default(),
        }
    }

    /// ID文字列から記述子を作成
    pub fn named(id: impl Into<String>, config: ResourceConfig) -> Result<Self> {
        Ok(Self::new(ResourceId::new(id)?, config))
    }

    pub fn with_dependency(mut self, id: ResourceId) -> Self {
        self.depends_on.insert(id);
        self
    }

    pub fn with_adopt(mut self, adopt: bool) -> Self {
        self.policy.adopt = adopt;
        self
    }

    pub fn with_delete(mut self, delete: bool) -> Self {
        self.policy.delete = delete;
        self
    }

    /// 実効依存集合
    ///
    /// 明示的な `depends_on` と設定に埋め込まれた参照の和集合です。
    pub fn dependencies(&self) -> BTreeSet<ResourceId> {
        let mut deps = self.depends_on.clone();
        deps.extend(self.config.references());
        deps
    }
}
