//! エッジWorkerスクリプト設定

use crate::descriptor::ResourceId;
use crate::secret::SecretRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workerバインディング
///
/// Workerの環境に注入される値です。シークレットは参照のまま保持され、
/// リソース参照は依存グラフの暗黙のエッジになります。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Binding {
    /// 平文の値（ステージ名など、秘密ではない設定値）
    Plain { value: String },

    /// シークレット参照（値はプロバイダー呼び出し直前に解決）
    Secret { secret: SecretRef },

    /// 別リソースへのバインディング（キュー、インデックス、AIなど）
    Resource { resource: ResourceId },

    /// 別リソースの特定の出力属性
    Output {
        resource: ResourceId,
        attribute: String,
    },
}

impl Binding {
    pub fn plain(value: impl Into<String>) -> Self {
        Binding::Plain {
            value: value.into(),
        }
    }

    pub fn secret(secret: SecretRef) -> Self {
        Binding::Secret { secret }
    }

    pub fn resource(resource: ResourceId) -> Self {
        Binding::Resource { resource }
    }

    pub fn output(resource: ResourceId, attribute: impl Into<String>) -> Self {
        Binding::Output {
            resource,
            attribute: attribute.into(),
        }
    }

    /// このバインディングが参照するリソースID
    pub fn references(&self) -> Option<&ResourceId> {
        match self {
            Binding::Resource { resource } | Binding::Output { resource, .. } => Some(resource),
            Binding::Plain { .. } | Binding::Secret { .. } => None,
        }
    }
}

/// 可観測性設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// ログ・トレース収集を有効化するか
    #[serde(default)]
    pub enabled: bool,
}

/// エッジWorkerスクリプト設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// スクリプト名（リモート側の識別子）
    pub name: String,

    /// エントリポイントのパス（例: ./src/worker.ts）
    pub entrypoint: String,

    /// 互換性日付（例: 2025-04-26）
    #[serde(default)]
    pub compatibility_date: Option<String>,

    /// 互換性フラグ
    #[serde(default)]
    pub compatibility_flags: Vec<String>,

    /// 環境バインディング（変数名 -> バインディング）
    #[serde(default)]
    pub bindings: BTreeMap<String, Binding>,

    /// 可観測性設定
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// workers.dev サブドメインURLを要求するか
    #[serde(default)]
    pub url: bool,
}

impl WorkerConfig {
    pub fn new(name: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entrypoint: entrypoint.into(),
            compatibility_date: None,
            compatibility_flags: Vec::new(),
            bindings: BTreeMap::new(),
            observability: ObservabilityConfig::default(),
            url: false,
        }
    }

    pub fn with_compatibility_date(mut self, date: impl Into<String>) -> Self {
        self.compatibility_date = Some(date.into());
        self
    }

    pub fn with_binding(mut self, key: impl Into<String>, binding: Binding) -> Self {
        self.bindings.insert(key.into(), binding);
        self
    }

    pub fn with_observability(mut self, enabled: bool) -> Self {
        self.observability = ObservabilityConfig { enabled };
        self
    }

    pub fn with_url(mut self, url: bool) -> Self {
        self.url = url;
        self
    }
}
