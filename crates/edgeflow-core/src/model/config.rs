//! リソース設定の型付きユニオン

use crate::descriptor::ResourceId;
use crate::model::{
    AiConfig, CommentConfig, DomainConfig, EventSourceConfig, QueueConfig, ResourceKind,
    VectorIndexConfig, WorkerConfig,
};
use crate::secret::SecretRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// リソース設定
///
/// 種別ごとの設定を一つの直和型にまとめたものです。JSONでは `kind`
/// タグ付きで表現されます。
///
/// ```json
/// { "kind": "queue", "name": "deep-thought-queue", "delivery_delay_secs": null }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceConfig {
    Queue(QueueConfig),
    VectorIndex(VectorIndexConfig),
    Worker(WorkerConfig),
    Ai(AiConfig),
    Domain(DomainConfig),
    EventSource(EventSourceConfig),
    Comment(CommentConfig),
}

impl ResourceConfig {
    /// リソース種別
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceConfig::Queue(_) => ResourceKind::Queue,
            ResourceConfig::VectorIndex(_) => ResourceKind::VectorIndex,
            ResourceConfig::Worker(_) => ResourceKind::Worker,
            ResourceConfig::Ai(_) => ResourceKind::Ai,
            ResourceConfig::Domain(_) => ResourceKind::Domain,
            ResourceConfig::EventSource(_) => ResourceKind::EventSource,
            ResourceConfig::Comment(_) => ResourceKind::Comment,
        }
    }

    /// リモート側の検索キー
    ///
    /// 既存リソースの採用（adopt）判定で `find` に渡される識別子です。
    /// `None` の種別は採用の対象になりません（AIバインディングは
    /// アカウントレベルのシングルトン、コメントは毎回新規投稿）。
    pub fn identity(&self) -> Option<String> {
        match self {
            ResourceConfig::Queue(config) => Some(config.name.clone()),
            ResourceConfig::VectorIndex(config) => Some(config.name.clone()),
            ResourceConfig::Worker(config) => Some(config.name.clone()),
            ResourceConfig::Ai(_) => None,
            ResourceConfig::Domain(config) => Some(config.domain_name.clone()),
            // コンシューマ登録は worker/queue の組で一意になる
            ResourceConfig::EventSource(config) => {
                Some(format!("{}/{}", config.worker, config.queue))
            }
            ResourceConfig::Comment(_) => None,
        }
    }

    /// 設定に埋め込まれたリソース参照（暗黙の依存エッジ）
    pub fn references(&self) -> BTreeSet<ResourceId> {
        let mut refs = BTreeSet::new();
        match self {
            ResourceConfig::Queue(_) | ResourceConfig::VectorIndex(_) | ResourceConfig::Ai(_) => {}
            ResourceConfig::Worker(config) => {
                for binding in config.bindings.values() {
                    if let Some(resource) = binding.references() {
                        refs.insert(resource.clone());
                    }
                }
            }
            ResourceConfig::Domain(config) => {
                refs.insert(config.worker.clone());
            }
            ResourceConfig::EventSource(config) => {
                refs.insert(config.worker.clone());
                refs.insert(config.queue.clone());
            }
            ResourceConfig::Comment(config) => {
                for output_ref in config.body.references() {
                    refs.insert(ResourceId::from_validated(&output_ref.resource));
                }
            }
        }
        refs
    }

    /// 設定に含まれるシークレット参照
    pub fn secret_refs(&self) -> Vec<&SecretRef> {
        match self {
            ResourceConfig::Worker(config) => config
                .bindings
                .values()
                .filter_map(|binding| match binding {
                    crate::model::Binding::Secret { secret } => Some(secret),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// 設定に含まれる出力属性参照（`(リソースID, 属性名)` の組）
    pub fn output_refs(&self) -> Vec<(ResourceId, String)> {
        match self {
            ResourceConfig::Worker(config) => config
                .bindings
                .values()
                .filter_map(|binding| match binding {
                    crate::model::Binding::Output {
                        resource,
                        attribute,
                    } => Some((resource.clone(), attribute.clone())),
                    _ => None,
                })
                .collect(),
            ResourceConfig::Comment(config) => config
                .body
                .references()
                .map(|output_ref| {
                    (
                        ResourceId::from_validated(&output_ref.resource),
                        output_ref.attribute.clone(),
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
