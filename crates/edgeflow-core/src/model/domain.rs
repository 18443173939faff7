//! カスタムドメイン設定

use crate::descriptor::ResourceId;
use serde::{Deserialize, Serialize};

/// カスタムドメイン設定
///
/// ゾーン内のホスト名をWorkerにルーティングします。`worker` は同じ
/// 宣言集合内のWorkerリソースIDで、暗黙の依存エッジになります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// 割り当てるホスト名（例: api.example.com）
    pub domain_name: String,

    /// DNSゾーンID
    pub zone_id: String,

    /// ルーティング先WorkerのリソースID
    pub worker: ResourceId,
}

impl DomainConfig {
    pub fn new(
        domain_name: impl Into<String>,
        zone_id: impl Into<String>,
        worker: ResourceId,
    ) -> Self {
        Self {
            domain_name: domain_name.into(),
            zone_id: zone_id.into(),
            worker,
        }
    }
}
