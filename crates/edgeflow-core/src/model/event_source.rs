//! キューコンシューマ設定

use crate::descriptor::ResourceId;
use serde::{Deserialize, Serialize};

fn default_batch_size() -> u32 {
    10
}

fn default_max_wait_time_ms() -> u64 {
    60_000
}

/// キューコンシューマ（イベントソース）設定
///
/// キューをWorkerのイベントソースとして接続します。`worker` と `queue`
/// はどちらも同じ宣言集合内のリソースIDで、暗黙の依存エッジになります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSourceConfig {
    /// メッセージを処理するWorkerのリソースID
    pub worker: ResourceId,

    /// 購読するキューのリソースID
    pub queue: ResourceId,

    /// 一度に配信するメッセージ数
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// バッチが満たない場合の最大待機時間（ミリ秒）
    #[serde(default = "default_max_wait_time_ms")]
    pub max_wait_time_ms: u64,
}

impl EventSourceConfig {
    pub fn new(worker: ResourceId, queue: ResourceId) -> Self {
        Self {
            worker,
            queue,
            batch_size: default_batch_size(),
            max_wait_time_ms: default_max_wait_time_ms(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_wait_time_ms(mut self, max_wait_time_ms: u64) -> Self {
        self.max_wait_time_ms = max_wait_time_ms;
        self
    }
}
