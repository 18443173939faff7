//! メッセージキュー設定

use serde::{Deserialize, Serialize};

/// メッセージキュー設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// キュー名（リモート側の識別子）
    pub name: String,

    /// 配信遅延（秒）
    #[serde(default)]
    pub delivery_delay_secs: Option<u32>,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delivery_delay_secs: None,
        }
    }

    pub fn with_delivery_delay_secs(mut self, secs: u32) -> Self {
        self.delivery_delay_secs = Some(secs);
        self
    }
}
