//! 設定フィンガープリント
//!
//! リソース設定を正規化JSONに直列化し、BLAKE3でハッシュ化した値です。
//! 前回適用時の値と比較することで Update / NoOp の判定を行います。
//!
//! 設定モデル内のマップはすべて `BTreeMap` で表現されているため、
//! 直列化順序は決定的であり、同じ設定は常に同じフィンガープリントに
//! なります。

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// 設定フィンガープリント（BLAKE3ハッシュの16進表現）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// 任意の直列化可能な値からフィンガープリントを計算
    pub fn of<T: Serialize>(value: &T) -> Result<Self> {
        let canonical = serde_json::to_vec(value)?;
        let hash = blake3::hash(&canonical);
        Ok(Self(hash.to_hex().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ログ表示用の短縮形（先頭12文字）
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
