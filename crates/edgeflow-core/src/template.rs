//! 出力参照テンプレート
//!
//! `${resource-id.attribute}` 形式のプレースホルダを含む文字列を扱います。
//! プレースホルダは依存リソースの出力属性への参照であり、展開は依存
//! リソースの適用完了後に行われます。
//!
//! ```text
//! "Deployed to ${app-worker.url} (stage: development)"
//! ```

use crate::error::{ResourceError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 依存リソースの出力属性への参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    /// 参照先リソースのID
    pub resource: String,
    /// 出力属性名（url, id など）
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Reference(OutputRef),
}

/// 出力参照テンプレート
///
/// パース済みの形で保持し、直列化時は元の文字列表現に戻します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    raw: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// テンプレート文字列をパース
    ///
    /// プレースホルダの中身が `resource-id.attribute` 形式でない場合、
    /// または `${` が閉じられていない場合はエラーになります。
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let re = Regex::new(r"\$\{([a-z0-9][a-z0-9-]*)\.([A-Za-z0-9_-]+)\}")
            .map_err(|e| ResourceError::TemplateParse(format!("正規表現のコンパイルエラー: {}", e)))?;

        let mut parts = Vec::new();
        let mut last_end = 0;
        for cap in re.captures_iter(&raw) {
            let whole = cap.get(0).ok_or_else(|| {
                ResourceError::TemplateParse("プレースホルダの位置を特定できません".to_string())
            })?;
            if whole.start() > last_end {
                parts.push(TemplatePart::Literal(raw[last_end..whole.start()].to_string()));
            }
            parts.push(TemplatePart::Reference(OutputRef {
                resource: cap[1].to_string(),
                attribute: cap[2].to_string(),
            }));
            last_end = whole.end();
        }
        if last_end < raw.len() {
            parts.push(TemplatePart::Literal(raw[last_end..].to_string()));
        }

        // パースされなかった `${` が残っていれば構文エラー扱いにする
        for part in &parts {
            if let TemplatePart::Literal(text) = part
                && let Some(pos) = text.find("${")
            {
                let tail: String = text[pos..].chars().take(30).collect();
                return Err(ResourceError::TemplateParse(format!(
                    "閉じられていない、または不正なプレースホルダ: {}",
                    tail
                )));
            }
        }

        Ok(Self { raw, parts })
    }

    /// プレースホルダを含まない静的テンプレートかどうか
    pub fn is_static(&self) -> bool {
        self.references().next().is_none()
    }

    /// 含まれる出力参照を列挙
    pub fn references(&self) -> impl Iterator<Item = &OutputRef> {
        self.parts.iter().filter_map(|part| match part {
            TemplatePart::Reference(output_ref) => Some(output_ref),
            TemplatePart::Literal(_) => None,
        })
    }

    /// 出力参照を解決してテンプレートを展開
    ///
    /// `lookup` が `None` を返した参照があれば `UnresolvedOutput` エラーに
    /// なります。
    pub fn render<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str, &str) -> Option<String>,
    {
        let mut rendered = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => rendered.push_str(text),
                TemplatePart::Reference(output_ref) => {
                    let value =
                        lookup(&output_ref.resource, &output_ref.attribute).ok_or_else(|| {
                            ResourceError::UnresolvedOutput {
                                resource: output_ref.resource.clone(),
                                attribute: output_ref.attribute.clone(),
                            }
                        })?;
                    rendered.push_str(&value);
                }
            }
        }
        Ok(rendered)
    }

    /// 元の文字列表現
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for Template {
    type Error = ResourceError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Template> for String {
    fn from(value: Template) -> Self {
        value.raw
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let template =
            Template::parse("Deployed ${app-worker.url} at stage ${app-worker.name}").unwrap();

        let refs: Vec<_> = template.references().collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].resource, "app-worker");
        assert_eq!(refs[0].attribute, "url");

        let rendered = template
            .render(|resource, attribute| match (resource, attribute) {
                ("app-worker", "url") => Some("https://app.example.dev".to_string()),
                ("app-worker", "name") => Some("app-worker-dev".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(rendered, "Deployed https://app.example.dev at stage app-worker-dev");
    }

    #[test]
    fn test_static_template() {
        let template = Template::parse("no placeholders here").unwrap();
        assert!(template.is_static());
        assert_eq!(template.render(|_, _| None).unwrap(), "no placeholders here");
    }

    #[test]
    fn test_unresolved_reference_is_error() {
        let template = Template::parse("${queue.id}").unwrap();
        let err = template.render(|_, _| None).unwrap_err();
        assert!(matches!(err, ResourceError::UnresolvedOutput { .. }));
    }

    #[test]
    fn test_malformed_placeholder_is_rejected() {
        assert!(Template::parse("${unclosed").is_err());
        assert!(Template::parse("${no-attribute}").is_err());
        assert!(Template::parse("${UPPER.url}").is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let template = Template::parse("url: ${worker.url}").unwrap();
        let json = serde_json::to_string(&template).unwrap();
        assert_eq!(json, r#""url: ${worker.url}""#);

        let back: Template = serde_json::from_str(&json).unwrap();
        assert_eq!(back, template);
    }
}
