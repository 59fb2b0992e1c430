use super::ContentId;
use serde::{Deserialize, Serialize};
use std::fmt;

const PATH_SEPARATOR: char = '.';

/// 祖先 ID を根から順に並べ、末尾に自身の ID を持つ Materialized path。
///
/// 派生 `Ord` は要素ごとの辞書順なので、祖先は常に子孫より前に並ぶ。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommentPath(Vec<ContentId>);

impl CommentPath {
    pub fn root(id: ContentId) -> Self {
        Self(vec![id])
    }

    pub fn child(&self, id: ContentId) -> Self {
        let mut segments = self.0.clone();
        segments.push(id);
        Self(segments)
    }

    /// ルートは 0
    pub fn depth(&self) -> u32 {
        self.0.len().saturating_sub(1) as u32
    }

    pub fn leaf(&self) -> &ContentId {
        // 構築経路はすべて 1 要素以上を保証する
        &self.0[self.0.len() - 1]
    }

    pub fn parent(&self) -> Option<&ContentId> {
        if self.0.len() < 2 {
            return None;
        }
        self.0.get(self.0.len() - 2)
    }

    pub fn segments(&self) -> &[ContentId] {
        &self.0
    }

    pub fn is_ancestor_of(&self, other: &CommentPath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    /// ストレージ用の `a.b.c` 形式
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(ContentId::as_str)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn decode(value: &str) -> Result<Self, String> {
        if value.trim().is_empty() {
            return Err("Comment path cannot be empty".to_string());
        }
        let segments = value
            .split(PATH_SEPARATOR)
            .map(ContentId::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("Invalid comment path: {err}"))?;
        Ok(Self(segments))
    }
}

impl fmt::Display for CommentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_path_extends_parent() {
        let a = ContentId::random();
        let b = ContentId::random();
        let root = CommentPath::root(a.clone());
        let child = root.child(b.clone());

        assert_eq!(root.depth(), 0);
        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent(), Some(&a));
        assert_eq!(child.leaf(), &b);
        assert!(root.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&root));
        assert!(root < child);
    }

    #[test]
    fn encode_decode_preserves_segments() {
        let path = CommentPath::root(ContentId::random())
            .child(ContentId::random())
            .child(ContentId::random());
        let decoded = CommentPath::decode(&path.encode()).unwrap();
        assert_eq!(decoded, path);
        assert!(CommentPath::decode("").is_err());
        assert!(CommentPath::decode("not-a-uuid").is_err());
    }
}
