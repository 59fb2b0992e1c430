//! フラットなコメント行から入れ子ツリーを組み立てる。
//!
//! ストアの prefix 検索機能に依存せず、path 順に並んだ任意の結果セットで動く。

use crate::domain::entities::{CommentRow, CommentSort};
use crate::domain::value_objects::ContentId;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    pub row: CommentRow,
    pub reply_count: u32,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn id(&self) -> &ContentId {
        &self.row.comment.id
    }

    /// 自身を含まない子孫数
    pub fn descendant_count(&self) -> usize {
        self.replies
            .iter()
            .map(|reply| 1 + reply.descendant_count())
            .sum()
    }
}

/// path 順に 1 回走査し、id→node の対応から親へ接続する。
///
/// 行集合の中に親が無い行（深さ窓・件数制限で切れた行、サブツリーの起点）は
/// フォレストのルートになる。
pub fn build_tree(mut rows: Vec<CommentRow>, sort: CommentSort) -> Vec<CommentNode> {
    rows.sort_by(|a, b| a.comment.path.cmp(&b.comment.path));

    let mut index: HashMap<ContentId, usize> = HashMap::with_capacity(rows.len());
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    let mut roots: Vec<usize> = Vec::new();

    for (position, row) in rows.iter().enumerate() {
        let parent = row
            .comment
            .parent_id
            .as_ref()
            .and_then(|parent_id| index.get(parent_id).copied());
        match parent {
            Some(parent_position) => children[parent_position].push(position),
            None => roots.push(position),
        }
        index.insert(row.comment.id.clone(), position);
    }

    // 子は常に親より後ろにあるので、逆順に組み立てれば子が先に揃う
    let mut built: Vec<Option<CommentNode>> = vec![None; rows.len()];
    for (position, row) in rows.into_iter().enumerate().rev() {
        let mut replies: Vec<CommentNode> = children[position]
            .iter()
            .filter_map(|child| built[*child].take())
            .collect();
        sort_nodes(&mut replies, sort);
        built[position] = Some(CommentNode {
            row,
            reply_count: replies.len() as u32,
            replies,
        });
    }

    let mut forest: Vec<CommentNode> = roots
        .iter()
        .filter_map(|root| built[*root].take())
        .collect();
    sort_nodes(&mut forest, sort);
    forest
}

/// 削除済みで、生きている子孫も持たないノードを取り除く。
/// 生きた返信を持つ墓標は形を保つため残す
pub fn prune_removed(nodes: Vec<CommentNode>) -> Vec<CommentNode> {
    nodes
        .into_iter()
        .filter_map(|mut node| {
            node.replies = prune_removed(std::mem::take(&mut node.replies));
            node.reply_count = node.replies.len() as u32;
            (!node.row.comment.is_removed || !node.replies.is_empty()).then_some(node)
        })
        .collect()
}

/// 深さ優先（前順）で平坦化する
pub fn flatten(nodes: &[CommentNode]) -> Vec<&CommentRow> {
    let mut out = Vec::new();
    for node in nodes {
        push_preorder(node, &mut out);
    }
    out
}

fn push_preorder<'a>(node: &'a CommentNode, out: &mut Vec<&'a CommentRow>) {
    out.push(&node.row);
    for reply in &node.replies {
        push_preorder(reply, out);
    }
}

pub fn sort_nodes(nodes: &mut [CommentNode], sort: CommentSort) {
    nodes.sort_by(|a, b| compare_rows(&a.row, &b.row, sort));
}

fn compare_rows(a: &CommentRow, b: &CommentRow, sort: CommentSort) -> Ordering {
    let primary = match sort {
        CommentSort::Best => b.wilson_score.total_cmp(&a.wilson_score),
        CommentSort::New => b.comment.created_at.cmp(&a.comment.created_at),
        CommentSort::Controversial => b
            .engagement()
            .cmp(&a.engagement())
            .then_with(|| balance(b).cmp(&balance(a))),
    };
    primary.then_with(|| a.comment.path.cmp(&b.comment.path))
}

// 少数派の票数。大きいほど賛否が拮抗している
fn balance(row: &CommentRow) -> u32 {
    row.upvotes.min(row.downvotes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Comment;
    use crate::domain::value_objects::UserId;
    use chrono::Duration;

    fn author() -> UserId {
        UserId::new("tester").unwrap()
    }

    fn row(comment: Comment, upvotes: u32, downvotes: u32) -> CommentRow {
        CommentRow {
            wilson_score: crate::domain::scoring::wilson_score(upvotes, downvotes),
            comment,
            upvotes,
            downvotes,
        }
    }

    fn reply(parent: &Comment) -> Comment {
        Comment::new_reply(parent, author(), "reply".into())
    }

    #[test]
    fn builds_nested_tree_and_counts_replies() {
        let thread = ContentId::random();
        let a = Comment::new_root(thread.clone(), author(), "a".into());
        let b = reply(&a);
        let c = reply(&b);
        let d = reply(&a);
        let e = Comment::new_root(thread, author(), "e".into());

        let rows = vec![
            row(c.clone(), 0, 0),
            row(a.clone(), 5, 0),
            row(e.clone(), 1, 0),
            row(d.clone(), 0, 3),
            row(b.clone(), 4, 1),
        ];
        let tree = build_tree(rows, CommentSort::Best);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id(), &a.id);
        assert_eq!(tree[0].reply_count, 2);
        assert_eq!(tree[0].descendant_count(), 3);
        assert_eq!(tree[0].replies[0].id(), &b.id);
        assert_eq!(tree[0].replies[0].replies[0].id(), &c.id);
        assert_eq!(tree[0].replies[1].id(), &d.id);
        assert_eq!(tree[1].id(), &e.id);
    }

    #[test]
    fn flatten_round_trips_parent_and_depth() {
        let thread = ContentId::random();
        let mut comments = vec![Comment::new_root(thread.clone(), author(), "r".into())];
        // 親を順に選んで深さ 10 までの鎖と枝を作る
        for i in 0..25usize {
            let parent = comments[i / 2].clone();
            if parent.depth() < 10 {
                comments.push(reply(&parent));
            }
        }
        comments.push(Comment::new_root(thread, author(), "r2".into()));

        let rows: Vec<CommentRow> = comments.iter().cloned().map(|c| row(c, 1, 1)).collect();
        let tree = build_tree(rows, CommentSort::New);
        let flat = flatten(&tree);

        assert_eq!(flat.len(), comments.len());
        let originals: HashMap<_, _> = comments.iter().map(|c| (c.id.clone(), c)).collect();
        for row in flat {
            let original = originals[&row.comment.id];
            assert_eq!(row.comment.parent_id, original.parent_id);
            assert_eq!(row.comment.depth(), original.depth());
        }
    }

    #[test]
    fn rows_without_parent_in_set_become_roots() {
        let thread = ContentId::random();
        let a = Comment::new_root(thread, author(), "a".into());
        let b = reply(&a);
        let c = reply(&b);

        let tree = build_tree(vec![row(b.clone(), 0, 0), row(c.clone(), 0, 0)], CommentSort::Best);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id(), &b.id);
        assert_eq!(tree[0].replies[0].id(), &c.id);
    }

    #[test]
    fn sorts_children_by_strategy() {
        let thread = ContentId::random();
        let root = Comment::new_root(thread, author(), "root".into());
        let mut old = reply(&root);
        old.created_at = root.created_at + Duration::minutes(1);
        let mut fresh = reply(&root);
        fresh.created_at = root.created_at + Duration::minutes(5);
        let mut split = reply(&root);
        split.created_at = root.created_at + Duration::minutes(3);

        let rows = vec![
            row(root.clone(), 0, 0),
            row(old.clone(), 20, 0),
            row(fresh.clone(), 1, 0),
            row(split.clone(), 15, 15),
        ];

        let best = build_tree(rows.clone(), CommentSort::Best);
        let ids: Vec<_> = best[0].replies.iter().map(|n| n.id().clone()).collect();
        assert_eq!(ids[0], old.id);

        let new = build_tree(rows.clone(), CommentSort::New);
        let ids: Vec<_> = new[0].replies.iter().map(|n| n.id().clone()).collect();
        assert_eq!(ids, vec![fresh.id.clone(), split.id.clone(), old.id.clone()]);

        let controversial = build_tree(rows, CommentSort::Controversial);
        let ids: Vec<_> = controversial[0]
            .replies
            .iter()
            .map(|n| n.id().clone())
            .collect();
        assert_eq!(ids, vec![split.id, old.id, fresh.id]);
    }

    #[test]
    fn empty_input_yields_empty_forest() {
        assert!(build_tree(Vec::new(), CommentSort::Best).is_empty());
    }

    #[test]
    fn pruning_drops_only_dead_branches() {
        let thread = ContentId::random();
        let root = Comment::new_root(thread.clone(), author(), "root".into());
        let mut dead = reply(&root);
        let mut dead_child = reply(&dead);
        let live = reply(&root);
        let mut tombstone_parent = reply(&root);
        let survivor = reply(&tombstone_parent);
        let mut removed_root = Comment::new_root(thread, author(), "gone".into());
        for comment in [&mut dead, &mut dead_child, &mut tombstone_parent, &mut removed_root] {
            comment.tombstone();
        }

        let rows = [&root, &dead, &dead_child, &live, &tombstone_parent, &survivor, &removed_root]
            .into_iter()
            .map(|comment| row(comment.clone(), 0, 0))
            .collect();
        let pruned = prune_removed(build_tree(rows, CommentSort::Best));

        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].id(), &root.id);
        assert_eq!(pruned[0].reply_count, 2);
        let kept: Vec<_> = flatten(&pruned).iter().map(|r| r.comment.id.clone()).collect();
        assert!(kept.contains(&tombstone_parent.id));
        assert!(kept.contains(&survivor.id));
        assert!(!kept.contains(&dead.id) && !kept.contains(&dead_child.id));
    }
}
