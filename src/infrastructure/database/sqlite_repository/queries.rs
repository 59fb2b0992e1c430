// content_aggregates

pub(super) const INSERT_AGGREGATE: &str = r#"
    INSERT INTO content_aggregates (
        content_type,
        content_id,
        upvotes,
        downvotes,
        hot_score,
        wilson_score,
        controversy_score,
        created_at,
        last_activity_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#;

pub(super) const SELECT_AGGREGATE: &str = r#"
    SELECT content_type, content_id, upvotes, downvotes, hot_score, wilson_score,
           controversy_score, created_at, last_activity_at
    FROM content_aggregates
    WHERE content_type = ?1 AND content_id = ?2
"#;

/// 書き込みロックを先に確保するための no-op 更新
pub(super) const TOUCH_AGGREGATE: &str = r#"
    UPDATE content_aggregates
    SET upvotes = upvotes
    WHERE content_type = ?1 AND content_id = ?2
"#;

/// 計算元の counters が変わっていない場合のみ更新する
pub(super) const UPDATE_AGGREGATE_SCORES: &str = r#"
    UPDATE content_aggregates
    SET hot_score = ?3,
        wilson_score = ?4,
        controversy_score = ?5
    WHERE content_type = ?1 AND content_id = ?2
      AND upvotes = ?6 AND downvotes = ?7
"#;

pub(super) const APPLY_VOTE_DELTA: &str = r#"
    UPDATE content_aggregates
    SET upvotes = upvotes + ?3,
        downvotes = downvotes + ?4,
        last_activity_at = ?5
    WHERE content_type = ?1 AND content_id = ?2
"#;

pub(super) const RECONCILE_AGGREGATE_COUNTS: &str = r#"
    UPDATE content_aggregates
    SET upvotes = (
            SELECT COUNT(*) FROM votes v
            WHERE v.content_type = content_aggregates.content_type
              AND v.content_id = content_aggregates.content_id
              AND v.vote_type = 'up'
        ),
        downvotes = (
            SELECT COUNT(*) FROM votes v
            WHERE v.content_type = content_aggregates.content_type
              AND v.content_id = content_aggregates.content_id
              AND v.vote_type = 'down'
        )
    WHERE content_type = ?1 AND content_id = ?2
"#;

pub(super) const SELECT_RECENTLY_ACTIVE_AGGREGATES: &str = r#"
    SELECT content_type, content_id, upvotes, downvotes, hot_score, wilson_score,
           controversy_score, created_at, last_activity_at
    FROM content_aggregates
    WHERE last_activity_at >= ?1
    ORDER BY last_activity_at DESC
    LIMIT ?2
"#;

pub(super) const SELECT_MOST_UPVOTED: &str = r#"
    SELECT content_type, content_id, upvotes, downvotes, hot_score, wilson_score,
           controversy_score, created_at, last_activity_at
    FROM content_aggregates
    WHERE content_type = ?1
      AND (?2 IS NULL OR created_at >= ?2)
    ORDER BY (upvotes - downvotes) DESC, upvotes DESC, created_at DESC
    LIMIT ?3 OFFSET ?4
"#;

pub(super) const SELECT_CONTROVERSIAL: &str = r#"
    SELECT content_type, content_id, upvotes, downvotes, hot_score, wilson_score,
           controversy_score, created_at, last_activity_at
    FROM content_aggregates
    WHERE content_type = ?1
      AND (?2 IS NULL OR created_at >= ?2)
      AND (upvotes + downvotes) > 0
      AND (upvotes + downvotes) >= ?3
    ORDER BY MIN(upvotes, downvotes) DESC, (upvotes + downvotes) DESC, created_at DESC
    LIMIT ?4 OFFSET ?5
"#;

pub(super) const SELECT_HOT: &str = r#"
    SELECT content_type, content_id, upvotes, downvotes, hot_score, wilson_score,
           controversy_score, created_at, last_activity_at
    FROM content_aggregates
    WHERE content_type = ?1
      AND (?2 IS NULL OR created_at >= ?2)
      AND hot_score >= ?3
    ORDER BY hot_score DESC, created_at DESC
    LIMIT ?4 OFFSET ?5
"#;

// votes

pub(super) const SELECT_VOTE: &str = r#"
    SELECT voter_id, content_type, content_id, vote_type, created_at, updated_at
    FROM votes
    WHERE voter_id = ?1 AND content_type = ?2 AND content_id = ?3
"#;

pub(super) const INSERT_VOTE: &str = r#"
    INSERT INTO votes (voter_id, content_type, content_id, vote_type, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
"#;

pub(super) const UPDATE_VOTE_TYPE: &str = r#"
    UPDATE votes
    SET vote_type = ?4,
        updated_at = ?5
    WHERE voter_id = ?1 AND content_type = ?2 AND content_id = ?3
"#;

pub(super) const DELETE_VOTE: &str = r#"
    DELETE FROM votes
    WHERE voter_id = ?1 AND content_type = ?2 AND content_id = ?3
"#;

pub(super) const SELECT_USER_VOTES: &str = r#"
    SELECT voter_id, content_type, content_id, vote_type, created_at, updated_at
    FROM votes
    WHERE voter_id = ?1
      AND (?2 IS NULL OR content_type = ?2)
    ORDER BY updated_at DESC, rowid DESC
    LIMIT ?3 OFFSET ?4
"#;

pub(super) const SELECT_CONTENT_VOTES_SINCE: &str = r#"
    SELECT voter_id, content_type, content_id, vote_type, created_at, updated_at
    FROM votes
    WHERE content_type = ?1 AND content_id = ?2
      AND created_at >= ?3
    ORDER BY created_at ASC, rowid ASC
"#;

// comments

pub(super) const SELECT_COMMENT_BY_ID: &str = r#"
    SELECT id, thread_id, parent_id, author_id, path, depth, content, is_removed,
           created_at, updated_at
    FROM comments
    WHERE id = ?1
"#;

pub(super) const SELECT_COMMENTS_BY_IDS_PREFIX: &str = r#"
    SELECT id, thread_id, parent_id, author_id, path, depth, content, is_removed,
           created_at, updated_at
    FROM comments
    WHERE id IN ("#;

pub(super) const SELECT_COMMENT_THREAD_ID: &str = r#"
    SELECT thread_id FROM comments WHERE id = ?1
"#;

pub(super) const TOUCH_COMMENT: &str = r#"
    UPDATE comments SET id = id WHERE id = ?1
"#;

/// 削除されていない親の行をロックする
pub(super) const TOUCH_LIVE_COMMENT: &str = r#"
    UPDATE comments
    SET id = id
    WHERE id = ?1 AND is_removed = 0
"#;

pub(super) const INSERT_COMMENT: &str = r#"
    INSERT INTO comments (
        id, thread_id, parent_id, author_id, path, depth, content, is_removed,
        created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
"#;

pub(super) const SELECT_IDEMPOTENT_COMMENT_ID: &str = r#"
    SELECT comment_id FROM comment_idempotency_keys WHERE idempotency_key = ?1
"#;

pub(super) const INSERT_IDEMPOTENCY_KEY: &str = r#"
    INSERT INTO comment_idempotency_keys (idempotency_key, comment_id, created_at)
    VALUES (?1, ?2, ?3)
"#;

pub(super) const SELECT_THREAD_COMMENT_ROWS: &str = r#"
    SELECT c.id, c.thread_id, c.parent_id, c.author_id, c.path, c.depth, c.content,
           c.is_removed, c.created_at, c.updated_at,
           COALESCE(a.upvotes, 0) AS upvotes,
           COALESCE(a.downvotes, 0) AS downvotes,
           COALESCE(a.wilson_score, 0.0) AS wilson_score
    FROM comments c
    LEFT JOIN content_aggregates a
      ON a.content_type = 'comment' AND a.content_id = c.id
    WHERE c.thread_id = ?1 AND c.depth <= ?2
    ORDER BY c.path
    LIMIT ?3
"#;

pub(super) const SELECT_SUBTREE_COMMENT_ROWS: &str = r#"
    SELECT c.id, c.thread_id, c.parent_id, c.author_id, c.path, c.depth, c.content,
           c.is_removed, c.created_at, c.updated_at,
           COALESCE(a.upvotes, 0) AS upvotes,
           COALESCE(a.downvotes, 0) AS downvotes,
           COALESCE(a.wilson_score, 0.0) AS wilson_score
    FROM comments c
    LEFT JOIN content_aggregates a
      ON a.content_type = 'comment' AND a.content_id = c.id
    WHERE c.thread_id = ?1
      AND (c.path = ?2 OR c.path LIKE ?3)
      AND c.depth <= ?4
    ORDER BY c.path
"#;

pub(super) const UPDATE_COMMENT_CONTENT: &str = r#"
    UPDATE comments
    SET content = ?2,
        updated_at = ?3
    WHERE id = ?1 AND is_removed = 0
"#;

pub(super) const SOFT_DELETE_COMMENT: &str = r#"
    UPDATE comments
    SET is_removed = 1,
        content = ?2,
        updated_at = ?3
    WHERE id = ?1
"#;

pub(super) const COUNT_CHILD_COMMENTS: &str = r#"
    SELECT COUNT(*) FROM comments WHERE parent_id = ?1
"#;

pub(super) const DELETE_SUBTREE_VOTES: &str = r#"
    DELETE FROM votes
    WHERE content_type = 'comment'
      AND content_id IN (SELECT id FROM comments WHERE path = ?1 OR path LIKE ?2)
"#;

pub(super) const DELETE_SUBTREE_AGGREGATES: &str = r#"
    DELETE FROM content_aggregates
    WHERE content_type = 'comment'
      AND content_id IN (SELECT id FROM comments WHERE path = ?1 OR path LIKE ?2)
"#;

pub(super) const DELETE_SUBTREE_IDEMPOTENCY_KEYS: &str = r#"
    DELETE FROM comment_idempotency_keys
    WHERE comment_id IN (SELECT id FROM comments WHERE path = ?1 OR path LIKE ?2)
"#;

pub(super) const DELETE_SUBTREE_COMMENTS: &str = r#"
    DELETE FROM comments WHERE path = ?1 OR path LIKE ?2
"#;

pub(super) const SELECT_COMMENT_STATS: &str = r#"
    SELECT COALESCE(a.upvotes, 0) AS upvotes,
           COALESCE(a.downvotes, 0) AS downvotes,
           COALESCE(a.wilson_score, 0.0) AS wilson_score,
           (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id) AS reply_count,
           (SELECT COUNT(*) FROM comments d WHERE d.path LIKE c.path || '.%') AS total_descendants
    FROM comments c
    LEFT JOIN content_aggregates a
      ON a.content_type = 'comment' AND a.content_id = c.id
    WHERE c.id = ?1
"#;

// trust_profiles

pub(super) const SELECT_TRUST_PROFILE: &str = r#"
    SELECT user_id, flags, trust_score, bot_score, is_bot, last_evaluated
    FROM trust_profiles
    WHERE user_id = ?1
"#;

/// 行の有無に関わらず書き込みトランザクションを開始する
pub(super) const TOUCH_TRUST_PROFILE: &str = r#"
    UPDATE trust_profiles SET flags = flags WHERE user_id = ?1
"#;

pub(super) const UPSERT_TRUST_PROFILE: &str = r#"
    INSERT INTO trust_profiles (user_id, flags, trust_score, bot_score, is_bot, last_evaluated)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(user_id) DO UPDATE SET
        flags = excluded.flags,
        trust_score = excluded.trust_score,
        bot_score = excluded.bot_score,
        is_bot = excluded.is_bot,
        last_evaluated = excluded.last_evaluated
"#;

// xp

pub(super) const ENSURE_XP_STATE: &str = r#"
    INSERT INTO xp_states (user_id, xp, level, updated_at)
    VALUES (?1, 0, 1, ?2)
    ON CONFLICT(user_id) DO NOTHING
"#;

pub(super) const SELECT_XP_STATE: &str = r#"
    SELECT user_id, xp, level FROM xp_states WHERE user_id = ?1
"#;

pub(super) const SELECT_XP_STATES_BY_LEVEL: &str = r#"
    SELECT user_id, xp, level
    FROM xp_states
    WHERE level = ?1
    ORDER BY xp DESC, user_id ASC
    LIMIT ?2 OFFSET ?3
"#;

pub(super) const UPDATE_XP_STATE: &str = r#"
    UPDATE xp_states
    SET xp = ?2,
        level = ?3,
        updated_at = ?4
    WHERE user_id = ?1
"#;

pub(super) const INSERT_XP_TRANSACTION: &str = r#"
    INSERT INTO xp_transactions (id, user_id, amount, reason, source_type, source_id, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;

pub(super) const SELECT_XP_TRANSACTIONS: &str = r#"
    SELECT id, user_id, amount, reason, source_type, source_id, created_at
    FROM xp_transactions
    WHERE user_id = ?1
    ORDER BY created_at DESC, rowid DESC
    LIMIT ?2 OFFSET ?3
"#;
