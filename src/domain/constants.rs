/// コメントのネスト上限（ルートは深さ 0）
pub const MAX_COMMENT_DEPTH: u32 = 10;
/// コメント本文の最大文字数
pub const MAX_COMMENT_LENGTH: usize = 10_000;
/// ソフト削除後の本文
pub const REMOVED_COMMENT_PLACEHOLDER: &str = "[deleted]";
/// 論争度スコアを算出する最小投票数の既定値
pub const DEFAULT_CONTROVERSY_MIN_VOTES: u32 = 5;
/// ホット一覧に載せる最小ホットスコアの既定値
pub const DEFAULT_MIN_HOT_SCORE: f64 = 1.0;
