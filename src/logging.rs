use tracing_subscriber::fmt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// フィルタを構築: 有効な `RUST_LOG` があればそれ、なければ `level`、最後に `info`
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// stderr へ出力する `fmt` サブスクライバーを登録
///
/// 既に登録済みなら `false` を返す (2 回目以降の呼び出しは何もしない)。
pub fn init(level: &str) -> bool {
    fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_timer(fmt::time::Uptime::default())
        .with_writer(std::io::stderr)
        .finish()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_noop() {
        init("debug");
        assert!(!init("info"));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // panic しないこと
        let _ = env_filter("not a [valid directive");
    }
}
