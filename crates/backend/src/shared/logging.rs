use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber. The hosting binary calls this once
/// at startup; repeated calls are no-ops.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sqlx=warn,sea_orm=warn".into()),
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
