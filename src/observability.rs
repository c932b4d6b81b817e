use tracing_subscriber::EnvFilter;

pub fn init_tracing(debug: bool) {
    let default = if debug {
        "debug,hyper=info,reqwest=info"
    } else {
        "info,axum=info,reqwest=warn"
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}
