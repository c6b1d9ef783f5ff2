use tracing_subscriber::EnvFilter;

const BANNER_WIDTH: usize = 72;
const KEY_WIDTH: usize = 16;
const LOG_ENV: &str = "ARGONBENCH_LOG";

/// Installs the global fmt subscriber. Diagnostics go to stderr so stdout
/// carries only benchmark results.
pub(crate) fn init_logging() {
    let filter = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(crate) fn startup_banner(title: &str, lines: &[(&str, String)]) {
    let border = "=".repeat(BANNER_WIDTH);
    eprintln!();
    eprintln!("{border}");
    eprintln!("{:^width$}", title, width = BANNER_WIDTH);
    eprintln!("{border}");
    for (key, value) in lines {
        eprintln!(
            "  {:<key_width$} {}",
            format!("{key}:"),
            value,
            key_width = KEY_WIDTH
        );
    }
    eprintln!("{border}");
    eprintln!();
}

pub(crate) fn info(tag: &str, message: impl AsRef<str>) {
    tracing::info!("{} {}", prefix(tag), message.as_ref());
}

pub(crate) fn warn(tag: &str, message: impl AsRef<str>) {
    tracing::warn!("{} {}", prefix(tag), message.as_ref());
}

pub(crate) fn error(tag: &str, message: impl AsRef<str>) {
    tracing::error!("{} {}", prefix(tag), message.as_ref());
}

fn prefix(tag: &str) -> String {
    format!("[{tag:<8}]")
}
