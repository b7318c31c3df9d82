use std::env;

use crate::{
    app_info::AppInfo,
    config::{SchedulerConfig, WorkerConfig},
};

pub fn print_version_info(app: AppInfo) {
    // Get build information if available
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_timestamp = option_env!("BUILD_TIMESTAMP").unwrap_or("unknown");
    let rustc_version = option_env!("RUSTC_VERSION").unwrap_or("unknown");

    println!("📦 {} v{}", app.name, app.version);

    if !app.description.is_empty() {
        println!("📝 {}", app.description);
    }

    println!();
    println!("🔨 Build Information:");
    println!("  🔗 Git Hash: {git_hash}");
    println!("  ⏰ Build Time: {build_timestamp}");
    println!("  🦀 Rust Version: {rustc_version}");
    println!();

    let scheduler = SchedulerConfig::default();
    let worker = WorkerConfig::default();
    println!("⏱️  Defaults:");
    println!("  📅 Scan interval: {}s", scheduler.tick_interval_seconds);
    println!("  ⌛ Job timeout: {}s", worker.job_timeout_seconds);
    println!("  🔁 Retry ceiling: {}", worker.max_retries);
    println!();

    println!("💻 Runtime Information:");
    println!("  🖥️  OS: {}", env::consts::OS);
    println!("  🏗️  Architecture: {}", env::consts::ARCH);
}
