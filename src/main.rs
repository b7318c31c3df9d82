use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    crony::boot::boot().await
}
