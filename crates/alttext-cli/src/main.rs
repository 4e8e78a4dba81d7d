//! Thin entrypoint for the `alttext` operator CLI.

#[tokio::main]
async fn main() {
    let exit_code = alttext_cli::run().await;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
