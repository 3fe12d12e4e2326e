use clap::Parser;

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = nestegg::api::Cli::parse();
    if let Err(e) = nestegg::api::run_cli(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
