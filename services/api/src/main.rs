use incentives_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("incentives worker error: {err}");
        std::process::exit(1);
    }
}
