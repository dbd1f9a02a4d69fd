use clap::Parser;
use client::input::Answers;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Name to register with; asked interactively when omitted
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Fixed answer for every prompt, repeat to cycle through several.
    /// Without any, answers are read from standard input.
    #[arg(short = 'a', long)]
    answer: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let mut answers = if args.answer.is_empty() {
        Answers::interactive(args.name)
    } else {
        Answers::fixed(args.name, args.answer)
    };

    let mut client = Client::connect(&args.server).await?;
    client.run(&mut answers).await;

    println!("The connection has been closed");
    Ok(())
}
