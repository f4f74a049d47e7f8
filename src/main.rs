use ragbot::api;
use ragbot::commands::CommandHandler;
use ragbot::config::Settings;
use ragbot::database::VectorDB;
use ragbot::embedding::MiniLmEmbedder;
use ragbot::providers::CohereProvider;
use ragbot::qa::QaEngine;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run the HTTP API server instead of the interactive CLI
    #[arg(long)]
    api: bool,

    #[arg(long, default_value = "3000")]
    port: u16,

    /// PDF to extract and index on startup
    #[arg(long)]
    document: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    colored::control::set_override(true);

    // Load environment variables
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::from_env()?;
    let engine = build_engine(&settings).await?;

    if args.api {
        run_api_server(args, engine).await
    } else {
        run_cli_mode(args, engine).await
    }
}

async fn build_engine(
    settings: &Settings,
) -> Result<QaEngine, Box<dyn std::error::Error + Send + Sync>> {
    let embedder = MiniLmEmbedder::new()?;

    let vector_db = VectorDB::connect(&settings.qdrant_url).await?;

    let provider = CohereProvider::new(
        settings.cohere_api_key.clone(),
        settings.cohere_model.clone(),
    );

    Ok(QaEngine::new(
        Arc::new(embedder),
        Arc::new(vector_db),
        Arc::new(provider),
        settings.collection.clone(),
        settings.top_k,
    ))
}

async fn run_cli_mode(
    args: Args,
    engine: QaEngine,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut command_handler = CommandHandler::new(engine);

    if let Some(path) = &args.document {
        if let Err(e) = command_handler.load_document(path).await {
            println!("{}", e.red());
        }
    }

    command_handler.handle_command("help").await?;

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("👤 ") {
            Ok(line) => {
                let input = line.trim();
                rl.add_history_entry(input);

                if let Err(e) = command_handler.handle_command(input).await {
                    println!("{}", e.red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn run_api_server(
    args: Args,
    engine: QaEngine,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;

    let app = api::create_api(engine);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    log::info!("API server listening on {}", addr);
    println!("Server running on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}
