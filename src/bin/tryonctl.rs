use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tryon_proxy::runninghub::types::TaskOutput;
use tryon_proxy::{Asset, Config, Generator, RunningHubClient};

#[derive(Parser, Debug)]
#[command(name = "tryonctl", about = "CLI for the try-on generation client", version)]
struct Cli {
    /// Override API_URL (job submission endpoint)
    #[arg(global = true, long)]
    api_url: Option<String>,

    /// Log at debug level (payloads are redacted)
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload both images, run the workflow and print the result URL
    Generate {
        /// Subject photo
        #[arg(long, value_name = "PATH")]
        model: PathBuf,
        /// Clothing photo
        #[arg(long, value_name = "PATH")]
        clothing: PathBuf,
    },
    /// Show account quota status
    Account {
        /// Output raw JSON instead of pretty lines
        #[arg(long)]
        json: bool,
    },
    /// Query a task's status
    Status {
        #[arg(long)]
        task_id: String,
    },
    /// Fetch a finished task's outputs
    Outputs {
        #[arg(long)]
        task_id: String,
    },
    /// Upload one image and print the asset reference
    Upload {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load env and parse CLI
    Config::dotenv_load();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut conf = Config::new()?;
    if let Some(url) = cli.api_url {
        conf.api_url = url;
    }
    let client = RunningHubClient::new(conf)?;

    match cli.command {
        Commands::Generate { model, clothing } => {
            let model = Asset::from_path(&model).await?;
            let clothing = Asset::from_path(&clothing).await?;
            let generator = Generator::new(client);
            let mut progress = generator.subscribe();
            let watcher = tokio::spawn(async move {
                while progress.changed().await.is_ok() {
                    let p = *progress.borrow();
                    eprint!("\rProgress: {:>3}/{}", p.value, p.max);
                }
            });
            let result = generator.generate(model, clothing).await;
            drop(generator);
            let _ = watcher.await;
            eprintln!();
            match result {
                Ok(generated) => {
                    println!("{}", generated.image_url);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Account { json } => {
            let status = client.account_status().await?;
            if json {
                println!("{}", serde_json::to_string(&status)?);
            } else {
                println!("currentTaskCounts: {}", status.current_task_counts);
                println!("remainCoins: {}", status.remain_coins.as_deref().unwrap_or("-"));
                println!("remainMoney: {} {}", status.remain_money.as_deref().unwrap_or("-"), status.currency.as_deref().unwrap_or(""));
                println!("apiType: {}", status.api_type.as_deref().unwrap_or("-"));
            }
            Ok(())
        }
        Commands::Status { task_id } => {
            let status = client.check_task_status(&task_id).await?;
            println!("{}", status);
            Ok(())
        }
        Commands::Outputs { task_id } => {
            match client.task_outputs(&task_id).await? {
                TaskOutput::Url(url) => println!("{}", url),
                TaskOutput::Descriptor(v) => println!("{}", serde_json::to_string_pretty(&v)?),
            }
            Ok(())
        }
        Commands::Upload { path } => {
            let asset = Asset::from_path(&path).await?;
            let reference = client.upload_asset(&asset).await;
            println!("{}", reference);
            Ok(())
        }
    }
}
