//! Demonstration binary: runs a bounded experiment end to end and prints the
//! computed metric catalog.

use anyhow::{Context, Result};
use clap::Parser;

use chatbench::experiment::{run_bounded, BoundedExperimentConfig};
use chatbench::models::Experiment;
use chatbench::prompt::generate_prompts;
use chatbench::signing::{Signer, SigningMode};
use chatbench::store::Store;
use chatbench::tracing_init::init_tracing;
use chatbench::write_queue::WriteQueue;

#[derive(Parser, Debug)]
#[command(name = "run-bounded")]
#[command(about = "Run a fixed number of streaming chat-completion requests and print metrics")]
struct Args {
    /// Target OpenAI-compatible base URL.
    #[arg(long)]
    endpoint: String,

    /// Model name sent in each request.
    #[arg(long)]
    model: String,

    /// Path to the SQLite store (created if absent).
    #[arg(long, default_value = "chatbench.db")]
    db_path: String,

    #[arg(long, default_value_t = 8)]
    num_runners: usize,

    #[arg(long, default_value_t = 50)]
    num_tasks: usize,

    #[arg(long, default_value_t = 256)]
    max_tokens: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value = "bounded-run")]
    experiment_name: String,

    #[arg(long)]
    no_sign: bool,

    #[arg(long)]
    old_sign: bool,

    #[arg(long)]
    account_address: Option<String>,

    #[arg(long)]
    private_key_hex: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let signer = if args.no_sign {
        None
    } else {
        let key_hex = args
            .private_key_hex
            .as_deref()
            .context("--private-key-hex is required unless --no-sign is passed")?;
        let mode = if args.old_sign {
            SigningMode::Legacy
        } else {
            SigningMode::Current
        };
        Some(Signer::from_private_key_hex(key_hex, mode).context("invalid signing key")?)
    };

    let store = Store::open(&args.db_path).context("failed to open store")?;
    let experiment = Experiment::new(&args.experiment_name, None);
    let experiment_id = store
        .create_experiment(&experiment)
        .context("failed to create experiment")?;

    let write_handle = WriteQueue::spawn(store.path().to_path_buf(), 2);
    let write_queue = write_handle.queue();

    let prompts = generate_prompts(args.num_tasks.max(1), 200, args.seed);

    let config = BoundedExperimentConfig {
        experiment_id,
        endpoint: args.endpoint,
        model: args.model,
        num_runners: args.num_runners,
        num_tasks: args.num_tasks,
        max_tokens: args.max_tokens,
        seed: args.seed,
        prompts,
        signer,
        account_address: args.account_address.unwrap_or_default(),
        api_key: None,
        no_sign: args.no_sign,
        old_sign: args.old_sign,
    };

    let metrics = run_bounded(config, &store, &write_queue)
        .await
        .context("bounded experiment failed")?;
    write_handle.stop().await;

    for (name, value) in metrics.iter() {
        println!("{name} = {value}");
    }

    Ok(())
}
