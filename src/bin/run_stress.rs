//! Demonstration binary: runs the continuous stress mode until `Ctrl-C`,
//! printing each window's summary line as it is computed.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use chatbench::models::Experiment;
use chatbench::prompt::generate_prompts;
use chatbench::signing::{Signer, SigningMode};
use chatbench::store::Store;
use chatbench::stress::{run_stress, StopSignal, StressConfig};
use chatbench::tracing_init::init_tracing;
use chatbench::write_queue::WriteQueue;

#[derive(Parser, Debug)]
#[command(name = "run-stress")]
#[command(about = "Run continuous load against a streaming chat-completion endpoint")]
struct Args {
    #[arg(long)]
    endpoint: String,

    #[arg(long)]
    model: String,

    #[arg(long, default_value = "chatbench.db")]
    db_path: String,

    #[arg(long, default_value_t = 8)]
    num_runners: usize,

    #[arg(long, default_value_t = 256)]
    max_tokens: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 5.0)]
    report_freq_min: f64,

    #[arg(long, default_value = "stress-run")]
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

    let prompts = generate_prompts(200, 200, args.seed);
    let stop = StopSignal::new();
    let ctrlc_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt; draining and stopping");
            ctrlc_stop.request_stop();
        }
    });

    let config = StressConfig {
        experiment_id,
        endpoint: args.endpoint,
        model: args.model,
        num_runners: args.num_runners,
        max_tokens: args.max_tokens,
        seed: args.seed,
        prompts,
        signer,
        account_address: args.account_address.unwrap_or_default(),
        api_key: None,
        report_freq_min: args.report_freq_min,
    };

    run_stress(config, &store, write_queue, stop)
        .await
        .context("stress run failed")?;
    write_handle.stop().await;

    Ok(())
}
