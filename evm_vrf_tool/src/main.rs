use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use evm_vrf::{Address, SecretKey, evm::parse_word_hex};
use evm_vrf_tool::{
    GenerateConfig, default_workers, generate,
    keyfile::{read_key_file, write_key_file},
    verify,
};
use std::{fs::File, io::BufWriter, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Generate VRF keys and batches of proofs, and check them.
#[derive(Parser)]
#[command(name = "vrf-tool", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new VRF key and write it to a key file
    GenVrfKey(GenVrfKeyArgs),
    /// Prove a range of request nonces and write the proofs to a CSV file
    GenVrfNumbers(GenVrfNumbersArgs),
    /// Check every proof in a CSV file written by gen-vrf-numbers
    VerifyVrfProofs(VerifyVrfProofsArgs),
}

#[derive(Args)]
struct GenVrfKeyArgs {
    /// Where to write the key file
    #[arg(long, env = "VRF_KEY_FILE", default_value = "vrf_key.json")]
    output: PathBuf,

    /// Overwrite an existing key file
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct GenVrfNumbersArgs {
    /// Key file written by gen-vrf-key
    #[arg(long, env = "VRF_KEY_FILE", default_value = "vrf_key.json")]
    key_file: PathBuf,

    /// Where to write the proofs
    #[arg(long, env = "VRF_PROOFS_FILE", default_value = "vrf_proofs.csv")]
    output: PathBuf,

    /// How many nonces to prove, starting at 1
    #[arg(long, default_value_t = 100)]
    num_proofs: u64,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long, env = "VRF_WORKERS")]
    workers: Option<usize>,

    /// Address of the requesting consumer
    #[arg(long, default_value = "0x0000000000000000000000000000000000000000")]
    sender: Address,

    /// Subscription id of the requests
    #[arg(long, default_value_t = 1)]
    sub_id: u64,

    /// Hash of the block the requests landed in
    #[arg(
        long,
        value_parser = parse_block_hash,
        default_value = "0x0000000000000000000000000000000000000000000000000000000000000000"
    )]
    block_hash: [u8; 32],

    /// Number of the block the requests landed in
    #[arg(long, default_value_t = 0)]
    block_num: u64,

    /// Callback gas limit of the requests
    #[arg(long, default_value_t = 100_000)]
    cb_gas_limit: u32,

    /// Number of random words per request
    #[arg(long, default_value_t = 1)]
    num_words: u32,
}

#[derive(Args)]
struct VerifyVrfProofsArgs {
    /// CSV file written by gen-vrf-numbers
    #[arg(long, env = "VRF_PROOFS_FILE", default_value = "vrf_proofs.csv")]
    input: PathBuf,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long, env = "VRF_WORKERS")]
    workers: Option<usize>,
}

fn parse_block_hash(s: &str) -> Result<[u8; 32], String> {
    parse_word_hex(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vrf_tool=info,evm_vrf_tool=info,evm_vrf=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping workers");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Command::GenVrfKey(args) => {
            let key = SecretKey::random(&mut rand::thread_rng());
            let key_file = write_key_file(&args.output, &key, args.force)?;
            info!(
                public_key = %key_file.public_key,
                key_hash = %key_file.key_hash,
                path = %args.output.display(),
                "wrote key"
            );
            println!("publicKey: {}", key_file.public_key);
            println!("keyHash: {}", key_file.key_hash);
        }
        Command::GenVrfNumbers(args) => {
            let key = read_key_file(&args.key_file)?;
            let out = File::create(&args.output)
                .with_context(|| format!("creating {}", args.output.display()))?;
            let config = GenerateConfig {
                num_proofs: args.num_proofs,
                workers: args.workers.unwrap_or_else(default_workers),
                sender: args.sender,
                sub_id: args.sub_id,
                block_hash: args.block_hash,
                block_num: args.block_num,
                callback_gas_limit: args.cb_gas_limit,
                num_words: args.num_words,
            };
            let written = generate(key, config, BufWriter::new(out), cancel).await?;
            println!("wrote {written} proofs to {}", args.output.display());
        }
        Command::VerifyVrfProofs(args) => {
            let input = File::open(&args.input)
                .with_context(|| format!("opening {}", args.input.display()))?;
            let workers = args.workers.unwrap_or_else(default_workers);
            let num_valid = verify(input, workers, cancel).await?;
            println!("numValid: {num_valid}");
        }
    }
    Ok(())
}
