//! Worker pools for generating and verifying proofs in bulk.
//!
//! Proving and verifying are CPU bound so each worker is a blocking task. Generation fans rows in
//! over an unbounded channel and is complete when every worker has dropped its sender.
//! Verification hands out rows by bumping a shared index. Both stop early when their
//! [`CancellationToken`] is cancelled.
use crate::row::{HEADER, ProofRow};
use anyhow::{Context, Result, anyhow, bail, ensure};
use evm_vrf::{
    Address, PreSeedDataV2, Proof, RequestSeed, SecretKey, Seed, key::KeyHash, seed::pre_seed_v2,
};
use std::{
    io::{Read, Write},
    ops::RangeInclusive,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The request fields shared by every proof in a generated batch.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Nonces `1..=num_proofs` are proven.
    pub num_proofs: u64,
    /// Size of the worker pool.
    pub workers: usize,
    pub sender: Address,
    pub sub_id: u64,
    pub block_hash: [u8; 32],
    pub block_num: u64,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// One worker per available CPU.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

/// Splits `1..=n` into at most `workers` contiguous ranges whose lengths differ by at most one.
pub fn nonce_ranges(n: u64, workers: usize) -> Vec<RangeInclusive<u64>> {
    let workers = (workers.max(1) as u64).min(n);
    if workers == 0 {
        return vec![];
    }
    let (size, extra) = (n / workers, n % workers);
    let mut start = 1;
    (0..workers)
        .map(|i| {
            let len = size + u64::from(i < extra);
            let range = start..=start + len - 1;
            start += len;
            range
        })
        .collect()
}

fn generate_row(
    key: &SecretKey,
    key_hash: &KeyHash,
    config: &GenerateConfig,
    nonce: u64,
) -> Result<ProofRow> {
    let pre_seed = pre_seed_v2(key_hash, &config.sender, config.sub_id, nonce);
    let request = PreSeedDataV2 {
        pre_seed: Seed::from_big(&pre_seed)
            .with_context(|| format!("pre-seed for nonce {nonce}"))?,
        block_hash: config.block_hash,
        block_num: config.block_num,
        sub_id: config.sub_id,
        callback_gas_limit: config.callback_gas_limit,
        num_words: config.num_words,
        sender: config.sender,
    };
    let proof = key
        .generate_proof(&request.final_seed())
        .with_context(|| format!("proving nonce {nonce}"))?;
    ProofRow::new(key_hash, nonce, &request, &proof)
}

/// Proves nonces `1..=config.num_proofs` for `key` and writes them to `out` as CSV, in no
/// particular order.
///
/// Returns the number of rows written, which is always `num_proofs` on success.
pub async fn generate<W>(
    key: SecretKey,
    config: GenerateConfig,
    out: W,
    cancel: CancellationToken,
) -> Result<u64>
where
    W: Write + Send + 'static,
{
    let key = Arc::new(key);
    let key_hash = key.public_key().key_hash()?;
    let config = Arc::new(config);
    let cancel = cancel.child_token();
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<ProofRow>>();

    let mut workers = JoinSet::new();
    for range in nonce_ranges(config.num_proofs, config.workers) {
        let (key, config, tx, cancel) = (key.clone(), config.clone(), tx.clone(), cancel.clone());
        workers.spawn_blocking(move || {
            debug!(first = range.start(), last = range.end(), "generation worker started");
            for nonce in range {
                if cancel.is_cancelled() {
                    break;
                }
                if tx.send(generate_row(&key, &key_hash, &config, nonce)).is_err() {
                    break;
                }
            }
        });
    }
    // the channel closes once the last worker is done with it
    drop(tx);

    let collector = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || -> Result<u64> {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(out);
            writer.write_record(HEADER)?;
            let mut written = 0;
            while let Some(row) = rx.blocking_recv() {
                let row = row.inspect_err(|_| cancel.cancel())?;
                writer.serialize(&row)?;
                written += 1;
            }
            writer.flush()?;
            Ok(written)
        })
    };

    let written = collector.await.context("collector panicked")?;
    if written.is_err() {
        cancel.cancel();
    }
    while let Some(joined) = workers.join_next().await {
        joined.context("generation worker panicked")?;
    }
    let written = written?;
    if cancel.is_cancelled() {
        bail!("generation cancelled after {written} proofs");
    }
    ensure!(
        written == config.num_proofs,
        "wrote {written} proofs but expected {}",
        config.num_proofs
    );
    info!(written, "generated proofs");
    Ok(written)
}

fn read_proofs<R: Read>(input: R) -> Result<Vec<Proof>> {
    let mut reader = csv::Reader::from_reader(input);
    let header = reader.headers()?;
    ensure!(
        header.iter().eq(HEADER),
        "unexpected CSV header: {}",
        header.iter().collect::<Vec<_>>().join(",")
    );
    reader
        .deserialize::<ProofRow>()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(anyhow::Error::from)
                .and_then(|row| row.to_proof())
                .with_context(|| format!("row {}", i + 1))
        })
        .collect()
}

/// Reads proofs written by [`generate`] and checks every one of them with `workers` workers.
///
/// The first invalid proof stops the run and is returned as the error. Otherwise returns how
/// many proofs were valid, which is all of them.
pub async fn verify<R>(input: R, workers: usize, cancel: CancellationToken) -> Result<usize>
where
    R: Read + Send + 'static,
{
    let proofs = tokio::task::spawn_blocking(move || read_proofs(input))
        .await
        .context("CSV reader panicked")??;
    let total = proofs.len();
    info!(total, workers, "verifying proofs");

    let proofs = Arc::new(proofs);
    let next = Arc::new(AtomicUsize::new(0));
    let valid = Arc::new(AtomicUsize::new(0));
    let cancel = cancel.child_token();

    let mut pool = JoinSet::new();
    for _ in 0..workers.max(1) {
        let (proofs, next, valid, cancel) =
            (proofs.clone(), next.clone(), valid.clone(), cancel.clone());
        pool.spawn_blocking(move || -> Result<()> {
            while !cancel.is_cancelled() {
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(proof) = proofs.get(i) else {
                    break;
                };
                match proof.verify() {
                    Ok(true) => {
                        valid.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(false) => {
                        cancel.cancel();
                        bail!("proof on row {} is invalid", i + 1);
                    }
                    Err(e) => {
                        cancel.cancel();
                        return Err(anyhow!(e).context(format!("verifying row {}", i + 1)));
                    }
                }
            }
            Ok(())
        });
    }

    while let Some(joined) = pool.join_next().await {
        joined.context("verification worker panicked")??;
    }
    if cancel.is_cancelled() {
        bail!("verification cancelled");
    }
    let valid = valid.load(Ordering::SeqCst);
    ensure!(valid == total, "only {valid} of {total} proofs were checked");
    info!(valid, "all proofs valid");
    Ok(valid)
}
