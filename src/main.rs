use std::{
    fmt::Display,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use datasquare_core::{
    dah::verify_shares,
    square::BlobPlacement,
    tx::{Envelope, WirePayForBlob},
    Blob, DataAvailabilityHeader, ExtendedSquare, Message, Namespace, Share, Square,
    SquareConfig,
};
use ed25519_dalek::SigningKey;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

//==================== CLI ====================//

#[derive(Parser, Debug)]
#[command(name = "dsq", version, about = "Blob data squares: wrap, prepare, extend, verify")]
struct Cli {
    /// TOML square configuration; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an ed25519 key pair as sk.hex / pk.hex.
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Wrap a file as a blob transaction with signed commitments.
    WrapBlob {
        data_file: PathBuf,
        #[arg(long)]
        namespace_hex: String,
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Wrap a file as a plain transaction.
    PlainTx {
        data_file: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build a square from hex transactions, one per line.
    Prepare {
        txs_file: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Erasure code a prepared square and print its roots.
    Extend { prepared: PathBuf },
    /// Check that a message of a prepared square is provably in its data root.
    VerifyBlob {
        prepared: PathBuf,
        #[arg(long)]
        index: usize,
    },
}

//==================== Shared types/helpers ====================//

#[derive(Serialize, Deserialize)]
struct PreparedFile {
    square_size: usize,
    data_root: String,
    square: Square,
    included_txs: Vec<String>,
    messages: Vec<Message>,
    placements: Vec<BlobPlacement>,
    rejected: Vec<RejectedTx>,
}

#[derive(Serialize, Deserialize)]
struct RejectedTx {
    index: usize,
    reason: String,
}

#[derive(Serialize)]
struct ExtendOutput {
    square_size: usize,
    extended_width: usize,
    data_root: String,
    #[serde(flatten)]
    header: DataAvailabilityHeader,
}

fn fail(what: &str, err: impl Display) -> ! {
    eprintln!("error: {what}: {err}");
    std::process::exit(2)
}

fn load_config(path: Option<&Path>) -> SquareConfig {
    match path {
        Some(path) => SquareConfig::load(path).unwrap_or_else(|e| fail("config", e)),
        None => SquareConfig::default(),
    }
}

fn read_all(p: &Path) -> Vec<u8> {
    fs::read(p).unwrap_or_else(|e| fail(&p.display().to_string(), e))
}

fn write_all(p: &Path, bytes: &[u8]) {
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).ok();
    }
    let mut f = fs::File::create(p).unwrap_or_else(|e| fail(&p.display().to_string(), e));
    f.write_all(bytes)
        .unwrap_or_else(|e| fail(&p.display().to_string(), e));
}

fn emit(out: Option<&Path>, text: &str) {
    match out {
        Some(path) => {
            write_all(path, text.as_bytes());
            eprintln!("written → {}", path.display());
        }
        None => println!("{text}"),
    }
}

fn decode_hex_arg(name: &str, value: &str) -> Vec<u8> {
    hex::decode(value.trim()).unwrap_or_else(|e| fail(&format!("invalid {name}"), e))
}

fn parse_sk_hex(sk_hex: &str) -> SigningKey {
    let sk_bytes = decode_hex_arg("sk-hex", sk_hex);
    let Ok(arr) = <[u8; 32]>::try_from(sk_bytes.as_slice()) else {
        fail("sk-hex", "must be 32 bytes (64 hex chars)")
    };
    SigningKey::from_bytes(&arr)
}

fn load_prepared(config: &SquareConfig, path: &Path) -> PreparedFile {
    let raw = read_all(path);
    let mut prepared: PreparedFile =
        serde_json::from_slice(&raw).unwrap_or_else(|e| fail("prepared json", e));
    let size = prepared.square.size();
    let shares = prepared
        .square
        .shares()
        .iter()
        .map(|share| Share::from_bytes(config, share.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| fail("prepared square", e));
    prepared.square = Square::new(size, shares).unwrap_or_else(|e| fail("prepared square", e));
    prepared
}

fn extend_and_header(
    config: &SquareConfig,
    square: &Square,
) -> (ExtendedSquare, DataAvailabilityHeader) {
    let eds = ExtendedSquare::extend(square).unwrap_or_else(|e| fail("extend", e));
    let dah = DataAvailabilityHeader::from_extended(config, &eds)
        .unwrap_or_else(|e| fail("data availability header", e));
    (eds, dah)
}

//==================== Transactions: keygen / wrap-blob / plain-tx ====================//

fn keygen_cmd(out_dir: &Path) {
    fs::create_dir_all(out_dir).unwrap_or_else(|e| fail("out-dir", e));

    let mut sk_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut sk_bytes);
    let sk = SigningKey::from_bytes(&sk_bytes);
    let pk = sk.verifying_key();

    write_all(&out_dir.join("sk.hex"), hex::encode(sk_bytes).as_bytes());
    write_all(&out_dir.join("pk.hex"), hex::encode(pk.as_bytes()).as_bytes());
    println!("keypair written → {}", out_dir.display());
}

fn wrap_blob_cmd(
    config: &SquareConfig,
    data_file: &Path,
    namespace_hex: &str,
    sk_hex: &str,
    out: Option<&Path>,
) {
    let data = read_all(data_file);
    let namespace = Namespace::from_raw(
        &decode_hex_arg("namespace-hex", namespace_hex),
        config.namespace_size,
    )
    .unwrap_or_else(|e| fail("namespace-hex", e));
    if config.reserved().is_reserved(&namespace) {
        fail("namespace-hex", format!("{namespace} is reserved"));
    }
    let sk = parse_sk_hex(sk_hex);

    let blob = Blob::new(namespace, data).unwrap_or_else(|e| fail("blob", e));
    let raw = WirePayForBlob::build(config, &blob, &sk)
        .and_then(|wire| wire.into_raw(config))
        .unwrap_or_else(|e| fail("wrap-blob", e));
    tracing::info!(bytes = blob.len(), tx_bytes = raw.len(), "blob wrapped");
    emit(out, &hex::encode(raw));
}

fn plain_tx_cmd(config: &SquareConfig, data_file: &Path, out: Option<&Path>) {
    let raw = Envelope::Plain(read_all(data_file))
        .encode(config)
        .unwrap_or_else(|e| fail("plain-tx", e));
    emit(out, &hex::encode(raw));
}

//==================== Squares: prepare / extend / verify-blob ====================//

fn prepare_cmd(config: &SquareConfig, txs_file: &Path, out: Option<&Path>) {
    let text = String::from_utf8(read_all(txs_file)).unwrap_or_else(|e| fail("txs file", e));
    let raw_txs: Vec<Vec<u8>> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|(n, line)| decode_hex_arg(&format!("transaction on line {}", n + 1), line))
        .collect();

    let prepared =
        datasquare_core::prepare_square(config, &raw_txs).unwrap_or_else(|e| fail("prepare", e));
    let (_, dah) = extend_and_header(config, &prepared.square);

    let file = PreparedFile {
        square_size: prepared.square_size,
        data_root: hex::encode(dah.hash()),
        square: prepared.square,
        included_txs: prepared.included_txs.iter().map(hex::encode).collect(),
        messages: prepared.messages,
        placements: prepared.placements,
        rejected: prepared
            .rejected
            .into_iter()
            .map(|r| RejectedTx {
                index: r.index,
                reason: r.error.to_string(),
            })
            .collect(),
    };
    eprintln!(
        "prepared {}x{} square: {} txs, {} blobs, {} rejected",
        file.square_size,
        file.square_size,
        file.included_txs.len(),
        file.messages.len(),
        file.rejected.len()
    );
    let json = serde_json::to_string_pretty(&file).unwrap_or_else(|e| fail("json", e));
    emit(out, &json);
}

fn extend_cmd(config: &SquareConfig, prepared: &Path) {
    let prepared = load_prepared(config, prepared);
    let (eds, header) = extend_and_header(config, &prepared.square);
    let data_root = hex::encode(header.hash());
    if data_root != prepared.data_root {
        tracing::warn!(recorded = %prepared.data_root, computed = %data_root, "data root differs");
    }
    let output = ExtendOutput {
        square_size: eds.original_size(),
        extended_width: eds.width(),
        data_root,
        header,
    };
    let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| fail("json", e));
    println!("{json}");
}

fn verify_blob_cmd(config: &SquareConfig, prepared: &Path, index: usize) {
    let prepared = load_prepared(config, prepared);
    let Some(placement) = prepared.placements.get(index) else {
        fail(
            "index",
            format!("square has {} messages", prepared.placements.len()),
        )
    };
    let Some(shares) = prepared
        .square
        .shares()
        .get(placement.start..placement.start + placement.share_count)
    else {
        fail("verify-blob", "placement lies outside the square")
    };
    let (eds, dah) = extend_and_header(config, &prepared.square);
    let data_root = dah.hash();
    if hex::encode(data_root) != prepared.data_root {
        fail("verify-blob", "data root does not match the prepared square");
    }

    let proofs = dah
        .prove_blob(config, &eds, placement)
        .unwrap_or_else(|e| fail("prove", e));
    if !verify_shares(config, data_root, shares, &proofs) {
        fail("verify-blob", "range proof rejected");
    }

    println!(
        "verify-blob: OK (namespace {}, {} shares across {} rows)",
        placement.namespace,
        placement.share_count,
        proofs.len()
    );
}

//==================== main ====================//

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Command::Keygen { out_dir } => keygen_cmd(&out_dir),
        Command::WrapBlob {
            data_file,
            namespace_hex,
            sk_hex,
            out,
        } => wrap_blob_cmd(&config, &data_file, &namespace_hex, &sk_hex, out.as_deref()),
        Command::PlainTx { data_file, out } => plain_tx_cmd(&config, &data_file, out.as_deref()),
        Command::Prepare { txs_file, out } => prepare_cmd(&config, &txs_file, out.as_deref()),
        Command::Extend { prepared } => extend_cmd(&config, &prepared),
        Command::VerifyBlob { prepared, index } => verify_blob_cmd(&config, &prepared, index),
    }
}
