use clap::{Parser, Subcommand};
use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use obscura_core::address::Address;
use obscura_core::block::{Block, BlockBody, BlockHeader, BlockInterlink};
use obscura_core::config::Config;
use obscura_core::node::Node;
use obscura_core::store::MemoryStore;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "obscura")]
#[command(about = "Obscura node CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot an in-memory chain from a fresh genesis and print its state.
    Info,
    /// Boot an in-memory chain and mine `count` blocks in sequence.
    Mine {
        #[arg(default_value_t = 1)]
        count: u32,
    },
}

fn now() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("time went backwards").as_secs() as u32
}

fn demo_miner_keypair() -> Keypair {
    let secret = SecretKey::from_bytes(&[7u8; 32]).unwrap();
    let public = PublicKey::from(&secret);
    Keypair { secret, public }
}

fn genesis_block(config: &Config, miner: Address) -> Block {
    let body = BlockBody { miner_address: miner, transactions: vec![] };
    let accounts_hash = {
        let accounts = obscura_core::accounts::Accounts::new(Arc::new(MemoryStore::new()));
        let mut txn = accounts.begin_transaction().expect("fresh tree has no open transaction");
        let hash = txn.commit_block_body(&body, 0, &config.policy).expect("coinbase-only body always applies");
        txn.abort();
        hash
    };
    let interlink = BlockInterlink::default();
    let header = BlockHeader {
        prev_hash: [0u8; 32],
        interlink_hash: interlink.hash(),
        body_hash: body.hash(),
        accounts_hash,
        n_bits: config.genesis_n_bits,
        height: 0,
        timestamp: 0,
        nonce: 0,
    };
    Block { header, interlink, body: Some(body) }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let keypair = demo_miner_keypair();
    let miner_address = obscura_core::crypto::pubkey_to_address(&keypair.public.to_bytes());

    let mut config = Config::default();
    config.genesis_n_bits = 0x2000_ffff;
    let genesis = genesis_block(&config, miner_address);
    let store = Arc::new(MemoryStore::new());
    let node = Node::new(store, config, genesis, miner_address).expect("genesis always bootstraps a fresh chain");

    match cli.command {
        Commands::Info => {
            println!("head:    {}", hex::encode(node.chain.head_hash()));
            println!("height:  {}", node.chain.height());
            println!("balance: {}", node.chain.balance(&miner_address));
        }
        Commands::Mine { count } => {
            for _ in 0..count {
                match node.miner.mine_one(now()).await {
                    Ok(block) => {
                        let height = block.header.height;
                        let hash = block.hash();
                        if let Err(err) = node.push_block(block, now()) {
                            log::error!("mined block rejected by chain: {err}");
                            break;
                        }
                        println!("mined block {height} ({})", hex::encode(hash));
                    }
                    Err(err) => {
                        log::error!("candidate assembly failed: {err}");
                        break;
                    }
                }
            }
            println!("height:  {}", node.chain.height());
            println!("balance: {}", node.chain.balance(&miner_address));
        }
    }
}
