//! End-to-end scenarios spanning the accounts tree, chain, mempool and
//! miner through their public APIs, rather than one module's internals.

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};
use obscura_core::account::Account;
use obscura_core::accounts::Accounts;
use obscura_core::address::Address;
use obscura_core::block::{Block, BlockBody, BlockHeader, BlockInterlink};
use obscura_core::blockchain::{FullChain, PushResult};
use obscura_core::config::Config;
use obscura_core::events;
use obscura_core::mempool::Mempool;
use obscura_core::node::Node;
use obscura_core::store::MemoryStore;
use obscura_core::transaction::Transaction;
use std::sync::Arc;

fn keypair(seed: u8) -> Keypair {
    let secret = SecretKey::from_bytes(&[seed; 32]).unwrap();
    let public = PublicKey::from(&secret);
    Keypair { secret, public }
}

fn signed_tx(kp: &Keypair, recipient: Address, value: u64, fee: u64, nonce: u32) -> Transaction {
    let mut tx = Transaction {
        sender_public_key: kp.public.to_bytes(),
        recipient,
        value,
        fee,
        nonce,
        signature: [0u8; 64],
    };
    let sig = kp.sign(&tx.signing_message());
    tx.signature = sig.to_bytes();
    tx
}

fn easy_config() -> Config {
    let mut config = Config::default();
    config.genesis_n_bits = 0x2000_ffff;
    config.policy.difficulty_block_window = 2;
    config
}

fn make_genesis(config: &Config, miner: Address) -> Block {
    let body = BlockBody { miner_address: miner, transactions: vec![] };
    let accounts_hash = {
        let accounts = Accounts::new(Arc::new(MemoryStore::new()));
        let mut txn = accounts.begin_transaction().unwrap();
        let hash = txn.commit_block_body(&body, 0, &config.policy).unwrap();
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

fn mine(mut block: Block) -> Block {
    loop {
        if block.header.verify_proof_of_work() {
            return block;
        }
        block.header.nonce = block.header.nonce.wrapping_add(1);
    }
}

fn child_block<S: obscura_core::store::KvStore>(
    chain: &FullChain<S>,
    config: &Config,
    parent_hash: obscura_core::Hash,
    miner: Address,
    txs: Vec<Transaction>,
) -> Block {
    let parent = chain.get_block(&parent_hash).unwrap();
    let body = BlockBody { miner_address: miner, transactions: txs };
    let interlink = BlockInterlink::build_next(parent_hash, parent.header.n_bits);

    let mut txn = chain.accounts().begin_transaction().unwrap();
    let accounts_hash = txn.commit_block_body(&body, parent.header.height + 1, &config.policy).unwrap();
    txn.abort();

    let n_bits = chain.get_next_target(&parent_hash).unwrap();
    let header = BlockHeader {
        prev_hash: parent_hash,
        interlink_hash: interlink.hash(),
        body_hash: body.hash(),
        accounts_hash,
        n_bits,
        height: parent.header.height + 1,
        timestamp: parent.header.timestamp + 1,
        nonce: 0,
    };
    mine(Block { header, interlink, body: Some(body) })
}

/// S2: applying then reverting a block body is the identity on the accounts
/// root hash.
#[test]
fn apply_then_revert_restores_accounts_hash() {
    let config = easy_config();
    let accounts = Accounts::new(Arc::new(MemoryStore::new()));
    let kp = keypair(1);
    let sender = obscura_core::crypto::pubkey_to_address(&kp.public.to_bytes());

    let mut seed = accounts.begin_transaction().unwrap();
    seed.commit_block_body(&BlockBody { miner_address: sender, transactions: vec![] }, 0, &config.policy).unwrap();
    seed.commit();

    let h0 = accounts.hash();
    let tx = signed_tx(&kp, Address([9u8; 20]), 5, 1, 0);
    let body = BlockBody { miner_address: Address([8u8; 20]), transactions: vec![tx] };

    let mut txn = accounts.begin_transaction().unwrap();
    txn.commit_block_body(&body, 1, &config.policy).unwrap();
    txn.commit();
    assert_ne!(accounts.hash(), h0);

    let mut txn = accounts.begin_transaction().unwrap();
    let reverted = txn.revert_block_body(&body, 1, &config.policy).unwrap();
    txn.commit();
    assert_eq!(reverted, h0);
    assert_eq!(accounts.hash(), h0);
}

/// S3: a chain of several blocks each extend the head in turn.
#[test]
fn linear_chain_of_several_blocks_extends_head_each_time() {
    let config = easy_config();
    let store = Arc::new(MemoryStore::new());
    let miner = Address([1u8; 20]);
    let genesis = make_genesis(&config, miner);
    let (events, _rx) = events::channel();
    let chain = FullChain::new(store, config.clone(), genesis.clone(), events).unwrap();

    let mut parent_hash = genesis.hash();
    for height in 1..=4u32 {
        let block = child_block(&chain, &config, parent_hash, miner, vec![]);
        let result = chain.push_block(block.clone(), 10_000_000).unwrap();
        assert_eq!(result, PushResult::Extended);
        assert_eq!(chain.height(), height);
        parent_hash = block.hash();
    }
}

/// S4: a heavier competing branch triggers a rebranch and the winning
/// fork's balances take effect.
#[test]
fn heavier_fork_triggers_rebranch_and_updates_balances() {
    let config = easy_config();
    let store = Arc::new(MemoryStore::new());
    let miner = Address([1u8; 20]);
    let genesis = make_genesis(&config, miner);
    let (events, _rx) = events::channel();
    let chain = FullChain::new(store, config.clone(), genesis.clone(), events).unwrap();

    // Main branch: one block.
    let a1 = child_block(&chain, &config, genesis.hash(), miner, vec![]);
    assert_eq!(chain.push_block(a1.clone(), 10_000_000).unwrap(), PushResult::Extended);

    // Competing two-block branch off genesis, heavier once fully pushed.
    let b1 = child_block(&chain, &config, genesis.hash(), Address([2u8; 20]), vec![]);
    let accepted = chain.push_block(b1.clone(), 10_000_000).unwrap();
    assert!(matches!(accepted, PushResult::Accepted | PushResult::Known));
    assert_eq!(chain.head_hash(), a1.hash());

    let b2 = child_block(&chain, &config, b1.hash(), Address([2u8; 20]), vec![]);
    let forked = chain.push_block(b2.clone(), 10_000_000).unwrap();
    assert_eq!(forked, PushResult::Forked);
    assert_eq!(chain.head_hash(), b2.hash());
    assert_eq!(chain.height(), 2);
}

/// S5: a mined block removes its transactions from the mempool via the
/// head-changed reaction.
#[test]
fn mined_transaction_is_swept_from_mempool_on_head_change() {
    let config = easy_config();
    let kp = keypair(2);
    let sender = obscura_core::crypto::pubkey_to_address(&kp.public.to_bytes());
    let genesis = make_genesis(&config, sender);
    let store = Arc::new(MemoryStore::new());
    let (events, _rx) = events::channel();
    let chain = Arc::new(FullChain::new(store, config.clone(), genesis.clone(), events.clone()).unwrap());
    let mempool = Mempool::new(Arc::clone(&chain), config.policy.clone(), events);

    let tx = signed_tx(&kp, Address([3u8; 20]), 10, 1, 0);
    assert_eq!(mempool.push_transaction(tx.clone()), obscura_core::mempool::PushResult::Added);
    assert_eq!(mempool.len(), 1);

    let block = child_block(&chain, &config, genesis.hash(), sender, vec![tx]);
    assert_eq!(chain.push_block(block, 10_000_000).unwrap(), PushResult::Extended);

    mempool.on_head_changed();
    assert_eq!(mempool.len(), 0);
}

/// S6: the miner assembles candidates that include currently pending
/// mempool transactions.
#[tokio::test]
async fn miner_candidate_includes_pending_mempool_transaction() {
    let config = easy_config();
    let kp = keypair(3);
    let sender = obscura_core::crypto::pubkey_to_address(&kp.public.to_bytes());
    let genesis = make_genesis(&config, sender);
    let store = Arc::new(MemoryStore::new());

    let node = Node::new(store, config.clone(), genesis.clone(), sender).unwrap();
    let tx = signed_tx(&kp, Address([4u8; 20]), 10, 1, 0);
    assert_eq!(node.push_transaction(tx), obscura_core::mempool::PushResult::Added);

    let block = node.miner.mine_one(10_000_000).await.unwrap();
    assert_eq!(block.body.as_ref().unwrap().transactions.len(), 1);

    node.push_block(block, 10_000_000).unwrap();
    assert_eq!(node.mempool.len(), 0);
    assert_eq!(node.chain.balance(&Address([4u8; 20])), 10);
}

#[test]
fn zero_account_is_the_default() {
    assert!(Account::default().is_zero());
}
