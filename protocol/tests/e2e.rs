//! End-to-end integration tests for cipherchain.
//!
//! These tests run the pieces together the way the node binary does: prime
//! search, key generation, signed transfers, mining, the ledger file, the
//! key exchange feeding the block cipher, and a relay-shaped conversation
//! over an in-memory duplex stream.
//!
//! Every test seeds its own PRNG, so failures reproduce.

use cipherchain::config::LedgerConfig;
use cipherchain::crypto::encryption::{decrypt_exact, encrypt, ChainingMode};
use cipherchain::crypto::exchange::{diffie_hellman_step_1, diffie_hellman_step_2};
use cipherchain::crypto::kasumi::Kasumi;
use cipherchain::crypto::keys::{ElGamalKeyPair, KeyPair, RsaKeyPair, SignatureScheme};
use cipherchain::crypto::numtheory::{find_prime, find_safe_prime};
use cipherchain::crypto::prng::Xorshift512;
use cipherchain::network::{
    read_frame, write_frame, Envelope, LedgerService, MessageBody, SecureChannel, SessionEvent,
};
use cipherchain::storage::{Blockchain, ChainFault, LedgerStore, SharedLedger};
use cipherchain::transaction::{sign_transaction, Transaction};
use num_bigint::BigUint;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn group(rng: &mut Xorshift512) -> BigUint {
    find_safe_prime(96, rng, Some(5_000_000)).expect("safe prime")
}

fn el_gamal(p: &BigUint, rng: &mut Xorshift512) -> KeyPair {
    ElGamalKeyPair::generate(p, rng).expect("keygen").into()
}

fn rsa(rng: &mut Xorshift512) -> KeyPair {
    let p = find_prime(160, rng, Some(100_000)).expect("prime");
    let q = find_prime(160, rng, Some(100_000)).expect("prime");
    RsaKeyPair::generate(&p, &q, rng).expect("keygen").into()
}

fn transfer(from: &KeyPair, to: &KeyPair, value: f64, rng: &mut Xorshift512) -> Transaction {
    let mut tx = Transaction::new(from.identity(), to.identity(), value);
    sign_transaction(&mut tx, from, rng).expect("sign");
    tx
}

fn one_per_block() -> LedgerConfig {
    LedgerConfig {
        block_capacity: 1,
        ..LedgerConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[test]
fn two_block_chain_verifies_and_detects_a_broken_link() {
    let mut rng = Xorshift512::from_u64(100);
    let p = group(&mut rng);
    let alice = el_gamal(&p, &mut rng);
    let bob = el_gamal(&p, &mut rng);

    let mut chain = Blockchain::with_config(SignatureScheme::ElGamal, one_per_block());
    chain
        .accept_transaction(transfer(&alice, &bob, 10.0, &mut rng))
        .unwrap();
    chain
        .accept_transaction(transfer(&bob, &alice, 4.0, &mut rng))
        .unwrap();

    assert_eq!(chain.len(), 2);
    assert_eq!(chain.verify_chain(), Ok(()));

    chain.block_mut(1).unwrap().previous_hash = "f".repeat(64);
    assert!(matches!(
        chain.verify_chain(),
        Err(ChainFault::BrokenLink { block_index: 1, .. })
    ));
}

#[test]
fn balances_after_two_transfers() {
    let mut rng = Xorshift512::from_u64(101);
    let alice = rsa(&mut rng);
    let bob = rsa(&mut rng);

    let mut chain = Blockchain::with_config(SignatureScheme::Rsa, one_per_block());
    chain
        .accept_transaction(transfer(&alice, &bob, 10.0, &mut rng))
        .unwrap();
    chain
        .accept_transaction(transfer(&bob, &alice, 4.0, &mut rng))
        .unwrap();

    assert_eq!(chain.balance(&alice.identity()), -6.0);
    assert_eq!(chain.balance(&bob.identity()), 6.0);
}

#[test]
fn sealed_blocks_end_in_zero_bits() {
    let mut rng = Xorshift512::from_u64(102);
    let alice = rsa(&mut rng);
    let bob = rsa(&mut rng);

    let mut chain = Blockchain::with_config(SignatureScheme::Rsa, one_per_block());
    for value in [1.0, 2.0, 3.0] {
        chain
            .accept_transaction(transfer(&alice, &bob, value, &mut rng))
            .unwrap();
    }

    for block in &chain.blocks()[..chain.len() - 1] {
        let digest = block.hash_hex();
        assert!(digest.ends_with('0'), "{digest} should end in four zero bits");
        assert!(block.satisfies_difficulty(4));
    }
    assert!(chain.is_valid());
}

#[test]
fn ledger_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let config = LedgerConfig::default();
    let mut rng = Xorshift512::from_u64(103);
    let alice = rsa(&mut rng);
    let bob = rsa(&mut rng);

    {
        let ledger =
            SharedLedger::persistent(LedgerStore::open(&path), SignatureScheme::Rsa, &config)
                .unwrap();
        for _ in 0..4 {
            ledger
                .add_transaction(transfer(&alice, &bob, 1.5, &mut rng))
                .unwrap();
        }
    }

    let reloaded = LedgerStore::open(&path).load(&config).unwrap().unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.is_valid());
    assert_eq!(reloaded.balance(&bob.identity()), 6.0);
}

// ---------------------------------------------------------------------------
// Key exchange + block cipher
// ---------------------------------------------------------------------------

#[test]
fn exchanged_key_drives_every_chaining_mode() {
    let mut rng = Xorshift512::from_u64(104);
    let p = group(&mut rng);

    let (offer, initiator) = diffie_hellman_step_1(&p, &mut rng).unwrap();
    let (bob_secret, reply) = diffie_hellman_step_2(&offer, &mut rng).unwrap();
    let alice_secret = initiator.complete(&reply).unwrap();
    assert_eq!(alice_secret, bob_secret);

    let alice = Kasumi::new(alice_secret.key_material());
    let bob = Kasumi::new(bob_secret.key_material());
    let message = b"the quick brown fox jumps over the lazy dog";

    for mode in [
        ChainingMode::Ecb,
        ChainingMode::Cbc,
        ChainingMode::Pcbc,
        ChainingMode::Ctr,
    ] {
        let ciphertext = encrypt(&alice, mode, 0x1234_5678_9ABC_DEF0, message);
        assert_eq!(ciphertext.len(), 48);
        let plaintext =
            decrypt_exact(&bob, mode, 0x1234_5678_9ABC_DEF0, &ciphertext, message.len()).unwrap();
        assert_eq!(plaintext, message, "{mode:?}");
    }
}

// ---------------------------------------------------------------------------
// Wire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn secure_conversation_over_frames() {
    let mut rng = Xorshift512::from_u64(105);
    let p = group(&mut rng);
    let mut alice = SecureChannel::new("alice", "bob", el_gamal(&p, &mut rng), rng.clone());
    let mut bob = SecureChannel::new("bob", "alice", el_gamal(&p, &mut rng), rng.clone());

    let (mut a_side, mut b_side) = tokio::io::duplex(64 * 1024);

    // alice -> bob: step 1
    write_frame(&mut a_side, &alice.start_exchange(&p).unwrap())
        .await
        .unwrap();
    let step1: Envelope = read_frame(&mut b_side).await.unwrap().unwrap();
    let SessionEvent::ExchangeReply(step2) = bob.handle(step1).unwrap() else {
        panic!("expected step 2");
    };

    // bob -> alice: step 2
    write_frame(&mut b_side, &step2).await.unwrap();
    let step2: Envelope = read_frame(&mut a_side).await.unwrap().unwrap();
    assert_eq!(alice.handle(step2).unwrap(), SessionEvent::KeyEstablished);

    // key announcement both ways
    write_frame(&mut a_side, &alice.announce_key()).await.unwrap();
    let init: Envelope = read_frame(&mut b_side).await.unwrap().unwrap();
    let SessionEvent::PeerKey { reply: Some(back) } = bob.handle(init).unwrap() else {
        panic!("bob should announce back");
    };
    write_frame(&mut b_side, &back).await.unwrap();
    let back: Envelope = read_frame(&mut a_side).await.unwrap().unwrap();
    alice.handle(back).unwrap();

    // data
    write_frame(&mut a_side, &alice.seal(b"see you at noon").unwrap())
        .await
        .unwrap();
    let data: Envelope = read_frame(&mut b_side).await.unwrap().unwrap();
    assert_eq!(
        bob.handle(data).unwrap(),
        SessionEvent::Message {
            sender: "alice".into(),
            text: b"see you at noon".to_vec(),
            verified: true,
        }
    );
}

#[test]
fn ledger_service_end_to_end() {
    let mut rng = Xorshift512::from_u64(106);
    let alice = rsa(&mut rng);
    let mallory = rsa(&mut rng);
    let service = LedgerService::new(
        "ledger",
        SharedLedger::new(Blockchain::new(SignatureScheme::Rsa)),
    );

    let mut honest = Transaction::new(alice.identity(), "bob", 3.0);
    sign_transaction(&mut honest, &alice, &mut rng).unwrap();
    let mut forged = Transaction::new(alice.identity(), "mallory", 99.0);
    sign_transaction(&mut forged, &mallory, &mut rng).unwrap();

    for (tx, expected) in [(honest, true), (forged, false)] {
        let reply = service
            .handle(&Envelope::new(
                "alice",
                "ledger",
                MessageBody::TransactionMessage { transaction: tx },
            ))
            .unwrap();
        let MessageBody::VerificationMessage { valid, .. } = reply.body else {
            panic!("expected a verdict");
        };
        assert_eq!(valid, Some(expected));
    }

    assert_eq!(service.ledger().balance("bob"), 3.0);
    assert_eq!(service.ledger().balance("mallory"), 0.0);
}
