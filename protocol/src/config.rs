//! # Protocol Configuration & Constants
//!
//! Every magic number in cipherchain lives here. If you're hardcoding a
//! constant somewhere else, move it here first and then argue about it.
//!
//! Most of these values are baked into persisted data: the sponge seed and
//! digest length decide every block hash, the difficulty decides which salts
//! are valid. Changing them invalidates existing ledgers, so don't.

// ---------------------------------------------------------------------------
// Number Theory
// ---------------------------------------------------------------------------

/// Width of the xorshift generator state, in bits.
pub const PRNG_STATE_BITS: u64 = 512;

/// Xorshift has an all-zero fixed point. A zero seed is swapped for this
/// constant (the first 64 fractional bits of pi).
pub const PRNG_ZERO_SEED_REPLACEMENT: u64 = 0x243F_6A88_85A3_08D3;

/// Rounds of Miller-Rabin per candidate. False positive rate is at most
/// 4^-5, which is accepted behavior for this toolkit.
pub const MILLER_RABIN_ITERATIONS: usize = 5;

/// Size of the safe primes used for ElGamal and Diffie-Hellman groups.
pub const SAFE_PRIME_BITS: u64 = 512;

/// Small primes used as a cheap filter before Miller-Rabin.
pub const SMALL_PRIMES: [u32; 25] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101,
];

// ---------------------------------------------------------------------------
// Keystream & Sponge Hash
// ---------------------------------------------------------------------------

/// Default RC4 state length. 256 gives the textbook byte-oriented generator.
pub const RC4_STATE_LEN: usize = 256;

/// Digest length of the sponge hash in bytes.
pub const HASH_LENGTH_BYTES: usize = 32;

/// Number of blank permutations applied during the squeeze phase.
pub const SQUEEZE_ITERATIONS: usize = 3;

/// Seed string appended to every sponge input before padding.
pub const SPONGE_SEED: &[u8] = b"cipherchain/sponge/v1";

// ---------------------------------------------------------------------------
// Block Cipher
// ---------------------------------------------------------------------------

/// Number of Feistel rounds.
pub const FEISTEL_ROUNDS: usize = 8;

/// Block size in bytes (64-bit blocks).
pub const CIPHER_BLOCK_BYTES: usize = 8;

/// XORed into the session key to derive `modified_key`. Same constant the
/// 3GPP KASUMI schedule uses: counting up, then counting down.
pub const NOTHING_UP_MY_SLEEVE: u128 = 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210;

/// Initialization value shared by CBC and PCBC when the caller has no
/// better idea.
pub const DEFAULT_IV: u64 = 0x5A5A_C3C3_0F0F_9696;

/// RC4 keys for the two FI substitution boxes.
pub const SBOX_SEED_1: &[u8] = b"cipherchain/fi/s1";
pub const SBOX_SEED_2: &[u8] = b"cipherchain/fi/s2";

/// Reduction polynomial for the GF(2^16) inversion in FL:
/// x^16 + x^12 + x^3 + x + 1.
pub const GF16_POLYNOMIAL: u32 = 0x1_100B;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Required number of trailing zero bits in a sealed block's digest.
pub const DIFFICULTY: u32 = 4;

/// Transactions per block before the block gets mined and a new one opens.
pub const BLOCK_CAPACITY: usize = 3;

/// `previous_hash` of block 0. There is nothing before genesis, so it
/// points at a sentinel instead of a digest.
pub const GENESIS_PREVIOUS_HASH: &str = "init_block";

/// Runtime-tunable ledger parameters.
///
/// The defaults mirror the constants above. Tests usually shrink
/// `block_capacity` to 1 to get multi-block chains cheaply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Trailing zero bits required on every sealed block digest.
    pub difficulty: u32,
    /// Transactions per block.
    pub block_capacity: usize,
    /// Salt attempts per mining run. `None` searches until it succeeds.
    pub max_mining_attempts: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DIFFICULTY,
            block_capacity: BLOCK_CAPACITY,
            max_mining_attempts: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Upper bound on a single frame payload. Ledger transactions carrying two
/// 512-bit signature components weigh in at a few KiB; 16 MiB leaves room
/// for anything legitimate and stops a hostile length prefix from making us
/// allocate gigabytes.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Name the relay answers ledger messages under.
pub const LEDGER_SERVICE_NAME: &str = "ledger";

/// Default relay port.
pub const DEFAULT_RELAY_PORT: u16 = 8880;
