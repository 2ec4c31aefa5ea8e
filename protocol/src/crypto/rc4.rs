//! # RC4 Keystream Generator
//!
//! Textbook RC4 with one twist: the state length is configurable. With the
//! default of 256 entries it is the classic byte generator; the sponge hash
//! runs it with one entry per state *bit* and only ever looks at the
//! permutation the key schedule leaves behind.

use std::num::NonZeroUsize;

use crate::config::RC4_STATE_LEN;

/// RC4 state: a permutation of `0..state_len` plus the two walk indices.
#[derive(Debug, Clone)]
pub struct Rc4 {
    state: Vec<usize>,
    x: usize,
    y: usize,
}

impl Rc4 {
    /// Standard 256-entry RC4 keyed with `key`.
    pub fn new(key: &[u8]) -> Self {
        Self::schedule(key, RC4_STATE_LEN)
    }

    /// RC4 over a permutation of `0..state_len`.
    pub fn with_state_len(key: &[u8], state_len: NonZeroUsize) -> Self {
        Self::schedule(key, state_len.get())
    }

    fn schedule(key: &[u8], n: usize) -> Self {
        let mut state: Vec<usize> = (0..n).collect();
        let mut j = 0usize;
        for i in 0..n {
            let k = if key.is_empty() {
                0
            } else {
                usize::from(key[i % key.len()])
            };
            j = (j + state[i] + k) % n;
            state.swap(i, j);
        }
        Self { state, x: 0, y: 0 }
    }

    /// Number of entries in the permutation.
    pub fn state_len(&self) -> usize {
        self.state.len()
    }

    /// The current permutation. Right after construction this is the output
    /// of the key schedule.
    pub fn permutation(&self) -> &[usize] {
        &self.state
    }

    fn next_value(&mut self) -> usize {
        let n = self.state.len();
        self.x = (self.x + 1) % n;
        self.y = (self.y + self.state[self.x]) % n;
        self.state.swap(self.x, self.y);
        self.state[(self.state[self.x] + self.state[self.y]) % n]
    }

    /// Next keystream byte (low 8 bits of the generator output).
    pub fn next_byte(&mut self) -> u8 {
        (self.next_value() & 0xff) as u8
    }

    pub fn next_bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next_byte()).collect()
    }

    /// XOR `message` with the keystream. Applying it twice with fresh
    /// generators on the same key gives the message back.
    pub fn cipher(&mut self, message: &[u8]) -> Vec<u8> {
        message.iter().map(|b| b ^ self.next_byte()).collect()
    }
}
