//! Hashing helpers shared by the DRUP and LRAT clause tables.
//!
//! Both checkers keep their own open-chained hash table (mirroring the solver's hand rolled
//! `Checker`/`LratChecker` tables) rather than a generic `HashMap`, since the DRUP table is keyed
//! by clause *content* while the LRAT table is keyed by clause *id* alone.

use cdcl_formula::Lit;

/// Integer type used to store a hash of a clause or a clause id.
pub type ClauseHash = u64;

/// Hash a single literal.
///
/// Constant based on the golden ratio, providing good mixing for the resulting upper bits.
#[inline]
pub fn lit_hash(lit: Lit) -> ClauseHash {
    (!(lit.code() as u64)).wrapping_mul(0x61c8_8646_80b5_83eb)
}

/// Hash a clause, interpreting it as a *set* of literals.
///
/// Order independent and duplicate-literal independent, so it is safe to call both before and
/// after simplification as long as the literal set is unchanged.
pub fn clause_hash(lits: &[Lit]) -> ClauseHash {
    lits.iter().fold(0, |hash, &lit| hash ^ lit_hash(lit))
}

/// Number of nonces used by [`id_hash`].
const NUM_NONCES: usize = 1 << 10;

/// A small deterministic splitmix64-style generator, seeded the same way every run.
///
/// The checker's clause id hash only needs a fixed table of odd nonces, not a general purpose
/// RNG, so this avoids pulling in an extra dependency just for that.
struct SplitMix64(u64);

impl SplitMix64 {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

/// Builds the nonce table used to hash clause ids for the LRAT checker's table.
///
/// Seeded with a fixed value so the table (and thus collision behavior) is reproducible across
/// runs, matching the solver's own `Random random(42)` seeding of its nonce table.
pub fn id_hash_nonces() -> Vec<u64> {
    let mut rng = SplitMix64(42);
    (0..NUM_NONCES)
        .map(|_| {
            let mut nonce = rng.next();
            if nonce & 1 == 0 {
                nonce += 1;
            }
            nonce
        })
        .collect()
}

/// Hashes a clause id against a nonce table produced by [`id_hash_nonces`].
pub fn id_hash(id: u64, nonces: &[u64]) -> ClauseHash {
    let j = (id as usize) % nonces.len();
    nonces[j].wrapping_mul(id)
}

/// Folds a wide hash down into `0..size` for a power-of-two sized bucket array.
pub fn reduce_hash(hash: ClauseHash, size: u64) -> usize {
    debug_assert!(size > 0 && size.is_power_of_two());
    let mut shift = 32;
    let mut res = hash;
    while (1u64 << shift) > size {
        res ^= res >> shift;
        shift >>= 1;
    }
    (res & (size - 1)) as usize
}
