//! Human-readable session key generation.
//!
//! Keys take the form `adjective-noun-NN` (e.g. `swift-cortex-42`),
//! easy to read back over a shoulder during a recording session.
//! Uniqueness is the registry's job; this module only draws candidates.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

const ADJECTIVES: [&str; 12] = [
    "swift", "bright", "clever", "neural", "quantum", "cosmic", "rapid", "dynamic", "active",
    "smart", "fast", "prime",
];

const NOUNS: [&str; 12] = [
    "brain", "cortex", "synapse", "neuron", "signal", "wave", "pulse", "mind", "link", "node",
    "core", "stream",
];

/// Draw one candidate key.
pub(crate) fn generate_key(rng: &mut ChaCha8Rng) -> String {
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    let number: u32 = rng.random_range(0..100);
    format!("{adjective}-{noun}-{number}")
}
