//! Seeded synthetic prompt generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const REFRAIN: &str = ". Repeat this text at least 10 times. Number the repetitions.";
const DEFAULT_SEED: u64 = 42;

/// Generate `num_prompts` prompts of approximately `length` characters each,
/// using `seed` to drive a deterministic RNG. Each prompt is prefixed with
/// its index, filled with a timestamp and random lowercase words, suffixed
/// with a fixed refrain, and truncated to exactly `length` characters.
pub fn generate_prompts(num_prompts: usize, length: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_prompts)
        .map(|i| generate_one(&mut rng, i, length))
        .collect()
}

/// Convenience wrapper using the default seed (42).
pub fn generate_prompts_default_seed(num_prompts: usize, length: usize) -> Vec<String> {
    generate_prompts(num_prompts, length, DEFAULT_SEED)
}

fn generate_one(rng: &mut StdRng, index: usize, length: usize) -> String {
    let mut text = format!("{index} ");

    let timestamp = chrono::Utc::now().timestamp();
    text.push_str(&timestamp.to_string());

    while text.len() < length {
        text.push(' ');
        let word_len = rng.gen_range(1..=20);
        let word: String = (0..word_len)
            .map(|_| (b'a' + rng.gen_range(0..26)) as char)
            .collect();
        text.push_str(&word);
    }

    text.push_str(REFRAIN);
    text.chars().take(length).collect()
}
