//! Seeded value generation.
//!
//! Every draw comes from one `StdRng` seeded with a reported seed, so a run is
//! reproduced exactly by reusing the seed: same seed and same call order give
//! the same values. No other entropy is consulted after seeding.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rowcheck_types::{ColumnType, Row, Value};
use xxhash_rust::xxh3::xxh3_64;

/// Probability that a non-key field is generated as null.
pub const NULL_PROBABILITY: f64 = 0.01;

/// Exponent applied to the normal draw; pushes magnitudes toward zero.
const SKEW_EXPONENT: i32 = 8;
/// Scale for generated integers.
const INTEGER_SCALE: f64 = 100.0;
/// Scale for generated strings (16^1.5, so short hex tokens dominate).
const STRING_SCALE: f64 = 64.0;

const TAG_TABLE: &[u8] = b"table";

/// Seeded generator of synthetic values and rows.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
    seed: u64,
    spare_gaussian: Option<f64>,
}

impl RandomSource {
    /// Seed with `seed`, or draw a fresh seed when `None`.
    #[must_use]
    pub fn seeded(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(draw_seed);
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            spare_gaussian: None,
        }
    }

    /// The seed that reproduces this source.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    pub fn boolean(&mut self) -> bool {
        self.rng.r#gen::<bool>()
    }

    /// Standard normal draw (Marsaglia polar method).
    pub fn gaussian(&mut self) -> f64 {
        if let Some(spare) = self.spare_gaussian.take() {
            return spare;
        }
        loop {
            let u = self.rng.gen_range(-1.0..1.0_f64);
            let v = self.rng.gen_range(-1.0..1.0_f64);
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                let factor = (-2.0 * s.ln() / s).sqrt();
                self.spare_gaussian = Some(v * factor);
                return u * factor;
            }
        }
    }

    /// Integer biased toward small magnitudes.
    #[allow(clippy::cast_possible_truncation)]
    pub fn integer(&mut self) -> i32 {
        // `as` saturates on overflow, which is the intended clamp.
        (self.gaussian().powi(SKEW_EXPONENT) * INTEGER_SCALE) as i32
    }

    /// Short lowercase hex token.
    #[allow(clippy::cast_possible_truncation)]
    pub fn string(&mut self) -> String {
        let magnitude = (self.gaussian().powi(SKEW_EXPONENT) * STRING_SCALE) as i32;
        format!("{magnitude:x}")
    }

    /// A [`Self::string`] redrawn until it starts with a letter.
    pub fn identifier(&mut self) -> String {
        loop {
            let s = self.string();
            if s.chars().next().is_some_and(char::is_alphabetic) {
                return s;
            }
        }
    }

    /// A value of the given column type. Types outside the known three
    /// produce null.
    pub fn value(&mut self, ty: &ColumnType) -> Value {
        match ty {
            ColumnType::String => Value::Text(self.identifier()),
            ColumnType::Integer => Value::Integer(self.integer()),
            ColumnType::Boolean => Value::Boolean(self.boolean()),
            ColumnType::Other(_) => Value::Null,
        }
    }

    /// A full row. Non-key positions are null with [`NULL_PROBABILITY`];
    /// the key position never is.
    pub fn row(&mut self, column_types: &[ColumnType], primary_index: usize) -> Row {
        column_types
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                if i != primary_index && self.unit() < NULL_PROBABILITY {
                    Value::Null
                } else {
                    self.value(ty)
                }
            })
            .collect()
    }
}

fn draw_seed() -> u64 {
    // Kept to 32 bits so the seed is easy to retype when replaying.
    u64::from(rand::thread_rng().r#gen::<u32>())
}

/// Seed for one table sequence: `xxh3(base || "table" || name)`.
#[must_use]
pub fn derive_table_seed(base_seed: u64, table_name: &str) -> u64 {
    let mut buf = Vec::with_capacity(8 + TAG_TABLE.len() + table_name.len());
    buf.extend_from_slice(&base_seed.to_le_bytes());
    buf.extend_from_slice(TAG_TABLE);
    buf.extend_from_slice(table_name.as_bytes());
    xxh3_64(&buf)
}
