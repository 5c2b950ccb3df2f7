//! Writes a synthetic bank telemarketing dataset (`;`-delimited) for manual
//! testing of the dashboard.
//!
//! Usage: `generate_sample [OUTPUT] [ROWS]`, defaults `bank-additional.csv` and 2000.

use anyhow::{Context, Result};

const JOBS: &[&str] = &[
    "admin.",
    "blue-collar",
    "entrepreneur",
    "housemaid",
    "management",
    "retired",
    "self-employed",
    "services",
    "student",
    "technician",
    "unemployed",
    "unknown",
];
const MARITAL: &[&str] = &["divorced", "married", "single", "unknown"];
const YES_NO: &[&str] = &["no", "yes", "unknown"];
const CONTACT: &[&str] = &["cellular", "telephone"];
const MONTHS: &[&str] = &["mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
const DAYS: &[&str] = &["mon", "tue", "wed", "thu", "fri"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[(self.next_u64() % options.len() as u64) as usize]
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Acceptance odds lean on a few columns so the filtered chart visibly moves.
fn acceptance_probability(age: i64, job: &str, contact: &str, month: &str) -> f64 {
    let mut p: f64 = 0.08;
    if age < 25 || age > 60 {
        p += 0.15;
    }
    if matches!(job, "student" | "retired") {
        p += 0.12;
    }
    if contact == "cellular" {
        p += 0.04;
    }
    if matches!(month, "mar" | "sep" | "oct" | "dec") {
        p += 0.2;
    }
    p.min(0.9)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let output_path = args.next().unwrap_or_else(|| "bank-additional.csv".to_string());
    let rows: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid row count '{n}'"))?,
        None => 2000,
    };

    let mut rng = SimpleRng::new(42);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(&output_path)
        .with_context(|| format!("creating {output_path}"))?;

    writer.write_record([
        "age",
        "job",
        "marital",
        "default",
        "housing",
        "loan",
        "contact",
        "month",
        "day_of_week",
        "y",
    ])?;

    let mut accepted = 0usize;
    for _ in 0..rows {
        let age = rng.gauss(40.0, 10.0).round().clamp(17.0, 98.0) as i64;
        let job = rng.pick(JOBS);
        let contact = rng.pick(CONTACT);
        let month = rng.pick(MONTHS);
        let y = if rng.next_f64() < acceptance_probability(age, job, contact, month) {
            accepted += 1;
            "yes"
        } else {
            "no"
        };

        writer.write_record([
            age.to_string().as_str(),
            job,
            rng.pick(MARITAL),
            rng.pick(YES_NO),
            rng.pick(YES_NO),
            rng.pick(YES_NO),
            contact,
            month,
            rng.pick(DAYS),
            y,
        ])?;
    }
    writer.flush().with_context(|| format!("writing {output_path}"))?;

    log::info!("{accepted} of {rows} rows accepted");
    println!("Wrote {rows} rows to {output_path}");
    Ok(())
}
