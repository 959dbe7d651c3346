//! Sample Patient Submitter
//!
//! Generates heart disease forms and posts them to a running service.

use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// One form submission, fields in the order the classifier pages use
struct PatientSample {
    fields: Vec<(&'static str, String)>,
}

/// Patient generator for exercising the classifiers
struct PatientGenerator {
    rng: rand::rngs::ThreadRng,
}

impl PatientGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Younger patient with typical vitals
    fn generate_typical(&mut self) -> PatientSample {
        let age = self.rng.gen_range(29..55);
        let oldpeak = self.rng.gen_range(0.0..1.5_f64);
        Self::sample([
            age as f64,
            self.rng.gen_range(0..2) as f64,
            self.rng.gen_range(1..3) as f64,
            self.rng.gen_range(105..135) as f64,
            self.rng.gen_range(170..240) as f64,
            0.0,
            self.rng.gen_range(0..2) as f64,
            self.rng.gen_range(150..195) as f64,
            0.0,
            (oldpeak * 10.0).round() / 10.0,
            2.0,
            0.0,
            2.0,
        ])
    }

    /// Older patient with angina and depressed ST segment
    fn generate_at_risk(&mut self) -> PatientSample {
        let age = self.rng.gen_range(55..77);
        let oldpeak = self.rng.gen_range(1.5..4.5_f64);
        Self::sample([
            age as f64,
            1.0,
            0.0,
            self.rng.gen_range(135..180) as f64,
            self.rng.gen_range(240..330) as f64,
            self.rng.gen_range(0..2) as f64,
            1.0,
            self.rng.gen_range(95..140) as f64,
            1.0,
            (oldpeak * 10.0).round() / 10.0,
            self.rng.gen_range(0..2) as f64,
            self.rng.gen_range(1..4) as f64,
            3.0,
        ])
    }

    fn sample(values: [f64; 13]) -> PatientSample {
        const NAMES: [&str; 13] = [
            "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang",
            "oldpeak", "slope", "ca", "thal",
        ];
        PatientSample {
            fields: NAMES
                .iter()
                .zip(values)
                .map(|(name, value)| (*name, value.to_string()))
                .collect(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_patients=info".parse()?),
        )
        .init();

    info!("Starting Sample Patient Submitter");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let base_url = args.get(1).map(|s| s.as_str()).unwrap_or("http://127.0.0.1:5000");
    let model = args.get(2).map(|s| s.as_str()).unwrap_or("rf");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
    let risk_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.3);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(200);
    let hh_number = std::env::var("SAMPLE_HH_NUMBER").ok();
    let patient_address = std::env::var("SAMPLE_PATIENT_ADDRESS").ok();

    info!(
        base_url = %base_url,
        model = %model,
        count = count,
        risk_rate = risk_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::new();
    let url = format!("{}/predict{}", base_url.trim_end_matches('/'), model);

    let mut generator = PatientGenerator::new();
    let mut rng = rand::thread_rng();
    let mut typical_count = 0;
    let mut at_risk_count = 0;

    for i in 0..count {
        let mut sample = if rng.gen_bool(risk_rate) {
            at_risk_count += 1;
            generator.generate_at_risk()
        } else {
            typical_count += 1;
            generator.generate_typical()
        };

        if let (Some(hh), Some(addr)) = (&hh_number, &patient_address) {
            sample.fields.insert(0, ("patientAddress", addr.clone()));
            sample.fields.insert(0, ("hhNumber", hh.clone()));
        }

        match client.post(&url).form(&sample.fields).send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let risk = body
                    .lines()
                    .find(|line| line.contains("Risk is"))
                    .map(|line| line.trim().to_string())
                    .unwrap_or_else(|| body.trim().to_string());
                info!(submission = i + 1, status = %status, result = %risk, "Submitted");
            }
            Err(e) => {
                warn!(submission = i + 1, error = %e, "Submission failed");
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Submitted {} patients ({} typical, {} at risk)",
        count, typical_count, at_risk_count
    );

    Ok(())
}
