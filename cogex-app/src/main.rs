mod app;
mod console;
pub use app::App;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Runs a trial protocol against a simulated subject and writes session logs"
)]
pub struct Cli {
    /// Session settings (JSON). Defaults are used when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Protocol file: `{ "states": [...] }`
    #[arg(long)]
    pub protocol: PathBuf,

    /// Trial table: a JSON array of rows
    #[arg(long)]
    pub trials: PathBuf,

    /// Overrides `output_dir` from the config
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Overrides `session_id` from the config
    #[arg(long)]
    pub session: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Probability that the simulated subject lets a choice time out
    #[arg(long, default_value_t = 0.1, value_parser = parse_probability)]
    pub miss_rate: f64,

    /// Resume every pause after this many frames instead of waiting for Enter
    #[arg(long)]
    pub auto_resume: Option<u32>,

    /// Never touch the pulse hardware, whatever the config says
    #[arg(long)]
    pub test_pulses: bool,
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{raw} is not a probability in 0..=1"))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let app = App::new(Cli::parse())?;
    app.run()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_rate_must_be_a_probability() {
        assert_eq!(parse_probability("0.25"), Ok(0.25));
        assert!(parse_probability("NaN").is_err());
        assert!(parse_probability("inf").is_err());
        assert!(parse_probability("1.5").is_err());
        assert!(parse_probability("-0.1").is_err());
    }

    #[test]
    fn cli_rejects_nan_miss_rate() {
        let args = ["cogex", "--protocol", "p.json", "--trials", "t.json", "--miss-rate", "NaN"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
