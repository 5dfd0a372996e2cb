//! Benchmark results and their presentation.

use colored::Colorize;
use std::time::Duration;

/// Latency distribution of the successful operations of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub mean: Duration,
    pub p50: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl LatencySummary {
    /// Summarize `samples`; an empty slice gives all zeros.
    pub fn from_samples(samples: &mut [Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();

        let total: Duration = samples.iter().sum();
        Self {
            mean: total / u32::try_from(samples.len()).unwrap_or(u32::MAX),
            p50: percentile(samples, 50.0),
            p99: percentile(samples, 99.0),
            max: samples[samples.len() - 1],
        }
    }
}

/// Nearest-rank percentile of sorted, non-empty `samples`.
fn percentile(samples: &[Duration], pct: f64) -> Duration {
    let rank = ((pct / 100.0) * samples.len() as f64).ceil() as usize;
    samples[rank.clamp(1, samples.len()) - 1]
}

/// Outcome of running one strategy.
#[derive(Debug, Clone)]
pub struct BenchResult {
    pub description: String,
    /// Wall-clock time from the first spawn to the last completion.
    pub duration: Duration,
    pub successful: usize,
    pub errors: usize,
    pub latency: LatencySummary,
    /// Highest number of connections the strategy had in use at once.
    pub peak_connections: usize,
}

impl BenchResult {
    /// Total operations attempted.
    pub fn total(&self) -> usize {
        self.successful + self.errors
    }

    /// Wall-clock time per successful operation, if any succeeded.
    pub fn avg_per_op(&self) -> Option<Duration> {
        if self.successful == 0 {
            return None;
        }
        Some(self.duration / u32::try_from(self.successful).unwrap_or(u32::MAX))
    }

    /// Successful operations per second.
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.successful as f64 / secs
        } else {
            0.0
        }
    }

    /// Print a formatted summary.
    pub fn print_summary(&self) {
        println!("\n{}:", self.description.white().bold());
        println!("  Duration:          {:?}", self.duration);
        println!("  Successful:        {}", self.successful.to_string().green());
        if self.errors > 0 {
            println!("  Errors:            {}", self.errors.to_string().red());
        } else {
            println!("  Errors:            {}", self.errors);
        }
        if let Some(avg) = self.avg_per_op() {
            println!("  Avg per operation: {:?}", avg);
            println!("  Operations/sec:    {:.2}", self.ops_per_sec());
            println!(
                "  Latency:           mean {:?}, p50 {:?}, p99 {:?}, max {:?}",
                self.latency.mean, self.latency.p50, self.latency.p99, self.latency.max
            );
        }
        println!("  Peak connections:  {}", self.peak_connections);
    }

    /// Return results as a CSV row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{:.2},{},{},{},{},{}",
            self.description,
            self.successful,
            self.errors,
            self.duration.as_millis(),
            self.avg_per_op().map(|d| d.as_micros()).unwrap_or(0),
            self.ops_per_sec(),
            self.latency.mean.as_micros(),
            self.latency.p50.as_micros(),
            self.latency.p99.as_micros(),
            self.latency.max.as_micros(),
            self.peak_connections
        )
    }

    /// Return CSV header.
    pub fn csv_header() -> &'static str {
        "strategy,successful,errors,duration_ms,avg_us,ops_per_sec,\
         mean_us,p50_us,p99_us,max_us,peak_connections"
    }
}

/// How much faster the pooled run was than the unpooled one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Unpooled duration divided by pooled duration.
    pub speedup: f64,
    /// `(speedup - 1) * 100`; negative when pooling was slower.
    pub improvement_pct: f64,
}

/// Compare two runs. Returns `None` when either run has zero duration.
pub fn compare(non_pooled: &BenchResult, pooled: &BenchResult) -> Option<Comparison> {
    if non_pooled.duration.is_zero() || pooled.duration.is_zero() {
        return None;
    }
    let speedup = non_pooled.duration.as_secs_f64() / pooled.duration.as_secs_f64();
    Some(Comparison {
        speedup,
        improvement_pct: (speedup - 1.0) * 100.0,
    })
}

/// Print the comparison between the two runs.
pub fn print_comparison(comparison: &Comparison) {
    println!("\n{}", "PERFORMANCE COMPARISON:".blue().bold());
    if comparison.speedup >= 1.0 {
        println!(
            "  Connection pooling is {}x faster",
            format!("{:.2}", comparison.speedup).green().bold()
        );
    } else {
        println!(
            "  Connection pooling is {}x slower",
            format!("{:.2}", 1.0 / comparison.speedup).yellow().bold()
        );
    }
    if comparison.speedup > 1.0 {
        println!(
            "  That's a {:.1}% improvement in performance.",
            comparison.improvement_pct
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(duration_ms: u64, successful: usize, errors: usize) -> BenchResult {
        BenchResult {
            description: "test".to_string(),
            duration: Duration::from_millis(duration_ms),
            successful,
            errors,
            latency: LatencySummary::default(),
            peak_connections: 1,
        }
    }

    #[test]
    fn test_latency_summary() {
        let mut samples: Vec<Duration> = (1..=100).rev().map(Duration::from_millis).collect();
        let summary = LatencySummary::from_samples(&mut samples);
        assert_eq!(summary.p50, Duration::from_millis(50));
        assert_eq!(summary.p99, Duration::from_millis(99));
        assert_eq!(summary.max, Duration::from_millis(100));
        assert_eq!(summary.mean, Duration::from_micros(50_500));
    }

    #[test]
    fn test_latency_summary_single_and_empty() {
        let mut one = vec![Duration::from_millis(7)];
        let summary = LatencySummary::from_samples(&mut one);
        assert_eq!(summary.p50, Duration::from_millis(7));
        assert_eq!(summary.p99, Duration::from_millis(7));
        assert_eq!(summary.mean, Duration::from_millis(7));

        assert_eq!(LatencySummary::from_samples(&mut []), LatencySummary::default());
    }

    #[test]
    fn test_rates() {
        let r = result(2000, 1000, 5);
        assert_eq!(r.total(), 1005);
        assert_eq!(r.avg_per_op(), Some(Duration::from_millis(2)));
        assert!((r.ops_per_sec() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_successes() {
        let r = result(100, 0, 10);
        assert_eq!(r.avg_per_op(), None);
        assert_eq!(r.ops_per_sec(), 0.0);
    }

    #[test]
    fn test_compare() {
        let c = compare(&result(3000, 10, 0), &result(1000, 10, 0)).unwrap();
        assert!((c.speedup - 3.0).abs() < 1e-9);
        assert!((c.improvement_pct - 200.0).abs() < 1e-9);

        assert!(compare(&result(0, 0, 0), &result(1000, 10, 0)).is_none());
    }

    #[test]
    fn test_csv_row_matches_header() {
        let row = result(1000, 10, 0).to_csv_row();
        assert_eq!(
            row.split(',').count(),
            BenchResult::csv_header().split(',').count()
        );
        assert!(row.starts_with("test,10,0,1000,100000,"));
    }
}
