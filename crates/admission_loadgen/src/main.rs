use std::{sync::Arc, time::Duration};

use clap::Parser;
use hdrhistogram::Histogram;
use rand::Rng;
use reqwest::Client;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{sleep_until, Instant},
};

type BoxError = Box<dyn std::error::Error>;

#[derive(Parser, Debug)]
#[command(version, about = "Open-loop load tester for the admission server")]
struct Args {
    /// Base URL of the server under test
    #[arg(short, long)]
    url: String,

    /// Concurrent request workers
    #[arg(short, long)]
    workers: usize,

    /// Requests scheduled per second, independent of response times
    #[arg(short, long)]
    rps: u64,

    /// Test length in seconds
    #[arg(short, long)]
    duration: u64,

    /// Number of distinct `/routeN` paths to spread requests over
    #[arg(long, default_value_t = 1)]
    routes: usize,

    /// Simulated client IPs sent as X-Forwarded-For (0 = fresh random IP per
    /// request). Only takes effect when the server runs with
    /// TRUST_FORWARDED_FOR=true; otherwise every request shares the
    /// load generator's own bucket.
    #[arg(long, default_value_t = 0)]
    clients: u32,

    /// Write latency quantiles to latency.csv
    #[arg(long)]
    csv: bool,
}

/// Per-worker outcome counts plus latency histogram; merged at the end.
struct Tally {
    latency_us: Histogram<u64>,
    admitted: u64,
    rejected: u64,
    server_errors: u64,
    network_errors: u64,
}

impl Tally {
    fn new() -> Result<Self, hdrhistogram::CreationError> {
        Ok(Self {
            latency_us: Histogram::new(3)?,
            admitted: 0,
            rejected: 0,
            server_errors: 0,
            network_errors: 0,
        })
    }

    fn record_status(&mut self, status: u16) {
        match status {
            200..=299 => self.admitted += 1,
            429 => self.rejected += 1,
            500..=599 => self.server_errors += 1,
            _ => {}
        }
    }

    fn merge(&mut self, other: &Tally) -> Result<(), hdrhistogram::AdditionError> {
        self.latency_us.add(&other.latency_us)?;
        self.admitted += other.admitted;
        self.rejected += other.rejected;
        self.server_errors += other.server_errors;
        self.network_errors += other.network_errors;
        Ok(())
    }

    fn total(&self) -> u64 {
        self.admitted + self.rejected + self.server_errors + self.network_errors
    }

    fn rejected_percent(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.rejected as f64 * 100.0 / total as f64,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    if args.rps == 0 || args.workers == 0 {
        return Err("--rps and --workers must be greater than zero".into());
    }
    if args.clients > 0 {
        eprintln!(
            "note: --clients only partitions traffic if the server trusts X-Forwarded-For \
             (TRUST_FORWARDED_FOR=true)"
        );
    }

    let started = Instant::now();
    let tally = run(&args).await?;
    print_summary(&tally, started.elapsed());

    if args.csv {
        export_csv(&tally.latency_us)?;
        println!("\nCSV exported to latency.csv");
    }
    Ok(())
}

async fn run(args: &Args) -> Result<Tally, BoxError> {
    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(30))
        .build()?;

    let (schedule, queue) = mpsc::channel::<Instant>(100_000);
    let queue = Arc::new(Mutex::new(queue));

    let workers = (0..args.workers)
        .map(|_| {
            spawn_worker(
                client.clone(),
                queue.clone(),
                args.url.clone(),
                args.routes.max(1),
                args.clients,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    drop(queue);

    // Open-loop: ticks are issued on schedule even when workers fall behind,
    // so latency includes queueing delay
    let period = Duration::from_secs_f64(1.0 / args.rps as f64);
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut tick = Instant::now();
    while Instant::now() < deadline {
        tick += period;
        if schedule.send(tick).await.is_err() {
            break;
        }
        sleep_until(tick).await;
    }
    drop(schedule);

    let mut merged = Tally::new()?;
    for worker in workers {
        merged.merge(&worker.await?)?;
    }
    Ok(merged)
}

fn spawn_worker(
    client: Client,
    queue: Arc<Mutex<mpsc::Receiver<Instant>>>,
    base_url: String,
    routes: usize,
    clients: u32,
) -> Result<JoinHandle<Tally>, hdrhistogram::CreationError> {
    let mut tally = Tally::new()?;

    Ok(tokio::spawn(async move {
        loop {
            // guard is dropped at the end of this statement, not held across the request
            let next = queue.lock().await.recv().await;
            let Some(scheduled_at) = next else { break };

            let result = client
                .get(weighted_url(&base_url, routes))
                .header("X-Forwarded-For", client_ip(clients))
                .send()
                .await;

            let _ = tally
                .latency_us
                .record(scheduled_at.elapsed().as_micros() as u64);
            match result {
                Ok(response) => tally.record_status(response.status().as_u16()),
                Err(_) => tally.network_errors += 1,
            }
        }
        tally
    }))
}

fn print_summary(tally: &Tally, elapsed: Duration) {
    let total = tally.total();
    let secs = elapsed.as_secs_f64();

    println!("\n==== Load Test Summary ====");
    println!("Duration: {secs:.2}s");
    println!("Total Requests: {total}");
    println!("Effective RPS: {:.2}", total as f64 / secs);

    println!("\nStatus Breakdown:");
    println!("  admitted (2xx): {}", tally.admitted);
    println!("  rejected (429): {} ({:.2}%)", tally.rejected, tally.rejected_percent());
    println!("  server errors (5xx): {}", tally.server_errors);
    println!("  network errors: {}", tally.network_errors);

    if total > 0 {
        let hist = &tally.latency_us;
        println!("\nLatency (microseconds):");
        for (label, q) in [("p50", 0.50), ("p95", 0.95), ("p99", 0.99)] {
            println!("  {label}: {}", hist.value_at_quantile(q));
        }
        println!("  max: {}", hist.max());
    }
}

fn client_ip(pool: u32) -> String {
    let mut rng = rand::thread_rng();
    if pool == 0 {
        return format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..255),
            rng.gen_range(0..255),
            rng.gen_range(0..255),
            rng.gen_range(1..255)
        );
    }
    // fixed pool inside 10.0.0.0/8 so the same clients keep coming back
    let id = rng.gen_range(0..pool);
    format!("10.{}.{}.{}", (id >> 16) & 0xff, (id >> 8) & 0xff, id & 0xff)
}

fn weighted_url(base: &str, routes: usize) -> String {
    let route = rand::thread_rng().gen_range(1..=routes);
    format!("{}/route{route}", base.trim_end_matches('/'))
}

fn export_csv(hist: &Histogram<u64>) -> Result<(), BoxError> {
    let mut writer = csv::Writer::from_path("latency.csv")?;
    writer.write_record(["quantile", "latency_microseconds"])?;
    for q in [0.50, 0.90, 0.95, 0.99, 1.0] {
        writer.write_record([q.to_string(), hist.value_at_quantile(q).to_string()])?;
    }
    writer.flush()?;
    Ok(())
}
