//! forecaster-cli — terminal frontend for the Resistance Forecaster HTTP API
//!
//! Every command is a single HTTP call against a running `forecaster-server`.
//!
//! # Subcommands
//! - `bayesian --meca <m>... --pbp2a <m>... [--vancomycin-profile <t>] [--ceftaroline-profile <t>]`
//! - `evolutionary --patterns <t> --trajectories <t> [--knowledge <t>]`
//! - `history [-n <limit>]`  — recent predictions, newest first
//! - `graph <id> [--svg <file>]` — stored chart, optionally writing its SVG
//! - `status`                — show server health
//!
//! `--json` prints the raw server response instead of the text summary.

use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_SERVER: &str = "http://127.0.0.1:9000";
const DEFAULT_LIMIT: usize = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "forecaster-cli",
    version,
    about = "Resistance Forecaster — submit predictions and browse stored results"
)]
struct Cli {
    /// Forecaster HTTP server URL (overrides FORECASTER_HTTP_URL env var)
    #[arg(long, env = "FORECASTER_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print the raw JSON response
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bayesian vancomycin / ceftaroline resistance prediction
    Bayesian {
        /// mecA mutation (repeat or comma-separate)
        #[arg(long = "meca", value_delimiter = ',')]
        mec_a: Vec<String>,

        /// PBP2a mutation (repeat or comma-separate)
        #[arg(long = "pbp2a", value_delimiter = ',')]
        pbp2a: Vec<String>,

        #[arg(long)]
        vancomycin_profile: Option<String>,

        #[arg(long)]
        ceftaroline_profile: Option<String>,
    },

    /// Evolutionary resistance-emergence prediction
    Evolutionary {
        /// Free-text mutation patterns, e.g. "mecA(G246E), PBP2a(V311A)"
        #[arg(long)]
        patterns: String,

        #[arg(long)]
        trajectories: String,

        #[arg(long)]
        knowledge: Option<String>,
    },

    /// List recent predictions
    History {
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Show a stored chart
    Graph {
        id: i64,

        /// Write the chart SVG to this file
        #[arg(long)]
        svg: Option<String>,
    },

    /// Show Forecaster server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DataPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChartSummary {
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

/// The fields shared by both prediction kinds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionSummary {
    pub id: Option<i64>,
    pub kind: String,
    pub confidence_level: f64,
    pub threat_level: String,
    pub source: String,
    #[serde(default)]
    pub charts: Vec<ChartSummary>,
    #[serde(default)]
    pub breakdown_analysis: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
    pub output: PredictionSummary,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub predictions: Vec<HistoryRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphView {
    pub id: i64,
    pub prediction_id: i64,
    pub title: String,
    pub context: Option<String>,
    pub interpretation: Option<String>,
    pub image_svg: String,
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

#[derive(Debug, Deserialize)]
pub struct GraphResponse {
    pub graph: GraphView,
}

// ============================================================================
// Request payloads
// ============================================================================

pub fn bayesian_payload(
    mec_a: &[String],
    pbp2a: &[String],
    vancomycin_profile: Option<&str>,
    ceftaroline_profile: Option<&str>,
) -> Value {
    json!({
        "mecAMutations": mec_a,
        "pbp2aMutations": pbp2a,
        "vancomycinResistanceProfile": vancomycin_profile,
        "ceftarolineResistanceProfile": ceftaroline_profile,
    })
}

pub fn evolutionary_payload(patterns: &str, trajectories: &str, knowledge: Option<&str>) -> Value {
    json!({
        "mutationPatterns": patterns,
        "evolutionaryTrajectories": trajectories,
        "existingKnowledge": knowledge,
    })
}

// ============================================================================
// Text output
// ============================================================================

fn bar(value: f64) -> String {
    let filled = (value.clamp(0.0, 1.0) * 20.0).round() as usize;
    format!("{}{}", "█".repeat(filled), "·".repeat(20 - filled))
}

fn format_points(out: &mut String, data: &[DataPoint]) {
    for p in data {
        out.push_str(&format!("    {:<24} {} {:.2}\n", p.name, bar(p.value), p.value));
    }
}

pub fn format_prediction(p: &PredictionSummary) -> String {
    let mut out = String::new();
    match p.id {
        Some(id) => out.push_str(&format!("Prediction #{} ({})\n", id, p.kind)),
        None => out.push_str(&format!("Prediction ({}, not stored)\n", p.kind)),
    }
    out.push_str(&format!("Threat level: {}\n", p.threat_level));
    out.push_str(&format!("Confidence:   {:.1}%\n", p.confidence_level * 100.0));
    if p.source == "heuristic" {
        out.push_str("Source:       heuristic fallback (model unavailable)\n");
    } else {
        out.push_str(&format!("Source:       {}\n", p.source));
    }

    for chart in &p.charts {
        match chart.id {
            Some(id) => out.push_str(&format!("\n  {} [graph {}]\n", chart.title, id)),
            None => out.push_str(&format!("\n  {}\n", chart.title)),
        }
        format_points(&mut out, &chart.data);
    }

    if !p.breakdown_analysis.is_empty() {
        out.push_str(&format!("\n{}\n", p.breakdown_analysis));
    }
    out
}

pub fn format_history(records: &[HistoryRecord]) -> String {
    let mut out = String::new();
    for r in records {
        out.push_str(&format!(
            "#{:<5} {:<13} {:<10} {:>6.1}%  {}  {}\n",
            r.id,
            r.kind,
            r.output.threat_level,
            r.output.confidence_level * 100.0,
            r.output.source,
            r.created_at
        ));
    }
    out
}

pub fn format_graph(g: &GraphView) -> String {
    let mut out = format!("Graph {} — {} (prediction #{})\n", g.id, g.title, g.prediction_id);
    if let Some(context) = &g.context {
        out.push_str(&format!("{}\n", context));
    }
    format_points(&mut out, &g.data);
    if let Some(interpretation) = &g.interpretation {
        out.push_str(&format!("{}\n", interpretation));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Read the body as JSON, failing with the server's `error` message on non-2xx.
fn read_json(resp: reqwest::blocking::Response) -> anyhow::Result<Value> {
    let status = resp.status();
    let body: Value = resp
        .json()
        .with_context(|| format!("server returned {} with a non-JSON body", status))?;
    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("unknown error");
        bail!("server returned {}: {}", status, message);
    }
    Ok(body)
}

fn print_json(body: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}

/// POST a prediction; the server may take up to the LLM timeout to answer.
fn do_predict(server: &str, path: &str, payload: &Value, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}{}", server, path);
    let resp = client(60)?
        .post(&url)
        .json(payload)
        .send()
        .with_context(|| format!("connection failed to {}", url))?;
    let body = read_json(resp)?;

    if json_output {
        return print_json(&body);
    }
    let prediction: PredictionSummary =
        serde_json::from_value(body).context("failed to parse prediction response")?;
    print!("{}", format_prediction(&prediction));
    Ok(())
}

fn do_history(server: &str, limit: usize, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/predictions?limit={}", server, limit);
    let resp = client(10)?
        .get(&url)
        .send()
        .with_context(|| format!("connection failed to {}", url))?;
    let body = read_json(resp)?;

    if json_output {
        return print_json(&body);
    }
    let history: HistoryResponse =
        serde_json::from_value(body).context("failed to parse history response")?;
    if history.predictions.is_empty() {
        eprintln!("No predictions stored yet");
        return Ok(());
    }
    print!("{}", format_history(&history.predictions));
    Ok(())
}

fn do_graph(server: &str, id: i64, svg: Option<&str>, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/graphs/{}", server, id);
    let resp = client(10)?
        .get(&url)
        .send()
        .with_context(|| format!("connection failed to {}", url))?;
    let body = read_json(resp)?;

    if json_output {
        print_json(&body)?;
    }
    let graph: GraphResponse =
        serde_json::from_value(body).context("failed to parse graph response")?;
    if let Some(path) = svg {
        std::fs::write(path, &graph.graph.image_svg)
            .with_context(|| format!("failed to write {}", path))?;
        eprintln!("Wrote {}", path);
    }
    if !json_output {
        print!("{}", format_graph(&graph.graph));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(10)?
        .get(&url)
        .send()
        .with_context(|| format!("cannot reach {}", url))?;
    let body = read_json(resp)?;

    if json_output {
        return print_json(&body);
    }
    println!("Forecaster server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:           {}", body["version"].as_str().unwrap_or("?"));
    println!("Database:          {}", body["database"].as_str().unwrap_or("?"));
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Bayesian {
            mec_a,
            pbp2a,
            vancomycin_profile,
            ceftaroline_profile,
        } => do_predict(
            &server,
            "/api/predictions/bayesian",
            &bayesian_payload(
                &mec_a,
                &pbp2a,
                vancomycin_profile.as_deref(),
                ceftaroline_profile.as_deref(),
            ),
            cli.json,
        ),
        Commands::Evolutionary {
            patterns,
            trajectories,
            knowledge,
        } => do_predict(
            &server,
            "/api/predictions/evolutionary",
            &evolutionary_payload(&patterns, &trajectories, knowledge.as_deref()),
            cli.json,
        ),
        Commands::History { limit } => do_history(&server, limit, cli.json),
        Commands::Graph { id, svg } => do_graph(&server, id, svg.as_deref(), cli.json),
        Commands::Status => do_status(&server, cli.json),
    };

    if let Err(e) = result {
        eprintln!("forecaster-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
