//! kgraph-cli: command-line front end for the kgraph HTTP API
//!
//! Every subcommand is one request against a running `kgraph-server`; the server
//! owns the working graph, so consecutive invocations edit the same session.
//!
//! # Subcommands
//! - `status`, `connect <url>`: store health and re-connection
//! - `generate`, `sample`, `import`, `show`, `clear`: the working graph
//! - `add-node`, `update-node`, `delete-node`, `add-edge`, `delete-edge`: manual edits
//! - `save`, `list`, `load`, `delete`: persisted graphs
//! - `analyze <name> centrality|communities|paths`: delegated analytics
//! - `export`: write JSON / CSV / GraphML files

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";
const DEFAULT_COLOR: &str = "#FF6B6B";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "kgraph-cli", version, about = "Generate, edit, persist and analyse knowledge graphs")]
struct Cli {
    /// kgraph HTTP server URL (overrides KGRAPH_HTTP_URL env var)
    #[arg(long, env = "KGRAPH_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show server and graph store health
    Status,

    /// Generate a graph from a natural-language description
    Generate {
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },

    /// Replace the working graph with a built-in sample
    Sample {
        #[arg(value_enum)]
        kind: Sample,
    },

    /// Print the working graph
    Show {
        /// Print the raw JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Empty the working graph
    Clear,

    AddNode {
        id: String,
        label: String,
        #[arg(long, default_value = DEFAULT_COLOR)]
        color: String,
    },

    UpdateNode {
        id: String,
        label: String,
        color: String,
    },

    /// Delete a node and every edge touching it
    DeleteNode { id: String },

    AddEdge {
        source: String,
        target: String,
        label: String,
    },

    /// Delete an edge by its index in `show`
    DeleteEdge { index: usize },

    /// Connect the server to a different graph store
    Connect {
        url: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, env = "KGRAPH_DB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Persist the working graph under a name (replaces a graph with the same name)
    Save {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List persisted graphs, newest first
    List,

    /// Load a persisted graph into the working session
    Load { name: String },

    /// Delete a persisted graph
    Delete { name: String },

    /// Run an analysis against a persisted graph
    Analyze {
        name: String,
        #[command(subcommand)]
        analysis: Analysis,
    },

    /// Export the working graph to files
    Export {
        name: String,
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Directory the files are written to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Replace the working graph with a previously exported JSON document
    Import { file: PathBuf },
}

#[derive(Debug, Subcommand)]
enum Analysis {
    /// Degree, approximate betweenness and approximate closeness per node
    Centrality,
    /// Naive connected-component communities
    Communities,
    /// Shortest path between two nodes, or a summary when either is omitted
    Paths {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        target: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sample {
    Technology,
    VehicleLifecycle,
}

impl Sample {
    fn wire_name(self) -> &'static str {
        match self {
            Sample::Technology => "technology",
            Sample::VehicleLifecycle => "vehicle_lifecycle",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
    Graphml,
}

impl Format {
    fn wire_name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Graphml => "graphml",
        }
    }
}

impl Analysis {
    fn to_body(&self) -> Value {
        match self {
            Analysis::Centrality => json!({"kind": "centrality"}),
            Analysis::Communities => json!({"kind": "communities"}),
            Analysis::Paths { source, target } => {
                let query = match (non_empty(source), non_empty(target)) {
                    (Some(s), Some(t)) => json!({"type": "specific", "source": s, "target": t}),
                    _ => json!({"type": "summary"}),
                };
                json!({"kind": "paths", "query": query})
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// HTTP client
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    base: reqwest::Url,
}

impl Api {
    fn new(server: &str) -> anyhow::Result<Self> {
        let base = reqwest::Url::parse(server).with_context(|| format!("invalid server URL {}", server))?;
        if base.cannot_be_a_base() {
            bail!("invalid server URL {}", server);
        }
        let client = reqwest::blocking::Client::builder()
            // Generation can take a while
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self { client, base })
    }

    /// Server URL with `segments` appended; each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> anyhow::Result<reqwest::Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid server URL {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, method: reqwest::Method, path: &[&str], body: Option<Value>) -> anyhow::Result<Value> {
        let url = self.url(path)?;
        let mut req = self.client.request(method, url.clone());
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .with_context(|| format!("cannot reach {}", url))?;
        let status = resp.status();
        let body: Value = resp.json().unwrap_or(Value::Null);

        if !status.is_success() {
            let message = body["error"].as_str().unwrap_or("no error message");
            bail!("server returned {}: {}", status, message);
        }
        Ok(body)
    }

    fn get(&self, path: &[&str]) -> anyhow::Result<Value> {
        self.send(reqwest::Method::GET, path, None)
    }

    fn post(&self, path: &[&str], body: Value) -> anyhow::Result<Value> {
        self.send(reqwest::Method::POST, path, Some(body))
    }

    fn put(&self, path: &[&str], body: Value) -> anyhow::Result<Value> {
        self.send(reqwest::Method::PUT, path, Some(body))
    }

    fn delete(&self, path: &[&str]) -> anyhow::Result<Value> {
        self.send(reqwest::Method::DELETE, path, None)
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Left-aligned text table with a dashed header rule.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(headers.iter().map(|h| h.to_string()).collect()));
    out.push(line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        out.push(line(row.clone()));
    }
    out.join("\n")
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn rows_of(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Session response (`{name, node_count, edge_count, graph}`) as node and edge tables.
pub fn render_graph(session: &Value) -> String {
    let graph = &session["graph"];
    let nodes: Vec<Vec<String>> = rows_of(&graph["nodes"])
        .iter()
        .map(|n| vec![text(&n["id"]), text(&n["label"]), text(&n["color"])])
        .collect();
    let edges: Vec<Vec<String>> = rows_of(&graph["edges"])
        .iter()
        .enumerate()
        .map(|(i, e)| {
            vec![
                i.to_string(),
                text(&e["source"]),
                text(&e["target"]),
                text(&e["label"]),
            ]
        })
        .collect();

    let title = match session["name"].as_str() {
        Some(name) => format!("Graph '{}'", name),
        None => "Working graph".to_string(),
    };
    format!(
        "{}: {} nodes, {} edges\n\n{}\n\n{}",
        title,
        nodes.len(),
        edges.len(),
        format_table(&["ID", "LABEL", "COLOR"], &nodes),
        format_table(&["#", "SOURCE", "TARGET", "LABEL"], &edges)
    )
}

pub fn render_graph_list(list: &Value) -> String {
    let rows: Vec<Vec<String>> = rows_of(&list["graphs"])
        .iter()
        .map(|g| {
            vec![
                text(&g["name"]),
                text(&g["node_count"]),
                text(&g["edge_count"]),
                text(&g["created_date"]),
                text(&g["description"]),
            ]
        })
        .collect();
    if rows.is_empty() {
        return "No saved graphs".to_string();
    }
    format_table(&["NAME", "NODES", "EDGES", "CREATED", "DESCRIPTION"], &rows)
}

pub fn render_centrality(result: &Value) -> String {
    let rows: Vec<Vec<String>> = rows_of(&result["rows"])
        .iter()
        .map(|r| {
            vec![
                text(&r["node_id"]),
                text(&r["label"]),
                text(&r["degree_centrality"]),
                text(&r["betweenness_centrality"]),
                format!("{:.3}", r["closeness_centrality"].as_f64().unwrap_or(0.0)),
            ]
        })
        .collect();
    if rows.is_empty() {
        return "No centrality data found".to_string();
    }

    let mut out = format_table(&["NODE", "LABEL", "DEGREE", "BETWEENNESS", "CLOSENESS"], &rows);
    let insights = &result["insights"];
    if insights.is_object() {
        out.push_str(&format!(
            "\n\nMost connected node:   {} ({})\nMost important broker: {} ({})",
            text(&insights["most_connected"]["label"]),
            text(&insights["most_connected"]["degree_centrality"]),
            text(&insights["top_broker"]["label"]),
            text(&insights["top_broker"]["betweenness_centrality"]),
        ));
    }
    out
}

pub fn render_communities(result: &Value) -> String {
    let summary = &result["summary"];
    let members = match summary["members"].as_object() {
        Some(m) if !m.is_empty() => m,
        _ => return "No community data found".to_string(),
    };

    let mut out = String::new();
    for (id, labels) in members {
        let labels: Vec<String> = rows_of(labels).iter().map(text).collect();
        out.push_str(&format!(
            "Community {} ({} nodes): {}\n",
            id,
            labels.len(),
            labels.join(", ")
        ));
    }
    out.push_str(&format!(
        "\nTotal communities: {}\nLargest community: {}\nAverage size:      {:.1}",
        text(&summary["community_count"]),
        text(&summary["largest_size"]),
        summary["average_size"].as_f64().unwrap_or(0.0)
    ));
    out
}

#[derive(Debug, Deserialize)]
struct PathRow {
    path_nodes: Vec<String>,
    path_edges: Vec<String>,
    total_cost: i64,
}

pub fn render_paths(result: &Value) -> String {
    let analysis = &result["analysis"];
    match analysis["kind"].as_str() {
        Some("paths") => {
            let paths: Vec<PathRow> =
                serde_json::from_value(analysis["result"].clone()).unwrap_or_default();
            if paths.is_empty() {
                return "No path found".to_string();
            }
            paths
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let mut walk = p.path_nodes.first().cloned().unwrap_or_default();
                    for (node, edge) in p.path_nodes.iter().skip(1).zip(&p.path_edges) {
                        walk.push_str(&format!(" -[{}]-> {}", edge, node));
                    }
                    format!("Path {}: {}\nCost: {}", i + 1, walk, p.total_cost)
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Some("summary") => {
            let s = &analysis["result"];
            let avg = s["avg_path_length"]
                .as_f64()
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string());
            format!(
                "Total nodes:     {}\nMin path length: {}\nAvg path length: {}\nMax path length: {}",
                text(&s["node_count"]),
                text(&s["min_path_length"]),
                avg,
                text(&s["max_path_length"])
            )
        }
        _ => "No path data found".to_string(),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn do_status(api: &Api) -> anyhow::Result<()> {
    let url = api.url(&["health"])?;
    let resp = api
        .client
        .get(url.clone())
        .send()
        .with_context(|| format!("cannot reach {}", url))?;
    let body: Value = resp.json().unwrap_or_default();

    println!("kgraph server:  {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
    println!("Graph store:    {}", if body["store_connected"] == true { "connected" } else { "not connected" });
    if let Some(pg) = body["postgresql"].as_str() {
        println!("PostgreSQL:     {}", pg);
    }
    if let Some(err) = body["error"].as_str() {
        println!("Store error:    {}", err);
    }
    println!(
        "Generation:     {}",
        if body["generation_enabled"] == true { "enabled" } else { "disabled (no API key)" }
    );
    Ok(())
}

/// A single normal path component: no separators, no `..`, not absolute.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn write_artifacts(out: &Path, export: &Value) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out).with_context(|| format!("cannot create {}", out.display()))?;
    let mut written = Vec::new();
    for artifact in rows_of(&export["artifacts"]) {
        let file_name = artifact["file_name"]
            .as_str()
            .ok_or_else(|| anyhow!("artifact without file name"))?;
        if !is_plain_file_name(file_name) {
            bail!("refusing to write artifact '{}' outside {}", file_name, out.display());
        }
        let content = artifact["content"].as_str().unwrap_or_default();
        let path = out.join(file_name);
        std::fs::write(&path, content).with_context(|| format!("cannot write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let api = Api::new(&cli.server)?;

    match cli.command {
        Commands::Status => do_status(&api)?,
        Commands::Generate { description } => {
            println!("Generating knowledge graph...");
            let session = api.post(&["graph", "generate"], json!({"description": description.join(" ")}))?;
            println!("{}", render_graph(&session));
        }
        Commands::Sample { kind } => {
            let session = api.post(&["graph", "sample"], json!({"sample": kind.wire_name()}))?;
            println!(
                "Sample graph loaded: {} nodes, {} edges",
                session["node_count"], session["edge_count"]
            );
        }
        Commands::Show { json } => {
            let session = api.get(&["graph"])?;
            if json {
                println!("{}", serde_json::to_string_pretty(&session["graph"])?);
            } else {
                println!("{}", render_graph(&session));
            }
        }
        Commands::Clear => {
            api.delete(&["graph"])?;
            println!("Working graph cleared");
        }
        Commands::AddNode { id, label, color } => {
            let resp = api.post(&["graph", "nodes"], json!({"id": id, "label": label, "color": color}))?;
            println!("Added node '{}'", text(&resp["node"]["id"]));
        }
        Commands::UpdateNode { id, label, color } => {
            api.put(
                &["graph", "nodes", id.as_str()],
                json!({"label": label, "color": color}),
            )?;
            println!("Updated node '{}'", id);
        }
        Commands::DeleteNode { id } => {
            let resp = api.delete(&["graph", "nodes", id.as_str()])?;
            println!(
                "Deleted node '{}' and {} connected edge(s)",
                id, resp["edges_removed"]
            );
        }
        Commands::AddEdge { source, target, label } => {
            api.post(
                &["graph", "edges"],
                json!({"source": source, "target": target, "label": label}),
            )?;
            println!("Added edge {} -[{}]-> {}", source, label, target);
        }
        Commands::DeleteEdge { index } => {
            let resp = api.delete(&["graph", "edges", index.to_string().as_str()])?;
            let edge = &resp["deleted"];
            println!(
                "Deleted edge {} -[{}]-> {}",
                text(&edge["source"]),
                text(&edge["label"]),
                text(&edge["target"])
            );
        }
        Commands::Connect { url, username, password } => {
            let resp = api.post(
                &["connect"],
                json!({"url": url, "username": username, "password": password}),
            )?;
            println!("Connected: {}", text(&resp["postgresql"]));
        }
        Commands::Save { name, description } => {
            let report = api.post(&["graphs"], json!({"name": name, "description": description}))?;
            println!(
                "Saved '{}': {} nodes, {} edges",
                text(&report["name"]),
                report["nodes_written"],
                report["edges_written"]
            );
            if report["edges_dropped"].as_u64().unwrap_or(0) > 0 {
                println!(
                    "Warning: {} edge(s) referenced missing nodes and were not saved",
                    report["edges_dropped"]
                );
            }
        }
        Commands::List => println!("{}", render_graph_list(&api.get(&["graphs"])?)),
        Commands::Load { name } => {
            let session = api.post(&["graphs", name.as_str(), "load"], json!({}))?;
            println!("{}", render_graph(&session));
        }
        Commands::Delete { name } => {
            api.delete(&["graphs", name.as_str()])?;
            println!("Deleted graph '{}'", name);
        }
        Commands::Analyze { name, analysis } => {
            let result = api.post(&["graphs", name.as_str(), "analysis"], analysis.to_body())?;
            let rendered = match analysis {
                Analysis::Centrality => render_centrality(&result),
                Analysis::Communities => render_communities(&result),
                Analysis::Paths { .. } => render_paths(&result),
            };
            println!("{}", rendered);
        }
        Commands::Export { name, format, out } => {
            let export = api.post(&["export"], json!({"name": name, "format": format.wire_name()}))?;
            for path in write_artifacts(&out, &export)? {
                println!("Wrote {}", path.display());
            }
        }
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let document: Value = serde_json::from_str(&text)
                .with_context(|| format!("{} is not JSON", file.display()))?;
            let session = api.post(&["graph", "import"], document)?;
            println!(
                "Imported {} nodes, {} edges",
                session["node_count"], session["edge_count"]
            );
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("kgraph-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
