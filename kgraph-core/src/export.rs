//! Export formatter: JSON document, CSV pair, GraphML
//!
//! Pure functions over a [`Graph`]; the caller decides where the artifacts go.

use std::fmt::Write as _;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::KgError;
use crate::models::{Edge, Graph, Node, ValidationError};

pub const JSON_FORMAT_TAG: &str = "knowledge_graph_json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
    Graphml,
}

impl std::str::FromStr for ExportFormat {
    type Err = KgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "graphml" => Ok(ExportFormat::Graphml),
            other => Err(KgError::Export(format!("unknown export format '{}'", other))),
        }
    }
}

/// One downloadable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub nodes: String,
    pub edges: String,
}

#[derive(Serialize)]
struct JsonMetadata<'a> {
    name: &'a str,
    exported_date: String,
    node_count: usize,
    edge_count: usize,
    format: &'static str,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    metadata: JsonMetadata<'a>,
    nodes: &'a [Node],
    edges: &'a [Edge],
}

#[derive(Deserialize)]
struct ImportEdge {
    source: String,
    #[serde(alias = "to")]
    target: String,
    label: String,
}

#[derive(Deserialize)]
struct ImportDocument {
    nodes: Vec<Node>,
    edges: Vec<ImportEdge>,
}

pub fn to_json(graph: &Graph, name: &str) -> Result<String, KgError> {
    let document = JsonDocument {
        metadata: JsonMetadata {
            name,
            exported_date: Utc::now().to_rfc3339(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            format: JSON_FORMAT_TAG,
        },
        nodes: &graph.nodes,
        edges: &graph.edges,
    };
    serde_json::to_string_pretty(&document).map_err(|e| KgError::Export(e.to_string()))
}

/// Read a document written by [`to_json`]. Metadata is ignored; edges written with
/// a `to` key instead of `target` are accepted.
pub fn from_json(text: &str) -> Result<Graph, KgError> {
    let document: ImportDocument =
        serde_json::from_str(text).map_err(|e| KgError::Parse(e.to_string()))?;
    let edges = document
        .edges
        .into_iter()
        .map(|e| Edge::new(e.source, e.target, e.label))
        .collect();
    Ok(Graph::from_parts(document.nodes, edges))
}

pub fn to_csv(graph: &Graph) -> Result<CsvExport, KgError> {
    let mut nodes = csv::Writer::from_writer(Vec::new());
    nodes
        .write_record(["id", "label", "color"])
        .map_err(csv_error)?;
    for node in &graph.nodes {
        nodes
            .write_record([&node.id, &node.label, &node.color])
            .map_err(csv_error)?;
    }

    let mut edges = csv::Writer::from_writer(Vec::new());
    edges
        .write_record(["source", "target", "label"])
        .map_err(csv_error)?;
    for edge in &graph.edges {
        edges
            .write_record([&edge.source, &edge.target, &edge.label])
            .map_err(csv_error)?;
    }

    Ok(CsvExport {
        nodes: finish_csv(nodes)?,
        edges: finish_csv(edges)?,
    })
}

fn csv_error(e: csv::Error) -> KgError {
    KgError::Export(format!("CSV write failed: {}", e))
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String, KgError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| KgError::Export(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| KgError::Export(e.to_string()))
}

pub fn to_graphml(graph: &Graph, name: &str) -> String {
    let mut out = String::new();
    out.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">
  <key id="label" for="node" attr.name="label" attr.type="string"/>
  <key id="color" for="node" attr.name="color" attr.type="string"/>
  <key id="edge_label" for="edge" attr.name="label" attr.type="string"/>
"#,
    );
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        r#"  <graph id="{}" edgedefault="directed">"#,
        xml_escape(name)
    );

    for node in &graph.nodes {
        let _ = writeln!(
            out,
            r#"    <node id="{}">
      <data key="label">{}</data>
      <data key="color">{}</data>
    </node>"#,
            xml_escape(&node.id),
            xml_escape(&node.label),
            xml_escape(&node.color)
        );
    }

    for (i, edge) in graph.edges.iter().enumerate() {
        let _ = writeln!(
            out,
            r#"    <edge id="e{}" source="{}" target="{}">
      <data key="edge_label">{}</data>
    </edge>"#,
            i,
            xml_escape(&edge.source),
            xml_escape(&edge.target),
            xml_escape(&edge.label)
        );
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}

fn xml_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Render `graph` in `format` as the files a user would download.
pub fn export(graph: &Graph, name: &str, format: ExportFormat) -> Result<Vec<ExportArtifact>, KgError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty {
            field: "Export file name",
        }
        .into());
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ValidationError::InvalidFileName(name.to_string()).into());
    }

    let artifacts = match format {
        ExportFormat::Json => vec![ExportArtifact {
            file_name: format!("{}.json", name),
            mime: "application/json".to_string(),
            content: to_json(graph, name)?,
        }],
        ExportFormat::Csv => {
            let csv = to_csv(graph)?;
            vec![
                ExportArtifact {
                    file_name: format!("{}_nodes.csv", name),
                    mime: "text/csv".to_string(),
                    content: csv.nodes,
                },
                ExportArtifact {
                    file_name: format!("{}_edges.csv", name),
                    mime: "text/csv".to_string(),
                    content: csv.edges,
                },
            ]
        }
        ExportFormat::Graphml => vec![ExportArtifact {
            file_name: format!("{}.graphml", name),
            mime: "application/xml".to_string(),
            content: to_graphml(graph, name),
        }],
    };

    tracing::debug!(name, ?format, files = artifacts.len(), "Graph exported");
    Ok(artifacts)
}
