//! Built-in demonstration graphs.

use serde::{Deserialize, Serialize};

use crate::models::{Edge, Graph, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// AI and technology landscape, 15 nodes / 20 edges.
    Technology,
    /// Vehicle lifecycle management, 30 nodes / 47 edges.
    VehicleLifecycle,
}

impl SampleKind {
    pub fn title(self) -> &'static str {
        match self {
            SampleKind::Technology => "AI/Technology",
            SampleKind::VehicleLifecycle => "Vehicle Lifecycle",
        }
    }

    pub fn graph(self) -> Graph {
        match self {
            SampleKind::Technology => build(TECHNOLOGY_NODES, TECHNOLOGY_EDGES),
            SampleKind::VehicleLifecycle => build(VEHICLE_NODES, VEHICLE_EDGES),
        }
    }
}

fn build(nodes: &[(&str, &str, &str)], edges: &[(&str, &str, &str)]) -> Graph {
    Graph::from_parts(
        nodes
            .iter()
            .map(|(id, label, color)| Node::new(*id, *label, *color))
            .collect(),
        edges
            .iter()
            .map(|(source, target, label)| Edge::new(*source, *target, *label))
            .collect(),
    )
}

const TECHNOLOGY_NODES: &[(&str, &str, &str)] = &[
    ("tech", "Technology", "#FF6B6B"),
    ("ai", "Artificial Intelligence", "#4ECDC4"),
    ("ml", "Machine Learning", "#45B7D1"),
    ("nlp", "Natural Language Processing", "#96CEB4"),
    ("cv", "Computer Vision", "#FFEAA7"),
    ("robotics", "Robotics", "#DDA0DD"),
    ("data", "Data Science", "#98D8C8"),
    ("python", "Python", "#F7DC6F"),
    ("tensorflow", "TensorFlow", "#AED6F1"),
    ("pytorch", "PyTorch", "#F8BBD9"),
    ("research", "Research", "#D2B4DE"),
    ("industry", "Industry", "#A9DFBF"),
    ("healthcare", "Healthcare", "#F9E79F"),
    ("finance", "Finance", "#FAD7A0"),
    ("education", "Education", "#ABEBC6"),
];

const TECHNOLOGY_EDGES: &[(&str, &str, &str)] = &[
    ("tech", "ai", "encompasses"),
    ("ai", "ml", "includes"),
    ("ai", "nlp", "includes"),
    ("ai", "cv", "includes"),
    ("ai", "robotics", "enables"),
    ("ml", "data", "requires"),
    ("ml", "python", "implemented_in"),
    ("ml", "tensorflow", "uses"),
    ("ml", "pytorch", "uses"),
    ("nlp", "python", "implemented_in"),
    ("cv", "python", "implemented_in"),
    ("ai", "research", "drives"),
    ("ai", "industry", "transforms"),
    ("ai", "healthcare", "applied_in"),
    ("ai", "finance", "applied_in"),
    ("ai", "education", "applied_in"),
    ("data", "healthcare", "analyzed_in"),
    ("data", "finance", "analyzed_in"),
    ("python", "data", "processes"),
    ("research", "industry", "influences"),
];

const VEHICLE_NODES: &[(&str, &str, &str)] = &[
    ("vehicle", "Vehicle", "#FF6B6B"),
    // Lifecycle stages
    ("design", "Design Phase", "#4ECDC4"),
    ("manufacturing", "Manufacturing", "#45B7D1"),
    ("assembly", "Assembly", "#96CEB4"),
    ("testing", "Quality Testing", "#FFEAA7"),
    ("delivery", "Delivery", "#DDA0DD"),
    ("registration", "Registration", "#98D8C8"),
    ("operation", "Operation", "#F7DC6F"),
    ("maintenance", "Maintenance", "#AED6F1"),
    ("inspection", "Inspection", "#F8BBD9"),
    ("repair", "Repair", "#D2B4DE"),
    ("recall", "Recall", "#A9DFBF"),
    ("disposal", "End-of-Life", "#F9E79F"),
    // Stakeholders
    ("manufacturer", "Manufacturer", "#FAD7A0"),
    ("dealer", "Dealer", "#ABEBC6"),
    ("owner", "Owner", "#F5B7B1"),
    ("service_center", "Service Center", "#AED6F1"),
    ("regulator", "Regulator", "#D5A6BD"),
    ("insurer", "Insurance Company", "#A9CCE3"),
    ("recycler", "Recycler", "#A3E4D7"),
    // Components
    ("engine", "Engine", "#F8C471"),
    ("transmission", "Transmission", "#BB8FCE"),
    ("brakes", "Brakes", "#85C1E9"),
    ("electronics", "Electronics", "#82E0AA"),
    ("body", "Body", "#F7DC6F"),
    // Documentation
    ("vin", "VIN", "#D7BDE2"),
    ("service_record", "Service Records", "#A2D9CE"),
    ("warranty", "Warranty", "#F9E79F"),
    ("manual", "Owner Manual", "#FADBD8"),
    ("compliance", "Compliance Data", "#D1F2EB"),
];

const VEHICLE_EDGES: &[(&str, &str, &str)] = &[
    ("design", "manufacturing", "leads_to"),
    ("manufacturing", "assembly", "leads_to"),
    ("assembly", "testing", "leads_to"),
    ("testing", "delivery", "leads_to"),
    ("delivery", "registration", "leads_to"),
    ("registration", "operation", "leads_to"),
    ("operation", "maintenance", "requires"),
    ("maintenance", "inspection", "includes"),
    ("inspection", "repair", "may_require"),
    ("operation", "disposal", "eventually_leads_to"),
    ("vehicle", "design", "starts_with"),
    ("vehicle", "vin", "identified_by"),
    ("vehicle", "engine", "contains"),
    ("vehicle", "transmission", "contains"),
    ("vehicle", "brakes", "contains"),
    ("vehicle", "electronics", "contains"),
    ("vehicle", "body", "contains"),
    ("manufacturer", "design", "responsible_for"),
    ("manufacturer", "manufacturing", "responsible_for"),
    ("manufacturer", "assembly", "responsible_for"),
    ("manufacturer", "warranty", "provides"),
    ("manufacturer", "manual", "creates"),
    ("manufacturer", "recall", "initiates"),
    ("dealer", "delivery", "handles"),
    ("dealer", "registration", "assists_with"),
    ("owner", "vehicle", "owns"),
    ("owner", "operation", "responsible_for"),
    ("owner", "maintenance", "schedules"),
    ("owner", "insurer", "contracts_with"),
    ("service_center", "maintenance", "performs"),
    ("service_center", "repair", "performs"),
    ("service_center", "service_record", "maintains"),
    ("regulator", "inspection", "mandates"),
    ("regulator", "compliance", "monitors"),
    ("regulator", "recall", "orders"),
    ("insurer", "vehicle", "covers"),
    ("recycler", "disposal", "handles"),
    ("engine", "maintenance", "requires"),
    ("transmission", "maintenance", "requires"),
    ("brakes", "inspection", "subject_to"),
    ("electronics", "testing", "validated_during"),
    ("service_record", "maintenance", "documents"),
    ("service_record", "repair", "documents"),
    ("warranty", "repair", "covers"),
    ("manual", "operation", "guides"),
    ("compliance", "testing", "verified_during"),
    ("compliance", "inspection", "checked_during"),
];
