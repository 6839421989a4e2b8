//! Mobile-first HTML dashboard for the knowledge graph.
//!
//! The export is a single self-contained page: a vis-network canvas on top,
//! a tap-to-inspect panel below. Node and edge data are injected into the
//! template via `__NODES__` / `__EDGES__` placeholders.

use serde::Serialize;

use profitgraph_shared::{ProfitGraphError, Result};

/// Longest node content carried into the dashboard payload.
const CONTENT_PREVIEW_CHARS: usize = 1_000;

/// A displayable graph node.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: i64,
    pub label: String,
    pub group: String,
    pub detail: String,
    pub content: String,
}

impl GraphNode {
    /// Build a display node from raw graph parts.
    ///
    /// Unnamed strategy nodes display as "Strategy Node"; other unnamed
    /// nodes fall back to their label. Content is truncated to a preview.
    pub fn from_parts(
        id: i64,
        labels: &[String],
        name: Option<&str>,
        detail: Option<&str>,
        content: Option<&str>,
    ) -> Self {
        let group = labels.first().cloned().unwrap_or_else(|| "Entity".into());

        let label = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if group == "Strategy" => "Strategy Node".to_string(),
            _ => group.clone(),
        };

        let content = content.unwrap_or_default();
        let content = if content.chars().count() > CONTENT_PREVIEW_CHARS {
            let preview: String = content.chars().take(CONTENT_PREVIEW_CHARS).collect();
            format!("{preview}...")
        } else {
            content.to_string()
        };

        Self {
            id,
            label,
            group,
            detail: detail.unwrap_or_default().to_string(),
            content,
        }
    }
}

/// A displayable graph edge.
#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub from: i64,
    pub to: i64,
}

/// Render the dashboard HTML with the given nodes and edges embedded.
pub fn render_dashboard(nodes: &[GraphNode], edges: &[GraphEdge]) -> Result<String> {
    let nodes_json = serde_json::to_string(nodes)
        .map_err(|e| ProfitGraphError::parse(format!("node serialization: {e}")))?;
    let edges_json = serde_json::to_string(edges)
        .map_err(|e| ProfitGraphError::parse(format!("edge serialization: {e}")))?;

    Ok(HTML_TEMPLATE
        .replace("__NODES__", &nodes_json)
        .replace("__EDGES__", &edges_json))
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>ProfitGraph Strategy Room</title>
    <meta name="viewport" content="width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no">
    <script type="text/javascript" src="https://unpkg.com/vis-network/standalone/umd/vis-network.min.js"></script>
    <style>
        body { margin: 0; padding: 0; background: #000; color: #0f0; font-family: monospace; overflow: hidden; height: 100vh; width: 100vw; }

        /* LAYOUT: Top 60% Graph, Bottom 40% Info */
        #network {
            width: 100vw;
            height: 60vh;
            border-bottom: 2px solid #333;
            background: #111;
        }

        #panel {
            width: 100vw;
            height: 40vh;
            background: #000;
            padding: 15px;
            box-sizing: border-box;
            overflow-y: auto;
            position: absolute;
            bottom: 0;
            left: 0;
            border-top: 1px solid #0f0;
        }

        /* TYPOGRAPHY */
        h2 { margin: 0 0 10px 0; color: #fff; font-size: 1.2rem; border-bottom: 1px solid #333; padding-bottom: 5px; }
        p { margin: 5px 0; color: #ccc; font-size: 0.9rem; line-height: 1.4; }
        strong { color: #0f0; }

        /* BADGES */
        .badge { display: inline-block; padding: 2px 6px; border-radius: 4px; font-size: 0.7rem; font-weight: bold; margin-bottom: 8px; }
        .risk { border: 1px solid #ff4444; color: #ff4444; }
        .tool { border: 1px solid #0f0; color: #0f0; }
        .strategy { border: 1px solid #00ccff; color: #00ccff; }

        /* HINT TEXT */
        .hint { color: #555; text-align: center; margin-top: 20px; font-style: italic; }
    </style>
</head>
<body>
    <div id="network"></div>
    <div id="panel">
        <div id="content-area">
            <p class="hint">Tap a node to reveal intelligence...</p>
        </div>
    </div>

    <script type="text/javascript">
        var nodes = new vis.DataSet(__NODES__);
        var edges = new vis.DataSet(__EDGES__);

        var container = document.getElementById('network');
        var data = { nodes: nodes, edges: edges };

        // MOBILE OPTIMIZED SETTINGS
        var options = {
            nodes: {
                shape: 'dot',
                size: 20,
                font: { color: '#ffffff', size: 14, strokeWidth: 2, strokeColor: '#000' },
                borderWidth: 2,
                shadow: true
            },
            edges: {
                width: 1,
                color: { color: '#444', highlight: '#0f0' },
                selectionWidth: 3
            },
            interaction: {
                hover: false,
                tooltipDelay: 200,
                zoomView: true,
                dragView: true
            },
            physics: {
                stabilization: false,
                barnesHut: { gravitationalConstant: -10000, springLength: 150 }
            },
            groups: {
                Strategy: { color: '#00ccff', size: 30 },
                Tool: { color: '#00ff00' },
                Risk: { color: '#ff4444', shape: 'triangle', size: 25 },
                Entity: { color: '#ffff00' }
            }
        };

        var network = new vis.Network(container, data, options);

        // CLICK HANDLER
        network.on("click", function (params) {
            var contentDiv = document.getElementById('content-area');

            if (params.nodes.length > 0) {
                // User tapped a node
                var nodeId = params.nodes[0];
                var node = nodes.get(nodeId);

                var badgeClass = "";
                if (node.group === "Risk") badgeClass = "risk";
                else if (node.group === "Strategy") badgeClass = "strategy";
                else badgeClass = "tool";

                var html = "<h2>" + node.label + "</h2>";
                html += "<span class='badge " + badgeClass + "'>" + node.group + "</span>";

                if (node.detail) {
                    html += "<p><strong>Details:</strong> " + node.detail + "</p>";
                }
                if (node.content) {
                    html += "<p><strong>Strategy Brief:</strong><br>" + node.content.replace(/\n/g, '<br>') + "</p>";
                }

                contentDiv.innerHTML = html;
            } else {
                // User tapped empty space
                contentDiv.innerHTML = '<p class="hint">Tap a node to reveal intelligence...</p>';
            }
        });
    </script>
</body>
</html>
"#;
