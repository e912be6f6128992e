//! Chart embedding for fenced code blocks
//!
//! A fenced block tagged `chartjs` becomes a Chart.js canvas, one tagged
//! `apache-echarts` or `echarts` becomes an Apache ECharts container. The
//! block body is YAML; it is checked against a small schema and embedded as
//! JSON in a loader script. A block that fails to parse or validate turns
//! into an inline error message instead of stopping the pass.

use mdpub_mdast::{Node, Root};
use saphyr::{LoadableYamlNode, Yaml};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::context::DocumentContext;
use crate::{PipelineError, Result};

const CHART_JS_SRC: &str = "https://cdn.jsdelivr.net/npm/chart.js";
const ECHARTS_SRC: &str = "https://cdn.jsdelivr.net/npm/echarts@5.1.2/dist/echarts.min.js";

const ECHARTS_DEFAULT_WIDTH: f64 = 800.0;
const ECHARTS_DEFAULT_HEIGHT: f64 = 600.0;

/// Chart libraries recognised by fence language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    ChartJs,
    ECharts,
}

impl ChartKind {
    pub fn from_lang(lang: &str) -> Option<Self> {
        match lang {
            "chartjs" => Some(ChartKind::ChartJs),
            "apache-echarts" | "echarts" => Some(ChartKind::ECharts),
            _ => None,
        }
    }

    /// Library name used in error messages
    pub fn label(self) -> &'static str {
        match self {
            ChartKind::ChartJs => "Chart.js",
            ChartKind::ECharts => "Apache ECharts",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CanvasOptions {
    id: Option<String>,
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartJsOptions {
    canvas: Option<CanvasOptions>,
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: String,
    #[allow(dead_code)]
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct EChartsOptions {
    canvas: Option<CanvasOptions>,
}

/// Counts from one chart pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChartSummary {
    pub rendered: usize,
    pub failed: usize,
}

/// Replace every chart code block in `root` with its HTML rendering
///
/// Element ids are numbered per document through `ctx.charts`; invalid
/// blocks do not consume a number.
pub fn embed_charts(root: &mut Root, ctx: &mut DocumentContext) -> ChartSummary {
    let mut summary = ChartSummary::default();

    root.visit_mut(|node| {
        let Node::Code(code) = node else {
            return;
        };
        let Some(kind) = code.lang.as_deref().and_then(ChartKind::from_lang) else {
            return;
        };

        let html = match render_chart(kind, &code.value, ctx) {
            Ok(html) => {
                summary.rendered += 1;
                html
            }
            Err(err) => {
                tracing::warn!(chart = kind.label(), error = %err, "Invalid chart block");
                summary.failed += 1;
                format!(
                    "<div>Error parsing {} configuration: {}</div>",
                    kind.label(),
                    escape_html(&err.to_string())
                )
            }
        };
        *node = Node::html(html);
    });

    summary
}

/// Render one chart block body to HTML
pub fn render_chart(kind: ChartKind, source: &str, ctx: &mut DocumentContext) -> Result<String> {
    let config = yaml_to_json(source)?;
    let script_config = script_json(&config)?;

    match kind {
        ChartKind::ChartJs => {
            let options: ChartJsOptions = serde_json::from_value(config)
                .map_err(|e| PipelineError::ChartSchema(e.to_string()))?;
            ctx.charts.chart_js += 1;
            let id = options
                .canvas
                .and_then(|c| c.id)
                .unwrap_or_else(|| format!("chart-js-{}", ctx.charts.chart_js));
            Ok(chart_js_html(&id, &script_config))
        }
        ChartKind::ECharts => {
            let options: EChartsOptions = serde_json::from_value(config)
                .map_err(|e| PipelineError::ChartSchema(e.to_string()))?;
            ctx.charts.echarts += 1;
            let canvas = options.canvas.unwrap_or_default();
            let id = canvas
                .id
                .unwrap_or_else(|| format!("apache-echarts-{}", ctx.charts.echarts));
            Ok(echarts_html(
                &id,
                canvas.width.unwrap_or(ECHARTS_DEFAULT_WIDTH),
                canvas.height.unwrap_or(ECHARTS_DEFAULT_HEIGHT),
                &script_config,
            ))
        }
    }
}

/// Escape text for an HTML element body
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Pretty JSON safe to place inside a `<script>` element
fn script_json(config: &Value) -> Result<String> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| PipelineError::ChartSchema(e.to_string()))?;
    Ok(json.replace("</", "<\\/"))
}

fn chart_js_html(id: &str, config: &str) -> String {
    format!(
        r##"<canvas id="{id}" class="chart-js"></canvas>
<script>
(() => {{
  const render = () => {{
    const canvas = document.querySelector("#{id}");
    const chart = new Chart(canvas, {config});
    canvas.onclick = (evt) => {{
      const points = chart.getElementsAtEventForMode(evt, "nearest", {{ intersect: true }}, true);
      if (points.length) {{
        const first = points[0];
        const data = chart.data.datasets[first.datasetIndex].data[first.index];
        if (data && data.navigation) window.location = data.navigation.url;
        if (data && data.url) window.location = data.url;
      }}
    }};
  }};
  if ("Chart" in window) {{
    render();
  }} else {{
    const script = document.createElement("script");
    script.onload = render;
    script.type = "text/javascript";
    script.src = "{src}";
    document.head.appendChild(script);
  }}
}})()
</script>"##,
        id = id,
        config = config,
        src = CHART_JS_SRC,
    )
}

fn echarts_html(id: &str, width: f64, height: f64, config: &str) -> String {
    format!(
        r##"<div id="{id}" class="apache-echarts" style="width: {width}px; height: {height}px;"></div>
<script>
(() => {{
  const render = () => {{
    const chart = echarts.init(document.getElementById("{id}"));
    chart.setOption({config});
    chart.on("click", ({{ data }}) => {{
      if (data && data.navigation) window.location = data.navigation.url;
      if (data && data.url) window.location = data.url;
    }});
    window.addEventListener("resize", () => chart.resize());
  }};
  if ("echarts" in window) {{
    render();
  }} else {{
    const script = document.createElement("script");
    script.onload = render;
    script.type = "text/javascript";
    script.src = "{src}";
    document.head.appendChild(script);
  }}
}})()
</script>"##,
        id = id,
        width = width,
        height = height,
        config = config,
        src = ECHARTS_SRC,
    )
}

/// Parse a YAML document into JSON
///
/// Only the first document is used; an empty body is `null`.
fn yaml_to_json(source: &str) -> Result<Value> {
    let docs = Yaml::load_from_str(source).map_err(|e| PipelineError::ChartYaml(e.to_string()))?;
    match docs.first() {
        Some(doc) => yaml_value(doc),
        None => Ok(Value::Null),
    }
}

fn yaml_value(node: &Yaml) -> Result<Value> {
    if node.is_null() {
        return Ok(Value::Null);
    }
    if let Some(b) = node.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(i) = node.as_integer() {
        return Ok(Value::Number(i.into()));
    }
    if let Some(f) = node.as_floating_point() {
        return Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| PipelineError::ChartYaml(format!("{} is not a JSON number", f)));
    }
    if let Some(s) = node.as_str() {
        return Ok(Value::String(s.to_string()));
    }
    if let Some(seq) = node.as_sequence() {
        return seq.iter().map(yaml_value).collect::<Result<Vec<_>>>().map(Value::Array);
    }
    if let Some(mapping) = node.as_mapping() {
        let mut object = Map::new();
        for (key, value) in mapping.iter() {
            object.insert(yaml_key(key)?, yaml_value(value)?);
        }
        return Ok(Value::Object(object));
    }
    Err(PipelineError::ChartYaml(
        "unsupported YAML node (aliases and tags are not allowed)".to_string(),
    ))
}

fn yaml_key(key: &Yaml) -> Result<String> {
    if let Some(s) = key.as_str() {
        Ok(s.to_string())
    } else if let Some(i) = key.as_integer() {
        Ok(i.to_string())
    } else if let Some(b) = key.as_bool() {
        Ok(b.to_string())
    } else {
        Err(PipelineError::ChartYaml(
            "mapping keys must be scalars".to_string(),
        ))
    }
}
