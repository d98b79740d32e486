use std::collections::BTreeSet;

use crate::model::{Layer, SimplifiedDockerfile, WaitForKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeStyle {
    #[default]
    Default,
    Solid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DotOptions {
    pub layers: bool,
    pub legend: bool,
    pub edge_style: EdgeStyle,
    pub nodesep: f64,
    pub ranksep: f64,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            layers: false,
            legend: false,
            edge_style: EdgeStyle::Default,
            nodesep: 1.0,
            ranksep: 0.5,
        }
    }
}

pub fn render_dot(dockerfile: &SimplifiedDockerfile, options: &DotOptions) -> String {
    let mut out = String::from("digraph G {\n");
    out.push_str("  compound=true;\n");
    out.push_str(&format!("  nodesep={};\n", options.nodesep));
    out.push_str(&format!("  ranksep={};\n", options.ranksep));
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=rounded];\n");

    for (index, image) in dockerfile.external_images.iter().enumerate() {
        out.push_str(&format!(
            "  external_image_{index} [label=\"{}\", style=\"dashed,rounded\", color=grey40];\n",
            escape_dot(&image.name)
        ));
    }

    let renderer = Renderer {
        dockerfile,
        options,
    };
    if options.layers {
        renderer.write_layers(&mut out);
    } else {
        renderer.write_stages(&mut out);
    }

    if options.legend {
        write_legend(&mut out, options.edge_style);
    }

    out.push_str("}\n");
    out
}

struct Renderer<'a> {
    dockerfile: &'a SimplifiedDockerfile,
    options: &'a DotOptions,
}

enum Target {
    Image(usize),
    Stage(usize),
}

impl Renderer<'_> {
    fn write_stages(&self, out: &mut String) {
        for (index, stage) in self.dockerfile.stages.iter().enumerate() {
            out.push_str(&format!(
                "  stage_{index} [label=\"{}\"];\n",
                escape_dot(&stage_label(stage.name.as_deref(), index))
            ));
        }

        let mut seen = BTreeSet::new();
        for (index, stage) in self.dockerfile.stages.iter().enumerate() {
            for layer in &stage.layers {
                let Some((source, kind)) = self.edge_source(layer, index) else {
                    continue;
                };
                let source = match source {
                    Target::Image(image) => format!("external_image_{image}"),
                    Target::Stage(stage) => format!("stage_{stage}"),
                };
                let edge = format!(
                    "  {source} -> stage_{index}{};\n",
                    attribute_list(edge_attributes(kind, self.options.edge_style))
                );
                if seen.insert(edge.clone()) {
                    out.push_str(&edge);
                }
            }
        }
    }

    fn write_layers(&self, out: &mut String) {
        let before = &self.dockerfile.before_first_stage;
        if !before.is_empty() {
            out.push_str("  subgraph cluster_before_first_stage {\n");
            out.push_str("    label=\"before first stage\";\n");
            out.push_str("    style=dashed;\n");
            out.push_str("    margin=16;\n");
            for (index, layer) in before.iter().enumerate() {
                out.push_str(&format!(
                    "    before_first_stage_layer_{index} [label=\"{}\"];\n",
                    escape_dot(&layer.label)
                ));
            }
            out.push_str("  }\n");
        }

        for (index, stage) in self.dockerfile.stages.iter().enumerate() {
            out.push_str(&format!("  subgraph cluster_stage_{index} {{\n"));
            out.push_str(&format!(
                "    label=\"{}\";\n",
                escape_dot(&stage_label(stage.name.as_deref(), index))
            ));
            out.push_str("    margin=16;\n");
            for (layer_index, layer) in stage.layers.iter().enumerate() {
                out.push_str(&format!(
                    "    stage_{index}_layer_{layer_index} [label=\"{}\", style=\"filled,rounded\", fillcolor=white];\n",
                    escape_dot(&layer.label)
                ));
            }
            out.push_str("  }\n");
        }

        for (index, stage) in self.dockerfile.stages.iter().enumerate() {
            for layer_index in 1..stage.layers.len() {
                out.push_str(&format!(
                    "  stage_{index}_layer_{} -> stage_{index}_layer_{layer_index};\n",
                    layer_index - 1
                ));
            }
        }

        for (index, stage) in self.dockerfile.stages.iter().enumerate() {
            for (layer_index, layer) in stage.layers.iter().enumerate() {
                let Some((source, kind)) = self.edge_source(layer, index) else {
                    continue;
                };
                let mut attributes = Vec::new();
                let source = match source {
                    Target::Image(image) => format!("external_image_{image}"),
                    Target::Stage(stage) => {
                        let last = self.dockerfile.stages[stage].layers.len().saturating_sub(1);
                        attributes.push(format!("ltail=cluster_stage_{stage}"));
                        format!("stage_{stage}_layer_{last}")
                    }
                };
                attributes.extend(edge_attributes(kind, self.options.edge_style));
                out.push_str(&format!(
                    "  {source} -> stage_{index}_layer_{layer_index}{};\n",
                    attribute_list(attributes)
                ));
            }
        }
    }

    // Self references are dropped.
    fn edge_source(&self, layer: &Layer, stage_index: usize) -> Option<(Target, WaitForKind)> {
        let wait_for = layer.wait_for.as_ref()?;
        if let Some(stage) = self.dockerfile.find_stage(&wait_for.name, stage_index) {
            return (stage != stage_index).then_some((Target::Stage(stage), wait_for.kind));
        }
        self.dockerfile
            .external_images
            .iter()
            .position(|image| image.name == wait_for.name)
            .map(|image| (Target::Image(image), wait_for.kind))
    }
}

fn stage_label(name: Option<&str>, index: usize) -> String {
    name.map_or_else(|| format!("stage {index}"), str::to_string)
}

fn edge_attributes(kind: WaitForKind, style: EdgeStyle) -> Vec<String> {
    let (arrowhead, line) = match kind {
        WaitForKind::From => return Vec::new(),
        WaitForKind::Copy => ("empty", "dashed"),
        WaitForKind::Mount => ("ediamond", "dotted"),
    };
    let mut attributes = vec![format!("arrowhead={arrowhead}")];
    if style == EdgeStyle::Default {
        attributes.push(format!("style={line}"));
    }
    attributes
}

fn attribute_list(attributes: Vec<String>) -> String {
    if attributes.is_empty() {
        String::new()
    } else {
        format!(" [{}]", attributes.join(", "))
    }
}

fn write_legend(out: &mut String, style: EdgeStyle) {
    out.push_str("  subgraph cluster_legend {\n");
    out.push_str("    label=\"Legend\";\n");
    out.push_str("    margin=16;\n");
    for (kind, text) in [
        (WaitForKind::From, "FROM ..."),
        (WaitForKind::Copy, "COPY --from=..."),
        (WaitForKind::Mount, "RUN --mount=(.*)from=..."),
    ] {
        let name = kind.as_str();
        out.push_str(&format!("    legend_{name}_source [label=\"\", shape=point];\n"));
        out.push_str(&format!(
            "    legend_{name}_target [label=\"{}\", shape=plaintext];\n",
            escape_dot(text)
        ));
        out.push_str(&format!(
            "    legend_{name}_source -> legend_{name}_target{};\n",
            attribute_list(edge_attributes(kind, style))
        ));
    }
    out.push_str("  }\n");
}

fn escape_dot(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::dot::{DotOptions, EdgeStyle, escape_dot, render_dot};
    use crate::parser::parse_dockerfile;

    const MULTI_STAGE: &str = "ARG V=1\n\
                               FROM golang:$V AS build\n\
                               RUN --mount=type=cache,from=gocache,target=/c go build\n\
                               FROM alpine\n\
                               COPY --from=build /out /out\n\
                               COPY --from=build /lib /lib\n";

    fn render(options: &DotOptions) -> String {
        let parsed = parse_dockerfile(MULTI_STAGE.as_bytes(), 20).expect("dockerfile should parse");
        render_dot(&parsed, options)
    }

    #[test]
    fn renders_graph_header_and_external_images() {
        let dot = render(&DotOptions::default());
        assert!(dot.starts_with("digraph G {\n  compound=true;\n  nodesep=1;\n  ranksep=0.5;\n"));
        assert!(dot.contains(
            "  external_image_0 [label=\"golang:1\", style=\"dashed,rounded\", color=grey40];\n"
        ));
        assert!(dot.contains("  external_image_1 [label=\"gocache\""));
        assert!(dot.contains("  external_image_2 [label=\"alpine\""));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn stage_mode_draws_one_node_per_stage() {
        let dot = render(&DotOptions::default());
        assert!(dot.contains("  stage_0 [label=\"build\"];\n"));
        assert!(dot.contains("  stage_1 [label=\"stage 1\"];\n"));
        assert!(dot.contains("  external_image_0 -> stage_0;\n"));
        assert!(dot.contains(
            "  external_image_1 -> stage_0 [arrowhead=ediamond, style=dotted];\n"
        ));
        assert_eq!(
            dot.matches("  stage_0 -> stage_1 [arrowhead=empty, style=dashed];\n")
                .count(),
            1
        );
        assert!(!dot.contains("cluster_stage"));
    }

    #[test]
    fn layer_mode_chains_layers_and_uses_ltail_for_stages() {
        let options = DotOptions {
            layers: true,
            ..DotOptions::default()
        };
        let dot = render(&options);

        assert!(dot.contains("  subgraph cluster_stage_0 {\n    label=\"build\";\n"));
        assert!(dot.contains("    stage_1_layer_2 [label=\"COPY --from=build...\""));
        assert!(dot.contains("  stage_1_layer_0 -> stage_1_layer_1;\n"));
        assert!(dot.contains("  stage_1_layer_1 -> stage_1_layer_2;\n"));
        assert!(dot.contains(
            "  stage_0_layer_1 -> stage_1_layer_1 [ltail=cluster_stage_0, arrowhead=empty, style=dashed];\n"
        ));
        assert!(dot.contains("  external_image_2 -> stage_1_layer_0;\n"));
        assert!(dot.contains("    before_first_stage_layer_0 [label=\"ARG V=1\"];\n"));
    }

    #[test]
    fn solid_style_drops_line_styles() {
        let options = DotOptions {
            edge_style: EdgeStyle::Solid,
            ..DotOptions::default()
        };
        let dot = render(&options);
        assert!(dot.contains("  stage_0 -> stage_1 [arrowhead=empty];\n"));
        assert!(!dot.contains("style=dashed]"));
        assert!(!dot.contains("style=dotted"));
    }

    #[test]
    fn legend_is_optional() {
        assert!(!render(&DotOptions::default()).contains("cluster_legend"));

        let options = DotOptions {
            legend: true,
            ..DotOptions::default()
        };
        let dot = render(&options);
        assert!(dot.contains("  subgraph cluster_legend {\n"));
        assert!(dot.contains("    legend_copy_source -> legend_copy_target [arrowhead=empty, style=dashed];\n"));
        assert!(dot.contains("    legend_from_source -> legend_from_target;\n"));
    }

    #[test]
    fn numeric_reference_points_at_stage() {
        let parsed = parse_dockerfile(b"FROM golang\nFROM alpine\nCOPY --from=0 /a /a\n", 30)
            .expect("dockerfile should parse");
        let dot = render_dot(&parsed, &DotOptions::default());
        assert!(dot.contains("  stage_0 -> stage_1 [arrowhead=empty, style=dashed];\n"));
        assert!(!dot.contains("label=\"0\""));
    }

    #[test]
    fn numeric_reference_to_own_stage_is_an_image() {
        let parsed = parse_dockerfile(b"FROM golang\nCOPY --from=0 /a /a\n", 30)
            .expect("dockerfile should parse");
        let dot = render_dot(&parsed, &DotOptions::default());
        assert!(dot.contains("external_image_1 [label=\"0\""));
        assert!(dot.contains("  external_image_1 -> stage_0 [arrowhead=empty, style=dashed];\n"));
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape_dot(r#"RUN echo "hi" \o/"#), r#"RUN echo \"hi\" \\o/"#);
        assert_eq!(escape_dot("a\nb"), "a\\nb");
    }
}
