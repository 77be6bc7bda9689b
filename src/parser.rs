use crate::error::{Error, Result};
use crate::network::{Edge, NetworkInput, NodeInput};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Clone, Copy)]
enum Section {
    Vertices,
    // Also a headerless list; direction follows the caller.
    Links,
    Edges,
    Arcs,
    Ignore,
}

fn parse_error(line: usize, reason: impl Into<String>) -> Error {
    Error::Parse {
        line,
        reason: reason.into(),
    }
}

fn parse_link_line(line_no: usize, line: &str) -> Result<(u32, u32, f64)> {
    let bad = || parse_error(line_no, format!("can't parse link data from '{line}'"));
    let mut parts = line.split_whitespace();
    let s = parts.next().ok_or_else(bad)?.parse::<u32>().map_err(|_| bad())?;
    let t = parts.next().ok_or_else(bad)?.parse::<u32>().map_err(|_| bad())?;
    let w = match parts.next() {
        Some(v) => v.parse::<f64>().map_err(|_| {
            parse_error(line_no, format!("can't parse link weight from '{line}'"))
        })?,
        None => 1.0,
    };
    Ok((s, t, w))
}

fn parse_vertex_line(line_no: usize, line: &str) -> Result<NodeInput> {
    let mut it = line.split_whitespace();
    let id = it
        .next()
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| parse_error(line_no, format!("can't parse node id from '{line}'")))?;

    let parse_weight = |v: &str| {
        v.parse::<f64>()
            .map_err(|_| parse_error(line_no, format!("can't parse vertex weight from '{line}'")))
    };

    let (name, weight) = match (line.find('"'), line.rfind('"')) {
        (Some(qs), Some(qe)) if qs < qe => {
            let name = line[qs + 1..qe].to_string();
            let weight = match line[qe + 1..].split_whitespace().next() {
                Some(w) => parse_weight(w)?,
                None => 1.0,
            };
            (Some(name), weight)
        }
        _ => {
            let name = it.next().map(str::to_string);
            let weight = match it.next() {
                Some(w) => parse_weight(w)?,
                None => 1.0,
            };
            (name, weight)
        }
    };

    Ok(NodeInput { id, weight, name })
}

/// Read a network from any buffered source.
///
/// Links keep their file order and are not merged or validated here; the
/// network builder owns aggregation and weight checks.
pub fn parse_network<R: BufRead>(reader: R, default_directed: bool) -> Result<NetworkInput> {
    let mut parsed = NetworkInput::default();
    let mut section = Section::Links;

    for (idx, line_res) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line_res?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }

        if line.starts_with('*') {
            let heading = line
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            section = match heading.as_str() {
                "*vertices" => Section::Vertices,
                "*edges" => Section::Edges,
                "*arcs" => Section::Arcs,
                "*links" => Section::Links,
                _ => Section::Ignore,
            };
            continue;
        }

        let directed = match section {
            Section::Ignore => continue,
            Section::Vertices => {
                parsed.nodes.push(parse_vertex_line(line_no, line)?);
                continue;
            }
            Section::Links => default_directed,
            Section::Edges => false,
            Section::Arcs => true,
        };
        let (s, t, w) = parse_link_line(line_no, line)?;
        parsed.edges.push(Edge::new(s, t, w, directed));
    }

    Ok(parsed)
}

pub fn parse_network_file(path: &Path, default_directed: bool) -> Result<NetworkInput> {
    let file = File::open(path)?;
    parse_network(BufReader::new(file), default_directed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_set_direction() {
        let text = "*Vertices 3\n1 \"A b\" 2\n2 B\n*Edges\n1 2\n*Arcs\n2 3 0.5\n*Links\n3 1\n";
        let parsed = parse_network(text.as_bytes(), true).unwrap();
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.nodes[0].name.as_deref(), Some("A b"));
        assert_eq!(parsed.nodes[0].weight, 2.0);
        assert_eq!(parsed.nodes[1].name.as_deref(), Some("B"));
        assert_eq!(
            parsed.edges,
            vec![
                Edge::undirected(1, 2, 1.0),
                Edge::directed(2, 3, 0.5),
                Edge::directed(3, 1, 1.0),
            ]
        );
    }

    #[test]
    fn plain_list_follows_default_direction() {
        let text = "# comment\n0 1 2\n1 2\n";
        let parsed = parse_network(text.as_bytes(), false).unwrap();
        assert_eq!(
            parsed.edges,
            vec![Edge::undirected(0, 1, 2.0), Edge::undirected(1, 2, 1.0)]
        );
    }

    #[test]
    fn bad_line_reports_line_number() {
        let text = "0 1\nfoo bar\n";
        let err = parse_network(text.as_bytes(), false).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let text = "*Network x\nwhatever here\n*Links\n0 1\n";
        let parsed = parse_network(text.as_bytes(), false).unwrap();
        assert_eq!(parsed.edges.len(), 1);
    }
}
