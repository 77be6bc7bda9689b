use crate::config::Config;
use crate::hierarchy::{Child, HierarchyTree};
use crate::network::Network;
use crate::trial::ClusterResult;
use std::io::{self, Write};

fn fmt_sig(v: f64, sig: usize) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }

    let digits_before = v.abs().log10().floor() as i32 + 1;
    let decimals = (sig as i32 - digits_before).max(0) as usize;
    let mut s = format!("{v:.decimals$}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn path_to_string(path: &[u32]) -> String {
    path.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(":")
}

fn leaf_label_paths(tree: &HierarchyTree) -> Vec<(u32, Vec<u32>)> {
    let mut out = Vec::with_capacity(tree.leaf_count());
    let mut path = Vec::new();
    for (pos, &top) in tree.top_modules().iter().enumerate() {
        path.push(pos as u32 + 1);
        collect_labels(tree, top, &mut path, &mut out);
        path.pop();
    }
    out
}

fn collect_labels(tree: &HierarchyTree, module: u32, path: &mut Vec<u32>, out: &mut Vec<(u32, Vec<u32>)>) {
    for (pos, child) in tree.module(module).children.iter().enumerate() {
        path.push(pos as u32 + 1);
        match *child {
            Child::Leaf(leaf) => out.push((leaf, path.clone())),
            Child::Module(m) => collect_labels(tree, m, path, out),
        }
        path.pop();
    }
}

pub fn write_summary<W: Write>(out: &mut W, result: &ClusterResult) -> io::Result<()> {
    let savings = if result.one_level_codelength > 0.0 {
        100.0 * (1.0 - result.codelength / result.one_level_codelength)
    } else {
        0.0
    };
    writeln!(
        out,
        "Partitioned into {} levels with {} top modules, codelength {} bits ({}% savings over one-level {})",
        result.num_levels(),
        result.num_top_modules(),
        fmt_sig(result.codelength, 9),
        fmt_sig(savings, 4),
        fmt_sig(result.one_level_codelength, 9),
    )?;
    let per_level: Vec<String> = result
        .level_codelengths
        .iter()
        .map(|&l| fmt_sig(l, 6))
        .collect();
    writeln!(out, "Per level codelength: {}", per_level.join(" "))?;
    if !result.flow_diagnostics.converged {
        writeln!(
            out,
            "Flow did not converge after {} iterations (residual {})",
            result.flow_diagnostics.iterations,
            fmt_sig(result.flow_diagnostics.residual, 3)
        )?;
    }
    if result.cancelled {
        writeln!(out, "Cancelled: best of {} completed trials", result.trial_codelengths.len())?;
    }
    Ok(())
}

pub fn write_tree<W: Write>(out: &mut W, network: &Network, result: &ClusterResult) -> io::Result<()> {
    writeln!(out, "# path flow name node_id")?;
    for (leaf, path) in leaf_label_paths(&result.tree) {
        let leaf = leaf as usize;
        writeln!(
            out,
            "{} {} \"{}\" {}",
            path_to_string(&path),
            fmt_sig(result.node_flow[leaf], 6),
            network.node_name_or_id(leaf),
            network.node_id(leaf)
        )?;
    }
    Ok(())
}

pub fn write_clu<W: Write>(out: &mut W, network: &Network, result: &ClusterResult) -> io::Result<()> {
    writeln!(out, "# node_id module flow")?;
    let levels = result.level_assignments();
    let Some(top) = levels.first() else {
        return Ok(());
    };
    for &leaf in &result.tree.leaf_order() {
        let leaf = leaf as usize;
        writeln!(
            out,
            "{} {} {}",
            network.node_id(leaf),
            top[leaf] + 1,
            fmt_sig(result.node_flow[leaf], 6)
        )?;
    }
    Ok(())
}

pub fn write_node_ranks<W: Write>(out: &mut W, network: &Network, result: &ClusterResult) -> io::Result<()> {
    writeln!(out, "# node_id flow")?;
    let mut order: Vec<usize> = (0..network.node_count()).collect();
    order.sort_by(|&a, &b| result.node_flow[b].total_cmp(&result.node_flow[a]));
    for leaf in order {
        writeln!(out, "{} {}", network.node_id(leaf), fmt_sig(result.node_flow[leaf], 6))?;
    }
    Ok(())
}

pub fn write_flow_network<W: Write>(out: &mut W, network: &Network, result: &ClusterResult) -> io::Result<()> {
    writeln!(out, "*Vertices {}", network.node_count())?;
    for leaf in 0..network.node_count() {
        writeln!(
            out,
            "{} \"{}\" {}",
            network.node_id(leaf),
            network.node_name_or_id(leaf),
            fmt_sig(result.node_flow[leaf], 6)
        )?;
    }
    writeln!(out, "{}", if network.is_directed() { "*Arcs" } else { "*Edges" })?;
    for e in 0..network.link_count() {
        let (s, t, _) = network.link(e);
        writeln!(
            out,
            "{} {} {}",
            network.node_id(s as usize),
            network.node_id(t as usize),
            fmt_sig(result.link_flow[e], 6)
        )?;
    }
    Ok(())
}

pub fn write_report<W: Write>(
    out: &mut W,
    config: &Config,
    network: &Network,
    result: &ClusterResult,
) -> io::Result<()> {
    if config.print_tree() {
        write_tree(out, network, result)?;
    }
    if config.print_clu() {
        write_clu(out, network, result)?;
    }
    if config.print_node_ranks() {
        write_node_ranks(out, network, result)?;
    }
    if config.print_flow_network() {
        write_flow_network(out, network, result)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn significant_digits_trim_zeros() {
        assert_eq!(fmt_sig(0.25, 6), "0.25");
        assert_eq!(fmt_sig(1.0, 6), "1");
        assert_eq!(fmt_sig(123.456789, 4), "123.5");
        assert_eq!(fmt_sig(0.0, 6), "0");
        assert_eq!(fmt_sig(-0.0000001, 3), "-0.0000001");
    }

    #[test]
    fn label_paths_follow_child_positions() {
        let tree = HierarchyTree::from_layers(4, &[0, 1, 0, 1], &[vec![0, 0]]);
        let paths = leaf_label_paths(&tree);
        assert_eq!(paths[0], (0, vec![1, 1, 1]));
        assert_eq!(paths[1], (2, vec![1, 1, 2]));
        assert_eq!(paths[3], (3, vec![1, 2, 2]));
        assert_eq!(path_to_string(&paths[3].1), "1:2:2");
    }
}
