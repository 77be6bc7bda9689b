use clap::Parser;
use infoflow::cli::Args;
use infoflow::{input, parser, ConnectionMode, Error, Network, TrialRunner};
use std::fs::File;
use std::io::Write;

#[test]
fn parse_pajek_file_with_vertices_and_mixed_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g.net");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "# two triangles").unwrap();
    writeln!(f, "*Vertices 6").unwrap();
    writeln!(f, "1 \"A\" 1").unwrap();
    writeln!(f, "2 \"B\" 1").unwrap();
    writeln!(f, "*Edges").unwrap();
    writeln!(f, "1 2 2.5").unwrap();
    writeln!(f, "1 2 0.5").unwrap();
    writeln!(f, "2 3").unwrap();
    writeln!(f, "*Arcs").unwrap();
    writeln!(f, "3 1 1").unwrap();

    let parsed = parser::parse_network_file(&path, false).unwrap();
    assert_eq!(parsed.nodes.len(), 2);
    assert_eq!(parsed.nodes[1].name.as_deref(), Some("B"));
    assert_eq!(parsed.edges.len(), 4);
    assert!(!parsed.edges[0].directed);
    assert!(parsed.edges[3].directed);

    let merged = input::aggregate_connections(&parsed.edges, ConnectionMode::Edges);
    assert_eq!(merged.len(), 3);
    assert!((merged[0].weight - 3.0).abs() < 1e-12);
}

#[test]
fn headerless_link_list_follows_requested_direction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("links.txt");
    std::fs::write(&path, "1 2\n2 3 4\n").unwrap();

    let undirected = parser::parse_network_file(&path, false).unwrap();
    assert!(undirected.edges.iter().all(|e| !e.directed));
    let directed = parser::parse_network_file(&path, true).unwrap();
    assert!(directed.edges.iter().all(|e| e.directed));
    assert_eq!(directed.edges[1].weight, 4.0);
}

#[test]
fn bad_link_line_reports_its_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.net");
    std::fs::write(&path, "*Edges\n1 2\n1 x\n").unwrap();
    let err = parser::parse_network_file(&path, false).unwrap_err();
    assert!(matches!(err, Error::Parse { line: 3, .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parser::parse_network_file(&dir.path().join("nope.net"), false).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn cli_config_drives_a_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g.net");
    std::fs::write(&path, "*Edges\n1 2\n2 3\n3 1\n4 5\n5 6\n6 4\n3 4\n").unwrap();
    let path_arg = path.to_string_lossy().into_owned();

    let args = Args::try_parse_from(["infoflow", path_arg.as_str(), "--num-trials", "3", "--tree"]).unwrap();
    let config = args.to_config().unwrap();
    assert!(config.print_tree());

    let parsed = parser::parse_network_file(&args.network_file, args.is_directed()).unwrap();
    let network = Network::from_input(&parsed, &config).unwrap();
    let result = TrialRunner::new(&network, &config).run().unwrap();
    assert_eq!(result.num_top_modules(), 2);
    assert_eq!(result.trial_codelengths.len(), 3);

    let mut out = Vec::new();
    infoflow::report::write_report(&mut out, &config, &network, &result).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("# path flow name node_id"));
    assert_eq!(text.lines().count(), 7);
}

#[test]
fn cli_rejects_unknown_connection_mode() {
    assert!(Args::try_parse_from(["infoflow", "in.net", "--connection-mode", "pairs"]).is_err());
}

#[test]
fn any_directed_variant_flag_reads_arcs() {
    for flag in ["--directed", "--undirdir", "--outdirdir", "--rawdir"] {
        let args = Args::try_parse_from(["infoflow", "in.net", flag]).unwrap();
        assert!(args.is_directed(), "{flag}");
    }
    let args = Args::try_parse_from(["infoflow", "in.net"]).unwrap();
    assert!(!args.is_directed());
}
