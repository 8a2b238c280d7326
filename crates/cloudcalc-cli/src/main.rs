mod cli;

use std::process::ExitCode;

use clap::Parser;
use cloudcalc_arch::{ArchType, ArchitectureBuilder};
use cloudcalc_core::{CloudCalcError, CloudCalcResult, Durability, Latency, Rate};
use cloudcalc_io::{all_metrics, load_catalog, Metric, MetricRegistry};
use cloudcalc_model::{Parameter, GIB};
use tracing_subscriber::EnvFilter;

use cli::Cli;

/// Metric names grouped under `--hide-costs` / `--hide-lookups` / `--hide-updates`.
/// `cloud_calc.cpp` declares these three flags but never wires them to anything;
/// this is the sensible behavior the flags' help text describes.
const COST_METRICS: &[&str] =
    &["TotalPrice", "PrimaryPrice", "EBSPrice", "SecondariesPrice", "LogServicePrice", "PageServicePrice", "S3Price", "NetworkPrice"];
const LOOKUP_METRICS: &[&str] = &["PrimaryRandomLookupTx", "SecondariesRandomLookupTx", "RandomLookupTx"];
const UPDATE_METRICS: &[&str] = &["RandomUpdateTx"];

/// Columns that `--terse` omits, matching `cloud_calc.cpp`'s `if (!args.terse)` gates.
const TERSE_HIDDEN: &[&str] = &[
    "CpuVendor",
    "StorageDevice",
    "CommitLatency",
    "S3Price",
    "DatasetSize",
    "PageReadVolume",
    "PageWriteVolume",
    "InterAZTraffic",
];

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn split_names(s: &str) -> Vec<String> {
    s.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// Resolves `--architectures`/`--excludes` into the ordered list of families
/// to assemble, matching `ArchitectureBuilder::assembleArchitectures`'s fixed
/// call order (Classic, RemoteBlockDevice, HADR, InMemory, Aurora, Socrates,
/// Dynamic) rather than `ArchType::all()`'s enum-declaration order.
fn resolve_requested_families(architectures: &str, excludes: &str) -> CloudCalcResult<Vec<ArchType>> {
    const ORDER: [ArchType; 7] =
        [ArchType::Classic, ArchType::RemoteBlockDevice, ArchType::Hadr, ArchType::InMemory, ArchType::AuroraLike, ArchType::SocratesLike, ArchType::Dynamic];

    let requested = split_names(architectures);
    let excluded = split_names(excludes);
    for name in requested.iter().chain(excluded.iter()) {
        if ArchType::from_name(name).is_none() {
            return Err(CloudCalcError::InvalidArgument(format!("unknown architecture family: {name}")));
        }
    }

    Ok(ORDER
        .into_iter()
        .filter(|a| requested.is_empty() || requested.iter().any(|n| n == a.name()))
        .filter(|a| !excluded.iter().any(|n| n == a.name()))
        .collect())
}

fn build_parameter(args: &Cli) -> CloudCalcResult<Parameter> {
    if args.lookup_zipf != 0.0 && args.update_ratio > 0.0 {
        return Err(CloudCalcError::InvalidArgument(
            "cannot specify a lookup zipf skew when there are also updates".to_string(),
        ));
    }
    if args.min_replicas > args.max_replicas {
        return Err(CloudCalcError::InvalidArgument("--min-replicas exceeds --max-replicas".to_string()));
    }

    let updates = args.transactions as f64 * args.update_ratio;
    let lookups = args.transactions as f64 - updates;

    Ok(Parameter {
        dataset_size: args.datasize * GIB,
        required_lookup_ops: Rate::secondly(lookups),
        lookup_zipf: args.lookup_zipf,
        required_update_ops: Rate::secondly(updates),
        tuple_size: args.tuplesize,
        page_size: args.pagesize,
        cpu_cost: args.cpu_cost as u64,
        min_secondaries: args.min_replicas as u32,
        max_secondaries: args.max_replicas as u32,
        intra_az_latency: args.intra_az_latency,
        inter_az_latency: args.inter_az_latency,
        ec2_discount: args.ec2_discount,
        group_commit: args.group_commit,
        deploy_across_az: args.inter_az,
        index_only_tables: args.index_only_tables,
        required_op_latency: Latency::from_nanos(args.latency as i64),
        required_durability: Durability::from_nines(args.durability),
        ..Parameter::default()
    })
}

fn build_columns(args: &Cli) -> Vec<Metric> {
    all_metrics()
        .into_iter()
        .filter(|m| !(args.terse && TERSE_HIDDEN.contains(&m.name())))
        .filter(|m| !(args.hide_costs && COST_METRICS.contains(&m.name())))
        .filter(|m| !(args.hide_lookups && LOOKUP_METRICS.contains(&m.name())))
        .filter(|m| !(args.hide_updates && UPDATE_METRICS.contains(&m.name())))
        .collect()
}

fn run(args: Cli) -> CloudCalcResult<()> {
    if args.token.is_some() {
        tracing::warn!("--token was given but this binary never issues network I/O; ignoring it");
    }

    cloudcalc_core::set_machine_readable(args.csv);
    cloudcalc_core::set_timeunit_for_print(args.priceunit.to_timeunit());

    let nodes = load_catalog(&args.vantage_csv, args.ec2_discount)?;
    let filters = split_names(&args.instances);
    let nodes: Vec<_> =
        nodes.into_iter().filter(|n| filters.is_empty() || filters.iter().any(|f| n.name.starts_with(f.as_str()))).collect();

    let parameter = build_parameter(&args)?;
    let requested = resolve_requested_families(&args.architectures, &args.excludes)?;

    let builder = ArchitectureBuilder::new(&nodes);
    let architectures = builder.assemble(&parameter, &requested);

    let mut registry = MetricRegistry::new(build_columns(&args), args.show_hidden);
    registry.insert(architectures);

    if !args.sort.is_empty() {
        registry.sort(&args.sort)?;
    }
    if args.filter {
        registry.filter();
    }
    if args.trunc {
        if args.sort.is_empty() {
            return Err(CloudCalcError::InvalidArgument("--trunc requires a non-empty --sort order".to_string()));
        }
        registry.trunc(10);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let delimiter = args.delimiter.as_bytes().first().copied().unwrap_or(b',');
    if args.csv {
        registry.render_csv(&mut out, delimiter)?;
    } else {
        registry.render_table(&mut out)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(&args.log_level);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cloudcalc: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_architectures_means_all_in_assembler_order() {
        let requested = resolve_requested_families("", "").unwrap();
        assert_eq!(
            requested,
            vec![
                ArchType::Classic,
                ArchType::RemoteBlockDevice,
                ArchType::Hadr,
                ArchType::InMemory,
                ArchType::AuroraLike,
                ArchType::SocratesLike,
                ArchType::Dynamic,
            ]
        );
    }

    #[test]
    fn excludes_default_drops_dynamic() {
        let requested = resolve_requested_families("", "dynamic").unwrap();
        assert!(!requested.contains(&ArchType::Dynamic));
        assert_eq!(requested.len(), 6);
    }

    #[test]
    fn excludes_win_over_an_explicit_request() {
        let requested = resolve_requested_families("classic,hadr", "classic").unwrap();
        assert_eq!(requested, vec![ArchType::Hadr]);
    }

    #[test]
    fn unknown_family_name_is_an_error() {
        let err = resolve_requested_families("not-a-family", "").unwrap_err();
        assert!(matches!(err, CloudCalcError::InvalidArgument(_)));
    }

    #[test]
    fn split_names_trims_and_drops_blanks() {
        assert_eq!(split_names(" a, b ,,c"), vec!["a", "b", "c"]);
        assert_eq!(split_names(""), Vec::<String>::new());
    }

    #[test]
    fn build_columns_hide_costs_removes_price_metrics() {
        let mut cli = test_cli();
        cli.hide_costs = true;
        let columns = build_columns(&cli);
        assert!(!columns.iter().any(|m| m.name() == "TotalPrice"));
        assert!(columns.iter().any(|m| m.name() == "RandomLookupTx"));
    }

    #[test]
    fn build_columns_terse_drops_the_terse_only_columns() {
        let mut cli = test_cli();
        cli.terse = true;
        let columns = build_columns(&cli);
        assert!(!columns.iter().any(|m| m.name() == "CommitLatency"));
        assert!(columns.iter().any(|m| m.name() == "TotalPrice"));
    }

    fn test_cli() -> Cli {
        Cli::parse_from(["cloudcalc", "--vantage-csv", "/dev/null"])
    }

    #[test]
    fn rejects_lookup_zipf_combined_with_updates() {
        let mut cli = test_cli();
        cli.lookup_zipf = 0.5;
        cli.update_ratio = 0.3;
        let err = build_parameter(&cli).unwrap_err();
        assert!(matches!(err, CloudCalcError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_min_replicas_over_max_replicas() {
        let mut cli = test_cli();
        cli.min_replicas = 5;
        cli.max_replicas = 2;
        let err = build_parameter(&cli).unwrap_err();
        assert!(matches!(err, CloudCalcError::InvalidArgument(_)));
    }
}
