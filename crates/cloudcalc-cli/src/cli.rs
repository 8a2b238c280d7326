//! Flag surface for the `cloudcalc` binary, grounded on
//! `original_source/cloud_calc.cpp`'s `CloudCalcArgs`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about = "Analytical cost/feasibility explorer for cloud database architectures", long_about = None)]
pub struct Cli {
    /// Vantage API token; accepted for CLI compatibility with the original
    /// tool, but this binary never issues network I/O, so a value here only
    /// produces a warning.
    #[arg(long)]
    pub token: Option<String>,

    /// Path to the instance catalog CSV.
    #[arg(short = 'c', long = "vantage-csv", default_value = "./vantage.csv")]
    pub vantage_csv: PathBuf,

    /// Dataset size, in GiB.
    #[arg(long = "datasize", default_value_t = 100)]
    pub datasize: u64,

    /// Total target operations per second.
    #[arg(long, default_value_t = 10_000)]
    pub transactions: u64,

    /// Fraction of transactions that are updates rather than lookups.
    #[arg(long = "update-ratio", default_value_t = 0.3)]
    pub update_ratio: f64,

    /// Zipf skew for lookup access; mutually exclusive with a nonzero update ratio.
    #[arg(long = "lookup-zipf", default_value_t = 0.0)]
    pub lookup_zipf: f64,

    /// Maximum number of secondary replicas to consider.
    #[arg(long = "max-replicas", default_value_t = 3)]
    pub max_replicas: u64,

    /// Minimum number of secondary replicas required.
    #[arg(long = "min-replicas", default_value_t = 0)]
    pub min_replicas: u64,

    /// Page size, in bytes.
    #[arg(long = "pagesize", default_value_t = 4096)]
    pub pagesize: u64,

    /// Tuple size, in bytes.
    #[arg(long = "tuplesize", default_value_t = 52)]
    pub tuplesize: u64,

    /// Required per-operation latency, in nanoseconds.
    #[arg(long, default_value_t = 9_999_999_999)]
    pub latency: u64,

    /// Required durability, in nines (e.g. 5 means 99.999%).
    #[arg(long, default_value_t = 0)]
    pub durability: u32,

    /// Whether the log service group-commits before acknowledging a write.
    #[arg(long = "group-commit", default_value_t = true)]
    pub group_commit: bool,

    /// Whether secondaries must be deployed in a different availability zone.
    #[arg(long = "inter-az", default_value_t = false)]
    pub inter_az: bool,

    /// Comma-separated sort columns; a `-` prefix sorts that column descending.
    #[arg(long, default_value = "TotalPrice")]
    pub sort: String,

    /// Unit used when rendering prices.
    #[arg(long = "priceunit", value_enum, default_value_t = PriceUnit::Hour)]
    pub priceunit: PriceUnit,

    /// Comma-separated instance name prefixes to keep; empty means no filter.
    #[arg(long, default_value = "")]
    pub instances: String,

    /// Comma-separated architecture family names to assemble; empty means all.
    #[arg(long, default_value = "")]
    pub architectures: String,

    /// Comma-separated architecture family names to skip.
    #[arg(long, default_value = "dynamic")]
    pub excludes: String,

    /// Field delimiter used by `--csv` output.
    #[arg(long, default_value = ",")]
    pub delimiter: String,

    /// Keep at least 10 architectures per family after sorting.
    #[arg(long, default_value_t = true)]
    pub trunc: bool,

    /// Drop architectures that fail a required SLA column.
    #[arg(long, default_value_t = true)]
    pub filter: bool,

    /// Emit CSV instead of an aligned table.
    #[arg(long, default_value_t = false)]
    pub csv: bool,

    /// Show columns that are hidden by default.
    #[arg(long = "show-hidden", default_value_t = false)]
    pub show_hidden: bool,

    /// Hide the price-related columns.
    #[arg(long = "hide-costs", default_value_t = false)]
    pub hide_costs: bool,

    /// Hide the lookup-throughput columns.
    #[arg(long = "hide-lookups", default_value_t = false)]
    pub hide_lookups: bool,

    /// Hide the update-throughput columns.
    #[arg(long = "hide-updates", default_value_t = false)]
    pub hide_updates: bool,

    /// Omit the columns marked optional/terse.
    #[arg(long, default_value_t = false)]
    pub terse: bool,

    /// Intra-AZ network latency, in milliseconds.
    #[arg(long = "intra-az-latency", default_value_t = 0.5)]
    pub intra_az_latency: f64,

    /// Inter-AZ network latency, in milliseconds.
    #[arg(long = "inter-az-latency", default_value_t = 1.0)]
    pub inter_az_latency: f64,

    /// Whether secondary indexes are covered by the primary key (no separate index storage).
    #[arg(long = "index-only-tables", default_value_t = true)]
    pub index_only_tables: bool,

    /// CPU cycles spent per logical operation.
    #[arg(long = "cpu-cost", default_value_t = 1000.0)]
    pub cpu_cost: f64,

    /// Fractional discount applied to catalog EC2 prices.
    #[arg(long = "ec2-discount", default_value_t = 0.0)]
    pub ec2_discount: f64,

    /// Tracing verbosity (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PriceUnit {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl PriceUnit {
    pub fn to_timeunit(self) -> cloudcalc_core::Timeunit {
        use cloudcalc_core::Timeunit;
        match self {
            PriceUnit::Second => Timeunit::Second,
            PriceUnit::Minute => Timeunit::Minute,
            PriceUnit::Hour => Timeunit::Hour,
            PriceUnit::Day => Timeunit::Day,
            PriceUnit::Month => Timeunit::Month,
            PriceUnit::Year => Timeunit::Year,
        }
    }
}
