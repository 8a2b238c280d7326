//! End-to-end tests driving the `cloudcalc` binary against a small
//! synthetic catalog fixture.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::tempdir;

const HEADER: &str = "consider_instance,previous_generation,name,id,vcpu,cpu_vendor,memory,clock_speed_ghz,price,price_unit,network_upto,network_speed,network_speed_burst,network_devices,nvme_ssd,storage_ssd,storage_devices,storage_size,storage_readops,storage_writeops,ebs_base_iops,ebs_burst_iops,ebs_base_throughput,ebs_burst_throughput\n";

/// A handful of instance shapes: a local-NVMe node (for Classic/HADR/InMemory),
/// and an EBS-only node with no instance storage (for RemoteBlockDevice/Aurora/Socrates).
fn write_catalog_fixture() -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let body = format!(
        "{HEADER}\
         true,false,m5.2xlarge,m5.2xlarge,8,intel,32768,2.5,0.384,hrs,false,10,10,1,false,false,0,0,0,0,12000,12000,500,500\n\
         true,false,i3en.2xlarge,i3en.2xlarge,8,intel,65536,2.5,0.904,hrs,false,25,25,1,true,false,2,2500,200000,70000,3000,3000,125,125\n\
         true,false,r5.4xlarge,r5.4xlarge,16,intel,131072,2.5,1.008,hrs,false,10,10,1,false,false,0,0,0,0,18750,18750,593.75,593.75\n"
    );
    let path = dir.path().join("vantage.csv");
    std::fs::write(&path, body).unwrap();
    (dir, path)
}

fn small_workload_args(csv_path: &str) -> Vec<String> {
    vec![
        "--vantage-csv".into(),
        csv_path.into(),
        "--datasize".into(),
        "10".into(),
        "--transactions".into(),
        "500".into(),
    ]
}

#[test]
fn default_run_produces_a_table_with_total_price() {
    let (_dir, path) = write_catalog_fixture();
    let mut cmd = Command::cargo_bin("cloudcalc").unwrap();
    cmd.args(small_workload_args(path.to_str().unwrap())).assert().success().stdout(predicate::str::contains("TotalPrice"));
}

#[test]
fn csv_output_is_comma_delimited_and_headed() {
    let (_dir, path) = write_catalog_fixture();
    let mut cmd = Command::cargo_bin("cloudcalc").unwrap();
    cmd.args(small_workload_args(path.to_str().unwrap()))
        .arg("--csv")
        .assert()
        .success()
        .stdout(predicate::str::contains("#,Type,Primary"));
}

#[test]
fn hide_costs_drops_price_columns() {
    let (_dir, path) = write_catalog_fixture();
    let mut cmd = Command::cargo_bin("cloudcalc").unwrap();
    cmd.args(small_workload_args(path.to_str().unwrap()))
        .args(["--csv", "--hide-costs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TotalPrice").not());
}

#[test]
fn unknown_architecture_family_is_rejected() {
    let (_dir, path) = write_catalog_fixture();
    let mut cmd = Command::cargo_bin("cloudcalc").unwrap();
    cmd.args(small_workload_args(path.to_str().unwrap()))
        .args(["--architectures", "not-a-real-family"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown architecture family"));
}

#[test]
fn conflicting_lookup_zipf_and_update_ratio_is_rejected() {
    let (_dir, path) = write_catalog_fixture();
    let mut cmd = Command::cargo_bin("cloudcalc").unwrap();
    cmd.args(small_workload_args(path.to_str().unwrap()))
        .args(["--lookup-zipf", "0.9", "--update-ratio", "0.3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lookup zipf"));
}

#[test]
fn trunc_without_sort_is_rejected() {
    let (_dir, path) = write_catalog_fixture();
    let mut cmd = Command::cargo_bin("cloudcalc").unwrap();
    cmd.args(small_workload_args(path.to_str().unwrap()))
        .args(["--sort", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--trunc requires"));
}

#[test]
fn missing_catalog_file_reports_a_catalog_error() {
    let mut cmd = Command::cargo_bin("cloudcalc").unwrap();
    cmd.args(small_workload_args("/no/such/vantage.csv")).assert().failure();
}
