//! Instance catalog ingestion: turns the vantage-point CSV into a `Vec<Node>`
//! the rest of the crate builds architectures against.

use std::path::Path;

use cloudcalc_core::{CloudCalcError, CloudCalcResult, Price};
use cloudcalc_model::{
    Cpu, InstanceStorage, InstanceStorageType, MachineEbsLimits, Memory, Network, Node, GIB, MIB,
};
use regex::Regex;
use serde::Deserialize;

/// One row of the instance catalog, exactly as it appears in the CSV header.
#[derive(Debug, Clone, Deserialize)]
struct CatalogRow {
    consider_instance: bool,
    #[serde(rename = "previous_generation")]
    #[allow(dead_code)]
    previous_generation: bool,

    name: String,
    #[allow(dead_code)]
    id: String,
    vcpu: f64,
    cpu_vendor: String,
    /// MiB, ×1024 to get bytes.
    memory: f64,
    clock_speed_ghz: f64,
    /// USD/hour, pre-discount.
    price: f64,
    #[allow(dead_code)]
    price_unit: String,

    network_upto: bool,
    /// Gbit/s.
    network_speed: f64,
    /// Gbit/s.
    network_speed_burst: f64,
    network_devices: f64,

    nvme_ssd: bool,
    storage_ssd: bool,
    storage_devices: f64,
    /// GiB per device.
    storage_size: f64,
    storage_readops: f64,
    storage_writeops: f64,

    ebs_base_iops: f64,
    ebs_burst_iops: f64,
    /// MiB/s.
    ebs_base_throughput: f64,
    /// MiB/s.
    ebs_burst_throughput: f64,
}

fn derive_cpu(row: &CatalogRow) -> Cpu {
    let ghz = if row.clock_speed_ghz == 0.0 { Cpu::DEFAULT_SPEED_GHZ } else { row.clock_speed_ghz };
    Cpu { count: row.vcpu as u64, speed: ghz * 1e9, vendor: row.cpu_vendor.clone() }
}

fn derive_network(row: &CatalogRow) -> Network {
    Network {
        speed: (row.network_speed * 1e9) as u64,
        burst_speed: (row.network_speed_burst * 1e9) as u64,
        devices: row.network_devices as u64,
        up_to: row.network_upto,
    }
}

fn derive_instance_storage(row: &CatalogRow) -> InstanceStorage {
    let size = (row.storage_size * GIB as f64) as u64;
    if row.nvme_ssd {
        InstanceStorage {
            storage_type: InstanceStorageType::NVMe,
            size,
            devices: row.storage_devices,
            read_ops: row.storage_readops as u64,
            write_ops: row.storage_writeops as u64,
        }
    } else if row.storage_ssd {
        InstanceStorage {
            storage_type: InstanceStorageType::SSD,
            size,
            devices: row.storage_devices,
            read_ops: (row.storage_devices * InstanceStorage::SSD_READ_OPS as f64) as u64,
            write_ops: (row.storage_devices * InstanceStorage::SSD_WRITE_OPS as f64) as u64,
        }
    } else {
        InstanceStorage::NONE
    }
}

fn derive_machine_ebs(row: &CatalogRow) -> MachineEbsLimits {
    MachineEbsLimits {
        base_iops: cloudcalc_core::Rate::secondly(row.ebs_base_iops),
        burst_iops: cloudcalc_core::Rate::secondly(row.ebs_burst_iops),
        base_throughput: row.ebs_base_throughput * MIB as f64,
        burst_throughput: row.ebs_burst_throughput * MIB as f64,
    }
}

/// `m5.2xlarge` -> `m5.2xl`, `m5.large` -> `m5.l`, `m5.medium` -> `m5.m`:
/// shortens the catalog's verbose instance names for display.
fn abbreviate_name(name: &str) -> String {
    let large = Regex::new("large").unwrap();
    let medium = Regex::new("medium").unwrap();
    let trailing_xl = Regex::new(r"([0-9]+)xl$").unwrap();
    let name = large.replace_all(name, "l");
    let name = medium.replace_all(&name, "m");
    trailing_xl.replace(&name, "$1").into_owned()
}

/// Loads the instance catalog from `path`, applying the same row-level
/// filters as `ArchitectureBuilder::prepareNodes`: instances not flagged for
/// consideration are skipped, bare-metal instances are skipped outright, and
/// only NVMe or storage-less instances make it into the live catalog.
pub fn load_catalog(path: &Path, ec2_discount: f64) -> CloudCalcResult<Vec<Node>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| CloudCalcError::Catalog(format!("{}: {e}", path.display())))?;

    let mut nodes = Vec::new();
    for result in reader.deserialize::<CatalogRow>() {
        let row = result?;
        if !row.consider_instance {
            continue;
        }
        if row.name.contains("metal") {
            continue;
        }
        let instance_storage = derive_instance_storage(&row);
        if !matches!(instance_storage.storage_type, InstanceStorageType::NVMe | InstanceStorageType::None) {
            continue;
        }
        nodes.push(Node {
            name: abbreviate_name(&row.name),
            cpu: derive_cpu(&row),
            memory: Memory::gb(row.memory),
            network: derive_network(&row),
            price: Price::hourly(row.price * (1.0 - ec2_discount)),
            instance_storage,
            machine_ebs: derive_machine_ebs(&row),
        });
    }

    tracing::info!(count = nodes.len(), path = %path.display(), "loaded instance catalog");
    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("vantage.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    const HEADER: &str = "consider_instance,previous_generation,name,id,vcpu,cpu_vendor,memory,clock_speed_ghz,price,price_unit,network_upto,network_speed,network_speed_burst,network_devices,nvme_ssd,storage_ssd,storage_devices,storage_size,storage_readops,storage_writeops,ebs_base_iops,ebs_burst_iops,ebs_base_throughput,ebs_burst_throughput\n";

    #[test]
    fn skips_unconsidered_and_metal_rows() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{HEADER}\
             true,false,m5.xlarge,m5.xlarge,4,intel,16384,2.5,0.192,hrs,false,10,10,1,false,false,0,0,0,0,3000,3000,125,125\n\
             false,false,m5.2xlarge,m5.2xlarge,8,intel,32768,2.5,0.384,hrs,false,10,10,1,false,false,0,0,0,0,3000,3000,125,125\n\
             true,false,m5.metal,m5.metal,96,intel,393216,2.5,4.608,hrs,false,25,25,1,false,false,0,0,0,0,3000,3000,125,125\n"
        );
        let path = write_fixture(&dir, &body);
        let nodes = load_catalog(&path, 0.0).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "m5.xl");
    }

    #[test]
    fn drops_ssd_and_hdd_instances() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{HEADER}\
             true,false,d2.xlarge,d2.xlarge,4,intel,31232,2.4,0.69,hrs,false,10,10,1,false,true,3,2000,100,100,3000,3000,125,125\n"
        );
        let path = write_fixture(&dir, &body);
        let nodes = load_catalog(&path, 0.0).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn applies_ec2_discount_to_price() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{HEADER}\
             true,false,i3en.xlarge,i3en.xlarge,4,intel,32768,2.5,0.339,hrs,false,10,10,1,true,false,1,2500,100000,35000,3000,3000,125,125\n"
        );
        let path = write_fixture(&dir, &body);
        let nodes = load_catalog(&path, 0.5).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!((nodes[0].price.value - 0.1695).abs() < 1e-6);
    }

    #[test]
    fn missing_column_is_a_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "name,vcpu\nm5.xlarge,4\n");
        let err = load_catalog(&path, 0.0).unwrap_err();
        assert!(matches!(err, CloudCalcError::Catalog(_) | CloudCalcError::Csv(_)));
    }
}
