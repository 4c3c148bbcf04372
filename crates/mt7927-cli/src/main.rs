// SPDX-License-Identifier: AGPL-3.0-only

//! `mt7927`: firmware inspection, simulated bring-up and register status.
//!
//! ```text
//! USAGE:
//!   mt7927 patch-info <file>           Patch header and section table
//!   mt7927 ram-info <file>             RAM trailer and region table
//!   mt7927 unpack <bundle> -o <dir>    Extract an MTK- bundle
//!   mt7927 simulate [options]          Full bring-up against the simulator
//!   mt7927 status <pcie-addr>          MCU, semaphore and init-done registers
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `warn`); `simulate` is most
//! useful with `RUST_LOG=mt7927_driver=debug`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use mt7927_driver::chip::{VariantConfig, MT7925, MT7927};
use mt7927_driver::firmware::{Bundle, MemorySource, PatchImage, PatchImageBuilder, RamImage, RamImageBuilder};
use mt7927_driver::sim::{Faults, Simulator};
use mt7927_driver::{Bringup, BringupConfig, McuState, MmioBus, RegisterShim};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mt7927", about = "MT7927 WiFi bring-up tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum Chip {
    Mt7927,
    Mt7925,
}

impl Chip {
    fn config(self) -> &'static VariantConfig {
        match self {
            Self::Mt7927 => &MT7927,
            Self::Mt7925 => &MT7925,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Print a patch file's header and sections.
    PatchInfo {
        /// Patch file.
        file: PathBuf,
    },
    /// Print a RAM file's trailer and regions.
    RamInfo {
        /// RAM file.
        file: PathBuf,
    },
    /// Extract every file of an MTK- bundle.
    Unpack {
        /// Bundle file.
        bundle: PathBuf,
        /// Output directory.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Run a full bring-up against the simulated chip.
    Simulate {
        /// Chip variant to simulate.
        #[arg(long, value_enum, default_value = "mt7927")]
        chip: Chip,
        /// Kill the MCU after this many firmware chunks.
        #[arg(long)]
        crash_after_chunks: Option<usize>,
        /// Never raise the power-on ack.
        #[arg(long)]
        no_power_ack: bool,
        /// Ownership semaphore held by the MCU.
        #[arg(long)]
        semaphore_owned: bool,
        /// Firmware never leaves IDLE.
        #[arg(long)]
        firmware_stalls: bool,
        /// Patch file to download (synthetic image if omitted).
        #[arg(long, requires = "ram")]
        patch: Option<PathBuf>,
        /// RAM file to download (synthetic image if omitted).
        #[arg(long, requires = "patch")]
        ram: Option<PathBuf>,
    },
    /// Read MCU state registers of a device (needs root).
    Status {
        /// PCIe address (e.g. 0000:01:00.0).
        pcie_addr: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::PatchInfo { file } => cmd_patch_info(&file)?,
        Cmd::RamInfo { file } => cmd_ram_info(&file)?,
        Cmd::Unpack { bundle, output } => cmd_unpack(&bundle, &output)?,
        Cmd::Simulate {
            chip,
            crash_after_chunks,
            no_power_ack,
            semaphore_owned,
            firmware_stalls,
            patch,
            ram,
        } => {
            let faults = Faults {
                no_power_ack,
                semaphore_owned,
                crash_after_chunks,
                firmware_stalls,
                ..Faults::default()
            };
            cmd_simulate(chip.config(), faults, patch.as_deref().zip(ram.as_deref()))?;
        }
        Cmd::Status { pcie_addr } => cmd_status(&pcie_addr)?,
    }

    Ok(())
}

fn read(path: &Path) -> Result<Bytes> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Bytes::from(data))
}

fn cmd_patch_info(file: &Path) -> Result<()> {
    let img = PatchImage::parse(read(file)?)?;
    let h = img.header();
    println!("Build date : {}", h.build_date);
    println!("Platform   : {}", h.platform);
    println!("HW/SW ver  : {:#010x}", h.hw_sw_ver);
    println!("Patch ver  : {:#010x}", h.patch_ver);
    println!("Sections   : {}", h.n_region);
    println!();
    for s in img.sections() {
        println!(
            "[{}] type {:#06x}  addr {:#010x}  len {:#8x}  offset {:#8x}  {:?}{}",
            s.index,
            s.sec_type,
            s.addr,
            s.len,
            s.offset,
            s.encryption,
            if s.is_downloadable() { "" } else { "  (skipped)" }
        );
    }
    Ok(())
}

fn cmd_ram_info(file: &Path) -> Result<()> {
    let img = RamImage::parse(read(file)?)?;
    let t = img.trailer();
    println!("Chip ID    : {:#04x}", t.chip_id);
    println!("ECO        : {:#04x}", t.eco_code);
    println!("FW version : {}", t.fw_ver);
    println!("Build date : {}", t.build_date);
    println!("Format     : ver {} flag {:#04x}", t.format_ver, t.format_flag);
    println!("Regions    : {}", t.n_region);
    println!();
    for r in img.regions() {
        println!(
            "[{}] addr {:#010x}  len {:#8x}  offset {:#8x}  features {:#04x}  mode {:#010x}{}",
            r.index,
            r.addr,
            r.len,
            r.offset,
            r.feature_set,
            r.dl_mode(),
            if r.is_downloadable() { "" } else { "  (skipped)" }
        );
    }
    if let Some(addr) = img.override_addr() {
        println!("Override   : {addr:#010x}");
    }
    Ok(())
}

fn cmd_unpack(bundle: &Path, output: &Path) -> Result<()> {
    let b = Bundle::parse(read(bundle)?)?;
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    for e in b.entries() {
        // Entry names come from the file: keep only the last component.
        let Some(name) = Path::new(&e.name).file_name() else {
            bail!("bundle entry {:?} has no file name", e.name);
        };
        let dest = output.join(name);
        fs::write(&dest, &e.data).with_context(|| format!("writing {}", dest.display()))?;
        println!("{}  {:>8} bytes  {}", dest.display(), e.data.len(), e.date);
    }
    Ok(())
}

fn synthetic_firmware(config: &BringupConfig) -> Result<MemorySource> {
    let patch = PatchImageBuilder::new()
        .platform("ALPS")
        .build_date("simulated")
        .section(0x20_0000, vec![0xa5u8; 12 * 1024])
        .build()?;
    let ram = RamImageBuilder::new(0x27, 0x01)
        .fw_ver("sim")
        .build_date("simulated")
        .region(0x0220_0000, vec![0x5au8; 24 * 1024])
        .region(0x00e0_0000, vec![0x3cu8; 4 * 1024])
        .build()?;
    Ok(MemorySource::new()
        .with(&config.patch_name, patch)
        .with(&config.ram_name, ram))
}

fn cmd_simulate(
    variant: &'static VariantConfig,
    faults: Faults,
    files: Option<(&Path, &Path)>,
) -> Result<()> {
    let config = BringupConfig::for_variant(variant);
    let source = match files {
        Some((patch, ram)) => MemorySource::new()
            .with(&config.patch_name, read(patch)?)
            .with(&config.ram_name, read(ram)?),
        None => synthetic_firmware(&config)?,
    };

    let sim = Simulator::with_faults(variant, faults);
    let mut dev = sim.device();
    let bringup = Bringup::new(config, Box::new(source));

    println!("Simulating {} bring-up ...", variant.chip);
    match bringup.bring_up(&mut dev) {
        Ok(report) => {
            println!("Result     : running ({:?})", report.confidence);
            for s in report.patch.iter().chain(&report.ram) {
                println!(
                    "  {:#010x}  len {:#8x}  cmd {:#04x}  {} chunks",
                    s.addr, s.len, s.config_cmd, s.chunks
                );
            }
            for c in report.outcome.caveats() {
                println!("  caveat: {c}");
            }
        }
        Err(e) => {
            println!("Result     : failed: {e}");
            if e.is_crash() {
                println!("Recovering ...");
                let report = bringup.recover(&mut dev)?;
                println!("Recovered  : {:?} path, {:?}", report.path, report.confidence);
            }
        }
    }
    println!(
        "Frames {}  chunks {}  virtual time {:?}",
        sim.frames().len(),
        sim.scatter_chunks().len(),
        sim.elapsed()
    );
    Ok(())
}

fn device_id(pcie_addr: &str) -> Result<u16> {
    let path = format!("/sys/bus/pci/devices/{pcie_addr}/device");
    let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let id = u16::from_str_radix(raw.trim().trim_start_matches("0x"), 16)
        .with_context(|| format!("parsing device id {:?}", raw.trim()))?;
    Ok(id)
}

fn cmd_status(pcie_addr: &str) -> Result<()> {
    use mt7927_driver::chip::{device_id as ids, regs};

    let id = device_id(pcie_addr)?;
    let Some(variant) = VariantConfig::for_device_id(id) else {
        bail!("{pcie_addr}: device {id:#06x} is not a supported chip (expected {:#06x})", ids::MT7927);
    };
    let bus = MmioBus::open(pcie_addr, 0)?;
    let shim = RegisterShim::new(Box::new(bus), variant.remap);

    let version = shim.read(regs::CONN_INFRA_VERSION);
    let romcode = shim.read(regs::ROMCODE_INDEX);
    let status = shim.read(regs::MCU_STATUS);
    let sema = shim.read(regs::CONN_SEMAPHORE);
    let ap2wf = shim.read(regs::AP2WF_BUS);
    let lpctl = shim.read(regs::CONN_ON_LPCTL);
    shim.restore();

    println!("Device     : {} @ {pcie_addr}", variant.chip);
    println!("CONN_INFRA : {version:#010x}");
    println!("ROMCODE    : {romcode:#010x} ({})", McuState::classify(romcode, variant));
    println!("MCU_STATUS : {status:#010x}");
    println!(
        "Semaphore  : {sema:#010x} ({})",
        if sema & regs::SEMA00_OWNED_BY_MCU != 0 { "owned by MCU" } else { "free" }
    );
    println!(
        "Init done  : {}",
        if ap2wf & regs::WFSYS_SW_INIT_DONE != 0 { "yes" } else { "no" }
    );
    println!(
        "Ownership  : {lpctl:#010x} ({})",
        if lpctl & regs::lpctl::OWN_SYNC != 0 { "firmware" } else { "driver" }
    );
    Ok(())
}
