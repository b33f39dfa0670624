use std::env;
use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use doc_descs::{generate, AxisOverrides, GenerateOpts, LinkLayer, Overlay, Preset};
use tracing::info;

#[derive(Args, Debug)]
pub struct DescsArgs {
    #[command(subcommand)]
    pub preset: PresetCommand,
}

#[derive(Subcommand, Debug)]
pub enum PresetCommand {
    /// Transport comparison under load.
    Load(LoadArgs),
    /// Queries through a caching CoAP proxy.
    Proxy(CommonArgs),
    /// CoAP caching with the Max-Age modes.
    MaxAge(CommonArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Build firmware in the RIOT docker image; OSCORE runs are skipped.
    #[arg(short, long)]
    pub docker: bool,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Restrict the runs to one link layer (ieee802154, "IEEE 802.15.4", 802154, ble).
    pub link_layer: Option<LinkLayer>,
    /// Reflash before the first run of every experiment.
    #[arg(short, long)]
    pub rebuild_first: bool,
    /// Schedule every run into this running testbed experiment.
    #[arg(short = 'i', long)]
    pub exp_id: Option<u64>,
    /// Output path, defaults to descs.yaml in the script directory.
    #[arg(short, long)]
    pub output_desc: Option<PathBuf>,
    /// Script directory, defaults to the directory of this executable.
    #[arg(long)]
    pub script_dir: Option<PathBuf>,
    /// Queries per run of the scaled variant.
    #[arg(long, value_name = "N")]
    pub scale: Option<u32>,
    /// YAML file narrowing the axes, applied last.
    #[arg(long)]
    pub overrides: Option<PathBuf>,
}

pub fn run(args: &DescsArgs) -> Result<(), Box<dyn Error>> {
    let (preset, common, docker) = match &args.preset {
        PresetCommand::Load(load) => (Preset::load(), &load.common, load.docker),
        PresetCommand::Proxy(common) => (Preset::proxy(), common, false),
        PresetCommand::MaxAge(common) => (Preset::max_age(), common, false),
    };
    let preset = match common.scale {
        Some(n) => preset.scaled(n),
        None => preset,
    };

    let mut overlays = Vec::new();
    if let Some(link_layer) = common.link_layer {
        overlays.push(Overlay::LinkLayer(link_layer));
    }
    if docker {
        overlays.push(Overlay::Docker);
    }
    if let Some(path) = &common.overrides {
        overlays.push(Overlay::Axes(AxisOverrides::load(path)?));
    }
    let plan = preset.plan_with(&overlays)?;

    let opts = GenerateOpts {
        rebuild_first: common.rebuild_first,
        exp_id: common.exp_id,
    };
    let desc = generate(&plan, &opts)?;
    let path = match &common.output_desc {
        Some(path) => {
            desc.write_to(path)?;
            path.clone()
        }
        None => desc.write_to_dir(&script_dir(common)?)?,
    };
    info!(
        preset = %preset,
        path = %path.display(),
        fingerprint = %desc.fingerprint()?,
        "descs ready"
    );
    Ok(())
}

fn script_dir(common: &CommonArgs) -> Result<PathBuf, Box<dyn Error>> {
    if let Some(dir) = &common.script_dir {
        return Ok(dir.clone());
    }
    let exe = env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or("executable has no parent directory, pass --script-dir")?;
    Ok(dir.to_path_buf())
}
