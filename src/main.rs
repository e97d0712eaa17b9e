use std::env;
use std::fs;
use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};

use light_clusters::app::{self, Overrides};
use light_clusters::{Scene, SliceGrid};

const USAGE: &str =
    "Usage: light-clusters <scene.xml> [--slices X Y Z] [--capacity N] [--aspect A] [--refine] [--dump]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read scene {}", options.path))?;
    let scene = Scene::from_xml(&xml).context("failed to parse scene XML")?;

    println!(
        "Loaded scene with {} objects ({} lights)",
        scene.objects.len(),
        scene.lights.len()
    );

    let frame = app::cluster_scene(&scene, &options.overrides)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    app::write_summary(&mut out, &frame)?;
    if options.dump {
        app::write_cells(&mut out, &frame.buffer)?;
    }
    out.flush()?;
    Ok(())
}

struct CliOptions {
    path: String,
    overrides: Overrides,
    dump: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(path) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut overrides = Overrides::default();
        let mut dump = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--slices" => {
                    let mut counts = [0u32; 3];
                    for count in counts.iter_mut() {
                        *count = next_value(&mut args, "--slices")?;
                    }
                    let [x, y, z] = counts;
                    overrides.slices = Some(SliceGrid::new(x, y, z)?);
                }
                "--capacity" => overrides.capacity = Some(next_value(&mut args, "--capacity")?),
                "--aspect" => overrides.aspect = Some(next_value(&mut args, "--aspect")?),
                "--refine" => overrides.refine = true,
                "--dump" => dump = true,
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(Self {
            path,
            overrides,
            dump,
        })
    }
}

fn next_value<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = args
        .next()
        .ok_or_else(|| anyhow!("{flag} expects a value"))?;
    value
        .parse()
        .with_context(|| format!("invalid value {value:?} for {flag}"))
}
