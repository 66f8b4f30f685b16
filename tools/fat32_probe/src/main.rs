//! Read a FAT32 image file through `fat32_ro`, without host filesystem support.
//!
//! ```text
//! fat32_probe <image> [info | ls [dir] | stat <path> | cat <path>]
//! ```
//!
//! `FAT32_LOG` sets the log level (default `info`), `FAT32_CACHE` the path
//! cache capacity.

mod logger;

use std::env;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process::ExitCode;

use fat32_ro::{Fat32Error, Fat32Volume, IoDevice, MountOptions};
use log::{LevelFilter, error, warn};
use vfs_api_types::MountableFs;

const USAGE: &str = "usage: fat32_probe <image> [info | ls [dir] | stat <path> | cat <path>]";

type Volume = Fat32Volume<IoDevice<BufReader<File>>>;

enum ProbeError {
    Usage,
    Open(String, io::Error),
    Output(io::Error),
    Fs(Fat32Error),
}

impl From<Fat32Error> for ProbeError {
    fn from(e: Fat32Error) -> Self {
        Self::Fs(e)
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => f.write_str(USAGE),
            Self::Open(path, e) => write!(f, "{path}: {e}"),
            Self::Output(e) => write!(f, "write failed: {e}"),
            Self::Fs(e) => write!(f, "{e} ({:?})", e.status()),
        }
    }
}

fn main() -> ExitCode {
    let level = env::var("FAT32_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    if let Err(e) = logger::init(level) {
        eprintln!("fat32_probe: logger: {e}");
    }

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(ProbeError::Usage) => {
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn options_from_env() -> MountOptions {
    let mut options = MountOptions::new();
    if let Ok(raw) = env::var("FAT32_CACHE") {
        match raw.parse::<usize>() {
            Ok(capacity) => options = options.path_cache_capacity(capacity),
            Err(_) => warn!("FAT32_CACHE={raw:?} is not a number, keeping {}", options.path_cache_capacity),
        }
    }
    options
}

fn run(args: &[String]) -> Result<(), ProbeError> {
    let (image, rest) = args.split_first().ok_or(ProbeError::Usage)?;
    let file = File::open(image).map_err(|e| ProbeError::Open(image.clone(), e))?;
    let mut device = IoDevice::new(BufReader::new(file));
    if !Fat32Volume::probe(&mut device)? {
        warn!("{image}: filesystem type label is not FAT32, mounting anyway");
    }
    let volume = Fat32Volume::mount_with(device, options_from_env())?;

    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
    match rest.as_slice() {
        [] | ["info"] => info(&volume),
        ["ls"] => ls(&volume, "/"),
        ["ls", dir] => ls(&volume, dir),
        ["stat", path] => stat(&volume, path),
        ["cat", path] => cat(&volume, path),
        _ => Err(ProbeError::Usage),
    }
}

fn info(volume: &Volume) -> Result<(), ProbeError> {
    let v = volume.volume_info();
    let g = volume.geometry();
    println!("label          {}", v.label);
    println!("serial         {:#010x}", v.id);
    println!("oem            {}", g.oem());
    println!("type label     {}", g.fs_type_label());
    println!("cluster size   {} bytes", g.bytes_per_cluster);
    println!("clusters       {}", g.total_clusters);
    match g.free_clusters {
        Some(n) => println!("free           {n} clusters ({} bytes)", v.free_bytes),
        None => println!("free           unknown"),
    }
    println!("root cluster   {}", g.root_cluster);
    if g.single_active_fat() {
        println!("fats           {} (only #{} active)", g.num_fats, g.active_fat());
    } else {
        println!("fats           {} (mirrored)", g.num_fats);
    }
    Ok(())
}

fn ls(volume: &Volume, dir: &str) -> Result<(), ProbeError> {
    let dir = volume.resolve(dir)?;
    for entry in dir.entries()? {
        let kind = if entry.is_dir() { 'd' } else { '-' };
        let ro = if entry.is_read_only() { 'r' } else { '-' };
        println!("{kind}{ro} {:>10} {} {}", entry.len(), entry.modified(), entry.name());
    }
    Ok(())
}

fn stat(volume: &Volume, path: &str) -> Result<(), ProbeError> {
    let entry = volume.lookup(path)?;
    let st = entry.stat();
    println!("name        {}", entry.name());
    println!("short name  {}", entry.short_name());
    println!("kind        {:?}", st.kind);
    println!("size        {}", st.size);
    println!("attributes  {:?}", entry.attributes());
    println!("cluster     {}", entry.first_cluster());
    println!("created     {}", st.created);
    println!("accessed    {}", st.accessed);
    println!("modified    {}", st.modified);
    let stats = volume.cache_stats();
    log::debug!("path cache {}/{} entries, {} hits, {} misses", stats.len, stats.capacity, stats.hits, stats.misses);
    Ok(())
}

fn cat(volume: &Volume, path: &str) -> Result<(), ProbeError> {
    let data = volume.read_file(path)?;
    io::stdout().lock().write_all(&data).map_err(ProbeError::Output)
}
