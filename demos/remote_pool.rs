//! Several workers appending gzip logs through a small client pool.
//!
//! Each worker owns its log file: concurrent appenders on one remote path
//! interleave their gzip members.
//!
//! ```text
//! RUST_LOG=debug cargo run --example remote_pool
//! ```

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use tracing::info;
use tracing_subscriber::EnvFilter;
use unifile::remote::MemoryBackend;
use unifile::{FsError, FsExt, FsRead, FsWrite, RemoteConfig, RemoteFs};

const WORKERS: usize = 6;
const LINES_PER_WORKER: usize = 3;

fn main() -> Result<(), FsError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let backend = MemoryBackend::new();
    let config = RemoteConfig::from_env()
        .unwrap_or_else(|_| RemoteConfig::new("memory:8020").with_pool_size(2));
    let fs = Arc::new(RemoteFs::connect(config, |addr| backend.connect(addr))?);
    fs.makedirs(Path::new("/logs"))?;

    let workers: Vec<_> = (0..WORKERS)
        .map(|id| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || -> Result<(), FsError> {
                let path = PathBuf::from(format!("/logs/worker-{id}.log.gz"));
                for n in 0..LINES_PER_WORKER {
                    let mut file = fs.append_to(&path)?;
                    let mut writer = file.writer(0)?;
                    writeln!(writer, "worker {id} line {n}")?;
                    writer.finish()?;
                    file.close()?;
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        match worker.join() {
            Ok(result) => result?,
            Err(_) => tracing::error!("worker panicked"),
        }
    }

    for path in fs.glob("/logs/*.gz")? {
        let raw = fs.stat(&path)?.map_or(0, |m| m.size);
        let mut file = fs.open_read(&path)?;
        let lines = file.reader(0)?.lines().collect::<Result<Vec<_>, _>>()?.len();
        info!(path = %path.display(), lines, compressed_bytes = raw, "log summary");
        file.close()?;
    }
    info!(idle = fs.pool().available(), "done");
    Ok(())
}
