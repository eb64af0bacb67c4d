use std::path::Path;

use lifelog_storage::{FsRecordStore, RecordStore};
use lifelog_worker::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env();

    println!(
        "lifelog-selfcheck: starting with root={}",
        config.root_dir.display()
    );
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    ensure_root(&config.root_dir).await?;
    ensure_env_present(&["OPENAI_API_KEY", "LIFELOG_SUBJECTS"])?;
    report_leaf_stores(&config).await?;

    println!("lifelog-selfcheck: ok");
    Ok(())
}

/// Create the root if needed and prove it accepts writes.
async fn ensure_root<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    let check = path.join(format!(".lifelog-selfcheck-{}", std::process::id()));
    tokio::fs::write(&check, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("root {} is not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&check).await?;
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true) {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}

/// Print how many captions each subject has; a missing leaf store is not an error.
async fn report_leaf_stores(config: &PipelineConfig) -> anyhow::Result<()> {
    let store = FsRecordStore::new(config.root_dir.clone());
    let layout = config.layout();

    for subject in &config.subjects {
        let leaf = layout.leaf(subject)?;
        let listing = match store.scan(&leaf).await {
            Ok(listing) => listing,
            Err(e) if e.is_not_found() => {
                println!("lifelog-selfcheck: {} has no {}", subject, leaf);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        println!(
            "lifelog-selfcheck: {} has {} captions ({} skipped entries)",
            subject,
            listing.records.len(),
            listing.skipped.len()
        );
    }
    Ok(())
}
