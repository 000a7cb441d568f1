use crate::cache::CacheManager;
use crate::cli::{CacheArgs, CacheCommands};
use crate::error::Result;
use tracing::info;

pub async fn run(args: CacheArgs) -> Result<()> {
    let manager = CacheManager::new()?;
    match args.command {
        CacheCommands::Path => {
            println!("{}", manager.path().display());
        }
        CacheCommands::Clear => {
            info!("Clearing cache at {:?}", manager.path());
            let removed = manager.clear()?;
            println!(
                "Removed {} cached structure(s) from {}",
                removed,
                manager.path().display()
            );
        }
    }
    Ok(())
}
