//! `quickmc fetch`: acquire and prepare the server jar without launching it.

use anyhow::Result;

use quickmc::config::Config;
use quickmc::health::ServiceMetrics;

use super::common::{acquire_artifact, describe};

pub(crate) async fn cmd_fetch(config: &Config) -> Result<()> {
    let metrics = ServiceMetrics::new();
    let artifact = acquire_artifact(config, &metrics).await?;

    println!("Artifact: {}", describe(&artifact));
    if let Some(sha) = &artifact.sha256 {
        println!("SHA-256:  {}", sha);
    }
    println!(
        "EULA:     {}",
        if artifact.accepted {
            "accepted"
        } else {
            "not accepted"
        }
    );
    Ok(())
}
