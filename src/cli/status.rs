//! `quickmc status`: one-shot status probe.

use std::time::Duration;

use anyhow::Result;

use quickmc::config::Config;
use quickmc::status::{probe, report_lines};

pub(crate) async fn cmd_status(
    config: &Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.status.host.clone());
    let port = port.unwrap_or(config.status.port);

    let snapshot = probe(&host, port, Duration::from_secs(config.status.timeout_secs)).await;
    for line in report_lines(&host, port, &snapshot) {
        println!("{}", line);
    }
    Ok(())
}
