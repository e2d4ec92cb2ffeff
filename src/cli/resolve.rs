//! `quickmc resolve`: print the coordinate the pipeline would fetch.

use anyhow::Result;
use serde::Serialize;

use quickmc::artifact::{resolve_artifact, CoordinateHints};
use quickmc::config::Config;

use super::common::catalog;

#[derive(Serialize)]
struct Resolved<'a> {
    project: &'a str,
    version: &'a str,
    build: u32,
    file_name: &'a str,
    sha256: &'a str,
    download_link: &'a str,
}

pub(crate) async fn cmd_resolve(config: &Config, json: bool) -> Result<()> {
    let client = catalog(config)?;
    let hints = CoordinateHints::from_config(&config.paper);
    let (coordinate, descriptor) = resolve_artifact(&client, &hints).await?;

    if json {
        let resolved = Resolved {
            project: &coordinate.project,
            version: &coordinate.version,
            build: coordinate.build,
            file_name: &descriptor.file_name,
            sha256: &descriptor.expected_sha256,
            download_link: &descriptor.download_link,
        };
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        println!("Project:  {}", coordinate.project);
        println!("Version:  {}", coordinate.version);
        println!("Build:    {}", coordinate.build);
        println!("File:     {}", descriptor.file_name);
        println!("SHA-256:  {}", descriptor.expected_sha256);
        println!("Download: {}", descriptor.download_link);
    }
    Ok(())
}
