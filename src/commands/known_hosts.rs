use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::cli::KnownHostsArgs;
use crate::ssh::HostKeyVerifier;

pub async fn cmd_known_hosts(args: KnownHostsArgs) -> Result<()> {
    let verifier = HostKeyVerifier::from_file(&args.file)?;

    let mut key_types: Vec<&str> = verifier.key_types().collect();
    key_types.sort_unstable();
    for key_type in key_types {
        println!("{}", key_type);
    }

    if let Some(key) = &args.key {
        let blob = STANDARD.decode(key.trim()).context("decoding --key")?;
        verifier
            .verify_blob(&blob)
            .with_context(|| format!("key does not match {}", args.file.display()))?;
        println!("key matches");
    }

    Ok(())
}
