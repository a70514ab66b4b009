//! `flowadm version` command.

pub fn execute() -> anyhow::Result<()> {
    println!("flowadm version: {}", env!("CARGO_PKG_VERSION"));
    println!("commit: {}", option_env!("FLOWADM_COMMIT").unwrap_or("unknown"));
    println!(
        "built: {}",
        option_env!("FLOWADM_BUILD_DATE").unwrap_or("unknown")
    );
    Ok(())
}
