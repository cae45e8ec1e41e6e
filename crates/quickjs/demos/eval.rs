//! Evaluates the expressions given on the command line (default `2 + 2`).
//!
//! `RUST_LOG=scriptcore=debug cargo run --example eval -- "6 * 7"`

use anyhow::{Context, Result};
use scriptcore::{Engine, ProcessRuntime};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut sources: Vec<String> = std::env::args().skip(1).collect();
    if sources.is_empty() {
        sources.push("2 + 2".to_string());
    }

    let runtime = ProcessRuntime::initialize(scriptcore_quickjs::api())
        .context("failed to initialize engine")?;
    {
        let mut engine = Engine::new(&runtime).context("failed to create engine")?;
        let scope = engine.scope()?;
        for source in &sources {
            match scope.eval(source) {
                Ok(Some(text)) => println!("{source} => {text}"),
                Ok(None) => println!("{source} => (no result)"),
                Err(err) => println!("{source} => error: {err}"),
            }
        }
    }
    runtime.cleanup().context("failed to clean up engine")?;
    Ok(())
}
