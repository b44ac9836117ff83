//! promdapt CLI entry point.

use promdapt_lib::cli::{self, Cli};
use promdapt_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
