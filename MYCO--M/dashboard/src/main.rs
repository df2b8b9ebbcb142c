use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use myco_dashboard::{
    render_mushrooms, render_prediction, render_summary, DashboardClient, DatasetSummary,
    DEFAULT_API,
};
use myco_learning::Dataset;

#[derive(Parser, Debug)]
#[command(
    name = "myco-dashboard",
    version,
    about = "Mushroom Classification Dashboard"
)]
struct Cli {
    /// Prediction service base URL.
    #[arg(long, default_value = DEFAULT_API)]
    api: String,
    /// Dataset used for the statistics section.
    #[arg(long, default_value = "data/mushrooms.csv")]
    data: PathBuf,
    #[arg(long, default_value = "class")]
    target: String,
    /// Feature values as a JSON object; enables the prediction and list sections.
    #[arg(long)]
    input: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    println!("Mushroom Classification Dashboard\n");

    let dataset = Dataset::from_csv(&cli.data, &cli.target)
        .with_context(|| format!("loading {}", cli.data.display()))?;
    print!("{}", render_summary(&DatasetSummary::from_dataset(&dataset)));

    let Some(input) = cli.input else {
        return Ok(());
    };
    let client = DashboardClient::new(cli.api)?;

    println!("\n== Make a Prediction ==");
    let prediction = client.predict(&input).await;
    if let Err(err) = &prediction {
        eprintln!("prediction failed: {err}");
    }
    print!("{}", render_prediction(&prediction));

    println!();
    let lists = client.mushrooms().await;
    if let Err(err) = &lists {
        eprintln!("fetching lists failed: {err}");
    }
    print!("{}", render_mushrooms(&lists));
    Ok(())
}
