use abrdl::{ManifestLocation, RepresentationCatalog};
use clap::Parser;
use clap_handler::handler;

use super::download::{HttpOptions, ManifestOptions};

/// Print the representations of a manifest
#[derive(Parser, Clone, Default)]
#[clap(name = "inspect", short_flag = 'S')]
pub struct InspectCommand {
    #[clap(flatten)]
    http: HttpOptions,

    #[clap(flatten)]
    manifest: ManifestOptions,

    /// Print the catalog as JSON
    #[clap(long)]
    json: bool,

    /// Manifest URL or local path
    url: String,
}

fn print_catalog(catalog: &RepresentationCatalog) {
    println!(
        "{:<16} {:>12} {:>11}  {:<24} TEMPLATE",
        "ID", "BANDWIDTH", "RESOLUTION", "CODECS"
    );
    for representation in catalog.iter() {
        println!(
            "{:<16} {:>12} {:>11}  {:<24} {}",
            representation.id,
            representation.bandwidth,
            representation.resolution().unwrap_or_else(|| "-".to_string()),
            representation.codecs.as_deref().unwrap_or("-"),
            representation.media
        );
    }

    match (catalog.presentation_duration(), catalog.segment_count()) {
        (Some(duration), Some(count)) => {
            println!("\nDuration {:.2}s, {count} segment(s)", duration.as_secs_f64())
        }
        (Some(duration), None) => println!("\nDuration {:.2}s", duration.as_secs_f64()),
        _ => {}
    }
}

#[handler(InspectCommand)]
async fn handle_inspect(this: InspectCommand) -> anyhow::Result<()> {
    let location = ManifestLocation::parse(&this.url)?;
    let client = this.http.into_client(&location)?;
    let catalog = this.manifest.load(&client, &location).await?;

    if this.json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        print_catalog(&catalog);
    }

    Ok(())
}
