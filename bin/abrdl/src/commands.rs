use clap::Subcommand;
use clap_handler::Handler;

mod download;
mod inspect;
mod serve;

#[derive(Subcommand, Clone, Handler)]
pub enum AbrdlCommand {
    Download(download::DownloadCommand),
    Inspect(inspect::InspectCommand),
    Serve(serve::ServeCommand),
}
