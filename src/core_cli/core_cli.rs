use structopt::StructOpt;

/// Command-line arguments
#[derive(StructOpt, Debug)]
#[structopt(name = "ferroftpd", about = "A multi-user FTP server written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[structopt(short, long, default_value = "")]
    pub config: String,

    /// Override the listen port from the configuration file
    #[structopt(short, long)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[structopt(short, long)]
    pub verbose: bool,
}
