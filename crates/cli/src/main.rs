use clap::Parser;
use tagwrite_cli::{
	cli::Cli,
	logging,
	output::{self, WriteReport},
	write,
};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;

	match write::run(&cli).await {
		Ok(report) => {
			output::print_report(&report, format);
			if !report.ok {
				std::process::exit(1);
			}
		}
		Err(err) => {
			tracing::error!(error = %err, "Run aborted");
			output::print_report(&WriteReport::from_cli_error(&err), format);
			std::process::exit(err.exit_code());
		}
	}
}
