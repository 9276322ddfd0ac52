//! # trailnet-topology
//!
//! CLI for running the network topology pipeline against a trail set and a
//! config file.

use clap::{crate_version, App, Arg, SubCommand};

use trailnet_topology::config::Config;
use trailnet_topology::model::{Report, Trail};
use trailnet_topology::pipeline::Pipeline;
use trailnet_topology::stages::preprocessor;

fn main() -> std::io::Result<()> {
	env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));
	let matches = App::new("Trail Network Topology")
		.version(crate_version!())
		.about("Turn georeferenced trail polylines into a routable, topologically clean graph")
		.subcommand(
			SubCommand::with_name("build")
				.about("Run the full nine-stage pipeline and write vertices/edges/report")
				.arg(
					Arg::with_name("trails")
						.takes_value(true)
						.required(true)
						.index(1)
						.help("Trail set JSON"),
				)
				.arg(
					Arg::with_name("config")
						.takes_value(true)
						.required(true)
						.index(2)
						.help("Pipeline config YAML"),
				)
				.arg(
					Arg::with_name("output")
						.takes_value(true)
						.required(true)
						.index(3)
						.help("Output JSON"),
				),
		)
		.subcommand(
			SubCommand::with_name("validate")
				.about("Pre-flight check a trail set without building a graph")
				.arg(
					Arg::with_name("trails")
						.takes_value(true)
						.required(true)
						.index(1)
						.help("Trail set JSON"),
				)
				.arg(
					Arg::with_name("config")
						.takes_value(true)
						.required(true)
						.index(2)
						.help("Pipeline config YAML"),
				),
		)
		.get_matches();

	log::info!("Loading...");
	if let Some(matches) = matches.subcommand_matches("build") {
		let trails: Vec<Trail> =
			serde_json::from_reader(&std::fs::File::open(matches.value_of("trails").unwrap())?)
				.expect("trail set invalid JSON");
		let config: Config =
			serde_yaml::from_reader(&std::fs::File::open(matches.value_of("config").unwrap())?)
				.expect("config invalid YAML");
		log::info!("Loaded {} trails", trails.len());

		let pipeline = Pipeline::new(config);
		let mut report = Report::default();
		match pipeline.run(trails, &mut report) {
			Ok(output) => {
				log::info!(
					"Built {} vertices, {} edges",
					output.vertices.len(),
					output.edges.len()
				);
				serde_json::to_writer(
					&std::fs::File::create(matches.value_of("output").unwrap())?,
					&output,
				)
				.expect("failed writing output JSON");
			}
			Err(err) => {
				log::error!("pipeline failed: {err}");
				log::info!(
					"partial report from completed stages: {:?}",
					report.stage_counts
				);
				std::process::exit(1);
			}
		}
	} else if let Some(matches) = matches.subcommand_matches("validate") {
		let trails: Vec<Trail> =
			serde_json::from_reader(&std::fs::File::open(matches.value_of("trails").unwrap())?)
				.expect("trail set invalid JSON");
		let config: Config =
			serde_yaml::from_reader(&std::fs::File::open(matches.value_of("config").unwrap())?)
				.expect("config invalid YAML");
		let summary = preprocessor::validate(&trails, &config);
		log::info!("{:#?}", summary);
		println!("{}", serde_json::to_string_pretty(&summary).unwrap());
	}
	Ok(())
}
