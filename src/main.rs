use glove_prep::{logging, Config, Pipeline};
use std::env;
use tracing::error;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {

    let args: Vec<String> = env::args().collect();

    // the log file is part of the configuration, so nothing is logged before it is read
    let params = match Config::new(&args) {
        Ok(config) => config.get_params(),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    match logging::subscriber(params.log_file.as_deref()) {
        Ok(subscriber) => subscriber.init(),
        Err(e) => {
            eprintln!("cannot open log file: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = Pipeline::run(&params) {
        error!("{}", e);
        std::process::exit(1);
    }
}
