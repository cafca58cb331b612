use std::{net::IpAddr, path::PathBuf, sync::Arc};

use hyper::{
    service::{make_service_fn, service_fn},
    Server,
};
use server::{app::App, AppSettings, Webserver};
use structopt::StructOpt;

#[macro_use]
extern crate log;

#[tokio::main]
async fn main() {
    let env = std::env::var("PARTYLIST_ENV").unwrap_or_else(|_| "test".to_string());

    let env_file_name = format!("{}.env", env);

    if let Err(e) = dotenv::from_filename(&env_file_name) {
        warn!(
            "environment file not found: {}, error: {}",
            env_file_name, e
        );
    }

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&log_filters)
        .init();

    let settings = AppSettings::from(Opts::from_args());

    let app = Arc::new(App::from_settings(&settings));

    let webserver = Arc::new(Webserver::new(app));

    let addr = settings.socket_addr();

    let service = make_service_fn(|_| {
        let webserver = webserver.clone();
        async {
            Ok::<_, hyper::Error>(service_fn(move |request| {
                let webserver = webserver.clone();
                server::entry_point(webserver, request)
            }))
        }
    });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(service),
        Err(e) => {
            error!("could not bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!(
        "starting server on http://{} with list file {:?}",
        addr, settings.data_file
    );

    let server = server.with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {}", e);
        }
        info!("shutting down");
    });

    if let Err(e) = server.await {
        error!("server error: {}", e);
    }
}

#[derive(StructOpt, Debug, Clone)]
pub struct Opts {
    #[structopt(long, default_value = "8080", env = "PARTYLIST_LISTEN_PORT")]
    port: u16,
    #[structopt(long, default_value = "0.0.0.0", env = "PARTYLIST_BIND_ADDR")]
    bind_addr: IpAddr,
    #[structopt(
        long,
        default_value = "./einkaufsliste.json",
        env = "PARTYLIST_DATA_FILE",
        parse(from_os_str)
    )]
    data_file: PathBuf,
}

impl From<Opts> for AppSettings {
    fn from(
        Opts {
            port,
            bind_addr,
            data_file,
        }: Opts,
    ) -> Self {
        Self {
            port,
            bind_addr,
            data_file,
        }
    }
}
