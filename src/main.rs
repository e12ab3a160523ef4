use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;

use lifeline_server::{
    database, init_logging,
    models::auth::{install_keys, AuthenticationMiddlewareFactory, Keys},
    routes, Config,
};

fn startup_error(error: lifeline_server::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config: Config = Config::load().map_err(startup_error)?;
    init_logging(config.log_level.as_deref());

    database::connect(&config.database)
        .await
        .map_err(startup_error)?;
    if let Err(error) = database::ensure_indexes().await {
        tracing::warn!(%error, "continuing without verified indexes");
    }

    install_keys(Keys::load(&config.auth).map_err(startup_error)?);

    let bind = (config.server.host.clone(), config.server.port);
    let data = web::Data::new(config);
    tracing::info!(host = %bind.0, port = bind.1, "starting server");

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(AuthenticationMiddlewareFactory)
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .configure(routes::configure)
    })
    .bind(bind)?
    .run()
    .await
}
